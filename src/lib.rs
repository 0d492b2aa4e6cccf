//! Deterministic form-interaction controller for server-rendered formset pages.
//!
//! A [`FormPage`] parses the page HTML into a lightweight DOM, binds every
//! `.formset` container into explicit [`Formset`] state and then reacts to
//! user input: adding and removing sub-forms, toggling the tender/referral
//! field groups and repopulating dependent dropdowns from a lookup backend.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

mod config;
mod dom;
mod field_name;
mod formset;
mod html;
mod lookup;
mod page;
mod selector;
mod visibility;

pub use config::{ControllerConfig, DependentSelectConfig};
pub use field_name::{FieldRef, RowIndex};
pub use formset::{FormRow, Formset, Removal, RowId, RowState};
pub use lookup::{
    ContactPerson, LookupBackend, LookupFailure, LookupOutcome, LookupRequest, MockLookupBackend,
    RequestSequencer,
};
pub use page::FormPage;
pub use visibility::{EnquiryType, GroupVisibility};

use dom::{Dom, NodeId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    DomRuntime(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    Binding(String),
    Lookup(String),
    Config(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::DomRuntime(msg) => write!(f, "dom runtime error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::Binding(msg) => write!(f, "formset binding error: {msg}"),
            Self::Lookup(msg) => write!(f, "lookup error: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}

//! Structured view of formset field identifiers.
//!
//! Every formset control is named `<prefix>-<index>-<field>`, its element id
//! is the same string behind `id_`, and a label's `for` mirrors the id. The
//! server renders the template row with the literal token `__prefix__` in
//! place of the index; that token is only recognised here, while binding.

use std::fmt;

const PLACEHOLDER_TOKEN: &str = "__prefix__";
const ID_PREFIX: &str = "id_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowIndex {
    Placeholder,
    At(usize),
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => f.write_str(PLACEHOLDER_TOKEN),
            Self::At(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub prefix: String,
    pub index: RowIndex,
    pub field: String,
    /// Whether the reference was written in element-id form (`id_...`).
    pub id_form: bool,
}

impl FieldRef {
    /// Parses `value` as a reference into the formset named `prefix`.
    ///
    /// Management fields such as `items-TOTAL_FORMS` and references into
    /// other formsets yield `None`.
    pub fn parse(value: &str, prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let (id_form, bare) = match value.strip_prefix(ID_PREFIX) {
            Some(rest) if rest.starts_with(prefix) => (true, rest),
            _ => (false, value),
        };
        let rest = bare.strip_prefix(prefix)?.strip_prefix('-')?;
        let (raw_index, field) = rest.split_once('-')?;
        if field.is_empty() {
            return None;
        }
        let index = if raw_index == PLACEHOLDER_TOKEN {
            RowIndex::Placeholder
        } else if !raw_index.is_empty() && raw_index.bytes().all(|b| b.is_ascii_digit()) {
            RowIndex::At(raw_index.parse().ok()?)
        } else {
            return None;
        };
        Some(Self {
            prefix: prefix.to_string(),
            index,
            field: field.to_string(),
            id_form,
        })
    }

    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index: RowIndex::At(index),
            ..self.clone()
        }
    }

    /// The form-field name, `<prefix>-<index>-<field>`.
    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.prefix, self.index, self.field)
    }

    /// The element id, `id_<prefix>-<index>-<field>`.
    pub fn element_id(&self) -> String {
        format!("{ID_PREFIX}{}", self.name())
    }

    pub fn is_deletion_marker(&self) -> bool {
        self.field == "DELETE"
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id_form {
            f.write_str(ID_PREFIX)?;
        }
        write!(f, "{}-{}-{}", self.prefix, self.index, self.field)
    }
}

/// Id of the hidden counter that mirrors a formset's visible row count.
pub(crate) fn total_forms_id(prefix: &str) -> String {
    format!("{ID_PREFIX}{prefix}-TOTAL_FORMS")
}

pub(crate) fn max_forms_id(prefix: &str) -> String {
    format!("{ID_PREFIX}{prefix}-MAX_NUM_FORMS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_id_forms() {
        let name = FieldRef::parse("items-3-unit_price", "items");
        assert_eq!(
            name,
            Some(FieldRef {
                prefix: "items".into(),
                index: RowIndex::At(3),
                field: "unit_price".into(),
                id_form: false,
            })
        );

        let id = FieldRef::parse("id_items-__prefix__-DELETE", "items");
        assert_eq!(
            id.as_ref().map(|r| (r.index, r.id_form, r.is_deletion_marker())),
            Some((RowIndex::Placeholder, true, true))
        );
    }

    #[test]
    fn rejects_management_fields_and_foreign_prefixes() {
        assert_eq!(FieldRef::parse("items-TOTAL_FORMS", "items"), None);
        assert_eq!(FieldRef::parse("id_items-TOTAL_FORMS", "items"), None);
        assert_eq!(FieldRef::parse("contacts-0-name", "items"), None);
        assert_eq!(FieldRef::parse("items-x1-name", "items"), None);
        assert_eq!(FieldRef::parse("items-0-", "items"), None);
    }

    #[test]
    fn field_keys_may_contain_dashes() {
        let parsed = FieldRef::parse("items-12-crane-capacity", "items");
        assert_eq!(
            parsed.map(|r| (r.index, r.field)),
            Some((RowIndex::At(12), "crane-capacity".to_string()))
        );
    }

    #[test]
    fn reindexing_keeps_id_and_name_shape() {
        let id = FieldRef::parse("id_items-__prefix__-quantity", "items");
        let renamed = id.map(|r| r.with_index(4).to_string());
        assert_eq!(renamed.as_deref(), Some("id_items-4-quantity"));

        let name = FieldRef::parse("items-7-quantity", "items");
        let renamed = name.map(|r| r.with_index(0));
        assert_eq!(renamed.as_ref().map(FieldRef::name).as_deref(), Some("items-0-quantity"));
        assert_eq!(
            renamed.as_ref().map(FieldRef::element_id).as_deref(),
            Some("id_items-0-quantity")
        );
    }

    #[test]
    fn management_field_ids() {
        assert_eq!(total_forms_id("items"), "id_items-TOTAL_FORMS");
        assert_eq!(max_forms_id("items"), "id_items-MAX_NUM_FORMS");
    }
}

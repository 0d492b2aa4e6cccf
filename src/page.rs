use super::*;
use crate::config::{ControllerConfig, DependentSelectConfig};
use crate::field_name::{max_forms_id, total_forms_id};
use crate::html::parse_html;
use crate::lookup::parse_contact_persons;
use std::collections::VecDeque;

const FORMSET_SELECTOR: &str = ".formset";
const ROW_SELECTOR: &str = ".formset-form";
const ROW_CLASS: &str = "formset-form";
const TEMPLATE_SELECTOR: &str = ".empty-form";
const TEMPLATE_CLASS: &str = "empty-form";
const HIDDEN_CLASS: &str = "d-none";
const ADD_SELECTOR: &str = ".add-form";
const REMOVE_SELECTOR: &str = ".remove-form";
const PRINT_SELECTOR: &str =
    r#"[data-action="print"], [onclick="printDocument()"], [onclick="window.print()"]"#;
const DELETE_MARKER_SELECTOR: &str = r#"input[id$="-DELETE"]"#;
const CLEARABLE_CONTROLS: &str = "input, textarea, select";
const FIELD_ATTRS: [&str; 3] = ["name", "id", "for"];

#[derive(Debug)]
struct BoundFormset {
    state: Formset,
    container: NodeId,
    template: Option<NodeId>,
}

#[derive(Debug)]
struct TraceState {
    enabled: bool,
    to_stderr: bool,
    logs: VecDeque<String>,
    log_limit: usize,
}

impl TraceState {
    fn log(&mut self, line: String) {
        if !self.enabled {
            return;
        }
        if self.to_stderr {
            eprintln!("{line}");
        }
        self.logs.push_back(line);
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
    }
}

/// A bound page: the parsed document plus the controller state driving it.
pub struct FormPage {
    dom: Dom,
    config: ControllerConfig,
    formsets: Vec<BoundFormset>,
    sequencer: RequestSequencer,
    pending_lookups: Vec<LookupRequest>,
    lookup_mocks: MockLookupBackend,
    lookup_backend: Option<Box<dyn LookupBackend>>,
    lookup_calls: Vec<String>,
    print_count: usize,
    trace: TraceState,
}

impl FormPage {
    pub fn from_html(html: &str) -> Result<Self> {
        Self::with_config(html, ControllerConfig::default())
    }

    /// Parses `html`, binds every `.formset` container and applies the
    /// initial field-group visibility.
    ///
    /// The bound row state is authoritative: a `TOTAL_FORMS` counter that
    /// disagrees with the visible rows is rewritten during binding.
    pub fn with_config(html: &str, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let dom = parse_html(html)?;
        let trace = TraceState {
            enabled: false,
            to_stderr: true,
            logs: VecDeque::new(),
            log_limit: config.trace_log_limit,
        };
        let mut page = Self {
            dom,
            config,
            formsets: Vec::new(),
            sequencer: RequestSequencer::default(),
            pending_lookups: Vec::new(),
            lookup_mocks: MockLookupBackend::new(),
            lookup_backend: None,
            lookup_calls: Vec::new(),
            print_count: 0,
            trace,
        };
        page.bind_formsets()?;
        page.apply_visibility()?;
        Ok(page)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.enabled = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace.to_stderr = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.logs.drain(..).collect()
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace.log_limit = max_entries;
        while self.trace.logs.len() > self.trace.log_limit {
            self.trace.logs.pop_front();
        }
        Ok(())
    }

    pub fn formset(&self, prefix: &str) -> Option<&Formset> {
        self.formsets
            .iter()
            .map(|bound| &bound.state)
            .find(|state| state.prefix() == prefix)
    }

    pub fn formset_prefixes(&self) -> Vec<&str> {
        self.formsets
            .iter()
            .map(|bound| bound.state.prefix())
            .collect()
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let label = self.node_label(target);
        tracing::debug!(node = %label, "click");
        self.trace.log(format!("[event] click target={label}"));
        if self.dom.disabled(target) {
            return Ok(());
        }

        if self.is_checkable_input(target) {
            let next = if self.input_type(target) == "radio" {
                true
            } else {
                !self.dom.checked(target)?
            };
            self.dom.set_checked(target, next)?;
            self.handle_change(target)?;
        }

        self.handle_click(target)
    }

    /// Chooses `value` in a `<select>` and fires its change handler.
    pub fn select_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !self.dom.is_tag(target, "select") {
            return Err(self.type_mismatch(selector, "select", target));
        }
        if self.dom.disabled(target) {
            return Ok(());
        }
        self.dom.set_value(target, value)?;
        self.handle_change(target)
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !(self.dom.is_tag(target, "input") || self.dom.is_tag(target, "textarea"))
            || self.is_checkable_input(target)
        {
            return Err(self.type_mismatch(selector, "text input or textarea", target));
        }
        if self.dom.disabled(target) {
            return Ok(());
        }
        self.dom.set_value(target, text)
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if !self.is_checkable_input(target) {
            return Err(self.type_mismatch(selector, "checkbox or radio", target));
        }
        if self.dom.disabled(target) || self.dom.checked(target)? == checked {
            return Ok(());
        }
        self.dom.set_checked(target, checked)?;
        self.handle_change(target)
    }

    /// Fires `event` on the element without changing its state first.
    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let label = self.node_label(target);
        tracing::debug!(node = %label, event, "event dispatched");
        self.trace.log(format!("[event] {event} target={label}"));
        match event {
            "click" => self.handle_click(target),
            "change" => self.handle_change(target),
            _ => Ok(()),
        }
    }

    /// Adds a row to the formset with `prefix`; `Ok(false)` when it is full.
    pub fn add_form(&mut self, prefix: &str) -> Result<bool> {
        let pos = self
            .formsets
            .iter()
            .position(|bound| bound.state.prefix() == prefix)
            .ok_or_else(|| Error::Binding(format!("no formset with prefix {prefix}")))?;
        self.add_row(pos)
    }

    /// Removes the row matched by `selector` (a `.formset-form` element).
    pub fn remove_form(&mut self, selector: &str) -> Result<Removal> {
        let target = self.select_one(selector)?;
        let row = self
            .dom
            .closest(target, ROW_SELECTOR)?
            .ok_or_else(|| Error::Binding(format!("{selector} is not inside a formset row")))?;
        self.remove_row(row)
    }

    /// Removes the visible row currently numbered `index` in `prefix`.
    pub fn remove_row_at(&mut self, prefix: &str, index: usize) -> Result<Removal> {
        let row = self
            .formset(prefix)
            .ok_or_else(|| Error::Binding(format!("no formset with prefix {prefix}")))?
            .rows()
            .iter()
            .find(|row| row.is_visible() && row.index == index)
            .map(|row| NodeId(row.id.0))
            .ok_or_else(|| Error::Binding(format!("formset {prefix} has no visible row {index}")))?;
        self.remove_row(row)
    }

    pub fn print(&mut self) {
        self.print_count += 1;
        tracing::debug!(count = self.print_count, "print dialog requested");
        self.trace
            .log(format!("[print] dialog requested count={}", self.print_count));
    }

    pub fn print_count(&self) -> usize {
        self.print_count
    }

    pub fn set_lookup_mock(&mut self, query_url: &str, body: &str) {
        self.lookup_mocks.set_response(query_url, body);
    }

    pub fn set_lookup_failure(&mut self, query_url: &str, failure: LookupFailure) {
        self.lookup_mocks.set_failure(query_url, failure);
    }

    pub fn clear_lookup_mocks(&mut self) {
        self.lookup_mocks.clear();
    }

    /// Routes lookups to `backend` instead of the registered mocks.
    pub fn set_lookup_backend<B: LookupBackend + 'static>(&mut self, backend: B) {
        self.lookup_backend = Some(Box::new(backend));
    }

    /// Query urls of every lookup issued since the last call.
    pub fn take_lookup_calls(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lookup_calls)
    }

    pub fn pending_lookups(&self) -> &[LookupRequest] {
        &self.pending_lookups
    }

    /// Resolves the pending lookup `token` through the active backend.
    pub fn complete_lookup(&mut self, token: u64) -> Result<LookupOutcome> {
        let request = self.take_pending(token)?;
        let response = match self.lookup_backend.as_mut() {
            Some(backend) => backend.fetch(&request),
            None => self.lookup_mocks.fetch(&request),
        };
        self.finish_lookup(request, response)
    }

    /// Resolves the pending lookup `token` with an explicit response.
    pub fn respond_lookup(
        &mut self,
        token: u64,
        response: std::result::Result<&str, LookupFailure>,
    ) -> Result<LookupOutcome> {
        let request = self.take_pending(token)?;
        self.finish_lookup(request, response.map(str::to_string))
    }

    /// Resolves every pending lookup in issue order.
    pub fn flush_lookups(&mut self) -> Result<Vec<LookupOutcome>> {
        let tokens = self
            .pending_lookups
            .iter()
            .map(|request| request.token)
            .collect::<Vec<_>>();
        let mut outcomes = Vec::with_capacity(tokens.len());
        for token in tokens {
            outcomes.push(self.complete_lookup(token)?);
        }
        Ok(outcomes)
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, name))
    }

    pub fn is_visible(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.dom.is_rendered(target))
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.dom.query_selector_all(selector)?.len())
    }

    /// `(value, label)` pairs of a select's options in document order.
    pub fn select_options(&self, selector: &str) -> Result<Vec<(String, String)>> {
        let target = self.select_one(selector)?;
        if !self.dom.is_tag(target, "select") {
            return Err(self.type_mismatch(selector, "select", target));
        }
        let mut out = Vec::new();
        for option in self.dom.select_options(target)? {
            out.push((
                self.dom.option_effective_value(option)?,
                self.dom.text_content(option),
            ));
        }
        Ok(out)
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(self.assertion_failed(selector, expected, actual, target));
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(self.assertion_failed(selector, expected, actual, target));
        }
        Ok(())
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        if actual != expected {
            return Err(self.assertion_failed(
                selector,
                &expected.to_string(),
                actual.to_string(),
                target,
            ));
        }
        Ok(())
    }

    pub fn assert_visible(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.is_rendered(target);
        if actual != expected {
            let describe = |visible: bool| if visible { "visible" } else { "hidden" };
            return Err(self.assertion_failed(
                selector,
                describe(expected),
                describe(actual).to_string(),
                target,
            ));
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn handle_click(&mut self, target: NodeId) -> Result<()> {
        if let Some(control) = self.dom.closest(target, ADD_SELECTOR)? {
            let container = self
                .dom
                .closest(control, FORMSET_SELECTOR)?
                .ok_or_else(|| Error::Binding("add control is not inside a .formset".into()))?;
            let pos = self.formset_position(container)?;
            self.add_row(pos)?;
            return Ok(());
        }

        if let Some(control) = self.dom.closest(target, REMOVE_SELECTOR)? {
            let row = self
                .dom
                .closest(control, ROW_SELECTOR)?
                .ok_or_else(|| Error::Binding("remove control is not inside a row".into()))?;
            self.remove_row(row)?;
            return Ok(());
        }

        if self.dom.closest(target, PRINT_SELECTOR)?.is_some() {
            self.print();
        }
        Ok(())
    }

    fn handle_change(&mut self, target: NodeId) -> Result<()> {
        let Some(id) = self.dom.attr(target, "id") else {
            return Ok(());
        };
        if id == self.config.enquiry_type_id {
            self.apply_visibility()?;
        }
        let bindings = self
            .config
            .dependent_selects
            .iter()
            .enumerate()
            .filter(|(_, binding)| binding.parent_id == id)
            .map(|(pos, _)| pos)
            .collect::<Vec<_>>();
        for binding in bindings {
            self.start_lookup(binding, target)?;
        }
        Ok(())
    }

    fn bind_formsets(&mut self) -> Result<()> {
        for container in self.dom.query_selector_all(FORMSET_SELECTOR)? {
            let Some(prefix) = self
                .dom
                .attr(container, "data-prefix")
                .filter(|prefix| !prefix.is_empty())
            else {
                tracing::warn!(
                    container = %self.node_label(container),
                    "formset container without data-prefix left unbound"
                );
                continue;
            };

            let template = self
                .owned_by(container, TEMPLATE_SELECTOR)?
                .into_iter()
                .next();
            let max_forms = self
                .dom
                .by_id(&max_forms_id(&prefix))
                .and_then(|node| self.dom.value(node).ok())
                .and_then(|raw| raw.trim().parse::<usize>().ok());

            let mut state = Formset::new(prefix.clone()).with_max_forms(max_forms);
            let rows = self.owned_by(container, ROW_SELECTOR)?;
            for (position, row) in rows.into_iter().enumerate() {
                if template.is_some_and(|template| row == template || self.is_inside(row, template))
                {
                    continue;
                }
                let index = self.row_index(row, &prefix).unwrap_or(position);
                let has_deletion_marker = self.deletion_marker(row)?.is_some();
                let state_of_row = if self.dom.is_self_hidden(row) {
                    RowState::SoftDeleted
                } else {
                    RowState::Visible
                };
                state.adopt_row(FormRow {
                    id: RowId(row.0),
                    index,
                    state: state_of_row,
                    has_deletion_marker,
                });
            }

            if let Some(counter) = self.dom.by_id(&total_forms_id(&prefix)) {
                let visible = state.total().to_string();
                let current = self.dom.value(counter)?;
                if current != visible {
                    tracing::warn!(
                        prefix = %prefix,
                        counter = %current,
                        visible = %visible,
                        "TOTAL_FORMS disagrees with the visible rows; rewriting it"
                    );
                    self.dom.set_value(counter, &visible)?;
                }
            }
            if template.is_none() {
                tracing::warn!(prefix = %prefix, "formset has no .empty-form template");
            }

            tracing::debug!(
                prefix = %prefix,
                rows = state.rows().len(),
                total = state.total(),
                "formset bound"
            );
            self.trace.log(format!(
                "[formset] bound prefix={prefix} rows={} total={}",
                state.rows().len(),
                state.total()
            ));
            self.formsets.push(BoundFormset {
                state,
                container,
                template,
            });
        }
        Ok(())
    }

    fn add_row(&mut self, pos: usize) -> Result<bool> {
        let prefix = self.formsets[pos].state.prefix().to_string();
        let container = self.formsets[pos].container;
        let template = self.formsets[pos].template.ok_or_else(|| {
            Error::Binding(format!("formset {prefix} has no .empty-form template"))
        })?;
        let counter = self
            .dom
            .by_id(&total_forms_id(&prefix))
            .ok_or_else(|| Error::Binding(format!("missing #{}", total_forms_id(&prefix))))?;

        if !self.formsets[pos].state.can_add() {
            tracing::debug!(prefix = %prefix, "formset is full; add ignored");
            self.trace
                .log(format!("[formset] add refused prefix={prefix} (max reached)"));
            return Ok(false);
        }

        let row = self.dom.clone_subtree(template)?;
        self.prepare_new_row(row)?;
        let has_deletion_marker = self.deletion_marker(row)?.is_some();
        let index = self.formsets[pos]
            .state
            .push_row(RowId(row.0), has_deletion_marker)
            .ok_or_else(|| Error::Binding(format!("formset {prefix} rejected a new row")))?;
        assign_row_index(&mut self.dom, row, &prefix, index)?;
        self.dom.append_child(container, row)?;

        let total = self.formsets[pos].state.total();
        self.dom.set_value(counter, &total.to_string())?;

        tracing::debug!(prefix = %prefix, index, total, "formset row added");
        self.trace
            .log(format!("[formset] add prefix={prefix} index={index} total={total}"));

        self.apply_visibility()?;
        Ok(true)
    }

    fn prepare_new_row(&mut self, row: NodeId) -> Result<()> {
        self.dom.class_remove(row, TEMPLATE_CLASS)?;
        self.dom.class_remove(row, HIDDEN_CLASS)?;
        self.dom.class_add(row, ROW_CLASS)?;
        self.dom.show(row)?;

        for control in self.dom.query_selector_all_from(row, CLEARABLE_CONTROLS)? {
            if self.is_checkable_input(control) {
                self.dom.set_checked(control, false)?;
            } else {
                self.dom.set_value(control, "")?;
            }
        }
        Ok(())
    }

    fn remove_row(&mut self, row: NodeId) -> Result<Removal> {
        let pos = self
            .formsets
            .iter()
            .position(|bound| bound.state.row(RowId(row.0)).is_some())
            .ok_or_else(|| Error::Binding("row is not bound to a formset".into()))?;
        let removal = self.formsets[pos]
            .state
            .remove_row(RowId(row.0))
            .ok_or_else(|| Error::Binding("row is not bound to a formset".into()))?;

        match removal {
            Removal::Soft => {
                if let Some(marker) = self.deletion_marker(row)? {
                    self.dom.set_value(marker, "on")?;
                    if self.is_checkable_input(marker) {
                        self.dom.set_checked(marker, true)?;
                    }
                }
                self.dom.hide(row)?;
            }
            Removal::Hard => self.dom.remove_node(row)?,
        }

        let prefix = self.formsets[pos].state.prefix().to_string();
        tracing::debug!(prefix = %prefix, removal = ?removal, "formset row removed");
        self.trace
            .log(format!("[formset] remove prefix={prefix} mode={removal:?}"));

        self.renumber_all()?;
        Ok(removal)
    }

    fn renumber_all(&mut self) -> Result<()> {
        for bound in &mut self.formsets {
            let prefix = bound.state.prefix().to_string();
            for (row, index) in bound.state.renumber() {
                assign_row_index(&mut self.dom, NodeId(row.0), &prefix, index)?;
            }
            let total = bound.state.total();
            if let Some(counter) = self.dom.by_id(&total_forms_id(&prefix)) {
                self.dom.set_value(counter, &total.to_string())?;
            }
            tracing::debug!(prefix = %prefix, total, "formset renumbered");
            self.trace
                .log(format!("[formset] renumber prefix={prefix} total={total}"));
        }
        Ok(())
    }

    fn apply_visibility(&mut self) -> Result<()> {
        let value = match self.dom.by_id(&self.config.enquiry_type_id) {
            Some(selector) => self.dom.value(selector)?,
            None => String::new(),
        };
        let visibility = EnquiryType::from_value(&value).visibility();

        let groups = [
            (self.config.tender_class.clone(), visibility.tender),
            (self.config.referral_class.clone(), visibility.referral),
        ];
        for (class_name, shown) in groups {
            for node in self.dom.query_selector_all(&format!(".{class_name}"))? {
                if shown {
                    self.dom.show(node)?;
                } else {
                    self.dom.hide(node)?;
                }
            }
        }

        tracing::debug!(
            enquiry_type = %value,
            tender = visibility.tender,
            referral = visibility.referral,
            "field groups updated"
        );
        self.trace.log(format!(
            "[visibility] enquiry_type={value:?} tender={} referral={}",
            visibility.tender, visibility.referral
        ));
        Ok(())
    }

    fn start_lookup(&mut self, binding: usize, parent: NodeId) -> Result<()> {
        let value = self.dom.value(parent)?;
        let DependentSelectConfig {
            lookup_url,
            query_param,
            ..
        } = self.config.dependent_selects[binding].clone();

        if value.is_empty() {
            self.sequencer.supersede(binding);
            self.reset_dependent(binding)?;
            tracing::debug!(binding, "dependent select cleared");
            self.trace
                .log(format!("[lookup] binding={binding} cleared without request"));
            return Ok(());
        }

        let token = self.sequencer.issue(binding);
        let request = LookupRequest {
            token,
            binding,
            url: lookup_url,
            param: query_param,
            value,
        };
        let query_url = request.query_url();
        tracing::debug!(token, binding, url = %query_url, "lookup issued");
        self.trace
            .log(format!("[lookup] issue token={token} url={query_url}"));
        self.lookup_calls.push(query_url);
        self.pending_lookups.push(request);
        Ok(())
    }

    fn take_pending(&mut self, token: u64) -> Result<LookupRequest> {
        let pos = self
            .pending_lookups
            .iter()
            .position(|request| request.token == token)
            .ok_or_else(|| Error::Lookup(format!("no pending lookup with token {token}")))?;
        Ok(self.pending_lookups.remove(pos))
    }

    fn finish_lookup(
        &mut self,
        request: LookupRequest,
        response: std::result::Result<String, LookupFailure>,
    ) -> Result<LookupOutcome> {
        let LookupRequest { token, binding, .. } = request;
        if !self.sequencer.is_current(binding, token) {
            tracing::debug!(token, binding, "stale lookup response discarded");
            self.trace
                .log(format!("[lookup] discard stale token={token}"));
            return Ok(LookupOutcome::Stale);
        }

        match response.and_then(|body| parse_contact_persons(&body)) {
            Ok(records) => {
                self.render_options(binding, &records)?;
                tracing::debug!(token, binding, options = records.len(), "lookup applied");
                self.trace.log(format!(
                    "[lookup] apply token={token} options={}",
                    records.len()
                ));
                Ok(LookupOutcome::Applied {
                    options: records.len(),
                })
            }
            Err(failure) => {
                tracing::warn!(token, binding, error = %failure, "lookup failed");
                self.reset_dependent(binding)?;
                self.trace
                    .log(format!("[lookup] failed token={token}: {failure}"));
                Ok(LookupOutcome::Failed(failure))
            }
        }
    }

    fn reset_dependent(&mut self, binding: usize) -> Result<()> {
        self.render_options(binding, &[])
    }

    fn render_options(&mut self, binding: usize, records: &[ContactPerson]) -> Result<()> {
        let config = &self.config.dependent_selects[binding];
        let Some(child) = self.dom.by_id(&config.child_id) else {
            tracing::warn!(child = %config.child_id, "dependent select is missing from the page");
            return Ok(());
        };
        let placeholder = config.placeholder.clone();

        self.dom.clear_children(child)?;
        self.append_option(child, "", &placeholder);
        for record in records {
            self.append_option(child, &record.id, &record.option_label());
        }
        self.dom.sync_select_value(child)
    }

    fn append_option(&mut self, select: NodeId, value: &str, label: &str) {
        let mut attrs = HashMap::new();
        attrs.insert("value".to_string(), value.to_string());
        let option = self.dom.create_element(select, "option".to_string(), attrs);
        if !label.is_empty() {
            self.dom.create_text(option, label.to_string());
        }
    }

    /// Matches of `selector` under `container` whose nearest `.formset` is
    /// `container` itself, so nested formsets keep their own rows.
    fn owned_by(&self, container: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let mut owned = Vec::new();
        for node in self.dom.query_selector_all_from(container, selector)? {
            let owner = match self.dom.parent(node) {
                Some(parent) => self.dom.closest(parent, FORMSET_SELECTOR)?,
                None => None,
            };
            if owner == Some(container) {
                owned.push(node);
            }
        }
        Ok(owned)
    }

    fn formset_position(&self, container: NodeId) -> Result<usize> {
        self.formsets
            .iter()
            .position(|bound| bound.container == container)
            .ok_or_else(|| {
                Error::Binding(format!(
                    "formset {} is not bound (missing data-prefix?)",
                    self.node_label(container)
                ))
            })
    }

    fn row_index(&self, row: NodeId, prefix: &str) -> Option<usize> {
        self.dom.subtree_elements(row).into_iter().find_map(|node| {
            FIELD_ATTRS.iter().find_map(|attr| {
                let value = self.dom.attr(node, attr)?;
                match FieldRef::parse(&value, prefix)?.index {
                    RowIndex::At(index) => Some(index),
                    RowIndex::Placeholder => None,
                }
            })
        })
    }

    fn deletion_marker(&self, row: NodeId) -> Result<Option<NodeId>> {
        Ok(self
            .dom
            .query_selector_all_from(row, DELETE_MARKER_SELECTOR)?
            .into_iter()
            .next())
    }

    fn is_inside(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.dom.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.dom.parent(current);
        }
        false
    }

    fn input_type(&self, node: NodeId) -> String {
        self.dom
            .attr(node, "type")
            .unwrap_or_else(|| "text".to_string())
            .to_ascii_lowercase()
    }

    fn is_checkable_input(&self, node: NodeId) -> bool {
        self.dom.is_tag(node, "input") && matches!(self.input_type(node).as_str(), "checkbox" | "radio")
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_label(&self, node: NodeId) -> String {
        let tag = self.dom.tag_name(node).unwrap_or("#node");
        match self.dom.attr(node, "id") {
            Some(id) => format!("{tag}#{id}"),
            None => tag.to_string(),
        }
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    fn type_mismatch(&self, selector: &str, expected: &str, actual: NodeId) -> Error {
        Error::TypeMismatch {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual: self.dom.tag_name(actual).unwrap_or("non-element").to_string(),
        }
    }

    fn assertion_failed(
        &self,
        selector: &str,
        expected: &str,
        actual: String,
        target: NodeId,
    ) -> Error {
        Error::AssertionFailed {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual,
            dom_snippet: self.node_snippet(target),
        }
    }
}

/// Rewrites every field reference (`name`, `id`, label `for`) of the
/// formset `prefix` inside `row` to point at `index`.
fn assign_row_index(dom: &mut Dom, row: NodeId, prefix: &str, index: usize) -> Result<()> {
    for node in dom.subtree_elements(row) {
        for attr in FIELD_ATTRS {
            let Some(value) = dom.attr(node, attr) else {
                continue;
            };
            let Some(field) = FieldRef::parse(&value, prefix) else {
                continue;
            };
            let renamed = field.with_index(index).to_string();
            if renamed != value {
                dom.set_attr(node, attr, &renamed)?;
            }
        }
    }
    Ok(())
}

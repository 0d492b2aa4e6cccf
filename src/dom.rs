use super::*;
use crate::selector::{SelectorCombinator, SelectorPart, SelectorStep, parse_selector_groups};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

/// An element plus the live state of its form control.
///
/// `value`, `checked` and `disabled` start from the markup and then diverge
/// from the attributes as the page is driven.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) disabled: bool,
}

impl Element {
    fn has_class(&self, class_name: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }
}

/// Arena-backed document tree. Detached nodes stay in the arena.
#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

fn not_element(node: NodeId, action: &str) -> Error {
    Error::DomRuntime(format!("cannot {action}: node {} is not an element", node.0))
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                node_type: NodeType::Document,
            }],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn push_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let dom_id = attrs.get("id").filter(|id| !id.is_empty()).cloned();
        let element = Element {
            value: attrs.get("value").cloned().unwrap_or_default(),
            checked: attrs.contains_key("checked"),
            disabled: attrs.contains_key("disabled"),
            tag_name,
            attrs,
        };
        let node = self.push_node(Some(parent), NodeType::Element(element));
        if let Some(dom_id) = dom_id {
            self.id_index.entry(dom_id).or_insert(node);
        }
        node
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.push_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId, action: &str) -> Result<&mut Element> {
        match &mut self.nodes[node.0].node_type {
            NodeType::Element(element) => Ok(element),
            _ => Err(not_element(node, action)),
        }
    }

    pub(crate) fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag_name(node)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// `node` and then each of its ancestors up to the topmost one.
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |current| self.parent(*current))
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub(crate) fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].node_type {
            NodeType::Text(text) => out.push_str(text),
            NodeType::Document | NodeType::Element(_) => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub(crate) fn value(&self, node: NodeId) -> Result<String> {
        self.element(node)
            .map(|element| element.value.clone())
            .ok_or_else(|| not_element(node, "read a value"))
    }

    /// Sets a control value. A `<select>` takes the value only when one of
    /// its options carries it and ends up empty otherwise.
    pub(crate) fn set_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        if self.is_tag(node, "select") {
            return self.set_select_value(node, value);
        }
        self.element_mut(node, "set a value")?.value = value.to_string();
        Ok(())
    }

    /// Derives live values from markup: textarea bodies and selected options.
    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        for node in self.subtree_elements(self.root) {
            if self.is_tag(node, "textarea") {
                let body = self.text_content(node);
                self.element_mut(node, "fill a textarea")?.value = body;
            } else if self.is_tag(node, "select") {
                self.sync_select_value(node)?;
            }
        }
        Ok(())
    }

    fn set_select_value(&mut self, select: NodeId, requested: &str) -> Result<()> {
        let mut chosen = None;
        for option in self.select_options(select)? {
            let value = self.option_effective_value(option)?;
            let hit = chosen.is_none() && value == requested;
            let element = self.element_mut(option, "select an option")?;
            if hit {
                element
                    .attrs
                    .insert("selected".to_string(), "true".to_string());
                chosen = Some(value);
            } else {
                element.attrs.remove("selected");
            }
        }
        self.element_mut(select, "set a select value")?.value = chosen.unwrap_or_default();
        Ok(())
    }

    /// Recomputes a select's value from its `selected` option, falling back
    /// to the first option.
    pub(crate) fn sync_select_value(&mut self, select: NodeId) -> Result<()> {
        let options = self.select_options(select)?;
        let picked = options
            .iter()
            .copied()
            .find(|option| self.attr(*option, "selected").is_some())
            .or_else(|| options.first().copied());
        let value = match picked {
            Some(option) => self.option_effective_value(option)?,
            None => String::new(),
        };
        self.element_mut(select, "sync a select value")?.value = value;
        Ok(())
    }

    /// Every `<option>` under a select, optgroups included.
    pub(crate) fn select_options(&self, select: NodeId) -> Result<Vec<NodeId>> {
        if !self.is_tag(select, "select") {
            return Err(Error::DomRuntime(format!(
                "node {} is not a <select>",
                select.0
            )));
        }
        Ok(self
            .subtree_elements(select)
            .into_iter()
            .filter(|node| self.is_tag(*node, "option"))
            .collect())
    }

    /// The `value` attribute of an option, or its text when it has none.
    pub(crate) fn option_effective_value(&self, option: NodeId) -> Result<String> {
        if !self.is_tag(option, "option") {
            return Err(Error::DomRuntime(format!(
                "node {} is not an <option>",
                option.0
            )));
        }
        Ok(self
            .attr(option, "value")
            .unwrap_or_else(|| self.text_content(option)))
    }

    pub(crate) fn checked(&self, node: NodeId) -> Result<bool> {
        self.element(node)
            .map(|element| element.checked)
            .ok_or_else(|| not_element(node, "read checked state"))
    }

    pub(crate) fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<()> {
        self.element_mut(node, "set checked state")?.checked = checked;
        Ok(())
    }

    pub(crate) fn disabled(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|e| e.disabled)
    }

    pub(crate) fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node).and_then(|e| e.attrs.get(name).cloned())
    }

    /// Writes an attribute. `value`, `checked` and `disabled` also reset the
    /// matching live state, and `id` keeps the id index current.
    pub(crate) fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(node, "set an attribute")?;
        let previous = element.attrs.insert(name.clone(), value.to_string());
        match name.as_str() {
            "value" => element.value = value.to_string(),
            "checked" => element.checked = true,
            "disabled" => element.disabled = true,
            _ => {}
        }

        // The first element in document order owns a duplicated id.
        if name == "id" && previous.as_deref() != Some(value) && self.is_connected(node) {
            self.reindex_ids();
        }
        Ok(())
    }

    /// Moves `child` (attached or detached) to the end of `parent`.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if matches!(self.nodes[parent.0].node_type, NodeType::Text(_)) {
            return Err(Error::DomRuntime(format!(
                "cannot attach node {}: node {} is text",
                child.0, parent.0
            )));
        }
        if child == self.root || self.ancestors(parent).any(|node| node == child) {
            return Err(Error::DomRuntime(format!(
                "cannot attach node {} inside its own subtree",
                child.0
            )));
        }

        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.reindex_ids();
        Ok(())
    }

    /// Detaches `node` from its parent. Detaching a detached node is a no-op.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::DomRuntime("the document root cannot be removed".into()));
        }
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|id| *id != node);
            self.reindex_ids();
        }
        Ok(())
    }

    pub(crate) fn clear_children(&mut self, node: NodeId) -> Result<()> {
        if self.element(node).is_none() {
            return Err(not_element(node, "clear children"));
        }
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
        self.reindex_ids();
        Ok(())
    }

    /// Deep-copies `source` into a detached subtree and returns its root.
    /// Ids inside the copy are not indexed until it is attached.
    pub(crate) fn clone_subtree(&mut self, source: NodeId) -> Result<NodeId> {
        if matches!(self.nodes[source.0].node_type, NodeType::Document) {
            return Err(Error::DomRuntime("the document node cannot be cloned".into()));
        }
        let copy = self.push_node(None, self.nodes[source.0].node_type.clone());
        for child in self.nodes[source.0].children.clone() {
            let child_copy = self.clone_subtree(child)?;
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        Ok(copy)
    }

    pub(crate) fn class_add(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node, |classes| {
            if !classes.iter().any(|c| c == class_name) {
                classes.push(class_name.to_string());
            }
        })
    }

    pub(crate) fn class_remove(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node, |classes| classes.retain(|c| c != class_name))
    }

    fn edit_classes(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<String>)) -> Result<()> {
        let element = self.element_mut(node, "change classes")?;
        let mut classes = element
            .attrs
            .get("class")
            .map(|value| value.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_else(Vec::new);
        edit(&mut classes);
        if classes.is_empty() {
            element.attrs.remove("class");
        } else {
            element.attrs.insert("class".to_string(), classes.join(" "));
        }
        Ok(())
    }

    pub(crate) fn style_get(&self, node: NodeId, property: &str) -> String {
        InlineStyle::parse(self.attr(node, "style").as_deref())
            .get(property)
            .unwrap_or_default()
            .to_string()
    }

    /// Sets one inline style property; an empty value removes it.
    pub(crate) fn style_set(&mut self, node: NodeId, property: &str, value: &str) -> Result<()> {
        let element = self.element_mut(node, "set a style")?;
        let mut style = InlineStyle::parse(element.attrs.get("style").map(String::as_str));
        style.set(property, value);
        match style.to_attr() {
            Some(attr) => element.attrs.insert("style".to_string(), attr),
            None => element.attrs.remove("style"),
        };
        Ok(())
    }

    pub(crate) fn hide(&mut self, node: NodeId) -> Result<()> {
        self.style_set(node, "display", "none")
    }

    pub(crate) fn show(&mut self, node: NodeId) -> Result<()> {
        if self.style_get(node, "display") == "none" {
            self.style_set(node, "display", "")?;
        }
        Ok(())
    }

    /// Whether the element itself is hidden by inline style, the `d-none`
    /// utility class or the `hidden` attribute.
    pub(crate) fn is_self_hidden(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|element| {
            element.attrs.contains_key("hidden")
                || element.has_class("d-none")
                || self.style_get(node, "display") == "none"
        })
    }

    pub(crate) fn is_rendered(&self, node: NodeId) -> bool {
        self.is_connected(node) && !self.ancestors(node).any(|n| self.is_self_hidden(n))
    }

    pub(crate) fn is_connected(&self, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == self.root)
    }

    fn reindex_ids(&mut self) {
        let mut index = HashMap::new();
        for node in self.subtree_elements(self.root) {
            if let Some(id) = self.attr(node, "id").filter(|id| !id.is_empty()) {
                index.entry(id).or_insert(node);
            }
        }
        self.id_index = index;
    }

    /// The node itself (when it is an element) followed by its element
    /// descendants in document order.
    pub(crate) fn subtree_elements(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if self.element(current).is_some() {
                out.push(current);
            }
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        if let [chain] = groups.as_slice() {
            if let [only] = chain.as_slice() {
                if let Some(id) = only.step.id_only() {
                    return Ok(self.by_id(id).into_iter().collect());
                }
            }
        }
        Ok(self.filter_matching(self.subtree_elements(self.root), &groups))
    }

    /// Like [`Dom::query_selector_all`] but limited to descendants of `scope`.
    pub(crate) fn query_selector_all_from(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        let descendants = self
            .subtree_elements(scope)
            .into_iter()
            .filter(|node| *node != scope)
            .collect();
        Ok(self.filter_matching(descendants, &groups))
    }

    fn filter_matching(&self, candidates: Vec<NodeId>, groups: &[Vec<SelectorPart>]) -> Vec<NodeId> {
        candidates
            .into_iter()
            .filter(|node| self.matches_any(*node, groups))
            .collect()
    }

    fn matches_any(&self, node: NodeId, groups: &[Vec<SelectorPart>]) -> bool {
        groups.iter().any(|chain| self.matches_chain(node, chain))
    }

    pub(crate) fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        if self.element(node).is_none() {
            return Ok(None);
        }
        let groups = parse_selector_groups(selector)?;
        Ok(self.ancestors(node).find(|n| self.matches_any(*n, &groups)))
    }

    /// Matches right to left, backtracking over descendant combinators.
    fn matches_chain(&self, node: NodeId, chain: &[SelectorPart]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !self.matches_step(node, &last.step) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        match last.combinator.unwrap_or(SelectorCombinator::Descendant) {
            SelectorCombinator::Child => self
                .parent(node)
                .is_some_and(|parent| self.matches_chain(parent, rest)),
            SelectorCombinator::Descendant => self
                .ancestors(node)
                .skip(1)
                .any(|ancestor| self.matches_chain(ancestor, rest)),
        }
    }

    fn matches_step(&self, node: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        step.tag
            .as_ref()
            .is_none_or(|tag| element.tag_name.eq_ignore_ascii_case(tag))
            && step
                .id
                .as_ref()
                .is_none_or(|id| element.attrs.get("id") == Some(id))
            && step.classes.iter().all(|c| element.has_class(c))
            && step.attrs.iter().all(|cond| cond.matches(&element.attrs))
    }

    /// Serializes a subtree with attributes in sorted order.
    pub(crate) fn dump_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let element = match &self.nodes[node.0].node_type {
            NodeType::Text(text) => {
                out.push_str(text);
                return;
            }
            NodeType::Document => None,
            NodeType::Element(element) => Some(element),
        };

        if let Some(element) = element {
            let mut attrs = element.attrs.iter().collect::<Vec<_>>();
            attrs.sort();
            out.push('<');
            out.push_str(&element.tag_name);
            for (name, value) in attrs {
                out.push_str(&format!(" {name}=\"{value}\""));
            }
            out.push('>');
            if crate::html::is_void_tag(&element.tag_name) {
                return;
            }
        }

        for child in &self.nodes[node.0].children {
            self.write_node(*child, out);
        }
        if let Some(element) = element {
            out.push_str(&format!("</{}>", element.tag_name));
        }
    }
}

/// Ordered `property: value` declarations of a `style` attribute.
struct InlineStyle(Vec<(String, String)>);

impl InlineStyle {
    fn parse(attr: Option<&str>) -> Self {
        let mut style = Self(Vec::new());
        for declaration in attr.unwrap_or_default().split(';') {
            if let Some((property, value)) = declaration.split_once(':') {
                let property = property.trim().to_ascii_lowercase();
                if !property.is_empty() {
                    style.set(&property, value.trim());
                }
            }
        }
        style
    }

    fn get(&self, property: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, property: &str, value: &str) {
        let existing = self.0.iter().position(|(name, _)| name == property);
        match (existing, value.is_empty()) {
            (Some(pos), true) => {
                self.0.remove(pos);
            }
            (Some(pos), false) => self.0[pos].1 = value.to_string(),
            (None, false) => self.0.push((property.to_string(), value.to_string())),
            (None, true) => {}
        }
    }

    fn to_attr(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| {
            self.0
                .iter()
                .map(|(name, value)| format!("{name}: {value};"))
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    fn node(dom: &Dom, id: &str) -> Result<NodeId> {
        dom.by_id(id)
            .ok_or_else(|| Error::SelectorNotFound(format!("#{id}")))
    }

    #[test]
    fn clone_subtree_is_detached_deep_copy() -> Result<()> {
        let mut dom = parse_html(
            r#"<div id="row"><input id="a" name="x" value="1"><label for="a">A</label></div>"#,
        )?;
        let row = node(&dom, "row")?;
        let copy = dom.clone_subtree(row)?;
        assert_eq!(dom.parent(copy), None);
        assert!(!dom.is_connected(copy));
        assert_eq!(dom.subtree_elements(copy).len(), 3);
        assert_eq!(dom.by_id("row"), Some(row));

        let root = dom.root;
        dom.append_child(root, copy)?;
        assert!(dom.is_connected(copy));
        assert_eq!(dom.query_selector_all("input[name=x]")?.len(), 2);
        Ok(())
    }

    #[test]
    fn append_refuses_to_nest_a_node_inside_itself() -> Result<()> {
        let mut dom = parse_html(r#"<div id="outer"><div id="inner"></div></div>"#)?;
        let outer = node(&dom, "outer")?;
        let inner = node(&dom, "inner")?;
        assert!(matches!(
            dom.append_child(inner, outer),
            Err(Error::DomRuntime(_))
        ));
        assert_eq!(dom.parent(inner), Some(outer));
        Ok(())
    }

    #[test]
    fn hide_and_show_round_trip_inline_display() -> Result<()> {
        let mut dom = parse_html(r#"<p id="p" style="color: red">x</p>"#)?;
        let p = node(&dom, "p")?;
        assert!(dom.is_rendered(p));
        dom.hide(p)?;
        assert!(!dom.is_rendered(p));
        assert_eq!(dom.attr(p, "style").as_deref(), Some("color: red; display: none;"));
        dom.show(p)?;
        assert!(dom.is_rendered(p));
        assert_eq!(dom.attr(p, "style").as_deref(), Some("color: red;"));
        Ok(())
    }

    #[test]
    fn d_none_ancestor_hides_descendants() -> Result<()> {
        let dom = parse_html(r#"<div class="empty-form d-none"><input id="x"></div>"#)?;
        assert!(!dom.is_rendered(node(&dom, "x")?));
        Ok(())
    }

    #[test]
    fn select_value_follows_selected_option() -> Result<()> {
        let mut dom = parse_html(
            r#"<select id="s"><option value="">--</option><option value="tender" selected>T</option></select>"#,
        )?;
        let select = node(&dom, "s")?;
        assert_eq!(dom.value(select)?, "tender");
        dom.set_value(select, "missing")?;
        assert_eq!(dom.value(select)?, "");
        dom.set_value(select, "")?;
        assert_eq!(dom.value(select)?, "");
        Ok(())
    }

    #[test]
    fn set_attr_id_reindexes_connected_nodes() -> Result<()> {
        let mut dom = parse_html(r#"<input id="id_items-3-qty">"#)?;
        let input = node(&dom, "id_items-3-qty")?;
        dom.set_attr(input, "id", "id_items-0-qty")?;
        assert_eq!(dom.by_id("id_items-3-qty"), None);
        assert_eq!(dom.by_id("id_items-0-qty"), Some(input));
        Ok(())
    }

    #[test]
    fn renamed_id_does_not_take_over_an_earlier_holder() -> Result<()> {
        let mut dom = parse_html(r#"<input id="id_items-0-qty"><input id="id_items-1-qty">"#)?;
        let first = node(&dom, "id_items-0-qty")?;
        let second = node(&dom, "id_items-1-qty")?;
        dom.set_attr(second, "id", "id_items-0-qty")?;
        assert_eq!(dom.by_id("id_items-0-qty"), Some(first));
        assert_eq!(dom.by_id("id_items-1-qty"), None);

        dom.set_attr(first, "id", "id_items-9-qty")?;
        assert_eq!(dom.by_id("id_items-0-qty"), Some(second));
        Ok(())
    }

    #[test]
    fn descendant_match_looks_past_the_nearest_ancestor() -> Result<()> {
        let dom = parse_html(
            r#"<div class="a"><div class="b"><div class="b"><input id="x"></div></div></div>"#,
        )?;
        let input = node(&dom, "x")?;
        assert_eq!(dom.query_selector_all(".a > .b input")?, vec![input]);
        assert!(dom.query_selector_all(".a > .b > input")?.is_empty());
        Ok(())
    }

    #[test]
    fn dump_node_sorts_attributes_and_skips_void_end_tags() -> Result<()> {
        let dom = parse_html(r#"<p id="p" class="lead">a<br>b</p>"#)?;
        assert_eq!(
            dom.dump_node(node(&dom, "p")?),
            r#"<p class="lead" id="p">a<br>b</p>"#
        );
        Ok(())
    }
}

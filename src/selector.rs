use super::*;

/// One `[...]` condition of a compound selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

impl SelectorAttrCondition {
    pub(crate) fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        let probe = |key: &String, value: &String, test: fn(&str, &str) -> bool| {
            attrs
                .get(key)
                .is_some_and(|actual| !value.is_empty() && test(actual, value))
        };
        match self {
            Self::Exists { key } => attrs.contains_key(key),
            Self::Eq { key, value } => attrs.get(key) == Some(value),
            Self::StartsWith { key, value } => probe(key, value, |a, v| a.starts_with(v)),
            Self::EndsWith { key, value } => probe(key, value, |a, v| a.ends_with(v)),
            Self::Contains { key, value } => probe(key, value, |a, v| a.contains(v)),
        }
    }
}

/// A compound selector such as `input.form-control[name$="-DELETE"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        let bare = !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty();
        if bare { self.id.as_deref() } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    /// Relation to the part on the left; `None` for the first part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

/// Parses a selector list (`a > b, c`) into one chain per group.
pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let unsupported = || Error::UnsupportedSelector(selector.to_string());

    let mut groups = Vec::new();
    for group in split_top_level(selector, |ch| ch == ',').ok_or_else(unsupported)? {
        let group = group.trim();
        if group.is_empty() {
            return Err(unsupported());
        }

        let mut chain: Vec<SelectorPart> = Vec::new();
        let mut pending = None;
        for token in split_top_level(group, |ch| ch.is_ascii_whitespace() || ch == '>')
            .ok_or_else(unsupported)?
        {
            let token = token.trim();
            match token {
                "" => continue,
                ">" => {
                    if chain.is_empty() || pending.is_some() {
                        return Err(unsupported());
                    }
                    pending = Some(SelectorCombinator::Child);
                }
                _ => {
                    let step = parse_compound(token).ok_or_else(unsupported)?;
                    let combinator = (!chain.is_empty())
                        .then(|| pending.take().unwrap_or(SelectorCombinator::Descendant));
                    chain.push(SelectorPart { step, combinator });
                }
            }
        }

        if chain.is_empty() || pending.is_some() {
            return Err(unsupported());
        }
        groups.push(chain);
    }
    Ok(groups)
}

/// Splits `src` at every top-level character accepted by `is_separator`.
///
/// Characters inside `[...]` (including quoted attribute values) never split.
/// A `>` separator is kept as its own piece so combinators survive.
fn split_top_level(src: &str, is_separator: impl Fn(char) -> bool) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut quote = None;

    for (pos, ch) in src.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            '"' | '\'' if depth > 0 => quote = Some(ch),
            _ if depth == 0 && is_separator(ch) => {
                pieces.push(&src[start..pos]);
                if ch == '>' {
                    pieces.push(">");
                }
                start = pos + ch.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    pieces.push(&src[start..]);
    Some(pieces)
}

fn parse_compound(token: &str) -> Option<SelectorStep> {
    let mut step = SelectorStep::default();
    let mut rest = token;

    while let Some(first) = rest.chars().next() {
        match first {
            '*' if !step.universal && step.tag.is_none() => {
                step.universal = true;
                rest = &rest[1..];
            }
            '#' => {
                let (id, tail) = take_ident(&rest[1..])?;
                if step.id.replace(id.to_string()).is_some() {
                    return None;
                }
                rest = tail;
            }
            '.' => {
                let (class_name, tail) = take_ident(&rest[1..])?;
                step.classes.push(class_name.to_string());
                rest = tail;
            }
            '[' => {
                let close = attr_block_end(rest)?;
                step.attrs.push(parse_attr_condition(&rest[1..close])?);
                rest = &rest[close + 1..];
            }
            _ if step == SelectorStep::default() => {
                let (tag, tail) = take_ident(rest)?;
                step.tag = Some(tag.to_string());
                rest = tail;
            }
            _ => return None,
        }
    }

    (step != SelectorStep::default()).then_some(step)
}

fn take_ident(src: &str) -> Option<(&str, &str)> {
    let end = src
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'))
        .unwrap_or(src.len());
    (end > 0).then(|| src.split_at(end))
}

/// Byte offset of the `]` closing the block that starts at `src[0]`.
fn attr_block_end(src: &str) -> Option<usize> {
    let mut quote = None;
    for (pos, ch) in src.char_indices().skip(1) {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, ']') => return Some(pos),
            (None, _) => {}
        }
    }
    None
}

fn parse_attr_condition(body: &str) -> Option<SelectorAttrCondition> {
    let body = body.trim();
    let Some((raw_key, raw_value)) = body.split_once('=') else {
        let key = body.to_ascii_lowercase();
        return (!key.is_empty()).then_some(SelectorAttrCondition::Exists { key });
    };

    let value = unquote(raw_value.trim()).to_string();
    let raw_key = raw_key.trim_end();
    let (key, operator) = match raw_key.chars().last() {
        Some(op @ ('^' | '$' | '*')) => (&raw_key[..raw_key.len() - 1], Some(op)),
        _ => (raw_key, None),
    };
    let key = key.trim().to_ascii_lowercase();
    if key.is_empty() {
        return None;
    }

    Some(match operator {
        Some('^') => SelectorAttrCondition::StartsWith { key, value },
        Some('$') => SelectorAttrCondition::EndsWith { key, value },
        Some('*') => SelectorAttrCondition::Contains { key, value },
        _ => SelectorAttrCondition::Eq { key, value },
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffix_attribute_condition() -> Result<()> {
        let groups = parse_selector_groups("input[id$=\"-DELETE\"]")?;
        assert_eq!(groups.len(), 1);
        let step = &groups[0][0].step;
        assert_eq!(step.tag.as_deref(), Some("input"));
        assert_eq!(
            step.attrs,
            vec![SelectorAttrCondition::EndsWith {
                key: "id".into(),
                value: "-DELETE".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn splits_groups_and_combinators() -> Result<()> {
        let groups = parse_selector_groups(".formset > .formset-form input, textarea")?;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[0][1].combinator, Some(SelectorCombinator::Child));
        assert_eq!(groups[0][2].combinator, Some(SelectorCombinator::Descendant));

        let groups = parse_selector_groups(".formset>.formset-form")?;
        assert_eq!(groups[0][1].combinator, Some(SelectorCombinator::Child));
        Ok(())
    }

    #[test]
    fn quoted_values_may_hold_separators() -> Result<()> {
        let groups = parse_selector_groups(r#"[onclick="window.print()"], [title='a, b > c']"#)?;
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[1][0].step.attrs,
            vec![SelectorAttrCondition::Eq {
                key: "title".into(),
                value: "a, b > c".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn rejects_malformed_selectors() {
        for selector in [".formset >", "a,,b", "> a", "[name", "div#a#b", "a.", "input*"] {
            assert!(
                matches!(
                    parse_selector_groups(selector),
                    Err(Error::UnsupportedSelector(_))
                ),
                "{selector} should be rejected"
            );
        }
    }

    #[test]
    fn id_only_fast_path_requires_bare_id() -> Result<()> {
        let groups = parse_selector_groups("#id_customer")?;
        assert_eq!(groups[0][0].step.id_only(), Some("id_customer"));
        let groups = parse_selector_groups("select#id_customer")?;
        assert_eq!(groups[0][0].step.id_only(), None);
        Ok(())
    }
}

use super::*;

/// Parses server-rendered page HTML into a [`Dom`].
///
/// Raw-text elements (`script`, `style`, `textarea`, `title`) keep their body
/// as a single text node; scripts are never executed.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut scanner = Scanner { src: html, pos: 0 };
    let mut builder = TreeBuilder {
        dom: Dom::new(),
        open: Vec::new(),
    };

    while let Some(token) = scanner.next_token()? {
        match token {
            Token::Start {
                tag,
                attrs,
                self_closing,
            } => builder.start(tag, attrs, self_closing),
            Token::Raw { tag, attrs, body } => builder.raw(tag, attrs, body),
            Token::End(tag) => builder.end(&tag),
            Token::Text(text) => builder.text(text),
        }
    }

    let mut dom = builder.dom;
    dom.initialize_form_control_values()?;
    Ok(dom)
}

fn parse_error(message: impl Into<String>) -> Error {
    Error::HtmlParse(message.into())
}

enum Token<'a> {
    Start {
        tag: String,
        attrs: HashMap<String, String>,
        self_closing: bool,
    },
    /// A raw-text element together with its undecoded body.
    Raw {
        tag: String,
        attrs: HashMap<String, String>,
        body: &'a str,
    },
    End(String),
    Text(&'a str),
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eat(&mut self, prefix: &str) -> bool {
        let hit = self.rest().starts_with(prefix);
        if hit {
            self.pos += prefix.len();
        }
        hit
    }

    /// Consumes a run of ASCII bytes accepted by `accept`.
    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.bytes().position(|b| !accept(b)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_ws(&mut self) {
        self.take_while(|b| b.is_ascii_whitespace());
    }

    /// Consumes up to whitespace, `>` or `/>`.
    fn unquoted_run(&mut self) -> &'a str {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut len = 0;
        while let Some(&b) = bytes.get(len) {
            let closes = b == b'>' || (b == b'/' && bytes.get(len + 1) == Some(&b'>'));
            if b.is_ascii_whitespace() || closes {
                break;
            }
            len += 1;
        }
        self.pos += len;
        &rest[..len]
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }

            if let Some(comment) = rest.strip_prefix("<!--") {
                let end = comment
                    .find("-->")
                    .ok_or_else(|| parse_error("unclosed HTML comment"))?;
                self.pos += "<!--".len() + end + "-->".len();
                continue;
            }

            let opens_tag = rest.starts_with('<')
                && rest
                    .as_bytes()
                    .get(1)
                    .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!'));
            if !opens_tag {
                let lead = rest.chars().next().map_or(0, char::len_utf8);
                let len = rest[lead..].find('<').map_or(rest.len(), |at| at + lead);
                self.pos += len;
                return Ok(Some(Token::Text(&rest[..len])));
            }

            if rest.starts_with("</") {
                return self.end_tag().map(|tag| Some(Token::End(tag)));
            }
            if rest.starts_with("<!") {
                self.skip_declaration()?;
                continue;
            }

            let (tag, attrs, self_closing) = self.start_tag()?;
            if self_closing || !is_raw_text_tag(&tag) {
                return Ok(Some(Token::Start {
                    tag,
                    attrs,
                    self_closing,
                }));
            }

            let close = self
                .raw_body_end(&tag)
                .ok_or_else(|| parse_error(format!("unclosed <{tag}>")))?;
            let body = &self.src[self.pos..close];
            self.pos = close;
            self.end_tag()?;
            return Ok(Some(Token::Raw { tag, attrs, body }));
        }
    }

    fn start_tag(&mut self) -> Result<(String, HashMap<String, String>, bool)> {
        self.pos += 1;
        let tag = self.take_while(is_name_byte).to_ascii_lowercase();
        if tag.is_empty() {
            return Err(parse_error("empty tag name"));
        }

        let mut attrs = HashMap::new();
        loop {
            self.skip_ws();
            if self.rest().is_empty() {
                return Err(parse_error(format!("unclosed <{tag}> start tag")));
            }
            if self.eat(">") {
                return Ok((tag, attrs, false));
            }
            if self.eat("/>") {
                return Ok((tag, attrs, true));
            }

            let name = self.take_while(is_attr_name_byte);
            if name.is_empty() {
                // Malformed attribute: drop the token and keep going.
                self.unquoted_run();
                continue;
            }
            let name = name.to_ascii_lowercase();
            self.skip_ws();
            let value = if self.eat("=") {
                self.skip_ws();
                self.attr_value()?
            } else {
                "true".to_string()
            };
            attrs.entry(name).or_insert(value);
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        let rest = self.rest();
        match rest.chars().next() {
            None => Err(parse_error("missing attribute value")),
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body
                    .find(quote)
                    .ok_or_else(|| parse_error("unclosed quoted attribute value"))?;
                self.pos += end + 2;
                Ok(decode_character_references(&body[..end]))
            }
            Some(_) => Ok(decode_character_references(self.unquoted_run())),
        }
    }

    fn end_tag(&mut self) -> Result<String> {
        self.pos += "</".len();
        self.skip_ws();
        let tag = self.take_while(is_name_byte).to_ascii_lowercase();
        let close = self
            .rest()
            .find('>')
            .ok_or_else(|| parse_error(format!("unclosed </{tag}> end tag")))?;
        self.pos += close + 1;
        Ok(tag)
    }

    /// Skips `<!DOCTYPE ...>` and similar, honouring quoted sections.
    fn skip_declaration(&mut self) -> Result<()> {
        let mut quote = None;
        for (at, ch) in self.rest().char_indices().skip(2) {
            match (quote, ch) {
                (Some(open), _) if open == ch => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(ch),
                (None, '>') => {
                    self.pos += at + 1;
                    return Ok(());
                }
                (None, _) => {}
            }
        }
        Err(parse_error("unclosed declaration"))
    }

    /// Absolute offset of the `</tag` that ends a raw-text body.
    fn raw_body_end(&self, tag: &str) -> Option<usize> {
        let bytes = self.src.as_bytes();
        let mut from = self.pos;
        while let Some(found) = self.src[from..].find("</") {
            let at = from + found;
            let mut name = at + 2;
            while bytes.get(name).is_some_and(u8::is_ascii_whitespace) {
                name += 1;
            }
            let end = name + tag.len();
            let same_tag = bytes
                .get(name..end)
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(tag.as_bytes()));
            if same_tag && !bytes.get(end).is_some_and(u8::is_ascii_alphanumeric) {
                return Some(at);
            }
            from = at + 2;
        }
        None
    }
}

/// Builds the tree from tokens, applying the implied end tags that
/// server templates lean on (`<option>` and `<p>`).
struct TreeBuilder {
    dom: Dom,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.root)
    }

    fn start(&mut self, tag: String, attrs: HashMap<String, String>, self_closing: bool) {
        self.close_implied(&tag);
        let parent = self.current();
        let void = is_void_tag(&tag);
        let node = self.dom.create_element(parent, tag, attrs);
        if !self_closing && !void {
            self.open.push(node);
        }
    }

    fn raw(&mut self, tag: String, attrs: HashMap<String, String>, body: &str) {
        let parent = self.current();
        let decode = matches!(tag.as_str(), "textarea" | "title");
        let node = self.dom.create_element(parent, tag, attrs);
        let body = if decode {
            decode_character_references(body)
        } else {
            body.to_string()
        };
        if !body.is_empty() {
            self.dom.create_text(node, body);
        }
    }

    /// Closes the innermost open element named `tag`; stray end tags are
    /// ignored.
    fn end(&mut self, tag: &str) {
        if let Some(at) = self.open.iter().rposition(|node| self.dom.is_tag(*node, tag)) {
            self.open.truncate(at);
        }
    }

    fn text(&mut self, raw: &str) {
        let parent = self.current();
        self.dom.create_text(parent, decode_character_references(raw));
    }

    fn close_implied(&mut self, tag: &str) {
        if matches!(tag, "option" | "optgroup") {
            let mut open_option = None;
            for (at, node) in self.open.iter().enumerate().rev() {
                match self.dom.tag_name(*node) {
                    Some("option") => {
                        open_option = Some(at);
                        break;
                    }
                    Some("optgroup" | "select" | "datalist") => break,
                    _ => {}
                }
            }
            if let Some(at) = open_option {
                self.open.truncate(at);
            }
        }

        if closes_paragraph(tag)
            && self.open.last().is_some_and(|top| self.dom.is_tag(*top, "p"))
        {
            self.open.pop();
        }
    }
}

fn closes_paragraph(tag: &str) -> bool {
    matches!(
        tag,
        "div"
            | "fieldset"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "ol"
            | "p"
            | "section"
            | "table"
            | "ul"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title")
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_byte(b: u8) -> bool {
    is_name_byte(b) || b == b':' || b == b'@'
}

/// Decodes numeric references and the named entities Django templates emit.
/// Unknown or unterminated references are kept verbatim.
fn decode_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .and_then(|end| entity_char(&tail[..end]).map(|ch| (ch, end + 1)));
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(reference: &str) -> Option<char> {
    if let Some(number) = reference.strip_prefix('#') {
        let codepoint = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(codepoint);
    }
    Some(match reference {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "hellip" => '…',
        "middot" => '·',
        "times" => '×',
        "rarr" => '→',
        "larr" => '←',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(dom: &Dom, id: &str) -> Result<NodeId> {
        dom.by_id(id)
            .ok_or_else(|| Error::SelectorNotFound(format!("#{id}")))
    }

    #[test]
    fn parses_django_management_form() -> Result<()> {
        let dom = parse_html(
            r#"
            <div class="formset" data-prefix="items">
              <input type="hidden" name="items-TOTAL_FORMS" value="2" id="id_items-TOTAL_FORMS">
              <input type="hidden" name="items-INITIAL_FORMS" value="0" id="id_items-INITIAL_FORMS">
            </div>
            "#,
        )?;
        let total = node(&dom, "id_items-TOTAL_FORMS")?;
        assert_eq!(dom.value(total)?, "2");
        assert_eq!(dom.attr(total, "type").as_deref(), Some("hidden"));
        Ok(())
    }

    #[test]
    fn textarea_body_becomes_value_and_entities_decode() -> Result<()> {
        let dom = parse_html(
            r#"<textarea id="notes" name="items-0-notes">Boom &amp; jib <b></textarea><p id="t">A &lt; B &#x41; &bogus; R&D</p>"#,
        )?;
        assert_eq!(dom.value(node(&dom, "notes")?)?, "Boom & jib <b>");
        assert_eq!(dom.text_content(node(&dom, "t")?), "A < B A &bogus; R&D");
        Ok(())
    }

    #[test]
    fn options_close_implicitly() -> Result<()> {
        let dom = parse_html(
            r#"<select id="s"><option value="">Select<option value="1">One</select>"#,
        )?;
        let select = node(&dom, "s")?;
        assert_eq!(dom.select_options(select)?.len(), 2);
        assert_eq!(dom.value(select)?, "");
        Ok(())
    }

    #[test]
    fn scripts_are_kept_as_text_and_not_parsed() -> Result<()> {
        let dom = parse_html(
            r#"<div id="a"></div><script>if (a < b) { $('.add-form').click(); }</SCRIPT ><div id="b"></div>"#,
        )?;
        assert!(dom.by_id("a").is_some());
        assert!(dom.by_id("b").is_some());
        assert!(dom.query_selector_all(".add-form")?.is_empty());
        Ok(())
    }

    #[test]
    fn doctype_and_quoted_attributes_with_markup() -> Result<()> {
        let dom = parse_html(
            r#"<!DOCTYPE html><button id="p" onclick="return a > b;" disabled>Print</button>"#,
        )?;
        let button = node(&dom, "p")?;
        assert_eq!(dom.attr(button, "onclick").as_deref(), Some("return a > b;"));
        assert!(dom.disabled(button));
        assert_eq!(dom.text_content(button), "Print");
        Ok(())
    }

    #[test]
    fn reports_unclosed_markup() {
        for html in ["<div><!-- open", "<div class=\"x", "<textarea>body"] {
            assert!(
                matches!(parse_html(html), Err(Error::HtmlParse(_))),
                "{html} should fail"
            );
        }
    }

    #[test]
    fn stray_end_tags_are_ignored() -> Result<()> {
        let dom = parse_html(r#"<div id="outer"></span><p id="inner">x</p></div>"#)?;
        assert_eq!(dom.parent(node(&dom, "inner")?), Some(node(&dom, "outer")?));
        Ok(())
    }
}

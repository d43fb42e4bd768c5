/// Markup parser
///
/// Walks the element syntax directly over the source string and delegates to
/// the expression parser at every `{`. Elements whose content must survive
/// verbatim (code, raw markdown, function bodies) are scanned up to their
/// closing tag without interpreting nested markup.

use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::expr::parse_braced;
use crate::span::Span;

/// Elements whose content is kept as raw text
pub const RAW_TEXT_ELEMENTS: &[&str] = &["CodeBlock", "pre", "Markdown", "Function", "Helper"];

pub struct MarkupParser<'input> {
    input: &'input str,
    pos: usize,
}

impl<'input> MarkupParser<'input> {
    pub fn new(input: &'input str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse the whole input as one root element
    pub fn parse_tree(mut self) -> Result<SourceTree> {
        self.skip_prolog()?;
        if self.at_end() {
            return Err(ParseError::eof("root element", self.pos));
        }
        if !self.rest().starts_with('<') {
            return Err(ParseError::unexpected(
                self.describe_here(),
                "root element",
                self.here_span(),
            ));
        }
        let root = self.parse_element()?;
        self.skip_prolog()?;
        if !self.at_end() {
            return Err(ParseError::unexpected(
                self.describe_here(),
                "end of file after the root element",
                self.here_span(),
            ));
        }
        Ok(SourceTree { root })
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn here_span(&self) -> Span {
        let len = self.peek().map(char::len_utf8).unwrap_or(0);
        Span::new(self.pos, self.pos + len)
    }

    fn describe_here(&self) -> String {
        match self.peek() {
            Some(c) => format!("{:?}", c),
            None => "end of input".to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Whitespace and comments allowed around the root element
    fn skip_prolog(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_comment(&mut self) -> Result<()> {
        let start = self.pos;
        match self.rest().find("-->") {
            Some(end) => {
                self.pos += end + 3;
                Ok(())
            }
            None => Err(ParseError::unterminated(
                "comment",
                Span::new(start, self.input.len()),
            )),
        }
    }

    fn parse_name(&mut self, what: &str) -> Result<(String, Span)> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            self.bump();
        }
        if self.pos == start {
            return Err(ParseError::unexpected(self.describe_here(), what, self.here_span()));
        }
        Ok((self.input[start..self.pos].to_string(), Span::new(start, self.pos)))
    }

    fn parse_element(&mut self) -> Result<Element> {
        let start = self.pos;
        self.bump(); // '<'
        let (name, name_span) = self.parse_name("element name")?;
        let attributes = self.parse_attributes(&name)?;

        if self.rest().starts_with("/>") {
            self.pos += 2;
            return Ok(Element {
                name,
                attributes,
                children: Vec::new(),
                span: Span::new(start, self.pos),
                name_span,
            });
        }
        // parse_attributes only returns at '>' or '/>'
        self.bump();

        let children = if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.parse_raw_content(&name, start)?
        } else {
            self.parse_children(&name, start)?
        };

        Ok(Element {
            name,
            attributes,
            children,
            span: Span::new(start, self.pos),
            name_span,
        })
    }

    fn parse_attributes(&mut self, element: &str) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError::eof(
                        format!("'>' to close <{}>", element),
                        self.pos,
                    ));
                }
                Some('>') => return Ok(attributes),
                Some('/') if self.rest().starts_with("/>") => return Ok(attributes),
                Some('{') if self.rest()[1..].trim_start().starts_with("/*") => {
                    self.skip_expr_comment()?;
                }
                Some(_) => {
                    let start = self.pos;
                    let (name, _) = self.parse_name("attribute name")?;
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.parse_attr_value(&name)?
                    } else {
                        AttrValue::Flag
                    };
                    attributes.push(Attribute {
                        name,
                        value,
                        span: Span::new(start, self.pos),
                    });
                }
            }
        }
    }

    fn parse_attr_value(&mut self, attr: &str) -> Result<AttrValue> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                let start = self.pos;
                self.bump();
                match self.rest().find(quote) {
                    Some(len) => {
                        let raw = &self.rest()[..len];
                        self.pos += len + 1;
                        Ok(AttrValue::String(decode_entities(raw)))
                    }
                    None => Err(ParseError::unterminated(
                        format!("value of attribute '{}'", attr),
                        Span::new(start, self.input.len()),
                    )),
                }
            }
            Some('{') => Ok(AttrValue::Expr(self.parse_embedded()?)),
            _ => Err(ParseError::unexpected(
                self.describe_here(),
                format!("quoted string or {{expression}} for attribute '{}'", attr),
                self.here_span(),
            )),
        }
    }

    /// Parse `{expr}` at the current position
    fn parse_embedded(&mut self) -> Result<EmbeddedExpr> {
        let start = self.pos;
        let (expr, end) = parse_braced(self.input, start + 1)?;
        self.pos = end;
        Ok(EmbeddedExpr {
            source: self.input[start + 1..end - 1].trim().to_string(),
            expr,
            span: Span::new(start, end),
        })
    }

    /// Skip `{/* ... */}`
    fn skip_expr_comment(&mut self) -> Result<()> {
        let start = self.pos;
        let Some(close) = self.rest().find("*/") else {
            return Err(ParseError::unterminated("comment", Span::new(start, self.input.len())));
        };
        self.pos += close + 2;
        self.skip_whitespace();
        if self.peek() != Some('}') {
            return Err(ParseError::unexpected(
                self.describe_here(),
                "'}' after comment",
                self.here_span(),
            ));
        }
        self.bump();
        Ok(())
    }

    fn parse_children(&mut self, parent: &str, open_start: usize) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        loop {
            if self.at_end() {
                return Err(ParseError::unterminated(
                    format!("element <{}>", parent),
                    Span::new(open_start, self.input.len()),
                ));
            }
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.skip_comment()?;
            } else if rest.starts_with("</") {
                self.parse_close_tag(parent)?;
                return Ok(children);
            } else if rest.starts_with('<') {
                children.push(Node::Element(self.parse_element()?));
            } else if rest.starts_with('{') {
                if rest[1..].trim_start().starts_with("/*") {
                    self.skip_expr_comment()?;
                } else {
                    children.push(Node::Expr(self.parse_embedded()?));
                }
            } else {
                let start = self.pos;
                let len = rest.find(['<', '{']).unwrap_or(rest.len());
                self.pos += len;
                children.push(Node::Text(Text {
                    value: decode_entities(&rest[..len]),
                    span: Span::new(start, self.pos),
                }));
            }
        }
    }

    fn parse_close_tag(&mut self, expected: &str) -> Result<()> {
        let start = self.pos;
        self.pos += 2;
        let (name, _) = self.parse_name("closing tag name")?;
        self.skip_whitespace();
        if self.peek() != Some('>') {
            return Err(ParseError::unexpected(
                self.describe_here(),
                format!("'>' to finish </{}>", name),
                self.here_span(),
            ));
        }
        self.bump();
        if name != expected {
            return Err(ParseError::MismatchedClose {
                expected: expected.to_string(),
                found: name,
                span: Span::new(start, self.pos),
            });
        }
        Ok(())
    }

    fn parse_raw_content(&mut self, name: &str, open_start: usize) -> Result<Vec<Node>> {
        let close = format!("</{}", name);
        let start = self.pos;
        let Some(offset) = self.rest().find(&close) else {
            return Err(ParseError::unterminated(
                format!("element <{}>", name),
                Span::new(open_start, self.input.len()),
            ));
        };
        let raw = &self.rest()[..offset];
        self.pos += offset;
        let end = self.pos;
        self.parse_close_tag(name)?;

        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Node::Text(Text {
            value: raw.to_string(),
            span: Span::new(start, end),
        })])
    }
}

/// Decode the small set of character references the markup supports
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; c"), "a <b> & c");
        assert_eq!(decode_entities("&#123;x&#125;"), "{x}");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }

    #[test]
    fn test_raw_element_keeps_markup() {
        let src = "<CodeBlock language=\"html\"><b>x</b>\n\n  y</CodeBlock>";
        let tree = MarkupParser::new(src).parse_tree().unwrap();
        let Node::Text(text) = &tree.root.children[0] else {
            panic!("Expected raw text");
        };
        assert_eq!(text.value, "<b>x</b>\n\n  y");
    }

    #[test]
    fn test_mismatched_close() {
        let err = MarkupParser::new("<p>a</div>").parse_tree().unwrap_err();
        assert!(matches!(err, ParseError::MismatchedClose { .. }));
    }
}

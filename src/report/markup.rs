//! Generic markup tree parser for uploaded hardware reports.
//!
//! Recursive descent over a small XML subset: elements with attributes, text,
//! comments, CDATA sections, and skipped processing instructions. A malformed
//! document fails fast with one positioned error and no partial tree is ever
//! returned. Nesting depth is capped, so arbitrarily deep input yields that
//! same positioned error instead of exhausting the stack. Nothing here knows
//! about any vendor schema.

use std::error::Error;
use std::fmt;

/// Hardware reports are shallow in practice; anything past this depth is
/// rejected with a parse error rather than recursed into.
const MAX_NESTING_DEPTH: usize = 256;

/// A parsed element: name, attributes in document order, children in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Concatenated text content of direct text children, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(text) = child {
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First direct child element with the given name, case-insensitive.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|el| el.name.eq_ignore_ascii_case(name))
    }

    /// Total element count of this subtree, including the element itself.
    pub fn count_elements(&self) -> usize {
        1 + self
            .child_elements()
            .map(Element::count_elements)
            .sum::<usize>()
    }
}

/// Single structural error with the 1-based position where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed report at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl Error for ParseError {}

/// Parse a whole document into its single root element.
pub fn parse_document(input: &str) -> Result<Element, ParseError> {
    let mut cursor = Cursor::new(input);
    cursor.skip_misc()?;
    if cursor.peek().is_none() {
        return Err(cursor.error("document has no root element"));
    }
    if cursor.peek() != Some('<') {
        return Err(cursor.error("expected root element"));
    }
    let root = parse_element(&mut cursor)?;
    cursor.skip_misc()?;
    if cursor.peek().is_some() {
        return Err(cursor.error("unexpected content after the root element"));
    }
    Ok(root)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            input,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn starts_with(&self, needle: &str) -> bool {
        self.rest().starts_with(needle)
    }

    fn eat(&mut self, needle: &str) -> bool {
        if self.starts_with(needle) {
            for _ in needle.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    /// Consume through the first occurrence of `terminator`, returning the
    /// text before it. Errors if the terminator never appears.
    fn take_until(&mut self, terminator: &str, what: &str) -> Result<String, ParseError> {
        let mut out = String::new();
        while !self.starts_with(terminator) {
            match self.bump() {
                Some(ch) => out.push(ch),
                None => return Err(self.error(&format!("unterminated {what}"))),
            }
        }
        self.eat(terminator);
        Ok(out)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    /// Skip whitespace, comments, processing instructions, and a doctype:
    /// everything allowed around the root element.
    fn skip_misc(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<!--") {
                self.eat("<!--");
                self.take_until("-->", "comment")?;
            } else if self.starts_with("<?") {
                self.eat("<?");
                self.take_until("?>", "processing instruction")?;
            } else if self.starts_with("<!") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        self.eat("<!");
        let mut bracket_depth = 0usize;
        loop {
            match self.bump() {
                Some('[') => bracket_depth += 1,
                Some(']') => bracket_depth = bracket_depth.saturating_sub(1),
                Some('>') if bracket_depth == 0 => return Ok(()),
                Some(_) => {}
                None => return Err(self.error("unterminated doctype declaration")),
            }
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            message: message.to_string(),
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':')
}

fn parse_name(cursor: &mut Cursor<'_>) -> Result<String, ParseError> {
    let mut name = String::new();
    match cursor.peek() {
        Some(ch) if is_name_start(ch) => {
            name.push(ch);
            cursor.bump();
        }
        _ => return Err(cursor.error("expected a tag name")),
    }
    while let Some(ch) = cursor.peek() {
        if !is_name_char(ch) {
            break;
        }
        name.push(ch);
        cursor.bump();
    }
    Ok(name)
}

fn parse_element(cursor: &mut Cursor<'_>) -> Result<Element, ParseError> {
    if !cursor.eat("<") {
        return Err(cursor.error("expected an opening tag"));
    }
    let name = parse_name(cursor)?;
    if cursor.depth >= MAX_NESTING_DEPTH {
        return Err(cursor.error(&format!(
            "element nesting deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }
    let attrs = parse_attributes(cursor)?;

    if cursor.eat("/>") {
        return Ok(Element {
            name,
            attrs,
            children: Vec::new(),
        });
    }
    if !cursor.eat(">") {
        return Err(cursor.error(&format!("unterminated tag <{name}>")));
    }

    cursor.depth += 1;
    let children = parse_children(cursor, &name)?;
    cursor.depth -= 1;
    Ok(Element {
        name,
        attrs,
        children,
    })
}

fn parse_attributes(cursor: &mut Cursor<'_>) -> Result<Vec<(String, String)>, ParseError> {
    let mut attrs = Vec::new();
    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            Some('>') | Some('/') => return Ok(attrs),
            Some(ch) if is_name_start(ch) => {}
            Some(_) => return Err(cursor.error("expected an attribute name")),
            None => return Err(cursor.error("unterminated tag")),
        }
        let name = parse_name(cursor)?;
        cursor.skip_whitespace();
        if !cursor.eat("=") {
            return Err(cursor.error(&format!("attribute {name} is missing '='")));
        }
        cursor.skip_whitespace();
        let quote = match cursor.peek() {
            Some(ch @ ('"' | '\'')) => ch,
            _ => return Err(cursor.error(&format!("attribute {name} value must be quoted"))),
        };
        cursor.bump();
        let raw = cursor.take_until(&quote.to_string(), "attribute value")?;
        attrs.push((name, decode_entities(&raw)));
    }
}

fn parse_children(cursor: &mut Cursor<'_>, parent: &str) -> Result<Vec<Node>, ParseError> {
    let mut children = Vec::new();
    let mut text = String::new();

    loop {
        if cursor.starts_with("</") {
            flush_text(&mut children, &mut text);
            cursor.eat("</");
            let closing = parse_name(cursor)?;
            if closing != parent {
                return Err(cursor.error(&format!(
                    "closing tag </{closing}> does not match <{parent}>"
                )));
            }
            cursor.skip_whitespace();
            if !cursor.eat(">") {
                return Err(cursor.error(&format!("unterminated closing tag </{closing}>")));
            }
            return Ok(children);
        }
        if cursor.starts_with("<!--") {
            cursor.eat("<!--");
            cursor.take_until("-->", "comment")?;
            continue;
        }
        if cursor.starts_with("<![CDATA[") {
            cursor.eat("<![CDATA[");
            let raw = cursor.take_until("]]>", "CDATA section")?;
            text.push_str(&raw);
            continue;
        }
        if cursor.starts_with("<?") {
            cursor.eat("<?");
            cursor.take_until("?>", "processing instruction")?;
            continue;
        }
        match cursor.peek() {
            Some('<') => {
                flush_text(&mut children, &mut text);
                children.push(Node::Element(parse_element(cursor)?));
            }
            Some(_) => {
                let raw = collect_text(cursor);
                text.push_str(&decode_entities(&raw));
            }
            None => return Err(cursor.error(&format!("unterminated element <{parent}>"))),
        }
    }
}

fn collect_text(cursor: &mut Cursor<'_>) -> String {
    let mut raw = String::new();
    while let Some(ch) = cursor.peek() {
        if ch == '<' {
            break;
        }
        raw.push(ch);
        cursor.bump();
    }
    raw
}

fn flush_text(children: &mut Vec<Node>, text: &mut String) {
    if !text.trim().is_empty() {
        children.push(Node::Text(std::mem::take(text)));
    } else {
        text.clear();
    }
}

/// Decode the five predefined entities plus numeric references. Anything
/// unrecognized is kept literally so odd vendor output still parses.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let Some(end) = rest.find(';').filter(|end| *end <= 12) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        if !entity
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '#')
        {
            out.push('&');
            rest = &rest[1..];
            continue;
        }
        match decode_entity(entity) {
            Some(decoded) => out.push_str(&decoded),
            None => out.push_str(&rest[..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        _ => {}
    }
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|ch| ch.to_string())
}

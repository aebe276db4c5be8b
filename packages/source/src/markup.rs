//! # Markup Scanner
//!
//! Minimal element scanner for JSX and HTML-like sources. It only knows enough
//! to answer two questions: which element encloses a position, and where the
//! text children of that element live.
//!
//! Elements are scanned on demand starting at a `<`, so code around the markup
//! (imports, hooks, TypeScript) never has to be understood.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Elements nested deeper than this abort the scan
pub const MAX_ELEMENT_DEPTH: usize = 256;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Half-open byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element(Element),
    Text(Span),
    /// `{...}` JSX expression container
    Expression(Span),
    Comment(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name, empty for fragments
    pub tag: String,

    /// From `<` to the end of the closing tag
    pub span: Span,

    /// The opening tag including its attributes
    pub open_tag: Span,

    /// Between the opening and the closing tag; `None` for void and self-closing elements
    pub content: Option<Span>,

    pub children: Vec<MarkupNode>,
}

impl Element {
    /// First direct text child that is not whitespace-only, trimmed
    pub fn first_text(&self, source: &str) -> Option<Span> {
        self.children.iter().find_map(|child| match child {
            MarkupNode::Text(span) => trimmed(source, *span),
            _ => None,
        })
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            MarkupNode::Element(element) => Some(element),
            _ => None,
        })
    }
}

/// Narrow a span to its non-whitespace core, `None` if nothing is left
pub fn trimmed(source: &str, span: Span) -> Option<Span> {
    let text = span.slice(source);
    let leading = text.len() - text.trim_start().len();
    let core = text.trim();
    if core.is_empty() {
        return None;
    }
    let start = span.start + leading;
    Some(Span::new(start, start + core.len()))
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("No element starts at offset {0}")]
    NotAnElement(usize),

    #[error("Element <{tag}> opened at {pos} is never closed")]
    Unclosed { tag: String, pos: usize },

    #[error("Expected </{expected}> at {pos}, found </{found}>")]
    MismatchedClose {
        expected: String,
        found: String,
        pos: usize,
    },

    #[error("Unterminated {what} starting at {pos}")]
    Unterminated { what: &'static str, pos: usize },

    #[error("Elements nested deeper than {MAX_ELEMENT_DEPTH}")]
    TooDeep,
}

pub type MarkupResult<T> = Result<T, MarkupError>;

/// Find the innermost element whose span covers `offset`.
///
/// Walks backwards from `offset` over every `<` that can start an element and
/// returns the first one whose scanned span encloses the position.
pub fn find_element_at(source: &str, offset: usize) -> Option<Element> {
    let bytes = source.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let scanner = Scanner::new(source);
    let last = offset.min(bytes.len() - 1);

    (0..=last)
        .rev()
        .filter(|&pos| scanner.starts_element(pos))
        .find_map(|pos| {
            scanner
                .element(pos, 0)
                .ok()
                .filter(|element| element.span.contains(offset))
        })
}

/// Scan the element that starts exactly at `offset`
pub fn parse_element_at(source: &str, offset: usize) -> MarkupResult<Element> {
    let scanner = Scanner::new(source);
    if !scanner.starts_element(offset) {
        return Err(MarkupError::NotAnElement(offset));
    }
    scanner.element(offset, 0)
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
        }
    }

    fn at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    fn starts_with(&self, pos: usize, pattern: &str) -> bool {
        self.bytes
            .get(pos..)
            .map(|rest| rest.starts_with(pattern.as_bytes()))
            .unwrap_or(false)
    }

    /// `<` followed by a tag name start or `>` (fragment)
    fn starts_element(&self, pos: usize) -> bool {
        self.at(pos) == Some(b'<')
            && matches!(self.at(pos + 1), Some(c) if c.is_ascii_alphabetic() || c == b'>')
    }

    fn element(&self, start: usize, depth: usize) -> MarkupResult<Element> {
        if depth > MAX_ELEMENT_DEPTH {
            return Err(MarkupError::TooDeep);
        }

        let name_start = start + 1;
        let mut pos = name_start;
        while let Some(c) = self.at(pos) {
            if c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b':' | b'-') {
                pos += 1;
            } else {
                break;
            }
        }
        let tag = self.source[name_start..pos].to_string();

        let (open_end, self_closing) = self.skip_attributes(pos, &tag, start, depth)?;
        let open_tag = Span::new(start, open_end);

        let is_void = VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
            && tag.chars().all(|c| !c.is_ascii_uppercase());

        if self_closing || is_void {
            return Ok(Element {
                tag,
                span: open_tag,
                open_tag,
                content: None,
                children: Vec::new(),
            });
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let closing = format!("</{}", tag);
            let close = self.source[open_end..]
                .find(&closing)
                .map(|i| open_end + i)
                .ok_or_else(|| MarkupError::Unclosed {
                    tag: tag.clone(),
                    pos: start,
                })?;
            let end = self.closing_tag_end(close, &tag, start)?;
            let content = Span::new(open_end, close);
            let children = if content.is_empty() {
                Vec::new()
            } else {
                vec![MarkupNode::Text(content)]
            };
            return Ok(Element {
                tag,
                span: Span::new(start, end),
                open_tag,
                content: Some(content),
                children,
            });
        }

        let mut children = Vec::new();
        let mut pos = open_end;

        loop {
            if pos >= self.bytes.len() {
                return Err(MarkupError::Unclosed { tag, pos: start });
            }

            if self.starts_with(pos, "</") {
                let end = self.closing_tag_end(pos, &tag, start)?;
                return Ok(Element {
                    tag,
                    span: Span::new(start, end),
                    open_tag,
                    content: Some(Span::new(open_end, pos)),
                    children,
                });
            }

            if self.starts_with(pos, "<!--") {
                let end = self.source[pos + 4..]
                    .find("-->")
                    .map(|i| pos + 4 + i + 3)
                    .ok_or(MarkupError::Unterminated {
                        what: "comment",
                        pos,
                    })?;
                children.push(MarkupNode::Comment(Span::new(pos, end)));
                pos = end;
                continue;
            }

            if self.starts_element(pos) {
                let child = self.element(pos, depth + 1)?;
                pos = child.span.end;
                children.push(MarkupNode::Element(child));
                continue;
            }

            if self.at(pos) == Some(b'{') {
                let end = self.skip_braces(pos, depth)?;
                children.push(MarkupNode::Expression(Span::new(pos, end)));
                pos = end;
                continue;
            }

            let text_start = pos;
            pos += 1;
            while pos < self.bytes.len() {
                let c = self.bytes[pos];
                if c == b'{' || (c == b'<' && (self.starts_element(pos) || self.starts_with(pos, "</") || self.starts_with(pos, "<!--"))) {
                    break;
                }
                pos += 1;
            }
            children.push(MarkupNode::Text(Span::new(text_start, pos)));
        }
    }

    /// Returns the offset just past the opening tag and whether it was `/>`
    fn skip_attributes(
        &self,
        mut pos: usize,
        tag: &str,
        start: usize,
        depth: usize,
    ) -> MarkupResult<(usize, bool)> {
        loop {
            match self.at(pos) {
                None => {
                    return Err(MarkupError::Unclosed {
                        tag: tag.to_string(),
                        pos: start,
                    })
                }
                Some(b'>') => return Ok((pos + 1, false)),
                Some(b'/') if self.at(pos + 1) == Some(b'>') => return Ok((pos + 2, true)),
                Some(b'{') => pos = self.skip_braces(pos, depth)?,
                Some(q @ (b'"' | b'\'')) => pos = self.skip_string(pos, q)?,
                // A nested element start inside an opening tag means this was not markup
                Some(b'<') => return Err(MarkupError::NotAnElement(start)),
                Some(_) => pos += 1,
            }
        }
    }

    fn closing_tag_end(&self, pos: usize, tag: &str, start: usize) -> MarkupResult<usize> {
        let name_start = pos + 2;
        let close = self.source[name_start..]
            .find('>')
            .map(|i| name_start + i)
            .ok_or_else(|| MarkupError::Unclosed {
                tag: tag.to_string(),
                pos: start,
            })?;
        let found = self.source[name_start..close].trim();
        if found != tag {
            return Err(MarkupError::MismatchedClose {
                expected: tag.to_string(),
                found: found.to_string(),
                pos,
            });
        }
        Ok(close + 1)
    }

    fn skip_string(&self, start: usize, quote: u8) -> MarkupResult<usize> {
        let mut pos = start + 1;
        while let Some(c) = self.at(pos) {
            if c == b'\\' {
                pos += 2;
                continue;
            }
            if c == quote {
                return Ok(pos + 1);
            }
            pos += 1;
        }
        Err(MarkupError::Unterminated {
            what: "string",
            pos: start,
        })
    }

    fn skip_template(&self, start: usize, depth: usize) -> MarkupResult<usize> {
        let mut pos = start + 1;
        while let Some(c) = self.at(pos) {
            match c {
                b'\\' => pos += 2,
                b'`' => return Ok(pos + 1),
                b'$' if self.at(pos + 1) == Some(b'{') => pos = self.skip_braces(pos + 1, depth)?,
                _ => pos += 1,
            }
        }
        Err(MarkupError::Unterminated {
            what: "template literal",
            pos: start,
        })
    }

    /// Skip a balanced `{...}` block, honouring strings and comments inside it.
    ///
    /// JSX elements inside the block are scanned as markup, so their text is
    /// never read as code.
    fn skip_braces(&self, start: usize, depth: usize) -> MarkupResult<usize> {
        let mut braces = 0usize;
        let mut pos = start;
        while let Some(c) = self.at(pos) {
            match c {
                b'{' => {
                    braces += 1;
                    pos += 1;
                }
                b'}' => {
                    braces -= 1;
                    pos += 1;
                    if braces == 0 {
                        return Ok(pos);
                    }
                }
                b'<' if self.starts_element(pos) => match self.element(pos, depth + 1) {
                    Ok(element) => pos = element.span.end,
                    Err(MarkupError::TooDeep) => return Err(MarkupError::TooDeep),
                    // A comparison such as `i<limit`
                    Err(_) => pos += 1,
                },
                b'"' | b'\'' => pos = self.skip_string(pos, c)?,
                b'`' => pos = self.skip_template(pos, depth)?,
                b'/' if self.at(pos + 1) == Some(b'*') => {
                    pos = self.source[pos + 2..]
                        .find("*/")
                        .map(|i| pos + 2 + i + 2)
                        .ok_or(MarkupError::Unterminated {
                            what: "comment",
                            pos,
                        })?;
                }
                b'/' if self.at(pos + 1) == Some(b'/') => {
                    pos = self.source[pos..]
                        .find('\n')
                        .map(|i| pos + i + 1)
                        .unwrap_or(self.bytes.len());
                }
                _ => pos += 1,
            }
        }
        Err(MarkupError::Unterminated {
            what: "expression",
            pos: start,
        })
    }
}

/// Escape text so it is inert inside JSX and HTML element content
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            c => escaped.push(c),
        }
    }
    escaped
}

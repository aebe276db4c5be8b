//! # Stylesheet Scanner
//!
//! Splits a stylesheet into rules and declarations with byte spans. Tokenizing
//! is done with logos; the structure on top of it is a small recursive walk
//! over braces. Rules inside at-rule blocks and nested rules are collected into
//! the same flat list, ordered by position.

use logos::Logos;
use thiserror::Error;

use crate::locator::offset_to_line;
use crate::markup::Span;

/// Blocks nested deeper than this abort the scan
pub const MAX_BLOCK_DEPTH: usize = 64;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssToken {
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    Comment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,

    #[token("{")]
    Open,

    #[token("}")]
    Close,

    #[token(";")]
    Semi,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("/")]
    Slash,

    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    #[regex(r#"[^{};()"'/ \t\r\n\f]+"#)]
    Text,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StylesheetError {
    #[error("Unexpected input at offset {0}")]
    Lex(usize),

    #[error("Unmatched '}}' at offset {0}")]
    UnexpectedClose(usize),

    #[error("Block opened at offset {0} is never closed")]
    Unclosed(usize),

    #[error("Blocks nested deeper than {MAX_BLOCK_DEPTH}")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Property name as written
    pub property: String,

    /// Value text without any `!important` flag
    pub value: String,

    pub important: bool,

    /// Trimmed span of the value text, excluding `!important`
    pub value_span: Span,

    /// Whole declaration, including the trailing `;` when present
    pub span: Span,

    pub has_semicolon: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Selector list as written, trimmed
    pub selector: String,

    pub selector_span: Span,

    /// From `{` to `}` inclusive
    pub block: Span,

    /// 1-indexed line of the selector start
    pub line: u32,

    pub declarations: Vec<Declaration>,
}

impl Rule {
    /// Whether the selector list, or any comma-separated member of it, matches
    pub fn matches(&self, normalized: &str) -> bool {
        let whole = normalize_selector(&self.selector);
        whole == normalized
            || self
                .selector
                .split(',')
                .any(|member| normalize_selector(member) == normalized)
    }

    /// Last declaration of `property`, compared case-insensitively
    pub fn declaration(&self, property: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .rev()
            .find(|decl| decl.property.eq_ignore_ascii_case(property.trim()))
    }
}

/// A single replacement of a byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len() + self.replacement.len());
        out.push_str(&source[..self.span.start]);
        out.push_str(&self.replacement);
        out.push_str(&source[self.span.end..]);
        out
    }
}

/// Lowercase, collapse whitespace and drop the spaces around combinators
pub fn normalize_selector(selector: &str) -> String {
    let collapsed = selector
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut out = String::with_capacity(collapsed.len());
    let chars: Vec<char> = collapsed.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c == ' ' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let is_combinator = |c: Option<char>| matches!(c, Some('>' | '+' | '~' | ','));
            if is_combinator(prev) || is_combinator(next) {
                continue;
            }
        }
        out.push(*c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(source: &str) -> Result<Self, StylesheetError> {
        let mut tokens = Vec::new();
        let mut lexer = CssToken::lexer(source);
        while let Some(token) = lexer.next() {
            let span = lexer.span();
            match token {
                Ok(token) => tokens.push((token, Span::new(span.start, span.end))),
                Err(()) => return Err(StylesheetError::Lex(span.start)),
            }
        }

        let mut walker = BlockWalker {
            source,
            tokens: &tokens,
            pos: 0,
            rules: Vec::new(),
        };
        walker.block(None, 0)?;

        let mut rules = walker.rules;
        rules.sort_by_key(|rule| rule.selector_span.start);
        Ok(Self { rules })
    }

    /// Find a rule by selector. With `near_line`, the rule starting closest to
    /// that line wins; otherwise the first match in document order.
    pub fn find_rule(&self, selector: &str, near_line: Option<u32>) -> Option<&Rule> {
        let normalized = normalize_selector(selector);
        let mut candidates = self.rules.iter().filter(|rule| rule.matches(&normalized));

        match near_line {
            Some(line) => candidates.min_by_key(|rule| rule.line.abs_diff(line)),
            None => candidates.next(),
        }
    }
}

/// Replace the value of an existing declaration, or append a new one.
/// An existing `!important` flag survives.
pub fn set_declaration(source: &str, rule: &Rule, property: &str, value: &str) -> TextEdit {
    if let Some(decl) = rule.declaration(property) {
        return TextEdit::new(decl.value_span, value);
    }
    insert_declaration(source, rule, property, value)
}

/// Remove the last declaration of `property`, taking its whole line when it
/// stands alone on one
pub fn remove_declaration(source: &str, rule: &Rule, property: &str) -> Option<TextEdit> {
    let decl = rule.declaration(property)?;
    let bytes = source.as_bytes();

    let mut start = decl.span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let mut end = decl.span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }

    let line_start = start == 0 || bytes[start - 1] == b'\n';
    if line_start && end < bytes.len() && bytes[end] == b'\n' {
        return Some(TextEdit::new(Span::new(start, end + 1), ""));
    }
    if line_start && bytes.get(end..end + 2) == Some(&b"\r\n"[..]) {
        return Some(TextEdit::new(Span::new(start, end + 2), ""));
    }

    // Inline declaration: drop it with one side of its surrounding space
    let inline_start = if decl.span.start > rule.block.start + 1 {
        start
    } else {
        decl.span.start
    };
    Some(TextEdit::new(Span::new(inline_start, decl.span.end), ""))
}

fn insert_declaration(source: &str, rule: &Rule, property: &str, value: &str) -> TextEdit {
    let body = &source[rule.block.start + 1..rule.block.end - 1];
    let multiline = body.contains('\n');

    match rule.declarations.last() {
        Some(last) => {
            let lead = if last.has_semicolon { "" } else { ";" };
            let text = if multiline {
                let indent = line_indent(source, last.span.start);
                format!("{}\n{}{}: {};", lead, indent, property, value)
            } else {
                format!("{} {}: {};", lead, property, value)
            };
            TextEdit::new(Span::new(last.span.end, last.span.end), text)
        }
        None if multiline => {
            let indent = format!("{}  ", line_indent(source, rule.selector_span.start));
            let at = rule.block.start + 1;
            TextEdit::new(Span::new(at, at), format!("\n{}{}: {};", indent, property, value))
        }
        None => {
            // `{}` or `{ }`: rewrite the whole body
            let span = Span::new(rule.block.start + 1, rule.block.end - 1);
            TextEdit::new(span, format!(" {}: {}; ", property, value))
        }
    }
}

/// Leading whitespace of the line containing `offset`
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

struct BlockWalker<'a> {
    source: &'a str,
    tokens: &'a [(CssToken, Span)],
    pos: usize,
    rules: Vec<Rule>,
}

impl<'a> BlockWalker<'a> {
    /// Walk statements until the matching `}` (or end of input at top level).
    /// Returns the declarations found directly inside this block.
    fn block(&mut self, open: Option<usize>, depth: usize) -> Result<Vec<Declaration>, StylesheetError> {
        if depth > MAX_BLOCK_DEPTH {
            return Err(StylesheetError::TooDeep);
        }

        let mut declarations = Vec::new();
        let mut segment: Option<Span> = None;
        let mut parens = 0usize;

        while let Some(&(token, span)) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token {
                CssToken::Whitespace | CssToken::Comment => {}
                CssToken::Semi if parens == 0 => {
                    if let Some(segment) = segment.take() {
                        if let Some(decl) = declaration(self.source, segment, Some(span)) {
                            declarations.push(decl);
                        }
                    }
                }
                CssToken::Open if parens == 0 => {
                    let prelude = segment.take();
                    let block_start = span.start;
                    let inner = self.block(Some(block_start), depth + 1)?;
                    let block = Span::new(block_start, self.tokens[self.pos - 1].1.end);

                    if let Some(prelude) = prelude {
                        let selector = prelude.slice(self.source).trim();
                        if !selector.starts_with('@') {
                            self.rules.push(Rule {
                                selector: selector.to_string(),
                                selector_span: prelude,
                                block,
                                line: offset_to_line(self.source, prelude.start),
                                declarations: inner,
                            });
                        }
                    }
                }
                CssToken::Close if parens == 0 => {
                    return match open {
                        Some(_) => {
                            if let Some(segment) = segment.take() {
                                if let Some(decl) = declaration(self.source, segment, None) {
                                    declarations.push(decl);
                                }
                            }
                            Ok(declarations)
                        }
                        None => Err(StylesheetError::UnexpectedClose(span.start)),
                    };
                }
                _ => {
                    match token {
                        CssToken::ParenOpen => parens += 1,
                        CssToken::ParenClose => parens = parens.saturating_sub(1),
                        _ => {}
                    }
                    segment = Some(match segment {
                        Some(current) => Span::new(current.start, span.end),
                        None => span,
                    });
                }
            }
        }

        match open {
            Some(start) => Err(StylesheetError::Unclosed(start)),
            None => Ok(declarations),
        }
    }
}

fn declaration(source: &str, segment: Span, semi: Option<Span>) -> Option<Declaration> {
    let text = segment.slice(source);
    let colon = text.find(':')?;
    let property = text[..colon].trim();
    if property.is_empty() || property.contains(char::is_whitespace) {
        return None;
    }

    let raw_value = &text[colon + 1..];
    let value_offset = segment.start + colon + 1;

    let lower = raw_value.to_ascii_lowercase();
    let (value_text, important) = match lower.rfind('!') {
        Some(bang) if lower[bang + 1..].trim() == "important" => (&raw_value[..bang], true),
        _ => (raw_value, false),
    };

    let leading = value_text.len() - value_text.trim_start().len();
    let value = value_text.trim();
    let value_start = value_offset + leading;

    let end = semi.map(|s| s.end).unwrap_or(segment.end);
    Some(Declaration {
        property: property.to_string(),
        value: value.to_string(),
        important,
        value_span: Span::new(value_start, value_start + value.len()),
        span: Span::new(segment.start, end),
        has_semicolon: semi.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "/* card */
.card {
  padding: 16px;
  color: #ff0000 !important;
  background: url(\"data:image/png;base64,AAAA\");
}

.card .title, .hero > h1 {
  font-size: 2rem;
  font-size: 3rem
}

@media (max-width: 600px) {
  .card {
    padding: 8px;
  }
}

.empty {}
";

    #[test]
    fn test_parse_rules() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let selectors: Vec<&str> = sheet.rules.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec![".card", ".card .title, .hero > h1", ".card", ".empty"]);
        assert_eq!(sheet.rules[0].line, 2);
        assert_eq!(sheet.rules[2].line, 14);
    }

    #[test]
    fn test_declarations() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let card = &sheet.rules[0];
        assert_eq!(card.declarations.len(), 3);

        let color = card.declaration("COLOR").unwrap();
        assert_eq!(color.value, "#ff0000");
        assert!(color.important);
        assert_eq!(color.value_span.slice(SHEET), "#ff0000");

        let background = card.declaration("background").unwrap();
        assert_eq!(background.value, "url(\"data:image/png;base64,AAAA\")");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let decl = sheet.rules[1].declaration("font-size").unwrap();
        assert_eq!(decl.value, "3rem");
        assert!(!decl.has_semicolon);
    }

    #[test]
    fn test_find_rule_by_member_and_normalization() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        assert!(sheet.find_rule(".HERO>h1", None).is_some());
        assert!(sheet.find_rule(".card   .title", None).is_some());
        assert!(sheet.find_rule(".missing", None).is_none());
    }

    #[test]
    fn test_find_rule_near_line() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        assert_eq!(sheet.find_rule(".card", None).unwrap().line, 2);
        assert_eq!(sheet.find_rule(".card", Some(13)).unwrap().line, 14);
        assert_eq!(sheet.find_rule(".card", Some(3)).unwrap().line, 2);
    }

    #[test]
    fn test_set_existing_keeps_important() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let edit = set_declaration(SHEET, &sheet.rules[0], "color", "#00ff00");
        let updated = edit.apply(SHEET);
        assert!(updated.contains("color: #00ff00 !important;"));
    }

    #[test]
    fn test_insert_uses_existing_indent() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let media_card = &sheet.rules[2];
        let updated = set_declaration(SHEET, media_card, "margin", "0").apply(SHEET);
        assert!(updated.contains("    padding: 8px;\n    margin: 0;\n  }"));
    }

    #[test]
    fn test_insert_after_missing_semicolon() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let updated = set_declaration(SHEET, &sheet.rules[1], "color", "red").apply(SHEET);
        assert!(updated.contains("font-size: 3rem;\n  color: red;\n}"));
    }

    #[test]
    fn test_insert_into_empty_rule() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let updated = set_declaration(SHEET, &sheet.rules[3], "gap", "4px").apply(SHEET);
        assert!(updated.contains(".empty { gap: 4px; }"));
        Stylesheet::parse(&updated).unwrap();
    }

    #[test]
    fn test_remove_declaration_line() {
        let sheet = Stylesheet::parse(SHEET).unwrap();
        let edit = remove_declaration(SHEET, &sheet.rules[0], "padding").unwrap();
        let updated = edit.apply(SHEET);
        assert!(updated.contains(".card {\n  color: #ff0000 !important;"));
        assert!(remove_declaration(SHEET, &sheet.rules[0], "margin").is_none());
    }

    #[test]
    fn test_remove_inline_declaration() {
        let source = ".a { color: red; padding: 0; }";
        let sheet = Stylesheet::parse(source).unwrap();
        let updated = remove_declaration(source, &sheet.rules[0], "padding").unwrap().apply(source);
        assert_eq!(updated, ".a { color: red; }");
    }

    #[test]
    fn test_nested_rules() {
        let source = ".card {\n  color: red;\n  .title {\n    color: blue;\n  }\n}\n";
        let sheet = Stylesheet::parse(source).unwrap();
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].declarations.len(), 1);
        assert_eq!(sheet.find_rule(".title", None).unwrap().declarations[0].value, "blue");
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(
            Stylesheet::parse(".a { color: red;"),
            Err(StylesheetError::Unclosed(3))
        );
        assert_eq!(
            Stylesheet::parse(".a {} }"),
            Err(StylesheetError::UnexpectedClose(6))
        );
    }

    #[test]
    fn test_normalize_selector() {
        assert_eq!(normalize_selector("  .A   >  .b  "), ".a>.b");
        assert_eq!(normalize_selector(".a,\n .b"), ".a,.b");
        assert_eq!(normalize_selector(".a .b"), ".a .b");
    }
}

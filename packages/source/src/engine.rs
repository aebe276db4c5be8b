//! # Source Engine
//!
//! Resolves locators against files under a project root and performs the
//! minimal text edit for a change. Every mutation verifies the expected prior
//! content first and leaves the file untouched on mismatch.

use std::io;
use std::path::{Component, Path, PathBuf};

use loupe_style::{parse, serialize_with, SerializeOptions, StyleValue};
use tracing::{debug, info};

use crate::cache::FileCache;
use crate::error::{EngineError, EngineResult};
use crate::locator::{line_col_to_offset, SourceLocator};
use crate::markup::{escape_text, find_element_at, Element, Span};
use crate::stylesheet::{self, Rule, TextEdit};

/// Properties whose four-value form is top/right/bottom/left
const BOX_SHORTHANDS: &[&str] = &[
    "margin",
    "padding",
    "inset",
    "border-width",
    "border-style",
    "border-color",
    "scroll-margin",
    "scroll-padding",
];

/// Result of a text mutation
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    /// Full file content after the edit
    pub content: String,
    pub affected_files: Vec<String>,
    /// Text that was replaced, entity-decoded and whitespace-collapsed
    pub previous_text: String,
}

/// Result of a style mutation
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOutcome {
    pub content: String,
    pub affected_files: Vec<String>,
    /// Selector of the rule that was edited
    pub selector: String,
    /// Declaration value before the edit, `None` when it was added
    pub previous: Option<StyleValue>,
}

/// Current value of a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationValue {
    pub selector: String,
    pub raw: String,
    pub value: StyleValue,
    pub important: bool,
}

pub struct SourceEngine {
    root: PathBuf,
    cache: FileCache,
}

impl SourceEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_cache(root, FileCache::new())
    }

    pub fn with_cache(root: impl Into<PathBuf>, cache: FileCache) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Forget a file, accepting either an absolute path or one relative to the root
    pub fn invalidate(&mut self, path: &Path) -> bool {
        if path.is_absolute() {
            self.cache.invalidate(path)
        } else {
            let full = self.root.join(path);
            self.cache.invalidate(&full)
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Join a locator path onto the root, rejecting anything that could escape it
    pub fn resolve_path(&self, relative: &str) -> EngineResult<PathBuf> {
        let path = Path::new(relative);
        let looks_absolute = path.is_absolute()
            || relative.starts_with('/')
            || relative.starts_with('\\')
            || relative.as_bytes().get(1) == Some(&b':');

        if relative.is_empty() || looks_absolute {
            return Err(EngineError::InvalidPath(relative.to_string()));
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(EngineError::InvalidPath(relative.to_string())),
            }
        }
        Ok(self.root.join(path))
    }

    fn load(&mut self, relative: &str) -> EngineResult<(PathBuf, String)> {
        let path = self.resolve_path(relative)?;
        let file = self.cache.load(&path).map_err(|err| read_error(relative, err))?;
        Ok((path, file.source.clone()))
    }

    fn persist(&mut self, path: &Path, relative: &str, content: String) -> EngineResult<()> {
        std::fs::write(path, &content).map_err(|source| EngineError::Write {
            path: relative.to_string(),
            source,
        })?;
        info!(file = %relative, bytes = content.len(), "Wrote source file");
        self.cache.store(path, content);
        Ok(())
    }

    /// Resolve the element a locator points at
    pub fn find_element(&mut self, locator: &SourceLocator) -> EngineResult<Element> {
        let (_, source) = self.load(&locator.file)?;
        element_at(&source, locator)
    }

    /// Replace the first text child of the located element.
    ///
    /// A non-empty `original_text` must match the current text, compared with
    /// entities decoded and whitespace collapsed.
    pub fn update_text(
        &mut self,
        locator: &SourceLocator,
        original_text: Option<&str>,
        new_text: &str,
    ) -> EngineResult<TextOutcome> {
        let (path, source) = self.load(&locator.file)?;
        let element = element_at(&source, locator)?;
        let content = element.content.ok_or_else(|| EngineError::NoTextContent {
            tag: element.tag.clone(),
        })?;

        let text_span = element.first_text(&source);
        let previous_text = text_span
            .map(|span| normalize_text(span.slice(&source)))
            .unwrap_or_default();

        if let Some(expected) = original_text.filter(|t| !t.trim().is_empty()) {
            if normalize_text(expected) != previous_text {
                return Err(EngineError::ContentMismatch {
                    expected: expected.trim().to_string(),
                    actual: previous_text,
                });
            }
        }

        let escaped = escape_text(new_text);
        let edit = match text_span {
            Some(span) => TextEdit::new(span, escaped),
            None if content.slice(&source).trim().is_empty() => TextEdit::new(content, escaped),
            None => TextEdit::new(Span::new(content.start, content.start), escaped),
        };

        let updated = edit.apply(&source);
        self.persist(&path, &locator.file, updated.clone())?;
        debug!(file = %locator.file, tag = %element.tag, "Updated element text");

        Ok(TextOutcome {
            content: updated,
            affected_files: vec![locator.file.clone()],
            previous_text,
        })
    }

    /// Current value of `property` in the first rule the locator resolves to
    pub fn read_declaration(
        &mut self,
        locator: &SourceLocator,
        selector: Option<&str>,
        property: &str,
    ) -> EngineResult<Option<DeclarationValue>> {
        let (_, _, rule) = self.resolve_rule(locator, selector)?;

        Ok(rule.declaration(property).map(|decl| DeclarationValue {
            selector: rule.selector.clone(),
            raw: decl.value.clone(),
            value: parse(property, &decl.value),
            important: decl.important,
        }))
    }

    /// Set `property` to `value`, adding the declaration when it is missing.
    ///
    /// With `expected`, the declaration must exist and hold a value
    /// semantically equal to it.
    pub fn write_declaration(
        &mut self,
        locator: &SourceLocator,
        selector: Option<&str>,
        property: &str,
        expected: Option<&StyleValue>,
        value: &StyleValue,
        options: &SerializeOptions,
    ) -> EngineResult<StyleOutcome> {
        let style_file = style_file(locator)?.to_string();
        let (path, source, rule) = self.resolve_rule(locator, selector)?;

        let previous = rule
            .declaration(property)
            .map(|decl| parse(property, &decl.value));
        if let Some(expected) = expected {
            check_prior(&rule, property, previous.as_ref(), expected)?;
        }

        let text = serialize_with(value, &options_for(property, options));
        let edit = stylesheet::set_declaration(&source, &rule, property, &text);
        let updated = edit.apply(&source);
        self.persist(&path, &style_file, updated.clone())?;
        debug!(file = %style_file, selector = %rule.selector, property, value = %text, "Set declaration");

        Ok(StyleOutcome {
            content: updated,
            affected_files: vec![style_file],
            selector: rule.selector,
            previous,
        })
    }

    /// Remove `property` from the resolved rule. The declaration must exist.
    pub fn remove_declaration(
        &mut self,
        locator: &SourceLocator,
        selector: Option<&str>,
        property: &str,
        expected: Option<&StyleValue>,
    ) -> EngineResult<StyleOutcome> {
        let style_file = style_file(locator)?.to_string();
        let (path, source, rule) = self.resolve_rule(locator, selector)?;

        let previous = rule
            .declaration(property)
            .map(|decl| parse(property, &decl.value));
        match (expected, previous.as_ref()) {
            (Some(expected), _) => check_prior(&rule, property, previous.as_ref(), expected)?,
            (None, None) => {
                return Err(EngineError::PropertyNotFound {
                    selector: rule.selector.clone(),
                    property: property.to_string(),
                })
            }
            (None, Some(_)) => {}
        }

        let edit = stylesheet::remove_declaration(&source, &rule, property).ok_or_else(|| {
            EngineError::PropertyNotFound {
                selector: rule.selector.clone(),
                property: property.to_string(),
            }
        })?;
        let updated = edit.apply(&source);
        self.persist(&path, &style_file, updated.clone())?;
        debug!(file = %style_file, selector = %rule.selector, property, "Removed declaration");

        Ok(StyleOutcome {
            content: updated,
            affected_files: vec![style_file],
            selector: rule.selector,
            previous,
        })
    }

    /// Pick the rule to edit: the explicit selector, or the first of the
    /// locator's selectors that resolves. Among duplicate rules the one
    /// starting nearest the locator's line wins.
    fn resolve_rule(
        &mut self,
        locator: &SourceLocator,
        selector: Option<&str>,
    ) -> EngineResult<(PathBuf, String, Rule)> {
        let style_file = style_file(locator)?;
        let path = self.resolve_path(style_file)?;
        let file = self
            .cache
            .load(&path)
            .map_err(|err| read_error(style_file, err))?;
        let source = file.source.clone();
        let sheet = file.stylesheet().map_err(|source| EngineError::Stylesheet {
            path: style_file.to_string(),
            source,
        })?;

        let candidates: Vec<&str> = match selector {
            Some(selector) => vec![selector],
            None => locator.selectors.iter().map(String::as_str).collect(),
        };

        let rule = candidates
            .iter()
            .find_map(|selector| sheet.find_rule(selector, Some(locator.line_number)))
            .cloned()
            .ok_or_else(|| EngineError::SelectorNotFound {
                file: style_file.to_string(),
                selectors: candidates.iter().map(|s| s.to_string()).collect(),
            })?;
        Ok((path, source, rule))
    }
}

fn style_file(locator: &SourceLocator) -> EngineResult<&str> {
    if locator.style_file.is_empty() {
        return Err(EngineError::MissingStyleLocator);
    }
    Ok(&locator.style_file)
}

fn read_error(relative: &str, err: io::Error) -> EngineError {
    if err.kind() == io::ErrorKind::NotFound {
        EngineError::FileNotFound(relative.to_string())
    } else {
        EngineError::Read {
            path: relative.to_string(),
            source: err,
        }
    }
}

fn element_at(source: &str, locator: &SourceLocator) -> EngineResult<Element> {
    let not_found = || EngineError::ElementNotFound {
        file: locator.file.clone(),
        line: locator.line_number,
        column: locator.column,
    };
    let offset = line_col_to_offset(source, locator.line_number, locator.column).ok_or_else(not_found)?;
    find_element_at(source, offset).ok_or_else(not_found)
}

fn check_prior(
    rule: &Rule,
    property: &str,
    current: Option<&StyleValue>,
    expected: &StyleValue,
) -> EngineResult<()> {
    let current = current.ok_or_else(|| EngineError::PropertyNotFound {
        selector: rule.selector.clone(),
        property: property.to_string(),
    })?;
    if !current.approx_eq(expected) {
        return Err(EngineError::ContentMismatch {
            expected: loupe_style::serialize(expected),
            actual: loupe_style::serialize(current),
        });
    }
    Ok(())
}

/// Shorthand collapse only applies to box-model properties
fn options_for(property: &str, options: &SerializeOptions) -> SerializeOptions {
    let mut options = options.clone();
    if !BOX_SHORTHANDS.contains(&property.to_ascii_lowercase().as_str()) {
        options.collapse_shorthand = false;
    }
    options
}

/// Decode the entities the editor writes and collapse whitespace the way
/// rendered text does
pub fn normalize_text(text: &str) -> String {
    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#123;", "{")
        .replace("&#125;", "}")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_rejects_escapes() {
        let engine = SourceEngine::new("/project");
        assert!(engine.resolve_path("src/App.tsx").is_ok());
        assert!(engine.resolve_path("./src/App.tsx").is_ok());
        assert!(engine.resolve_path("../secret").is_err());
        assert!(engine.resolve_path("src/../../x").is_err());
        assert!(engine.resolve_path("/etc/passwd").is_err());
        assert!(engine.resolve_path("C:/x").is_err());
        assert!(engine.resolve_path("").is_err());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello\n     world "), "Hello world");
        assert_eq!(normalize_text("a &lt; b &amp;&amp; c"), "a < b && c");
    }

    #[test]
    fn test_collapse_only_for_box_properties() {
        let options = SerializeOptions::default().with_shorthand_collapse();
        assert!(options_for("Padding", &options).collapse_shorthand);
        assert!(!options_for("grid-area", &options).collapse_shorthand);
    }
}

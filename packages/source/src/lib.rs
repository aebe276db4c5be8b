//! # Loupe Source
//!
//! Maps locators emitted by build-time instrumentation back to source
//! constructs and performs verified, minimal edits on them.
//!
//! ```text
//! data-source "src/Card.tsx:12:5"  ──► markup scanner ──► element text
//! data-style  "src/Card.css:.card" ──► stylesheet scanner ──► declaration
//! ```
//!
//! A [`SourceEngine`] owns a [`FileCache`]; each engine reloads a file when
//! its on-disk content differs from the cached copy.
//!
//! ```rust,ignore
//! use loupe_source::{SourceEngine, SourceLocator};
//!
//! let mut engine = SourceEngine::new("/path/to/project");
//! let locator = SourceLocator::from_strings("src/Card.tsx:4:7", None)?;
//! engine.update_text(&locator, Some("Hello"), "Hello there")?;
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod locator;
pub mod markup;
pub mod stylesheet;

pub use cache::{CachedFile, FileCache};
pub use engine::{normalize_text, DeclarationValue, SourceEngine, StyleOutcome, TextOutcome};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use locator::{
    line_col_to_offset, offset_to_line, parse_source_locator, parse_style_locator, LocatorError,
    SourceLocator,
};
pub use markup::{find_element_at, Element, MarkupError, MarkupNode, Span};
pub use stylesheet::{Declaration, Rule, Stylesheet, StylesheetError, TextEdit};

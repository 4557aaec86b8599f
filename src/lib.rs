//! Find, redact and re-typeset text in PDF files
//!
//! Text is located through the page content streams, its font, size and
//! color are recovered, the original glyphs are removed from the content
//! stream, and the replacement is drawn at the old baseline. Fonts that are
//! not built into PDF viewers are looked up in the system font directories
//! and, failing that, downloaded from a web font service.

mod data;
mod diagnostics;
mod editor;
mod error;
mod fonts;
mod insert;
mod locator;
mod output;
mod page;
mod processor;
mod redact;
mod types;
mod utils;

// Re-export error types
pub use error::{EditError, InsertError, LocateError, RedactError, RegisterError};

// Re-export editing API
pub use diagnostics::Diagnostics;
pub use editor::{
    DEFAULT_OUTPUT_SUFFIX, EditReport, MatchOutcome, PdfEditor, PdfEditorBuilder,
    baseline_position, edited_path,
};
pub use insert::{BuiltinFont, FontChoice, TextInserter};
pub use locator::{
    DEFAULT_CSS_ENDPOINT, FontLocator, FontSource, LocatorConfig, system_font_dirs, user_font_dir,
};
pub use page::PageRef;

// Re-export public types
pub use types::{
    BoundingBox, MediaBox, Point, Rgb, TextLine, TextMatch, TextOutput, TextPage, TextProperties,
    TextSpan,
};

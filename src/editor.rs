use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostics, narrate};
use crate::error::{EditError, InsertError, RedactError};
use crate::insert::{FontChoice, TextInserter};
use crate::locator::{FontLocator, FontSource, LocatorConfig};
use crate::page::PageRef;
use crate::types::{BoundingBox, Point, Rgb, TextOutput, TextProperties};

pub const DEFAULT_OUTPUT_SUFFIX: &str = "_edited";

/// Baseline origin for replacement text of `size` over `rect`.
///
/// The offset from the top of the match is a rough approximation, not a
/// typographic constant.
pub fn baseline_position(rect: &BoundingBox, size: f64) -> Point {
    Point {
        x: rect.l,
        y: rect.t + size + size * 0.08,
    }
}

/// `dir/name.ext` becomes `dir/name{suffix}.ext`.
pub fn edited_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}.pdf", stem, suffix),
    };
    source.with_file_name(name)
}

/// What happened to one occurrence of the searched text.
#[derive(Debug)]
pub enum MatchOutcome {
    Replaced {
        rect: BoundingBox,
        properties: TextProperties,
        font: FontChoice,
    },
    /// The original text is still on the page.
    RedactFailed { rect: BoundingBox, error: RedactError },
    /// The original text is gone but the replacement was not drawn.
    InsertFailed {
        rect: BoundingBox,
        properties: TextProperties,
        error: InsertError,
    },
}

impl MatchOutcome {
    pub fn rect(&self) -> &BoundingBox {
        match self {
            MatchOutcome::Replaced { rect, .. }
            | MatchOutcome::RedactFailed { rect, .. }
            | MatchOutcome::InsertFailed { rect, .. } => rect,
        }
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self, MatchOutcome::Replaced { .. })
    }
}

/// Result of one [`PdfEditor::edit_text`] call.
#[derive(Debug)]
pub struct EditReport {
    pub page: usize,
    pub matches: Vec<MatchOutcome>,
    pub output: PathBuf,
}

impl EditReport {
    pub fn replaced(&self) -> usize {
        self.matches.iter().filter(|m| m.is_replaced()).count()
    }

    /// Every match was replaced; true when nothing matched.
    pub fn is_complete(&self) -> bool {
        self.matches.iter().all(MatchOutcome::is_replaced)
    }
}

/// Builder for configuring a [`PdfEditor`].
///
/// # Examples
///
/// ```no_run
/// use pdf_retext::{LocatorConfig, PdfEditor};
///
/// let mut editor = PdfEditor::builder()
///     .password("secret")
///     .verbose(true)
///     .locator(LocatorConfig::new().downloads(false))
///     .open("contract.pdf")?;
/// let report = editor.edit_text(0, "ACME", "Globex")?;
/// println!("replaced {} of {}", report.replaced(), report.matches.len());
/// # Ok::<(), pdf_retext::EditError>(())
/// ```
pub struct PdfEditorBuilder {
    password: Option<String>,
    verbose: bool,
    output_suffix: String,
    redaction_fill: Option<Rgb>,
    fonts: Box<dyn FontSource>,
}

impl Default for PdfEditorBuilder {
    fn default() -> Self {
        PdfEditorBuilder {
            password: None,
            verbose: false,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_owned(),
            redaction_fill: Some(Rgb::WHITE),
            fonts: Box::new(FontLocator::default()),
        }
    }
}

impl PdfEditorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the password for encrypted PDFs.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Inserted before the extension of the edited file's name.
    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    /// Paint redacted regions with `fill`, or leave them bare with `None`.
    pub fn redaction_fill(mut self, fill: Option<Rgb>) -> Self {
        self.redaction_fill = fill;
        self
    }

    pub fn locator(self, config: LocatorConfig) -> Self {
        self.font_source(config.build())
    }

    /// Resolve font families through `source` instead of a [`FontLocator`].
    pub fn font_source(mut self, source: impl FontSource + 'static) -> Self {
        self.fonts = Box::new(source);
        self
    }

    /// Open the document at `path`.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<PdfEditor, EditError> {
        let path = path.as_ref();
        let mut doc = Document::load(path)?;
        if doc.is_encrypted() {
            if let Some(password) = &self.password {
                doc.decrypt(password)?;
            } else {
                doc.decrypt("")?;
            }
        }
        let diag = Diagnostics::new(self.verbose);
        narrate!(diag, "opened {} ({} pages)", path.display(), doc.get_pages().len());
        Ok(PdfEditor {
            doc,
            source: path.to_owned(),
            diag,
            output_suffix: self.output_suffix,
            redaction_fill: self.redaction_fill,
            fonts: self.fonts,
        })
    }
}

/// An open PDF whose text can be replaced in place.
///
/// # Examples
///
/// ```no_run
/// use pdf_retext::PdfEditor;
///
/// let mut editor = PdfEditor::open("sample.pdf")?;
/// editor.set_verbose(true);
/// let report = editor.edit_text(0, "sensitive", "redacted")?;
/// assert!(report.output.ends_with("sample_edited.pdf"));
/// # Ok::<(), pdf_retext::EditError>(())
/// ```
pub struct PdfEditor {
    doc: Document,
    source: PathBuf,
    diag: Diagnostics,
    output_suffix: String,
    redaction_fill: Option<Rgb>,
    fonts: Box<dyn FontSource>,
}

impl PdfEditor {
    /// Create a builder for configuring the editor.
    pub fn builder() -> PdfEditorBuilder {
        PdfEditorBuilder::new()
    }

    /// Open `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PdfEditor, EditError> {
        PdfEditorBuilder::new().open(path)
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.diag = Diagnostics::new(verbose);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// A handle on the zero-based page `page`.
    pub fn page(&mut self, page: usize) -> Result<PageRef<'_>, EditError> {
        PageRef::new(&mut self.doc, page)
    }

    /// Plain text of a page, one line per text line.
    pub fn page_text(&mut self, page: usize) -> Result<String, EditError> {
        Ok(self.page_output(page)?.to_string())
    }

    /// Styled spans of a page.
    pub fn page_output(&mut self, page: usize) -> Result<TextOutput, EditError> {
        Ok(self.page(page)?.text())
    }

    /// Replace every occurrence of `old` on `page` with `new`, then save the
    /// document next to its source under the edited name.
    ///
    /// A match that cannot be redacted or redrawn is reported and skipped;
    /// only opening, page lookup and saving fail the whole call.
    pub fn edit_text(
        &mut self,
        page: usize,
        old: &str,
        new: &str,
    ) -> Result<EditReport, EditError> {
        let diag = self.diag;
        let fill = self.redaction_fill;
        let mut inserter = TextInserter::new(self.fonts.as_ref());
        let mut page_ref = PageRef::new(&mut self.doc, page)?;

        let found = page_ref.search_for(old);
        narrate!(diag, "found {} occurrences of {:?} on page {}", found.len(), old, page);

        let mut matches = Vec::with_capacity(found.len());
        for m in found {
            let rect = m.rect;
            let properties = page_ref.extract_properties(&rect);
            narrate!(
                diag,
                "match at {}: font {} size {:.2} color {}",
                rect,
                properties.font,
                properties.size,
                properties.color
            );

            if let Err(error) = page_ref.redact(&rect, fill, &diag) {
                warn!("skipping match at {}: {}", rect, error);
                matches.push(MatchOutcome::RedactFailed { rect, error });
                continue;
            }

            let position = baseline_position(&rect, properties.size);
            match page_ref.insert_text(&mut inserter, position, new, &properties, &diag) {
                Ok(font) => matches.push(MatchOutcome::Replaced {
                    rect,
                    properties,
                    font,
                }),
                Err(error) => {
                    warn!("could not draw replacement at {}: {}", rect, error);
                    matches.push(MatchOutcome::InsertFailed {
                        rect,
                        properties,
                        error,
                    });
                }
            }
        }

        let output = edited_path(&self.source, &self.output_suffix);
        self.save_to(&output)?;
        narrate!(diag, "saved {}", output.display());
        Ok(EditReport {
            page,
            matches,
            output,
        })
    }

    /// Write the document as it currently stands to `path`.
    pub fn save_pdf<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EditError> {
        self.save_to(path.as_ref())?;
        narrate!(self.diag, "saved {}", path.as_ref().display());
        Ok(())
    }

    // Superseded content streams still hold redacted text until pruned.
    fn save_to(&mut self, path: &Path) -> Result<(), EditError> {
        let pruned = self.doc.prune_objects();
        debug!("pruned {} unreferenced objects", pruned.len());
        self.doc.save(path)?;
        Ok(())
    }
}

use std::fmt::Formatter;
use std::path::PathBuf;

/// Fatal errors of one edit invocation: the document could not be opened,
/// the page does not exist, or the result could not be written.
#[derive(Debug)]
pub enum EditError {
    FormatError(std::fmt::Error),
    IoError(std::io::Error),
    PdfError(lopdf::Error),
    PageOutOfRange { page: usize, page_count: usize },
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            EditError::FormatError(e) => write!(f, "Formating error: {}", e),
            EditError::IoError(e) => write!(f, "IO error: {}", e),
            EditError::PdfError(e) => write!(f, "PDF error: {}", e),
            EditError::PageOutOfRange { page, page_count } => write!(
                f,
                "page {} out of range (document has {} pages)",
                page, page_count
            ),
        }
    }
}

impl std::error::Error for EditError {}

impl From<std::fmt::Error> for EditError {
    fn from(e: std::fmt::Error) -> Self {
        EditError::FormatError(e)
    }
}

impl From<std::io::Error> for EditError {
    fn from(e: std::io::Error) -> Self {
        EditError::IoError(e)
    }
}

impl From<lopdf::Error> for EditError {
    fn from(e: lopdf::Error) -> Self {
        EditError::PdfError(e)
    }
}

/// Why a font family could not be resolved to a file.
#[derive(Debug)]
pub enum LocateError {
    /// No user font directory could be derived from the environment.
    NoFontDirectory,
    /// Not on disk, and downloading is switched off.
    NotFound { family: String },
    /// The font service or the font URL answered with a non-success status.
    Status { url: String, status: u16 },
    /// The request never produced a response.
    Network(String),
    /// The style sheet did not reference a font file.
    MissingFontUrl,
    IoError(std::io::Error),
}

impl std::fmt::Display for LocateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            LocateError::NoFontDirectory => write!(f, "no user font directory available"),
            LocateError::NotFound { family } => {
                write!(f, "font '{}' not found on this system", family)
            }
            LocateError::Status { url, status } => write!(f, "{} answered HTTP {}", url, status),
            LocateError::Network(e) => write!(f, "network error: {}", e),
            LocateError::MissingFontUrl => write!(f, "could not parse font URL from CSS"),
            LocateError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for LocateError {}

impl From<std::io::Error> for LocateError {
    fn from(e: std::io::Error) -> Self {
        LocateError::IoError(e)
    }
}

impl From<ureq::Error> for LocateError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(status, response) => LocateError::Status {
                url: response.get_url().to_owned(),
                status,
            },
            ureq::Error::Transport(t) => LocateError::Network(t.to_string()),
        }
    }
}

/// Why a region could not be redacted. The original text is still on the
/// page whenever one of these is returned.
#[derive(Debug)]
pub enum RedactError {
    PdfError(lopdf::Error),
    /// The content stream could not be decoded or re-encoded.
    Content(String),
    /// No glyph of the page falls inside the region.
    NoText,
    /// Glyphs in the region live in a form XObject and cannot be removed.
    Unreachable { glyphs: usize },
}

impl std::fmt::Display for RedactError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            RedactError::PdfError(e) => write!(f, "PDF error: {}", e),
            RedactError::Content(e) => write!(f, "content stream error: {}", e),
            RedactError::NoText => write!(f, "no text inside the redaction region"),
            RedactError::Unreachable { glyphs } => write!(
                f,
                "{} glyphs inside the region are drawn by a form XObject",
                glyphs
            ),
        }
    }
}

impl std::error::Error for RedactError {}

impl From<lopdf::Error> for RedactError {
    fn from(e: lopdf::Error) -> Self {
        RedactError::PdfError(e)
    }
}

/// Why replacement text could not be drawn.
#[derive(Debug)]
pub enum InsertError {
    PdfError(lopdf::Error),
    Content(String),
    InvalidSize(f64),
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            InsertError::PdfError(e) => write!(f, "PDF error: {}", e),
            InsertError::Content(e) => write!(f, "content stream error: {}", e),
            InsertError::InvalidSize(size) => write!(f, "invalid font size {}", size),
        }
    }
}

impl std::error::Error for InsertError {}

impl From<lopdf::Error> for InsertError {
    fn from(e: lopdf::Error) -> Self {
        InsertError::PdfError(e)
    }
}

/// Why a located font file could not be embedded.
#[derive(Debug)]
pub enum RegisterError {
    IoError(std::io::Error),
    /// WOFF and WOFF2 containers cannot be embedded in a PDF.
    UnsupportedFormat(PathBuf),
    Parse(String),
    PdfError(lopdf::Error),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            RegisterError::IoError(e) => write!(f, "IO error: {}", e),
            RegisterError::UnsupportedFormat(path) => {
                write!(f, "cannot embed {}: unsupported format", path.display())
            }
            RegisterError::Parse(e) => write!(f, "font parse error: {}", e),
            RegisterError::PdfError(e) => write!(f, "PDF error: {}", e),
        }
    }
}

impl std::error::Error for RegisterError {}

impl From<std::io::Error> for RegisterError {
    fn from(e: std::io::Error) -> Self {
        RegisterError::IoError(e)
    }
}

impl From<lopdf::Error> for RegisterError {
    fn from(e: lopdf::Error) -> Self {
        RegisterError::PdfError(e)
    }
}

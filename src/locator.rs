use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;
use walkdir::WalkDir;

use crate::diagnostics::{Diagnostics, narrate};
use crate::error::LocateError;

/// Resolves a font family name to a font file.
pub trait FontSource {
    fn locate(&self, family: &str, diag: &Diagnostics) -> Result<PathBuf, LocateError>;
}

pub const DEFAULT_CSS_ENDPOINT: &str = "https://fonts.googleapis.com/css";

const FONT_EXTENSIONS: [&str; 4] = ["ttf", "otf", "woff", "woff2"];
const MAX_FONT_BYTES: u64 = 64 * 1024 * 1024;

/// Font directories of the current platform, system-wide first.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut paths = Vec::new();
    if cfg!(target_os = "windows") {
        if let Some(windir) = std::env::var_os("WINDIR") {
            paths.push(PathBuf::from(windir).join("Fonts"));
        }
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            paths.push(PathBuf::from(local).join("Microsoft\\Windows\\Fonts"));
        }
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/Library/Fonts"));
        paths.push(PathBuf::from("/System/Library/Fonts"));
        paths.extend(home.map(|h| h.join("Library/Fonts")));
    } else {
        paths.push(PathBuf::from("/usr/share/fonts"));
        paths.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = home {
            paths.push(home.join(".fonts"));
            paths.push(home.join(".local/share/fonts"));
        }
    }
    paths
}

/// Where downloaded fonts are stored for the current user.
pub fn user_font_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        std::env::var_os("LOCALAPPDATA").map(|l| PathBuf::from(l).join("Microsoft\\Windows\\Fonts"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library/Fonts"))
    } else {
        dirs::home_dir().map(|h| h.join(".local/share/fonts"))
    }
}

/// Where a [`FontLocator`] looks and whether it may download.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    search_dirs: Vec<PathBuf>,
    user_font_dir: Option<PathBuf>,
    css_endpoint: String,
    downloads: bool,
    timeout: Option<Duration>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            search_dirs: system_font_dirs(),
            user_font_dir: user_font_dir(),
            css_endpoint: DEFAULT_CSS_ENDPOINT.to_owned(),
            downloads: true,
            timeout: None,
        }
    }
}

impl LocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the platform directory list.
    pub fn search_dirs(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.search_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Where downloaded fonts are written.
    pub fn user_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_font_dir = Some(dir.into());
        self
    }

    pub fn css_endpoint(mut self, url: impl Into<String>) -> Self {
        self.css_endpoint = url.into();
        self
    }

    pub fn downloads(mut self, enabled: bool) -> Self {
        self.downloads = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> FontLocator {
        FontLocator { config: self }
    }
}

/// Finds font files on disk, falling back to the web font service.
#[derive(Debug, Clone, Default)]
pub struct FontLocator {
    config: LocatorConfig,
}

fn normalize(family: &str) -> String {
    family
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First `url(...)` of a style sheet, without quotes.
pub(crate) fn css_font_url(css: &str) -> Option<&str> {
    let start = css.find("url(")? + "url(".len();
    let end = start + css[start..].find(')')?;
    let url = css[start..end].trim().trim_matches(|c| c == '"' || c == '\'');
    (!url.is_empty()).then_some(url)
}

/// File extension for a font response, by content type.
pub(crate) fn extension_for(content_type: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("woff2") {
        ".woff2"
    } else if content_type.contains("woff") {
        ".woff"
    } else if content_type.contains("opentype") {
        ".otf"
    } else {
        ".ttf"
    }
}

impl FontLocator {
    pub fn new(config: LocatorConfig) -> FontLocator {
        FontLocator { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Path of a font file for `family`: an installed file when one
    /// matches, else a freshly downloaded one.
    pub fn locate(&self, family: &str, diag: &Diagnostics) -> Result<PathBuf, LocateError> {
        if let Some(path) = self.find_installed(family) {
            narrate!(diag, "found font '{}' at {}", family, path.display());
            return Ok(path);
        }
        if !self.config.downloads {
            narrate!(diag, "font '{}' not installed, downloads disabled", family);
            return Err(LocateError::NotFound {
                family: family.to_owned(),
            });
        }
        narrate!(diag, "font '{}' not installed, downloading", family);
        let located = self.download(family, diag);
        if let Err(e) = &located {
            warn!("could not download font '{}': {}", family, e);
        }
        located
    }

    /// Scan the search directories in order; the first file whose name
    /// contains the normalized family wins.
    pub fn find_installed(&self, family: &str) -> Option<PathBuf> {
        let wanted = normalize(family);
        if wanted.is_empty() {
            return None;
        }
        self.config
            .search_dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .find(|path| is_font_file(path, &wanted))
    }

    fn agent(&self) -> ureq::Agent {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    fn download(&self, family: &str, diag: &Diagnostics) -> Result<PathBuf, LocateError> {
        let dir = self
            .config
            .user_font_dir
            .as_ref()
            .ok_or(LocateError::NoFontDirectory)?;
        let agent = self.agent();
        // form encoding turns spaces into '+'
        let response = agent
            .get(&self.config.css_endpoint)
            .query("family", family)
            .call()?;
        if response.status() != 200 {
            return Err(LocateError::Status {
                url: response.get_url().to_owned(),
                status: response.status(),
            });
        }
        let css = response.into_string()?;
        let font_url = css_font_url(&css).ok_or(LocateError::MissingFontUrl)?;
        narrate!(diag, "downloading {}", font_url);

        let response = agent.get(font_url).call()?;
        if response.status() != 200 {
            return Err(LocateError::Status {
                url: font_url.to_owned(),
                status: response.status(),
            });
        }
        let ext = extension_for(response.header("Content-Type").unwrap_or(""));
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FONT_BYTES)
            .read_to_end(&mut bytes)?;

        fs::create_dir_all(dir)?;
        let path = dir.join(download_file_name(family, ext));
        fs::write(&path, &bytes)?;
        narrate!(diag, "saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// File name for a downloaded font: spaces become `_`, and anything
/// outside `[A-Za-z0-9_-]` is dropped so the name stays in its directory.
fn download_file_name(family: &str, ext: &str) -> String {
    let stem: String = family
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        format!("font{}", ext)
    } else {
        format!("{}{}", stem, ext)
    }
}

fn is_font_file(path: &Path, wanted: &str) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    let has_font_ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| FONT_EXTENSIONS.contains(&e.as_str()));
    has_font_ext && name.contains(wanted)
}

impl FontSource for FontLocator {
    fn locate(&self, family: &str, diag: &Diagnostics) -> Result<PathBuf, LocateError> {
        FontLocator::locate(self, family, diag)
    }
}

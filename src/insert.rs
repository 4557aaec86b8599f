use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::warn;
use ttf_parser::{Face, GlyphId};

use crate::data::WIN_ANSI_ENCODING;
use crate::diagnostics::{Diagnostics, narrate};
use crate::error::{InsertError, RegisterError};
use crate::locator::FontSource;
use crate::page::{decode_page, media_box, write_content_with};
use crate::types::{Point, TextProperties};
use crate::utils::*;

/// The fonts every PDF viewer provides, addressable without a font file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl BuiltinFont {
    pub const ALL: [BuiltinFont; 14] = [
        BuiltinFont::Helvetica,
        BuiltinFont::HelveticaBold,
        BuiltinFont::HelveticaOblique,
        BuiltinFont::HelveticaBoldOblique,
        BuiltinFont::TimesRoman,
        BuiltinFont::TimesBold,
        BuiltinFont::TimesItalic,
        BuiltinFont::TimesBoldItalic,
        BuiltinFont::Courier,
        BuiltinFont::CourierBold,
        BuiltinFont::CourierOblique,
        BuiltinFont::CourierBoldOblique,
        BuiltinFont::Symbol,
        BuiltinFont::ZapfDingbats,
    ];

    /// Short alias, also used as the page resource name.
    pub fn alias(self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "helv",
            BuiltinFont::HelveticaBold => "hebo",
            BuiltinFont::HelveticaOblique => "heit",
            BuiltinFont::HelveticaBoldOblique => "hebi",
            BuiltinFont::TimesRoman => "tiro",
            BuiltinFont::TimesBold => "tibo",
            BuiltinFont::TimesItalic => "tiit",
            BuiltinFont::TimesBoldItalic => "tibi",
            BuiltinFont::Courier => "cour",
            BuiltinFont::CourierBold => "cobo",
            BuiltinFont::CourierOblique => "coit",
            BuiltinFont::CourierBoldOblique => "cobi",
            BuiltinFont::Symbol => "symb",
            BuiltinFont::ZapfDingbats => "zadb",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::HelveticaOblique => "Helvetica-Oblique",
            BuiltinFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            BuiltinFont::TimesRoman => "Times-Roman",
            BuiltinFont::TimesBold => "Times-Bold",
            BuiltinFont::TimesItalic => "Times-Italic",
            BuiltinFont::TimesBoldItalic => "Times-BoldItalic",
            BuiltinFont::Courier => "Courier",
            BuiltinFont::CourierBold => "Courier-Bold",
            BuiltinFont::CourierOblique => "Courier-Oblique",
            BuiltinFont::CourierBoldOblique => "Courier-BoldOblique",
            BuiltinFont::Symbol => "Symbol",
            BuiltinFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Resolve a short alias (any case) or an exact PostScript name.
    pub fn from_alias(name: &str) -> Option<BuiltinFont> {
        BuiltinFont::ALL
            .into_iter()
            .find(|f| f.alias().eq_ignore_ascii_case(name) || f.base_font() == name)
    }

    fn is_symbolic(self) -> bool {
        matches!(self, BuiltinFont::Symbol | BuiltinFont::ZapfDingbats)
    }
}

/// The font a piece of text was drawn with.
#[derive(Debug, Clone, PartialEq)]
pub enum FontChoice {
    /// The requested name was a built-in alias.
    Builtin(BuiltinFont),
    /// A font file was located and embedded under the requested family.
    Embedded { family: String, path: PathBuf },
    /// Nothing usable was found; the default built-in font stood in.
    Fallback(BuiltinFont),
}

impl FontChoice {
    pub const DEFAULT_FONT: BuiltinFont = BuiltinFont::Helvetica;
}

/// WinAnsi bytes for `text`; characters outside the encoding become `?`.
fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let c = if c == '\u{a0}' { ' ' } else { c };
            (1..=255u8)
                .find(|&b| u32::from(WIN_ANSI_ENCODING[b as usize]) == c as u32)
                .unwrap_or(b'?')
        })
        .collect()
}

/// A font file embedded as a Type0/Identity-H font. Widths and the
/// `ToUnicode` map cover the glyphs drawn so far and grow with every use.
struct EmbeddedFont {
    family: String,
    font_id: ObjectId,
    descendant_id: ObjectId,
    to_unicode_id: ObjectId,
    data: Vec<u8>,
    used: BTreeMap<u16, char>,
}

fn is_woff(path: &Path, data: &[u8]) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    matches!(ext.as_deref(), Some("woff" | "woff2"))
        || data.starts_with(b"wOFF")
        || data.starts_with(b"wOF2")
}

fn pdf_font_name(family: &str) -> String {
    let name: String = family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if name.is_empty() { "Embedded".to_owned() } else { name }
}

impl EmbeddedFont {
    fn register(
        doc: &mut Document,
        family: &str,
        path: &Path,
    ) -> Result<EmbeddedFont, RegisterError> {
        let data = fs::read(path)?;
        if is_woff(path, &data) {
            return Err(RegisterError::UnsupportedFormat(path.to_owned()));
        }
        let face = Face::parse(&data, 0).map_err(|e| RegisterError::Parse(e.to_string()))?;
        let upem = face.units_per_em() as f64;
        if upem <= 0. {
            return Err(RegisterError::Parse("units per em is zero".to_owned()));
        }
        let scale = |v: i16| Object::Integer((v as f64 * 1000. / upem).round() as i64);
        let bbox = face.global_bounding_box();
        let is_cff = face.tables().cff.is_some();
        let base_font = pdf_font_name(family);

        let mut flags = 32;
        if face.is_monospaced() {
            flags |= 1;
        }
        if face.is_italic() {
            flags |= 64;
        }

        let font_file = if is_cff {
            Stream::new(dictionary! { "Subtype" => "OpenType" }, data.clone())
        } else {
            Stream::new(dictionary! { "Length1" => data.len() as i64 }, data.clone())
        };
        let font_file_id = doc.add_object(font_file);

        let italic_angle = if face.is_italic() { -12 } else { 0 };
        let mut descriptor = dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(base_font.clone().into_bytes()),
            "Flags" => flags,
            "FontBBox" => vec![
                scale(bbox.x_min),
                scale(bbox.y_min),
                scale(bbox.x_max),
                scale(bbox.y_max),
            ],
            "ItalicAngle" => italic_angle,
            "Ascent" => scale(face.ascender()),
            "Descent" => scale(face.descender()),
            "CapHeight" => scale(face.capital_height().unwrap_or(face.ascender())),
            "StemV" => 80,
        };
        let (font_file_key, subtype) = if is_cff {
            ("FontFile3", "CIDFontType0")
        } else {
            ("FontFile2", "CIDFontType2")
        };
        descriptor.set(font_file_key, font_file_id);
        let descriptor_id = doc.add_object(descriptor);

        let mut descendant = dictionary! {
            "Type" => "Font",
            "Subtype" => subtype,
            "BaseFont" => Object::Name(base_font.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => Vec::<Object>::new(),
        };
        if !is_cff {
            descendant.set("CIDToGIDMap", "Identity");
        }
        let descendant_id = doc.add_object(descendant);
        let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(base_font.into_bytes()),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::from(descendant_id)],
            "ToUnicode" => to_unicode_id,
        });

        Ok(EmbeddedFont {
            family: family.to_owned(),
            font_id,
            descendant_id,
            to_unicode_id,
            data,
            used: BTreeMap::new(),
        })
    }

    /// Glyph ids of `text` as two-byte codes, recording them as used.
    fn encode(&mut self, text: &str) -> Result<Vec<u8>, InsertError> {
        let face = Face::parse(&self.data, 0).map_err(|e| InsertError::Content(e.to_string()))?;
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let gid = face.glyph_index(c).map(|g| g.0).unwrap_or(0);
            if gid != 0 {
                self.used.entry(gid).or_insert(c);
            }
            bytes.extend_from_slice(&gid.to_be_bytes());
        }
        Ok(bytes)
    }

    /// Rewrite `/W` and `/ToUnicode` for every glyph used so far.
    fn update(&self, doc: &mut Document) -> Result<(), InsertError> {
        let face = Face::parse(&self.data, 0).map_err(|e| InsertError::Content(e.to_string()))?;
        let upem = face.units_per_em() as f64;
        let mut widths = Vec::with_capacity(self.used.len() * 2);
        for &gid in self.used.keys() {
            let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f64;
            widths.push(Object::Integer(gid as i64));
            widths.push(vec![Object::Integer((advance * 1000. / upem).round() as i64)].into());
        }
        doc.get_dictionary_mut(self.descendant_id)?.set("W", widths);

        let cmap = to_unicode_cmap(&self.used);
        *doc.get_object_mut(self.to_unicode_id)? =
            Object::Stream(Stream::new(dictionary! {}, cmap.into_bytes()));
        Ok(())
    }
}

fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n");
    cmap.push_str("12 dict begin\n");
    cmap.push_str("begincmap\n");
    cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
    cmap.push_str("/CMapType 2 def\n");
    cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let mappings: Vec<(&u16, &char)> = used.iter().collect();
    // at most 100 entries per bfchar block
    for chunk in mappings.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, c) in chunk {
            let mut units = [0u16; 2];
            let hex: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, hex);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\n");
    cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
    cmap.push_str("end\n");
    cmap.push_str("end\n");
    cmap
}

/// A name for `target` in the page's font resources: `preferred` when free
/// or already bound to it, else `preferred` with a number appended.
fn font_resource_name(
    doc: &Document,
    resources_id: ObjectId,
    preferred: &str,
    target: ObjectId,
) -> Vec<u8> {
    let fonts = doc
        .get_dictionary(resources_id)
        .ok()
        .and_then(|res| maybe_get::<&lopdf::Dictionary>(doc, res, b"Font"));
    let taken = resource_names(doc, resources_id, b"Font");
    let bound_to_target = |name: &[u8]| {
        fonts
            .and_then(|f| f.get(name).ok())
            .and_then(|o| o.as_reference().ok())
            == Some(target)
    };
    let mut name = preferred.as_bytes().to_vec();
    let mut n = 1;
    while taken.contains(&name) && !bound_to_target(&name) {
        name = format!("{}{}", preferred, n).into_bytes();
        n += 1;
    }
    name
}

/// Draws replacement text, resolving fonts through a [`FontSource`].
///
/// One inserter serves one document: fonts it adds are reused by later
/// insertions instead of being embedded again.
pub struct TextInserter<'s> {
    source: &'s dyn FontSource,
    builtins: HashMap<BuiltinFont, ObjectId>,
    embedded: HashMap<PathBuf, EmbeddedFont>,
}

impl<'s> TextInserter<'s> {
    pub fn new(source: &'s dyn FontSource) -> TextInserter<'s> {
        TextInserter {
            source,
            builtins: HashMap::new(),
            embedded: HashMap::new(),
        }
    }

    fn choose_font(&mut self, doc: &mut Document, family: &str, diag: &Diagnostics) -> FontChoice {
        if let Some(builtin) = BuiltinFont::from_alias(family) {
            return FontChoice::Builtin(builtin);
        }
        let path = match self.source.locate(family, diag) {
            Ok(path) => path,
            Err(e) => {
                narrate!(
                    diag,
                    "font '{}' unavailable ({}), using {}",
                    family,
                    e,
                    FontChoice::DEFAULT_FONT.alias()
                );
                return FontChoice::Fallback(FontChoice::DEFAULT_FONT);
            }
        };
        if !self.embedded.contains_key(&path) {
            match EmbeddedFont::register(doc, family, &path) {
                Ok(font) => {
                    narrate!(diag, "embedded {} as '{}'", path.display(), family);
                    self.embedded.insert(path.clone(), font);
                }
                Err(e) => {
                    warn!("cannot register {}: {}", path.display(), e);
                    return FontChoice::Fallback(FontChoice::DEFAULT_FONT);
                }
            }
        }
        FontChoice::Embedded {
            family: family.to_owned(),
            path,
        }
    }

    fn builtin_font(&mut self, doc: &mut Document, font: BuiltinFont) -> ObjectId {
        *self.builtins.entry(font).or_insert_with(|| {
            let mut dict = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
            };
            if !font.is_symbolic() {
                dict.set("Encoding", "WinAnsiEncoding");
            }
            doc.add_object(dict)
        })
    }

    /// Draw `text` on the page with its baseline origin at `position`
    /// (top-down page space), in the font, size and color of `properties`.
    pub fn insert(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        position: Point,
        text: &str,
        properties: &TextProperties,
        diag: &Diagnostics,
    ) -> Result<FontChoice, InsertError> {
        if !(properties.size.is_finite() && properties.size > 0.) {
            return Err(InsertError::InvalidSize(properties.size));
        }
        let choice = self.choose_font(doc, &properties.font, diag);

        let (font_id, preferred, string) = match &choice {
            FontChoice::Builtin(font) | FontChoice::Fallback(font) => {
                let bytes = if font.is_symbolic() {
                    text.bytes().collect()
                } else {
                    win_ansi_bytes(text)
                };
                (
                    self.builtin_font(doc, *font),
                    font.alias().to_owned(),
                    Object::String(bytes, StringFormat::Literal),
                )
            }
            FontChoice::Embedded { path, .. } => {
                let font = self
                    .embedded
                    .get_mut(path)
                    .ok_or_else(|| {
                        InsertError::Content(format!("{} not registered", path.display()))
                    })?;
                let bytes = font.encode(text)?;
                font.update(doc)?;
                (
                    font.font_id,
                    pdf_font_name(&font.family),
                    Object::String(bytes, StringFormat::Hexadecimal),
                )
            }
        };

        let resources_id = own_page_resources(doc, page_id)?;
        let name = font_resource_name(doc, resources_id, &preferred, font_id);
        set_resource(doc, resources_id, b"Font", &name, font_id)?;

        let content = decode_page(doc, page_id)?;
        let origin = media_box(doc, page_id).to_user_space(position);
        let color = properties.color;
        let real = |v: f64| Object::Real(v as f32);
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(name), real(properties.size)]),
            Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)]),
            Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), real(origin.x), real(origin.y)],
            ),
            Operation::new("Tj", vec![string]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        write_content_with(doc, page_id, content, operations)?;
        narrate!(
            diag,
            "inserted {:?} at ({:.2}, {:.2}) with {:?}",
            text,
            position.x,
            position.y,
            choice
        );
        Ok(choice)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::LocateError;
    use crate::page::PageRef;
    use crate::types::Rgb;

    struct CountingSource {
        calls: Cell<usize>,
        answer: Option<PathBuf>,
    }

    impl CountingSource {
        fn new(answer: Option<PathBuf>) -> CountingSource {
            CountingSource {
                calls: Cell::new(0),
                answer,
            }
        }
    }

    impl FontSource for CountingSource {
        fn locate(&self, family: &str, _diag: &Diagnostics) -> Result<PathBuf, LocateError> {
            self.calls.set(self.calls.get() + 1);
            self.answer.clone().ok_or_else(|| LocateError::NotFound {
                family: family.to_owned(),
            })
        }
    }

    const AT: Point = Point { x: 72., y: 100. };
    const QUIET: Diagnostics = Diagnostics::quiet();

    fn blank_page() -> (Document, ObjectId) {
        blank_page_in(vec![0.into(), 0.into(), 612.into(), 792.into()])
    }

    fn blank_page_in(media_box: Vec<Object>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    fn props(font: &str) -> TextProperties {
        TextProperties {
            font: font.to_owned(),
            size: 12.,
            color: Rgb::new(0.2, 0.4, 0.6),
        }
    }

    #[test]
    fn aliases_never_consult_the_font_source() {
        let source = CountingSource::new(None);
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        for font in BuiltinFont::ALL {
            for name in [font.alias(), font.base_font()] {
                let choice = inserter
                    .insert(&mut doc, page_id, AT, "x", &props(name), &QUIET)
                    .unwrap();
                assert_eq!(choice, FontChoice::Builtin(font));
            }
        }
        assert_eq!(source.calls.get(), 0);
    }

    #[test_log::test]
    fn inserted_text_is_extractable_with_its_style() {
        let source = CountingSource::new(None);
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        inserter
            .insert(&mut doc, page_id, AT, "café", &props("helv"), &QUIET)
            .unwrap();
        let page = PageRef::new(&mut doc, 0).unwrap();
        let output = page.text();
        let span = output.first_span().unwrap();
        assert_eq!(span.text, "café");
        assert_eq!(span.font_name, "Helvetica");
        assert!((span.font_size - 12.).abs() < 1e-6);
        assert!((span.color.b - 0.6).abs() < 1e-6);
        // baseline lands where it was asked to
        let found = page.search_for("caf")[0].rect;
        assert!((found.l - 72.).abs() < 1e-3);
        assert!(found.t < 100. && found.b > 100.);
    }

    #[test]
    fn position_is_relative_to_an_offset_media_box() {
        let source = CountingSource::new(None);
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) =
            blank_page_in(vec![100.into(), 200.into(), 712.into(), 992.into()]);
        inserter
            .insert(&mut doc, page_id, AT, "shifted", &props("helv"), &QUIET)
            .unwrap();
        let page = PageRef::new(&mut doc, 0).unwrap();
        let found = page.search_for("shifted")[0].rect;
        assert!((found.l - 72.).abs() < 1e-3);
        assert!(found.t < 100. && found.b > 100.);
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let source = CountingSource::new(None);
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        let choice = inserter
            .insert(&mut doc, page_id, AT, "a", &props("No Such Font"), &QUIET)
            .unwrap();
        assert_eq!(choice, FontChoice::Fallback(BuiltinFont::Helvetica));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn unparsable_font_file_falls_back_to_helvetica() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("Junk.ttf");
        fs::write(&junk, b"definitely not a font").unwrap();
        let source = CountingSource::new(Some(junk));
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        let choice = inserter
            .insert(&mut doc, page_id, AT, "a", &props("Junk"), &QUIET)
            .unwrap();
        assert_eq!(choice, FontChoice::Fallback(BuiltinFont::Helvetica));
    }

    #[test]
    fn woff_files_are_not_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let woff = dir.path().join("Web.woff2");
        fs::write(&woff, b"wOF2\0\0\0\0").unwrap();
        let (mut doc, _) = blank_page();
        let err = EmbeddedFont::register(&mut doc, "Web", &woff).err();
        assert!(matches!(err, Some(RegisterError::UnsupportedFormat(_))));
    }

    #[test]
    fn invalid_size_is_rejected() {
        let source = CountingSource::new(None);
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        let mut p = props("helv");
        p.size = 0.;
        let err = inserter.insert(&mut doc, page_id, AT, "a", &p, &QUIET);
        assert!(matches!(err, Err(InsertError::InvalidSize(_))));
    }

    #[test]
    fn existing_resource_names_are_not_clobbered() {
        let (mut doc, page_id) = blank_page();
        let other = doc.add_object(dictionary! { "Type" => "Font" });
        let res = own_page_resources(&mut doc, page_id).unwrap();
        set_resource(&mut doc, res, b"Font", b"helv", other).unwrap();
        let mine = doc.add_object(dictionary! { "Type" => "Font" });
        assert_eq!(font_resource_name(&doc, res, "helv", mine), b"helv1".to_vec());
        assert_eq!(font_resource_name(&doc, res, "helv", other), b"helv".to_vec());
    }

    #[test]
    fn win_ansi_replaces_unencodable_characters() {
        assert_eq!(win_ansi_bytes("a€ж"), vec![b'a', 0x80, b'?']);
    }

    #[test]
    fn system_truetype_font_is_embedded_and_extractable() {
        let Some(path) = walkdir::WalkDir::new("/usr/share/fonts")
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.into_path())
            .find(|p| p.extension().is_some_and(|e| e == "ttf"))
        else {
            return;
        };
        let source = CountingSource::new(Some(path.clone()));
        let mut inserter = TextInserter::new(&source);
        let (mut doc, page_id) = blank_page();
        for (i, word) in ["Hello", "Hello"].iter().enumerate() {
            let at = Point {
                x: 72.,
                y: 100. + 40. * i as f64,
            };
            let choice = inserter
                .insert(&mut doc, page_id, at, word, &props("Some Family"), &QUIET)
                .unwrap();
            assert!(matches!(choice, FontChoice::Embedded { .. }));
        }
        // the file is embedded once
        let type0 = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| {
                d.get(b"Subtype").and_then(|s| s.as_name()).ok() == Some(b"Type0".as_slice())
            })
            .count();
        assert_eq!(type0, 1);
    }
}

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::slice::Iter;

use adobe_cmap_parser::{ByteMapping, CIDRange, CodeRange};
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use crate::data::*;
use crate::utils::*;

pub(crate) type CharCode = u32;

/// Ascent and descent used when a font carries no descriptor, as fractions
/// of the font size.
pub(crate) const DEFAULT_ASCENT: f64 = 1.075;
pub(crate) const DEFAULT_DESCENT: f64 = -0.299;

/// Width families of the standard 14 fonts, for fonts without `/Widths`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StandardFamily {
    Helvetica,
    Times,
    Courier,
    Symbolic,
}

impl StandardFamily {
    pub(crate) fn from_base_name(name: &str) -> Option<StandardFamily> {
        let name = strip_subset_tag(name);
        if name.starts_with("Helvetica") || name.starts_with("Arial") {
            Some(StandardFamily::Helvetica)
        } else if name.starts_with("Times") {
            Some(StandardFamily::Times)
        } else if name.starts_with("Courier") {
            Some(StandardFamily::Courier)
        } else if name == "Symbol" || name == "ZapfDingbats" {
            Some(StandardFamily::Symbolic)
        } else {
            None
        }
    }

    /// Advance of a character in thousandths of an em.
    pub(crate) fn width_of(self, c: char) -> f64 {
        let code = c as u32;
        let table = match self {
            StandardFamily::Helvetica => &HELVETICA_WIDTHS,
            StandardFamily::Times => &TIMES_WIDTHS,
            StandardFamily::Courier => return COURIER_WIDTH as f64,
            StandardFamily::Symbolic => return FALLBACK_WIDTH as f64,
        };
        match code {
            32..=126 => table[(code - 32) as usize] as f64,
            0xa0 => table[0] as f64,
            _ => FALLBACK_WIDTH as f64,
        }
    }
}

#[derive(Clone)]
pub(crate) struct PdfSimpleFont<'a> {
    font: &'a Dictionary,
    base_name: String,
    encoding: Vec<u16>,
    unicode_map: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f64>,
    width_scale: f64,
    standard: Option<StandardFamily>,
    missing_width: f64,
    ascent: f64,
    descent: f64,
}

pub(crate) struct PdfCIDFont<'a> {
    font: &'a Dictionary,
    base_name: String,
    encoding: ByteMapping,
    to_unicode: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f64>,
    default_width: f64,
    ascent: f64,
    descent: f64,
}

pub(crate) struct PdfFontIter<'a> {
    i: Iter<'a, u8>,
    font: &'a dyn PdfFont,
}

impl<'a> Iterator for PdfFontIter<'a> {
    type Item = (CharCode, u8);
    fn next(&mut self) -> Option<(CharCode, u8)> {
        self.font.next_char(&mut self.i)
    }
}

pub(crate) trait PdfFont: Debug {
    /// Advance of a code in thousandths of text space.
    fn get_width(&self, id: CharCode) -> f64;
    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)>;
    fn decode_char(&self, char: CharCode) -> String;
    fn get_font_name(&self) -> &str;
    fn ascent(&self) -> f64;
    fn descent(&self) -> f64;
}

impl<'a> dyn PdfFont + 'a {
    pub(crate) fn char_codes(&'a self, chars: &'a [u8]) -> PdfFontIter<'a> {
        PdfFontIter {
            i: chars.iter(),
            font: self,
        }
    }

    pub(crate) fn decode(&self, chars: &[u8]) -> String {
        self.char_codes(chars)
            .map(|x| self.decode_char(x.0))
            .collect()
    }
}

pub(crate) fn make_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Rc<dyn PdfFont + 'a> {
    let subtype = maybe_get_name_string(doc, font, b"Subtype").unwrap_or_default();
    debug!("MakeFont({})", subtype);
    if subtype == "Type0" {
        Rc::new(PdfCIDFont::new(doc, font))
    } else {
        Rc::new(PdfSimpleFont::new(doc, font, &subtype))
    }
}

fn encoding_table(name: &[u8]) -> Option<Vec<u16>> {
    match name {
        b"MacRomanEncoding" => Some(MAC_ROMAN_ENCODING.to_vec()),
        b"WinAnsiEncoding" => Some(WIN_ANSI_ENCODING.to_vec()),
        b"StandardEncoding" => Some(STANDARD_ENCODING.to_vec()),
        _ => {
            warn!("unsupported encoding {:?}", pdf_to_utf8(name));
            None
        }
    }
}

/// Apply a `Differences` array on top of a base table.
fn apply_differences(doc: &Document, table: &mut [u16], differences: &[Object], base_name: &str) {
    let mut code = 0usize;
    for o in differences {
        match maybe_deref(doc, o) {
            &Object::Integer(i) => code = i.max(0) as usize,
            &Object::Name(ref n) => {
                let name = pdf_to_utf8(n);
                match glyph_name_to_unicode(&name).map(|s| s.encode_utf16().collect::<Vec<_>>()) {
                    Some(units) if units.len() == 1 && code < table.len() => {
                        table[code] = units[0];
                    }
                    _ => debug!("unknown glyph name '{}' for font {}", name, base_name),
                }
                code += 1;
            }
            other => debug!("unexpected Differences entry {:?}", other),
        }
    }
}

fn descriptor_metrics(doc: &Document, font: &Dictionary) -> (f64, f64) {
    let descriptor: Option<&Dictionary> = maybe_get(doc, font, b"FontDescriptor");
    let ascent = descriptor
        .and_then(|d| maybe_get::<f64>(doc, d, b"Ascent"))
        .filter(|a| *a > 0.)
        .map(|a| a / 1000.);
    let descent = descriptor
        .and_then(|d| maybe_get::<f64>(doc, d, b"Descent"))
        .filter(|d| *d < 0.)
        .map(|d| d / 1000.);
    (
        ascent.unwrap_or(DEFAULT_ASCENT),
        descent.unwrap_or(DEFAULT_DESCENT),
    )
}

impl<'a> PdfSimpleFont<'a> {
    fn new(doc: &'a Document, font: &'a Dictionary, subtype: &str) -> PdfSimpleFont<'a> {
        let base_name = maybe_get_name_string(doc, font, b"BaseFont")
            .or_else(|| maybe_get_name_string(doc, font, b"Name"))
            .unwrap_or_else(|| "Unnamed".to_owned());
        let standard = StandardFamily::from_base_name(&base_name);
        debug!("base_name {} {} {:?}", base_name, subtype, font);

        let default_table = || -> Vec<u16> {
            match (standard, subtype) {
                (Some(StandardFamily::Symbolic), _) => PDFDocEncoding.to_vec(),
                (_, "TrueType") => WIN_ANSI_ENCODING.to_vec(),
                _ => STANDARD_ENCODING.to_vec(),
            }
        };

        let encoding = match maybe_get_obj(doc, font, b"Encoding") {
            Some(&Object::Name(ref name)) => encoding_table(name).unwrap_or_else(default_table),
            Some(&Object::Dictionary(ref enc)) => {
                let mut table = maybe_get_name(doc, enc, b"BaseEncoding")
                    .and_then(encoding_table)
                    .unwrap_or_else(default_table);
                if let Some(differences) = maybe_get_array(doc, enc, b"Differences") {
                    apply_differences(doc, &mut table, differences, &base_name);
                }
                table
            }
            _ => default_table(),
        };

        let unicode_map = get_unicode_map(doc, font);

        let width_scale = if subtype == "Type3" {
            maybe_get::<Vec<f64>>(doc, font, b"FontMatrix")
                .and_then(|m| m.first().copied())
                .map(|a| a * 1000.)
                .unwrap_or(1.)
        } else {
            1.
        };

        let mut widths = HashMap::new();
        if let (Some(first_char), Some(widths_array)) = (
            maybe_get::<i64>(doc, font, b"FirstChar"),
            maybe_get::<Vec<f64>>(doc, font, b"Widths"),
        ) {
            for (i, w) in widths_array.into_iter().enumerate() {
                widths.insert((first_char + i as i64) as CharCode, w);
            }
        }

        let descriptor: Option<&Dictionary> = maybe_get(doc, font, b"FontDescriptor");
        let missing_width = descriptor
            .and_then(|d| maybe_get::<f64>(doc, d, b"MissingWidth"))
            .unwrap_or(0.);
        let (ascent, descent) = descriptor_metrics(doc, font);

        PdfSimpleFont {
            font,
            base_name,
            encoding,
            unicode_map,
            widths,
            width_scale,
            standard,
            missing_width,
            ascent,
            descent,
        }
    }
}

impl<'a> PdfFont for PdfSimpleFont<'a> {
    fn get_width(&self, id: CharCode) -> f64 {
        if let Some(width) = self.widths.get(&id) {
            return *width * self.width_scale;
        }
        if let Some(standard) = self.standard {
            let decoded = to_utf8(&self.encoding, &[id as u8]);
            if let Some(c) = decoded.chars().next() {
                return standard.width_of(c);
            }
        }
        debug!(
            "missing width for {} in {}, falling back to {}",
            id, self.base_name, self.missing_width
        );
        self.missing_width
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        iter.next().map(|x| (*x as CharCode, 1))
    }

    fn decode_char(&self, char: CharCode) -> String {
        if let Some(s) = self.unicode_map.as_ref().and_then(|m| m.get(&char)) {
            return s.clone();
        }
        to_utf8(&self.encoding, &[char as u8])
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }

    fn ascent(&self) -> f64 {
        self.ascent
    }

    fn descent(&self) -> f64 {
        self.descent
    }
}

impl<'a> fmt::Debug for PdfSimpleFont<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.font.fmt(f)
    }
}

fn get_unicode_map(doc: &Document, font: &Dictionary) -> Option<HashMap<CharCode, String>> {
    match maybe_get_obj(doc, font, b"ToUnicode") {
        Some(&Object::Stream(ref stream)) => {
            let contents = get_contents(stream);
            let cmap = match adobe_cmap_parser::get_unicode_map(&contents) {
                Ok(cmap) => cmap,
                Err(e) => {
                    warn!("unparsable ToUnicode CMap: {:?}", e);
                    return None;
                }
            };

            let mut unicode = HashMap::new();
            for (&k, v) in cmap.iter() {
                let be: Vec<u16> = v
                    .chunks_exact(2)
                    .map(|pair| ((pair[0] as u16) << 8) | pair[1] as u16)
                    .collect();
                if let [0xd800..=0xdfff] = &be[..] {
                    continue;
                }
                match String::from_utf16(&be) {
                    Ok(s) => {
                        unicode.insert(k, s);
                    }
                    Err(_) => debug!("invalid UTF-16 for code {}: {:02X?}", k, v),
                }
            }
            Some(unicode)
        }
        Some(&Object::Name(ref name)) => {
            debug!("ToUnicode name {:?} ignored", pdf_to_utf8(name));
            None
        }
        None => None,
        Some(other) => {
            warn!("unsupported ToUnicode {:?}", other);
            None
        }
    }
}

fn identity_mapping() -> ByteMapping {
    ByteMapping {
        codespace: vec![CodeRange {
            width: 2,
            start: 0,
            end: 0xffff,
        }],
        cid: vec![CIDRange {
            src_code_lo: 0,
            src_code_hi: 0xffff,
            dst_CID_lo: 0,
        }],
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` forms.
// CIDs are two-byte values
const MAX_CID: i64 = 0xffff;

fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<CharCode, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i + 1 < w.len() {
        let first = maybe_deref(doc, &w[i]).as_i64().ok();
        match (first, maybe_deref(doc, &w[i + 1])) {
            (Some(cid), &Object::Array(ref wa)) => {
                for (j, width) in wa.iter().enumerate() {
                    let id = cid + j as i64;
                    if !(0..=MAX_CID).contains(&id) {
                        continue;
                    }
                    if let Some(width) = as_num(maybe_deref(doc, width)) {
                        widths.insert(id as CharCode, width);
                    }
                }
                i += 2;
            }
            (Some(c_first), last) if i + 2 < w.len() => {
                let c_last = last.as_i64().unwrap_or(c_first);
                let width = as_num(maybe_deref(doc, &w[i + 2])).unwrap_or(0.);
                for id in c_first.max(0)..=c_last.min(MAX_CID) {
                    widths.insert(id as CharCode, width);
                }
                i += 3;
            }
            _ => {
                debug!("malformed W array at {}", i);
                break;
            }
        }
    }
    widths
}

impl<'a> PdfCIDFont<'a> {
    fn new(doc: &'a Document, font: &'a Dictionary) -> PdfCIDFont<'a> {
        let base_name =
            maybe_get_name_string(doc, font, b"BaseFont").unwrap_or_else(|| "Unnamed".to_owned());
        let ciddict: Option<&Dictionary> = maybe_get_array(doc, font, b"DescendantFonts")
            .and_then(|d| d.first())
            .and_then(|d| maybe_deref(doc, d).as_dict().ok());
        debug!("base_name {} {:?}", base_name, font);

        let encoding = match maybe_get_obj(doc, font, b"Encoding") {
            Some(&Object::Name(ref name)) => {
                let name = pdf_to_utf8(name);
                if name != "Identity-H" && name != "Identity-V" {
                    warn!("unsupported encoding {}, assuming Identity-H", name);
                }
                identity_mapping()
            }
            Some(&Object::Stream(ref stream)) => {
                let contents = get_contents(stream);
                adobe_cmap_parser::get_byte_mapping(&contents).unwrap_or_else(|e| {
                    warn!("unparsable encoding CMap: {:?}", e);
                    identity_mapping()
                })
            }
            _ => identity_mapping(),
        };

        let to_unicode = get_unicode_map(doc, font);

        let (widths, default_width, (ascent, descent)) = match ciddict {
            Some(ciddict) => (
                maybe_get_array(doc, ciddict, b"W")
                    .map(|w| parse_cid_widths(doc, w))
                    .unwrap_or_default(),
                maybe_get::<f64>(doc, ciddict, b"DW").unwrap_or(1000.),
                descriptor_metrics(doc, ciddict),
            ),
            None => {
                warn!("Type0 font {} has no descendant font", base_name);
                (HashMap::new(), 1000., (DEFAULT_ASCENT, DEFAULT_DESCENT))
            }
        };

        PdfCIDFont {
            font,
            base_name,
            encoding,
            to_unicode,
            widths,
            default_width,
            ascent,
            descent,
        }
    }
}

impl<'a> PdfFont for PdfCIDFont<'a> {
    fn get_width(&self, id: CharCode) -> f64 {
        self.widths.get(&id).copied().unwrap_or(self.default_width)
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        let mut c = *iter.next()? as u32;
        let mut code = None;
        'outer: for width in 1..=4 {
            for range in &self.encoding.codespace {
                if c >= range.start && c <= range.end && range.width == width {
                    code = Some((c, width));
                    break 'outer;
                }
            }
            let next = *iter.next()?;
            c = (c << 8) | next as u32;
        }
        let code = code?;
        for range in &self.encoding.cid {
            if code.0 >= range.src_code_lo && code.0 <= range.src_code_hi {
                return Some((code.0 - range.src_code_lo + range.dst_CID_lo, code.1 as u8));
            }
        }
        Some((0, code.1 as u8))
    }

    fn decode_char(&self, char: CharCode) -> String {
        match self.to_unicode.as_ref().and_then(|x| x.get(&char)) {
            Some(s) if !s.contains('\0') => s.clone(),
            _ => {
                debug!("Unknown character {} in {}", char, self.base_name);
                String::new()
            }
        }
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }

    fn ascent(&self) -> f64 {
        self.ascent
    }

    fn descent(&self) -> f64 {
        self.descent
    }
}

impl<'a> fmt::Debug for PdfCIDFont<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.font.fmt(f)
    }
}

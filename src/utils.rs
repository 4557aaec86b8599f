use encoding_rs::UTF_16BE;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::types::MediaBox;

#[allow(non_upper_case_globals)]
pub(crate) const PDFDocEncoding: &'static [u16] = &[
    0x0000, 0x0001, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006, 0x0007, 0x0008, 0x0009, 0x000a, 0x000b,
    0x000c, 0x000d, 0x000e, 0x000f, 0x0010, 0x0011, 0x0012, 0x0013, 0x0014, 0x0015, 0x0016, 0x0017,
    0x02d8, 0x02c7, 0x02c6, 0x02d9, 0x02dd, 0x02db, 0x02da, 0x02dc, 0x0020, 0x0021, 0x0022, 0x0023,
    0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029, 0x002a, 0x002b, 0x002c, 0x002d, 0x002e, 0x002f,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037, 0x0038, 0x0039, 0x003a, 0x003b,
    0x003c, 0x003d, 0x003e, 0x003f, 0x0040, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x004a, 0x004b, 0x004c, 0x004d, 0x004e, 0x004f, 0x0050, 0x0051, 0x0052, 0x0053,
    0x0054, 0x0055, 0x0056, 0x0057, 0x0058, 0x0059, 0x005a, 0x005b, 0x005c, 0x005d, 0x005e, 0x005f,
    0x0060, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067, 0x0068, 0x0069, 0x006a, 0x006b,
    0x006c, 0x006d, 0x006e, 0x006f, 0x0070, 0x0071, 0x0072, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077,
    0x0078, 0x0079, 0x007a, 0x007b, 0x007c, 0x007d, 0x007e, 0x0000, 0x2022, 0x2020, 0x2021, 0x2026,
    0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203a, 0x2212, 0x2030, 0x201e, 0x201c, 0x201d, 0x2018,
    0x2019, 0x201a, 0x2122, 0xfb01, 0xfb02, 0x0141, 0x0152, 0x0160, 0x0178, 0x017d, 0x0131, 0x0142,
    0x0153, 0x0161, 0x017e, 0x0000, 0x20ac, 0x00a1, 0x00a2, 0x00a3, 0x00a4, 0x00a5, 0x00a6, 0x00a7,
    0x00a8, 0x00a9, 0x00aa, 0x00ab, 0x00ac, 0x0000, 0x00ae, 0x00af, 0x00b0, 0x00b1, 0x00b2, 0x00b3,
    0x00b4, 0x00b5, 0x00b6, 0x00b7, 0x00b8, 0x00b9, 0x00ba, 0x00bb, 0x00bc, 0x00bd, 0x00be, 0x00bf,
    0x00c0, 0x00c1, 0x00c2, 0x00c3, 0x00c4, 0x00c5, 0x00c6, 0x00c7, 0x00c8, 0x00c9, 0x00ca, 0x00cb,
    0x00cc, 0x00cd, 0x00ce, 0x00cf, 0x00d0, 0x00d1, 0x00d2, 0x00d3, 0x00d4, 0x00d5, 0x00d6, 0x00d7,
    0x00d8, 0x00d9, 0x00da, 0x00db, 0x00dc, 0x00dd, 0x00de, 0x00df, 0x00e0, 0x00e1, 0x00e2, 0x00e3,
    0x00e4, 0x00e5, 0x00e6, 0x00e7, 0x00e8, 0x00e9, 0x00ea, 0x00eb, 0x00ec, 0x00ed, 0x00ee, 0x00ef,
    0x00f0, 0x00f1, 0x00f2, 0x00f3, 0x00f4, 0x00f5, 0x00f6, 0x00f7, 0x00f8, 0x00f9, 0x00fa, 0x00fb,
    0x00fc, 0x00fd, 0x00fe, 0x00ff,
];

static NULL: Object = Object::Null;

pub(crate) fn pdf_to_utf8(s: &[u8]) -> String {
    if s.len() > 2 && s[0] == 0xfe && s[1] == 0xff {
        return UTF_16BE.decode_without_bom_handling(&s[2..]).0.into_owned();
    }
    to_utf8(PDFDocEncoding, s)
}

/// Decode single-byte codes through an encoding table; unmapped codes vanish.
pub(crate) fn to_utf8(encoding: &[u16], s: &[u8]) -> String {
    let r: Vec<u8> = s
        .iter()
        .filter_map(|&x| encoding.get(x as usize).copied())
        .filter(|&k| k != 0)
        .flat_map(|k| [(k >> 8) as u8, k as u8])
        .collect();
    UTF_16BE.decode_without_bom_handling(&r).0.into_owned()
}

pub(crate) fn maybe_deref<'a>(doc: &'a Document, o: &'a Object) -> &'a Object {
    match o {
        &Object::Reference(r) => doc.get_object(r).unwrap_or(&NULL),
        _ => o,
    }
}

pub(crate) fn maybe_get_obj<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key)
        .map(|o| maybe_deref(doc, o))
        .ok()
        .filter(|o| !matches!(o, Object::Null))
}

pub(crate) trait FromObj<'a>
where
    Self: std::marker::Sized,
{
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<Self>;
}

impl<'a, T: FromObj<'a>> FromObj<'a> for Vec<T> {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<Self> {
        maybe_deref(doc, obj)
            .as_array()
            .ok()?
            .iter()
            .map(|x| T::from_obj(doc, x))
            .collect()
    }
}

impl<'a> FromObj<'a> for f64 {
    fn from_obj(doc: &Document, obj: &Object) -> Option<Self> {
        match maybe_deref(doc, obj) {
            &Object::Integer(i) => Some(i as f64),
            &Object::Real(f) => Some(f.into()),
            _ => None,
        }
    }
}

impl<'a> FromObj<'a> for i64 {
    fn from_obj(doc: &Document, obj: &Object) -> Option<Self> {
        match maybe_deref(doc, obj) {
            &Object::Integer(i) => Some(i),
            _ => None,
        }
    }
}

impl<'a> FromObj<'a> for &'a Dictionary {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
        maybe_deref(doc, obj).as_dict().ok()
    }
}

impl<'a> FromObj<'a> for &'a Stream {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Stream> {
        maybe_deref(doc, obj).as_stream().ok()
    }
}

impl<'a> FromObj<'a> for &'a Object {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
        Some(maybe_deref(doc, obj))
    }
}

pub(crate) fn maybe_get<'a, T: FromObj<'a>>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<T> {
    maybe_get_obj(doc, dict, key).and_then(|o| T::from_obj(doc, o))
}

pub(crate) fn maybe_get_name_string<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<String> {
    maybe_get_name(doc, dict, key).map(pdf_to_utf8)
}

pub(crate) fn maybe_get_name<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a [u8]> {
    maybe_get_obj(doc, dict, key).and_then(|n| n.as_name().ok())
}

pub(crate) fn maybe_get_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    maybe_get_obj(doc, dict, key).and_then(|n| n.as_array().ok())
}

pub(crate) fn as_num(o: &Object) -> Option<f64> {
    match o {
        &Object::Integer(i) => Some(i as f64),
        &Object::Real(f) => Some(f.into()),
        _ => None,
    }
}

pub(crate) fn get_contents(contents: &Stream) -> Vec<u8> {
    if contents.filters().is_ok() {
        contents
            .decompressed_content()
            .unwrap_or_else(|_| contents.content.clone())
    } else {
        contents.content.clone()
    }
}

pub(crate) fn get_inherited<'a, T: FromObj<'a>>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<T> {
    let o: Option<T> = maybe_get(doc, dict, key);
    if let Some(o) = o {
        Some(o)
    } else {
        let parent = dict
            .get(b"Parent")
            .and_then(|parent| parent.as_reference())
            .and_then(|id| doc.get_dictionary(id))
            .ok()?;
        get_inherited(doc, parent, key)
    }
}

pub(crate) fn page_media_box(doc: &Document, page_dict: &Dictionary) -> MediaBox {
    const US_LETTER: [f64; 4] = [0., 0., 612., 792.];
    let media_box: Vec<f64> = get_inherited(doc, page_dict, b"MediaBox")
        .filter(|b: &Vec<f64>| b.len() == 4)
        .unwrap_or_else(|| US_LETTER.to_vec());
    MediaBox {
        llx: media_box[0].min(media_box[2]),
        lly: media_box[1].min(media_box[3]),
        urx: media_box[0].max(media_box[2]),
        ury: media_box[1].max(media_box[3]),
    }
}

/// Give the page a resource dictionary of its own object, materialising
/// inherited or inline resources, and return its id.
pub(crate) fn own_page_resources(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<ObjectId> {
    let page = doc.get_dictionary(page_id)?;
    if let Ok(&Object::Reference(id)) = page.get(b"Resources") {
        if doc.get_dictionary(id).is_ok() {
            return Ok(id);
        }
    }
    let resources = get_inherited::<&Dictionary>(doc, page, b"Resources")
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let id = doc.add_object(resources);
    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Reference(id));
    Ok(id)
}

/// Names already used in one resource category (`Font`, `XObject`, ...).
pub(crate) fn resource_names(
    doc: &Document,
    resources_id: ObjectId,
    category: &[u8],
) -> Vec<Vec<u8>> {
    doc.get_dictionary(resources_id)
        .ok()
        .and_then(|res| maybe_get::<&Dictionary>(doc, res, category))
        .map(|d| d.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default()
}

/// Add `name → target` to a resource category, following an indirect
/// category dictionary if there is one.
pub(crate) fn set_resource(
    doc: &mut Document,
    resources_id: ObjectId,
    category: &[u8],
    name: &[u8],
    target: ObjectId,
) -> lopdf::Result<()> {
    let entry = doc.get_dictionary(resources_id)?.get(category).ok().cloned();
    match entry {
        Some(Object::Reference(id)) => {
            doc.get_dictionary_mut(id)?
                .set(name.to_vec(), Object::Reference(target));
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set(name.to_vec(), Object::Reference(target));
            doc.get_dictionary_mut(resources_id)?
                .set(category.to_vec(), Object::Dictionary(dict));
        }
        _ => {
            let mut dict = Dictionary::new();
            dict.set(name.to_vec(), Object::Reference(target));
            doc.get_dictionary_mut(resources_id)?
                .set(category.to_vec(), Object::Dictionary(dict));
        }
    }
    Ok(())
}

/// Replace whatever the page's `/Contents` holds with one new stream.
pub(crate) fn set_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> lopdf::Result<()> {
    let stream = Stream::new(dictionary! {}, content);
    let id = doc.add_object(stream);
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Reference(id));
    Ok(())
}

/// Strip the `ABCDEF+` tag of a subset font name.
pub(crate) fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_and_pdfdoc_strings() {
        assert_eq!(pdf_to_utf8(b"\xfe\xff\x00A\x00B"), "AB");
        assert_eq!(pdf_to_utf8(b"caf\xe9"), "café");
    }

    #[test]
    fn subset_tags_are_stripped() {
        assert_eq!(strip_subset_tag("ABCDEF+OpenSans-Bold"), "OpenSans-Bold");
        assert_eq!(strip_subset_tag("Helvetica"), "Helvetica");
        assert_eq!(strip_subset_tag("abc+Font"), "abc+Font");
    }

    #[test]
    fn inherited_media_box_is_found_on_parent() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 100.into()],
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
        });
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page_media_box(&doc, page);
        assert_eq!(media_box.urx, 200.);
        assert_eq!(media_box.height(), 100.);
    }

    #[test]
    fn own_resources_copies_inherited_dictionary() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Resources" => dictionary! { "Font" => dictionary! {} },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
        });
        let res_id = own_page_resources(&mut doc, page_id).unwrap();
        let font_id = doc.add_object(dictionary! { "Type" => "Font" });
        set_resource(&mut doc, res_id, b"Font", b"helv", font_id).unwrap();
        assert_eq!(resource_names(&doc, res_id, b"Font"), vec![b"helv".to_vec()]);
        // the parent's dictionary is untouched
        let parent = doc.get_dictionary(pages_id).unwrap();
        let fonts = parent.get(b"Resources").unwrap().as_dict().unwrap();
        assert_eq!(fonts.get(b"Font").unwrap().as_dict().unwrap().len(), 0);
    }
}

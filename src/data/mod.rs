mod core_fonts;
mod encodings;
mod glyphnames;

pub(crate) use core_fonts::*;
pub(crate) use encodings::*;
pub(crate) use glyphnames::GLYPH_NAMES;

/// Look up a glyph name, accepting the `uniXXXX` and `uXXXX[XX]` forms.
pub(crate) fn glyph_name_to_unicode(name: &str) -> Option<String> {
    if let Ok(i) = GLYPH_NAMES.binary_search_by_key(&name, |&(n, _)| n) {
        return String::from_utf16(&[GLYPH_NAMES[i].1]).ok();
    }
    // "a.sc", "T_h" and friends: take the part before the suffix
    if let Some((base, _)) = name.split_once('.') {
        if !base.is_empty() {
            return glyph_name_to_unicode(base);
        }
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_names_are_sorted() {
        assert!(GLYPH_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn resolves_named_and_hex_glyphs() {
        assert_eq!(glyph_name_to_unicode("quoteright").as_deref(), Some("\u{2019}"));
        assert_eq!(glyph_name_to_unicode("uni00E9").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_unicode("u1F600").as_deref(), Some("😀"));
        assert_eq!(glyph_name_to_unicode("a.sc").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_unicode("notaglyph"), None);
    }
}

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, ObjectId};
use tracing::warn;

use crate::diagnostics::Diagnostics;
use crate::error::{EditError, InsertError, RedactError};
use crate::insert::{FontChoice, TextInserter};
use crate::output::{Glyph, GlyphOutput, TextIndex};
use crate::processor::Processor;
use crate::redact;
use crate::types::{BoundingBox, MediaBox, Point, Rgb, TextMatch, TextOutput, TextProperties};
use crate::utils::*;

pub(crate) fn decode_page(doc: &Document, page_id: ObjectId) -> lopdf::Result<Content> {
    Content::decode(&doc.get_page_content(page_id)?)
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    match doc.get_dictionary(page_id) {
        Ok(page) => page_media_box(doc, page),
        Err(_) => page_media_box(doc, &Dictionary::new()),
    }
}

/// Every glyph painted by `content`, the decoded content of `page_id`.
pub(crate) fn collect_glyphs(doc: &Document, page_id: ObjectId, content: &Content) -> Vec<Glyph> {
    let empty_resources = Dictionary::new();
    let page_dict = doc.get_dictionary(page_id).unwrap_or(&empty_resources);
    let resources = get_inherited(doc, page_dict, b"Resources").unwrap_or(&empty_resources);
    let mut output = GlyphOutput::new(&page_media_box(doc, page_dict));
    Processor::new(doc).process_content(content, resources, &mut output);
    output.into_glyphs()
}

fn page_glyphs(doc: &Document, page_id: ObjectId) -> Vec<Glyph> {
    match decode_page(doc, page_id) {
        Ok(content) => collect_glyphs(doc, page_id, &content),
        Err(e) => {
            warn!("Failed to decode content stream: {}. Page has no text.", e);
            Vec::new()
        }
    }
}

/// Whether content appended after `operations` could inherit a modified
/// graphics state: unbalanced `q`/`Q`, or a `cm` outside any `q`.
///
/// Returns how many `q` to prepend and `Q` to append so the original
/// operations are sealed off, or `None` when they already are.
pub(crate) fn needs_isolation(operations: &[Operation]) -> Option<(usize, usize)> {
    let mut depth: i64 = 0;
    let mut min_depth: i64 = 0;
    let mut top_level_cm = false;
    for operation in operations {
        match operation.operator.as_str() {
            "q" => depth += 1,
            "Q" => {
                depth -= 1;
                min_depth = min_depth.min(depth);
            }
            "cm" if depth <= 0 => top_level_cm = true,
            _ => {}
        }
    }
    if depth == 0 && min_depth == 0 && !top_level_cm {
        return None;
    }
    let opens = 1 + (-min_depth) as usize;
    let closes = (opens as i64 + depth) as usize;
    Some((opens, closes))
}

/// Write `content` back as the page's only content stream, followed by
/// `extra` drawn in the page's initial graphics state.
pub(crate) fn write_content_with(
    doc: &mut Document,
    page_id: ObjectId,
    mut content: Content,
    extra: Vec<Operation>,
) -> lopdf::Result<()> {
    if let Some((opens, closes)) = needs_isolation(&content.operations) {
        let mut operations = Vec::with_capacity(content.operations.len() + opens + closes);
        operations.extend((0..opens).map(|_| Operation::new("q", vec![])));
        operations.append(&mut content.operations);
        operations.extend((0..closes).map(|_| Operation::new("Q", vec![])));
        content.operations = operations;
    }
    content.operations.extend(extra);
    set_page_content(doc, page_id, content.encode()?)
}

/// A page of an open document, the unit every editing step works on.
///
/// Regions and positions are in top-down page space: the origin is the
/// top-left corner of the media box and y grows downwards.
pub struct PageRef<'d> {
    doc: &'d mut Document,
    page_id: ObjectId,
    index: usize,
}

impl<'d> PageRef<'d> {
    /// The page at zero-based `index`.
    pub fn new(doc: &'d mut Document, index: usize) -> Result<PageRef<'d>, EditError> {
        let pages = doc.get_pages();
        let page_count = pages.len();
        let page_id = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(|number| pages.get(&number))
            .copied()
            .ok_or(EditError::PageOutOfRange { page: index, page_count })?;
        Ok(PageRef {
            doc,
            page_id,
            index,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> ObjectId {
        self.page_id
    }

    pub fn media_box(&self) -> MediaBox {
        media_box(self.doc, self.page_id)
    }

    /// Structured text of the whole page.
    pub fn text(&self) -> TextOutput {
        let glyphs = page_glyphs(self.doc, self.page_id);
        TextIndex::new(&glyphs).text_output(self.index as u32)
    }

    /// Every occurrence of `needle` on the page, case-sensitive.
    pub fn search_for(&self, needle: &str) -> Vec<TextMatch> {
        let glyphs = page_glyphs(self.doc, self.page_id);
        TextIndex::new(&glyphs)
            .search(needle)
            .into_iter()
            .map(|rect| TextMatch {
                page: self.index,
                rect,
            })
            .collect()
    }

    /// Style of the text in `region`, taken from its first span. Falls back
    /// to the default properties when the region holds no text.
    pub fn extract_properties(&self, region: &BoundingBox) -> TextProperties {
        let glyphs: Vec<Glyph> = page_glyphs(self.doc, self.page_id)
            .into_iter()
            .filter(|g| region.contains(g.bbox.center()))
            .collect();
        let output = TextIndex::new(&glyphs).text_output(self.index as u32);
        match output.first_span() {
            Some(span) => TextProperties {
                font: span.font_name.clone(),
                size: span.font_size,
                color: span.color,
            },
            None => TextProperties::default(),
        }
    }

    /// Remove the text inside `region` for good, painting `fill` over it.
    pub fn redact(
        &mut self,
        region: &BoundingBox,
        fill: Option<Rgb>,
        diag: &Diagnostics,
    ) -> Result<(), RedactError> {
        redact::redact(self.doc, self.page_id, region, fill, diag)
    }

    /// Draw `text` with its baseline origin at `position`.
    pub fn insert_text(
        &mut self,
        inserter: &mut TextInserter<'_>,
        position: Point,
        text: &str,
        properties: &TextProperties,
        diag: &Diagnostics,
    ) -> Result<FontChoice, InsertError> {
        inserter.insert(self.doc, self.page_id, position, text, properties, diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, dictionary};

    fn ops(s: &[u8]) -> Vec<Operation> {
        Content::decode(s).unwrap().operations
    }

    #[test]
    fn huge_page_index_is_out_of_range() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        for index in [usize::MAX, u32::MAX as usize, u32::MAX as usize + 1] {
            let err = PageRef::new(&mut doc, index).err();
            assert!(matches!(
                err,
                Some(EditError::PageOutOfRange { page, page_count: 0 }) if page == index
            ));
        }
    }

    #[test]
    fn balanced_content_needs_no_isolation() {
        assert_eq!(needs_isolation(&ops(b"q 1 0 0 1 5 5 cm Q BT ET")), None);
    }

    #[test]
    fn top_level_cm_and_unbalanced_stacks_are_isolated() {
        assert_eq!(needs_isolation(&ops(b"1 0 0 1 5 5 cm")), Some((1, 1)));
        assert_eq!(needs_isolation(&ops(b"q q")), Some((1, 3)));
        assert_eq!(needs_isolation(&ops(b"Q Q q")), Some((3, 2)));
    }
}

use std::collections::HashMap;
use std::ops::Range;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId, StringFormat, dictionary};
use tracing::warn;

use crate::diagnostics::{Diagnostics, narrate};
use crate::error::RedactError;
use crate::page::{collect_glyphs, decode_page, media_box, write_content_with};
use crate::types::{BoundingBox, MediaBox, Point, Rgb};
use crate::utils::*;

fn to_pdf_rect(media_box: &MediaBox, region: &BoundingBox) -> Vec<Object> {
    let lower_left = media_box.to_user_space(Point {
        x: region.l,
        y: region.b,
    });
    let upper_right = media_box.to_user_space(Point {
        x: region.r,
        y: region.t,
    });
    [lower_left.x, lower_left.y, upper_right.x, upper_right.y]
        .into_iter()
        .map(|v| Object::Real(v as f32))
        .collect()
}

fn from_pdf_rect(doc: &Document, media_box: &MediaBox, rect: &[Object]) -> Option<BoundingBox> {
    let v: Vec<f64> = rect
        .iter()
        .filter_map(|o| as_num(maybe_deref(doc, o)))
        .collect();
    let (dx, top) = (media_box.llx, media_box.ury);
    match v[..] {
        [x0, y0, x1, y1] => Some(BoundingBox::new(x0 - dx, top - y1, x1 - dx, top - y0)),
        _ => None,
    }
}

/// Add a `/Redact` annotation with an empty overlay covering `region`.
pub(crate) fn mark(
    doc: &mut Document,
    page_id: ObjectId,
    region: &BoundingBox,
) -> lopdf::Result<ObjectId> {
    let rect = to_pdf_rect(&media_box(doc, page_id), region);
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Redact",
        "Rect" => rect,
        "OverlayText" => Object::String(Vec::new(), StringFormat::Literal),
        "P" => page_id,
    });
    let annots = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
    match annots {
        Some(Object::Reference(id)) => {
            doc.get_object_mut(id)?.as_array_mut()?.push(annot_id.into());
        }
        Some(Object::Array(mut array)) => {
            array.push(annot_id.into());
            doc.get_dictionary_mut(page_id)?.set("Annots", array);
        }
        _ => {
            doc.get_dictionary_mut(page_id)?
                .set("Annots", vec![Object::from(annot_id)]);
        }
    }
    Ok(annot_id)
}

fn is_redact_annot(doc: &Document, annot: &Object) -> bool {
    maybe_deref(doc, annot)
        .as_dict()
        .map(|d| maybe_get_name(doc, d, b"Subtype") == Some(b"Redact".as_slice()))
        .unwrap_or(false)
}

/// Regions of every `/Redact` annotation on the page, with their object ids.
fn redaction_marks(doc: &Document, page_id: ObjectId) -> Vec<(Option<ObjectId>, BoundingBox)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let media_box = page_media_box(doc, page);
    maybe_get_array(doc, page, b"Annots")
        .map(|annots| {
            annots
                .iter()
                .filter(|a| is_redact_annot(doc, a))
                .filter_map(|a| {
                    let dict = maybe_deref(doc, a).as_dict().ok()?;
                    let rect = maybe_get_array(doc, dict, b"Rect")?;
                    let region = from_pdf_rect(doc, &media_box, rect)?;
                    Some((a.as_reference().ok(), region))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Drop every `/Redact` annotation from the page.
fn unmark(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    let marks: Vec<ObjectId> = redaction_marks(doc, page_id)
        .into_iter()
        .filter_map(|(id, _)| id)
        .collect();
    let annots = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
    let keep = |doc: &Document, array: Vec<Object>| -> Vec<Object> {
        array
            .into_iter()
            .filter(|a| !is_redact_annot(doc, a))
            .collect()
    };
    match annots {
        Some(Object::Reference(id)) => {
            let array = doc.get_object(id)?.as_array()?.clone();
            let kept = keep(doc, array);
            *doc.get_object_mut(id)? = Object::Array(kept);
        }
        Some(Object::Array(array)) => {
            let kept = keep(doc, array);
            let page = doc.get_dictionary_mut(page_id)?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", kept);
            }
        }
        _ => {}
    }
    for id in marks {
        doc.objects.remove(&id);
    }
    Ok(())
}

/// Split one shown string around removed byte ranges. Each removed run turns
/// into a `TJ` adjustment of the same advance, so the glyphs that stay do
/// not move.
fn split_string(s: &[u8], format: &StringFormat, removed: &[(Range<usize>, f64)]) -> Vec<Object> {
    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (range, advance) in removed {
        if range.start > cursor {
            pieces.push(Object::String(
                s[cursor..range.start].to_vec(),
                format.clone(),
            ));
        }
        match pieces.last_mut() {
            Some(Object::Real(n)) => *n -= *advance as f32,
            _ => pieces.push(Object::Real(-*advance as f32)),
        }
        cursor = cursor.max(range.end);
    }
    if cursor < s.len() {
        pieces.push(Object::String(s[cursor..].to_vec(), format.clone()));
    }
    pieces
}

type Removals = HashMap<(usize, Option<usize>), Vec<(Range<usize>, f64)>>;

/// Rewrite one showing operation without the removed glyphs.
fn rewrite_operation(
    op_index: usize,
    operation: &Operation,
    removals: &Removals,
) -> Result<Vec<Operation>, RedactError> {
    let split = |element: Option<usize>, object: &Object| -> Result<Vec<Object>, RedactError> {
        match (object, removals.get(&(op_index, element))) {
            (Object::String(s, format), Some(removed)) => Ok(split_string(s, format, removed)),
            (object, None) => Ok(vec![object.clone()]),
            (object, Some(_)) => Err(RedactError::Content(format!(
                "cannot split {:?} in {}",
                object, operation.operator
            ))),
        }
    };
    let string_operand = |i: usize| {
        operation
            .operands
            .get(i)
            .ok_or_else(|| {
                RedactError::Content(format!("missing operand of {}", operation.operator))
            })
    };

    let mut rewritten = Vec::new();
    match operation.operator.as_str() {
        "TJ" => {
            let array = string_operand(0)?
                .as_array()
                .map_err(|e| RedactError::Content(e.to_string()))?;
            let mut elements = Vec::with_capacity(array.len());
            for (i, e) in array.iter().enumerate() {
                elements.extend(split(Some(i), e)?);
            }
            rewritten.push(Operation::new("TJ", vec![Object::Array(elements)]));
        }
        "Tj" => {
            let elements = split(None, string_operand(0)?)?;
            rewritten.push(Operation::new("TJ", vec![Object::Array(elements)]));
        }
        "'" => {
            let elements = split(None, string_operand(0)?)?;
            rewritten.push(Operation::new("T*", vec![]));
            rewritten.push(Operation::new("TJ", vec![Object::Array(elements)]));
        }
        "\"" => {
            rewritten.push(Operation::new("Tw", vec![string_operand(0)?.clone()]));
            rewritten.push(Operation::new("Tc", vec![string_operand(1)?.clone()]));
            rewritten.push(Operation::new("T*", vec![]));
            let elements = split(None, string_operand(2)?)?;
            rewritten.push(Operation::new("TJ", vec![Object::Array(elements)]));
        }
        other => {
            return Err(RedactError::Content(format!(
                "glyphs attributed to non-showing operator {}",
                other
            )));
        }
    }
    Ok(rewritten)
}

fn fill_operations(media_box: &MediaBox, region: &BoundingBox, fill: Rgb) -> Vec<Operation> {
    let lower_left = media_box.to_user_space(Point {
        x: region.l,
        y: region.b,
    });
    let real = |v: f64| Object::Real(v as f32);
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(fill.r), real(fill.g), real(fill.b)]),
        Operation::new(
            "re",
            vec![
                real(lower_left.x),
                real(lower_left.y),
                real(region.width()),
                real(region.height()),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Apply every redaction mark of the page: remove the glyphs whose centre
/// lies in a marked region, paint the regions, then drop the marks.
///
/// The page is left untouched when this fails.
pub(crate) fn apply(
    doc: &mut Document,
    page_id: ObjectId,
    fill: Option<Rgb>,
    diag: &Diagnostics,
) -> Result<(), RedactError> {
    let regions: Vec<BoundingBox> = redaction_marks(doc, page_id)
        .into_iter()
        .map(|(_, region)| region)
        .collect();
    let content = decode_page(doc, page_id)?;
    let glyphs = collect_glyphs(doc, page_id, &content);
    let targets: Vec<_> = glyphs
        .iter()
        .filter(|g| regions.iter().any(|r| r.contains(g.bbox.center())))
        .collect();
    if targets.is_empty() {
        return Err(RedactError::NoText);
    }
    let unreachable = targets.iter().filter(|g| g.location.is_none()).count();
    if unreachable > 0 {
        return Err(RedactError::Unreachable {
            glyphs: unreachable,
        });
    }

    let mut removals: Removals = HashMap::new();
    for location in targets.iter().filter_map(|g| g.location.as_ref()) {
        removals
            .entry((location.op_index, location.element))
            .or_default()
            .push((location.bytes.clone(), location.advance_units));
    }
    for removed in removals.values_mut() {
        removed.sort_by_key(|(range, _)| range.start);
    }
    narrate!(
        diag,
        "redacting {} glyphs from {} strings",
        targets.len(),
        removals.len()
    );

    let mut operations = Vec::with_capacity(content.operations.len());
    for (op_index, operation) in content.operations.iter().enumerate() {
        if removals.keys().any(|(i, _)| *i == op_index) {
            operations.extend(rewrite_operation(op_index, operation, &removals)?);
        } else {
            operations.push(operation.clone());
        }
    }

    let media_box = media_box(doc, page_id);
    let extra: Vec<Operation> = match fill {
        Some(fill) => regions
            .iter()
            .flat_map(|region| fill_operations(&media_box, region, fill))
            .collect(),
        None => Vec::new(),
    };
    write_content_with(doc, page_id, lopdf::content::Content { operations }, extra)?;
    unmark(doc, page_id)?;
    Ok(())
}

/// Mark `region` for redaction and apply it straight away.
pub(crate) fn redact(
    doc: &mut Document,
    page_id: ObjectId,
    region: &BoundingBox,
    fill: Option<Rgb>,
    diag: &Diagnostics,
) -> Result<(), RedactError> {
    narrate!(diag, "redacting region {}", region);
    mark(doc, page_id, region)?;
    let applied = apply(doc, page_id, fill, diag);
    if let Err(e) = &applied {
        warn!("redaction of {} failed: {}", region, e);
        unmark(doc, page_id)?;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageRef;
    use lopdf::{Stream, content::Content};

    fn one_page(content: &[u8]) -> (Document, ObjectId) {
        one_page_in(content, [0, 0, 612, 792])
    }

    fn one_page_in(content: &[u8], media_box: [i64; 4]) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => media_box.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
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

    #[test]
    fn split_keeps_surrounding_bytes_and_merges_runs() {
        let removed = [(1..2, 500.), (2..3, 250.)];
        let pieces = split_string(b"abcd", &StringFormat::Literal, &removed);
        assert_eq!(pieces.len(), 3);
        assert!(matches!(&pieces[0], Object::String(s, _) if s == b"a"));
        assert!(matches!(pieces[1], Object::Real(n) if n == -750.));
        assert!(matches!(&pieces[2], Object::String(s, _) if s == b"d"));
    }

    #[test_log::test]
    fn redaction_removes_only_the_region() {
        let (mut doc, page_id) = one_page(b"BT /F1 12 Tf 72 700 Td (keep gone keep) Tj ET");
        let mut page = PageRef::new(&mut doc, 0).unwrap();
        let region = page.search_for("gone")[0].rect;
        page.redact(&region, Some(Rgb::WHITE), &Diagnostics::quiet())
            .unwrap();
        let text = page.text().to_string();
        assert!(!text.contains("gone"), "{}", text);
        assert!(text.contains("keep"));
        // the second "keep" did not move
        let after = page.search_for("keep");
        assert_eq!(after.len(), 2);
        assert!(after[1].rect.l > region.r - 1.);
        let annots = doc.get_dictionary(page_id).unwrap().get(b"Annots");
        assert!(annots.is_err());
    }

    #[test]
    fn empty_region_fails_and_leaves_page_alone() {
        let (mut doc, page_id) = one_page(b"BT /F1 12 Tf 72 700 Td (text) Tj ET");
        let before = doc.get_page_content(page_id).unwrap();
        let region = BoundingBox::new(300., 300., 350., 320.);
        let err = redact(&mut doc, page_id, &region, Some(Rgb::WHITE), &Diagnostics::quiet());
        assert!(matches!(err, Err(RedactError::NoText)));
        assert_eq!(doc.get_page_content(page_id).unwrap(), before);
        assert!(redaction_marks(&doc, page_id).is_empty());
    }

    #[test]
    fn quote_operator_is_split_into_next_line_and_tj() {
        let (mut doc, page_id) =
            one_page(b"BT /F1 12 Tf 14 TL 72 700 Td (first) Tj (second) ' ET");
        let region = PageRef::new(&mut doc, 0).unwrap().search_for("cond")[0].rect;
        redact(&mut doc, page_id, &region, None, &Diagnostics::quiet()).unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let operators: Vec<&str> = content
            .operations
            .iter()
            .map(|o| o.operator.as_str())
            .collect();
        assert_eq!(operators, vec!["BT", "Tf", "TL", "Td", "Tj", "T*", "TJ", "ET"]);
        let text = PageRef::new(&mut doc, 0).unwrap().text().to_string();
        assert_eq!(text, "first\nse\n");
    }

    #[test]
    fn offset_media_box_measures_from_its_top_left_corner() {
        let (mut doc, page_id) = one_page_in(
            b"BT /F1 12 Tf 172 900 Td (keep gone) Tj ET",
            [100, 200, 712, 992],
        );
        let mut page = PageRef::new(&mut doc, 0).unwrap();
        let keep = page.search_for("keep")[0].rect;
        assert!((keep.l - 72.).abs() < 1e-6);
        assert!(keep.t < 92. && keep.b > 92.);

        let region = page.search_for("gone")[0].rect;
        page.redact(&region, Some(Rgb::WHITE), &Diagnostics::quiet())
            .unwrap();
        assert!(!page.text().to_string().contains("gone"));

        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let fill = content
            .operations
            .iter()
            .find(|o| o.operator == "re")
            .unwrap();
        let x = as_num(&fill.operands[0]).unwrap();
        let y = as_num(&fill.operands[1]).unwrap();
        assert!((x - (region.l + 100.)).abs() < 1e-3);
        assert!((y - (992. - region.b)).abs() < 1e-3);
    }
}

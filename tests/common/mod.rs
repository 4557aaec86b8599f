use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

pub const LINES: [&str; 3] = [
    "This is a test PDF file. It might contain sensitive information.",
    "It contains multiple lines of text.",
    "This sensitive information can be edited using PDFEditor",
];

fn show_line(text: &str, y: i64) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![100.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn encode(operations: Vec<Operation>) -> Vec<u8> {
    Content { operations }.encode().unwrap()
}

/// One US letter page whose resources name Helvetica `F1`, plus whatever
/// `xobjects` the caller adds.
fn write_page(
    path: PathBuf,
    content: Vec<u8>,
    xobjects: impl FnOnce(&mut Document, ObjectId) -> Dictionary,
) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let xobjects = xobjects(&mut doc, font_id);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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

    doc.save(&path).unwrap();
    path
}

/// Write a US letter page with `LINES` set in 12pt Helvetica at x = 100,
/// baselines 750, 700 and 650.
pub fn sample_pdf(dir: &Path) -> PathBuf {
    let operations = LINES
        .iter()
        .enumerate()
        .flat_map(|(i, line)| show_line(line, 750 - 50 * i as i64))
        .collect();
    write_page(dir.join("example.pdf"), encode(operations), |_, _| {
        Dictionary::new()
    })
}

/// "sensitive form" drawn by a form XObject at baseline 750, then
/// "sensitive page" in the page content at baseline 650.
pub fn form_pdf(dir: &Path) -> PathBuf {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("Do", vec!["X1".into()]),
        Operation::new("Q", vec![]),
    ];
    operations.extend(show_line("sensitive page", 650));
    write_page(dir.join("form.pdf"), encode(operations), |doc, font_id| {
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            },
            encode(show_line("sensitive form", 750)),
        );
        let form_id = doc.add_object(form);
        dictionary! { "X1" => form_id }
    })
}

use std::collections::HashMap;
use std::rc::Rc;

use euclid::Transform2D;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, warn};

use crate::fonts::{PdfFont, make_font};
use crate::output::{GlyphLocation, GlyphOutput};
use crate::types::{Rgb, Transform};
use crate::utils::*;

// Nested forms deeper than this are skipped; it also breaks reference cycles
const MAX_FORM_DEPTH: usize = 12;

#[derive(Clone)]
pub(crate) struct TextState<'a> {
    pub(crate) font: Option<Rc<dyn PdfFont + 'a>>,
    pub(crate) font_size: f64,
    pub(crate) character_spacing: f64,
    pub(crate) word_spacing: f64,
    pub(crate) horizontal_scaling: f64,
    pub(crate) leading: f64,
    pub(crate) rise: f64,
    pub(crate) tm: Transform,
}

#[derive(Clone)]
pub(crate) struct GraphicsState<'a> {
    pub(crate) ctm: Transform,
    pub(crate) ts: TextState<'a>,
    pub(crate) fill: Rgb,
}

impl<'a> GraphicsState<'a> {
    fn new() -> GraphicsState<'a> {
        GraphicsState {
            ts: TextState {
                font: None,
                font_size: 0.,
                character_spacing: 0.,
                word_spacing: 0.,
                horizontal_scaling: 100. / 100.,
                leading: 0.,
                rise: 0.,
                tm: Transform2D::identity(),
            },
            ctm: Transform2D::identity(),
            fill: Rgb::BLACK,
        }
    }
}

/// Which string of which operation is being shown; absent inside forms.
#[derive(Clone, Copy)]
struct StringSite {
    op_index: usize,
    element: Option<usize>,
}

fn operand(operation: &Operation, i: usize) -> Option<f64> {
    operation.operands.get(i).and_then(as_num)
}

fn matrix(operands: &[Object]) -> Option<Transform> {
    let m: Vec<f64> = operands.iter().filter_map(as_num).collect();
    match m[..] {
        [a, b, c, d, e, f] if operands.len() == 6 => Some(Transform2D::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// Fill color from `sc`/`scn` operands; the component count picks the space.
fn fill_from_components(operands: &[Object]) -> Option<Rgb> {
    let c: Vec<f64> = operands.iter().filter_map(as_num).collect();
    match c[..] {
        [g] => Some(Rgb::gray(g)),
        [r, g, b] => Some(Rgb::new(r, g, b)),
        [c, m, y, k] => Some(Rgb::from_cmyk(c, m, y, k)),
        _ => None,
    }
}

fn show_text(
    gs: &mut GraphicsState,
    s: &[u8],
    site: Option<StringSite>,
    output: &mut GlyphOutput,
) {
    let ts = &mut gs.ts;
    let Some(font) = ts.font.clone() else {
        warn!("text shown without a font, skipping {} bytes", s.len());
        return;
    };
    debug!("{:?}", font.decode(s));

    let mut offset = 0usize;
    for (c, length) in font.char_codes(s) {
        // 5.3.3 Text Space Details
        let tsm = Transform2D::new(
            ts.font_size * ts.horizontal_scaling,
            0.,
            0.,
            ts.font_size,
            0.,
            ts.rise,
        );
        // Trm = Tsm × Tm × CTM
        let trm = tsm.then(&ts.tm.then(&gs.ctm));

        let w0 = font.get_width(c) / 1000.;

        let mut spacing = ts.character_spacing;
        // Word spacing applies to single-byte code 32 only.
        let is_space = c == 32 && length == 1;
        if is_space {
            spacing += ts.word_spacing
        }

        let bytes = offset..offset + length as usize;
        offset = bytes.end;
        let location = site.map(|site| GlyphLocation {
            op_index: site.op_index,
            element: site.element,
            bytes,
            advance_units: if ts.font_size != 0. {
                (w0 * ts.font_size + spacing) * 1000. / ts.font_size
            } else {
                0.
            },
        });

        output.output_character(
            &trm,
            w0,
            font.ascent(),
            font.descent(),
            strip_subset_tag(font.get_font_name()),
            gs.fill,
            &font.decode_char(c),
            location,
        );

        let tx = ts.horizontal_scaling * (w0 * ts.font_size + spacing);
        ts.tm = Transform2D::translation(tx, 0.).then(&ts.tm);
    }
}

fn adjust_text(ts: &mut TextState, tj: f64) {
    let tx = ts.horizontal_scaling * (-tj / 1000. * ts.font_size);
    ts.tm = Transform2D::translation(tx, 0.).then(&ts.tm);
    debug!("adjust text by: {} {:?}", tj, ts.tm);
}

/// Walks a content stream and reports every glyph it paints.
pub(crate) struct Processor<'a> {
    doc: &'a Document,
}

impl<'a> Processor<'a> {
    pub(crate) fn new(doc: &'a Document) -> Processor<'a> {
        Processor { doc }
    }

    /// Interpret page content. Glyphs of the page's own operations carry
    /// their location; glyphs painted by form XObjects do not.
    pub(crate) fn process_content(
        &mut self,
        content: &Content,
        resources: &'a Dictionary,
        output: &mut GlyphOutput,
    ) {
        self.process_operations(
            &content.operations,
            resources,
            GraphicsState::new(),
            output,
            true,
            0,
        );
    }

    fn process_operations(
        &mut self,
        operations: &[Operation],
        resources: &'a Dictionary,
        mut gs: GraphicsState<'a>,
        output: &mut GlyphOutput,
        located: bool,
        depth: usize,
    ) {
        let doc = self.doc;
        let mut font_table: HashMap<Vec<u8>, Rc<dyn PdfFont + 'a>> = HashMap::new();
        let mut gs_stack = Vec::new();
        let mut tlm: Transform = Transform2D::identity();
        let site = |op_index: usize, element: Option<usize>| {
            located.then_some(StringSite { op_index, element })
        };

        for (op_index, operation) in operations.iter().enumerate() {
            match operation.operator.as_ref() {
                "BT" | "ET" => {
                    tlm = Transform2D::identity();
                    gs.ts.tm = tlm;
                }
                "cm" => match matrix(&operation.operands) {
                    Some(m) => {
                        gs.ctm = m.then(&gs.ctm);
                        debug!("matrix {:?}", gs.ctm);
                    }
                    None => warn!("malformed cm {:?}", operation.operands),
                },
                "q" => gs_stack.push(gs.clone()),
                "Q" => match gs_stack.pop() {
                    Some(s) => gs = s,
                    None => warn!("No state to pop"),
                },
                "rg" | "g" | "k" => {
                    let c: Vec<f64> = operation.operands.iter().filter_map(as_num).collect();
                    match (operation.operator.as_str(), &c[..]) {
                        ("rg", &[r, g, b]) => gs.fill = Rgb::new(r, g, b),
                        ("g", &[g]) => gs.fill = Rgb::gray(g),
                        ("k", &[c, m, y, k]) => gs.fill = Rgb::from_cmyk(c, m, y, k),
                        _ => warn!("malformed color {:?}", operation),
                    }
                }
                "cs" => gs.fill = Rgb::BLACK,
                "sc" | "scn" => {
                    if let Some(fill) = fill_from_components(&operation.operands) {
                        gs.fill = fill;
                    }
                }
                "TJ" => match operation.operands.first() {
                    Some(Object::Array(array)) => {
                        for (i, e) in array.iter().enumerate() {
                            match e {
                                Object::String(s, _) => {
                                    show_text(&mut gs, s, site(op_index, Some(i)), output);
                                }
                                Object::Integer(_) | Object::Real(_) => {
                                    adjust_text(&mut gs.ts, as_num(e).unwrap_or(0.));
                                }
                                _ => debug!("kind of {:?}", e),
                            }
                        }
                    }
                    _ => warn!("unexpected TJ operand {:?}", operation),
                },
                "Tj" | "'" | "\"" => {
                    let string_index = if operation.operator == "\"" { 2 } else { 0 };
                    if operation.operator == "\"" {
                        gs.ts.word_spacing = operand(operation, 0).unwrap_or(0.);
                        gs.ts.character_spacing = operand(operation, 1).unwrap_or(0.);
                    }
                    if operation.operator != "Tj" {
                        tlm = Transform2D::translation(0., -gs.ts.leading).then(&tlm);
                        gs.ts.tm = tlm;
                    }
                    match operation.operands.get(string_index) {
                        Some(Object::String(s, _)) => {
                            show_text(&mut gs, s, site(op_index, None), output);
                        }
                        _ => warn!("unexpected {} operand {:?}", operation.operator, operation),
                    }
                }
                "Tc" => gs.ts.character_spacing = operand(operation, 0).unwrap_or(0.),
                "Tw" => gs.ts.word_spacing = operand(operation, 0).unwrap_or(0.),
                "Tz" => gs.ts.horizontal_scaling = operand(operation, 0).unwrap_or(100.) / 100.,
                "TL" => gs.ts.leading = operand(operation, 0).unwrap_or(0.),
                "Ts" => gs.ts.rise = operand(operation, 0).unwrap_or(0.),
                "Tf" => {
                    let name = operation.operands.first().and_then(|n| n.as_name().ok());
                    gs.ts.font = name.and_then(|name| {
                        if let Some(font) = font_table.get(name) {
                            return Some(font.clone());
                        }
                        let font = maybe_get::<&Dictionary>(doc, resources, b"Font")
                            .and_then(|fonts| maybe_get::<&Dictionary>(doc, fonts, name))
                            .map(|dict| make_font(doc, dict));
                        match &font {
                            Some(font) => {
                                font_table.insert(name.to_vec(), font.clone());
                            }
                            None => warn!("font {} missing from resources", pdf_to_utf8(name)),
                        }
                        font
                    });
                    gs.ts.font_size = operand(operation, 1).unwrap_or(0.);
                    debug!("font size: {} {:?}", gs.ts.font_size, operation);
                }
                "Tm" => match matrix(&operation.operands) {
                    Some(m) => {
                        tlm = m;
                        gs.ts.tm = tlm;
                        debug!("Tm: matrix {:?}", gs.ts.tm);
                    }
                    None => warn!("malformed Tm {:?}", operation.operands),
                },
                "Td" | "TD" => {
                    let (Some(tx), Some(ty)) = (operand(operation, 0), operand(operation, 1))
                    else {
                        warn!("malformed {:?}", operation);
                        continue;
                    };
                    if operation.operator == "TD" {
                        gs.ts.leading = -ty;
                    }
                    tlm = Transform2D::translation(tx, ty).then(&tlm);
                    gs.ts.tm = tlm;
                    debug!("{} matrix {:?}", operation.operator, gs.ts.tm);
                }
                "T*" => {
                    tlm = Transform2D::translation(0., -gs.ts.leading).then(&tlm);
                    gs.ts.tm = tlm;
                }
                "Do" => {
                    let Some(name) = operation.operands.first().and_then(|n| n.as_name().ok())
                    else {
                        continue;
                    };
                    let xf = maybe_get::<&Dictionary>(doc, resources, b"XObject")
                        .and_then(|xobjects| maybe_get::<&Stream>(doc, xobjects, name));
                    match xf {
                        Some(xf) => self.process_form(xf, resources, &gs, output, depth),
                        None => debug!("XObject {} not found", pdf_to_utf8(name)),
                    }
                }
                _ => {}
            }
        }
    }

    // `Do` processes an entire subdocument, so we recurse with the form's
    // content and resources
    fn process_form(
        &mut self,
        xf: &'a Stream,
        resources: &'a Dictionary,
        gs: &GraphicsState<'a>,
        output: &mut GlyphOutput,
        depth: usize,
    ) {
        let doc = self.doc;
        if maybe_get_name(doc, &xf.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return;
        }
        if depth >= MAX_FORM_DEPTH {
            warn!("form XObjects nested deeper than {}, skipping", MAX_FORM_DEPTH);
            return;
        }
        let content = match Content::decode(&get_contents(xf)) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to decode form content: {}. Skipping.", e);
                return;
            }
        };
        let resources = maybe_get::<&Dictionary>(doc, &xf.dict, b"Resources").unwrap_or(resources);
        let mut gs = gs.clone();
        if let Some(m) = maybe_get_array(doc, &xf.dict, b"Matrix").and_then(|m| matrix(m)) {
            gs.ctm = m.then(&gs.ctm);
        }
        self.process_operations(&content.operations, resources, gs, output, false, depth + 1);
    }
}

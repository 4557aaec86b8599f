use std::ops::Range;

use euclid::{point2, vec2};

use crate::types::{BoundingBox, MediaBox, Point, Rgb, TextOutput, TextSpan, Transform};

/// Where a glyph's bytes live in the page content stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GlyphLocation {
    /// Index of the showing operation in the decoded page content.
    pub(crate) op_index: usize,
    /// Element of the `TJ` array holding the string, `None` for the other
    /// showing operators.
    pub(crate) element: Option<usize>,
    pub(crate) bytes: Range<usize>,
    /// Horizontal advance in thousandths of text space, the unit of `TJ`
    /// adjustments.
    pub(crate) advance_units: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Glyph {
    pub(crate) text: String,
    pub(crate) bbox: BoundingBox,
    pub(crate) origin: Point,
    pub(crate) font_name: String,
    pub(crate) size: f64,
    pub(crate) color: Rgb,
    pub(crate) location: Option<GlyphLocation>,
}

pub(crate) struct GlyphOutput {
    flip_ctm: Transform,
    glyphs: Vec<Glyph>,
}

impl GlyphOutput {
    pub(crate) fn new(media_box: &MediaBox) -> GlyphOutput {
        GlyphOutput {
            flip_ctm: media_box.flip(),
            glyphs: Vec::new(),
        }
    }

    /// Record one glyph. `trm` is the full text rendering matrix, font size
    /// included, so glyph space maps straight onto user space.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        ascent: f64,
        descent: f64,
        font_name: &str,
        color: Rgb,
        char: &str,
        location: Option<GlyphLocation>,
    ) {
        let position = trm.then(&self.flip_ctm);
        let corners = [
            point2(0., descent),
            point2(width, descent),
            point2(0., ascent),
            point2(width, ascent),
        ]
        .map(|p| position.transform_point(p));
        let bbox = corners[1..].iter().fold(
            BoundingBox::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y),
            |acc, p| acc.union(&BoundingBox::new(p.x, p.y, p.x, p.y)),
        );
        let size = trm.transform_vector(vec2(0., 1.)).length();

        let text = if char == "\t" { " " } else { char };

        self.glyphs.push(Glyph {
            text: text.to_owned(),
            bbox,
            origin: Point {
                x: position.m31,
                y: position.m32,
            },
            font_name: font_name.to_owned(),
            size,
            color,
            location,
        });
    }

    pub(crate) fn into_glyphs(self) -> Vec<Glyph> {
        self.glyphs
    }
}

/// One line of page text. Every char of `text` points back at the glyph
/// that produced it, or at nothing for inserted word gaps.
#[derive(Debug)]
struct Line {
    text: String,
    chars: Vec<(usize, Option<usize>)>,
}

impl Line {
    fn new() -> Line {
        Line {
            text: String::new(),
            chars: Vec::new(),
        }
    }

    fn push(&mut self, s: &str, glyph: Option<usize>) {
        for c in s.chars() {
            self.chars.push((self.text.len(), glyph));
            self.text.push(c);
        }
    }

    fn glyphs_in(&self, bytes: Range<usize>) -> impl Iterator<Item = usize> + '_ {
        self.chars
            .iter()
            .filter(move |(offset, _)| bytes.contains(offset))
            .filter_map(|(_, glyph)| *glyph)
    }
}

/// Glyphs of a page grouped into lines in content order, for text output
/// and substring search.
pub(crate) struct TextIndex<'g> {
    glyphs: &'g [Glyph],
    lines: Vec<Line>,
}

impl<'g> TextIndex<'g> {
    // A baseline shift larger than this ratio of the font size starts a new line
    const LINE_BREAK_RATIO: f64 = 0.5;
    // A gap larger than this ratio of the font size reads as a word space
    const CHAR_SPACE_THRESHOLD_RATIO: f64 = 0.15;

    pub(crate) fn new(glyphs: &'g [Glyph]) -> TextIndex<'g> {
        let mut lines = Vec::new();
        let mut line = Line::new();
        let mut last: Option<&Glyph> = None;

        for (i, glyph) in glyphs.iter().enumerate() {
            if glyph.text.is_empty() {
                continue;
            }
            if let Some(prev) = last {
                let size = prev.size.max(glyph.size);
                let y_gap = (glyph.origin.y - prev.origin.y).abs();
                let moved_back = glyph.origin.x < prev.origin.x - size;
                if y_gap > size * Self::LINE_BREAK_RATIO || moved_back {
                    lines.push(std::mem::replace(&mut line, Line::new()));
                } else {
                    let gap = glyph.bbox.l - prev.bbox.r;
                    let prev_is_space = prev.text.chars().all(char::is_whitespace);
                    let is_space = glyph.text.chars().all(char::is_whitespace);
                    if gap > size * Self::CHAR_SPACE_THRESHOLD_RATIO
                        && !prev_is_space
                        && !is_space
                    {
                        line.push(" ", None);
                    }
                }
            }
            line.push(&glyph.text, Some(i));
            last = Some(glyph);
        }
        if !line.chars.is_empty() {
            lines.push(line);
        }

        TextIndex { glyphs, lines }
    }

    /// Boxes of every occurrence of `needle`, line by line. Case-sensitive;
    /// an occurrence never spans two lines.
    pub(crate) fn search(&self, needle: &str) -> Vec<BoundingBox> {
        if needle.is_empty() {
            return Vec::new();
        }
        let mut found = Vec::new();
        for line in &self.lines {
            for (start, m) in line.text.match_indices(needle) {
                let rect = line
                    .glyphs_in(start..start + m.len())
                    .map(|g| self.glyphs[g].bbox)
                    .reduce(|a, b| a.union(&b));
                if let Some(rect) = rect {
                    found.push(rect);
                }
            }
        }
        found
    }

    /// Lines of styled spans. A span ends wherever font, size or color
    /// changes.
    pub(crate) fn text_output(&self, page_num: u32) -> TextOutput {
        let mut lines = Vec::new();
        for line in &self.lines {
            let mut spans: Vec<TextSpan> = Vec::new();
            for (offset, glyph) in &line.chars {
                let c = line.text[*offset..].chars().next().unwrap_or(' ');
                let Some(g) = glyph.map(|g| &self.glyphs[g]) else {
                    if let Some(span) = spans.last_mut() {
                        span.text.push(c);
                    }
                    continue;
                };
                match spans.last_mut() {
                    Some(span) if same_style(span, g) => {
                        span.text.push(c);
                        span.bbox = span.bbox.union(&g.bbox);
                    }
                    _ => spans.push(TextSpan {
                        text: c.to_string(),
                        bbox: g.bbox,
                        font_name: g.font_name.clone(),
                        font_size: g.size,
                        color: g.color,
                        page_num,
                    }),
                }
            }
            lines.push(spans);
        }
        TextOutput::from(lines)
    }
}

fn same_style(span: &TextSpan, glyph: &Glyph) -> bool {
    span.font_name == glyph.font_name
        && (span.font_size - glyph.size).abs() < 0.01
        && span.color == glyph.color
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn glyph(text: &str, x: f64, y: f64, size: f64) -> Glyph {
        let width = size * 0.5;
        Glyph {
            text: text.to_owned(),
            bbox: BoundingBox::new(x, y - size, x + width, y + size * 0.2),
            origin: Point { x, y },
            font_name: "Helvetica".to_owned(),
            size,
            color: Rgb::BLACK,
            location: None,
        }
    }

    fn word(s: &str, x: f64, y: f64) -> Vec<Glyph> {
        s.chars()
            .enumerate()
            .map(|(i, c)| glyph(&c.to_string(), x + i as f64 * 5., y, 10.))
            .collect()
    }

    #[test]
    fn gaps_become_spaces_and_baselines_split_lines() {
        let mut glyphs = word("hello", 10., 100.);
        glyphs.extend(word("world", 40., 100.));
        glyphs.extend(word("next", 10., 120.));
        let index = TextIndex::new(&glyphs);
        assert_eq!(index.text_output(0).to_string(), "hello world\nnext\n");
    }

    #[test]
    fn search_is_case_sensitive_and_finds_every_occurrence() {
        let glyphs = word("abcAbcabc", 0., 50.);
        let index = TextIndex::new(&glyphs);
        let found = index.search("abc");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].l, 0.);
        assert_eq!(found[0].r, 15.);
        assert_eq!(found[1].l, 30.);
        assert!(index.search("ABC").is_empty());
        assert!(index.search("").is_empty());
    }

    #[test]
    fn style_change_starts_a_span() {
        let mut glyphs = word("ab", 0., 50.);
        glyphs[1].color = Rgb::new(1., 0., 0.);
        let output = TextIndex::new(&glyphs).text_output(3);
        let line = &output.lines()[0];
        assert_eq!(line.len(), 2);
        assert_eq!(line[1].color, Rgb::new(1., 0., 0.));
        assert_eq!(line[1].page_num, 3);
    }

    #[test]
    fn glyph_box_follows_text_matrix() {
        let media_box = MediaBox {
            llx: 0.,
            lly: 0.,
            urx: 200.,
            ury: 100.,
        };
        let mut output = GlyphOutput::new(&media_box);
        // 10pt text at (20, 30) in PDF space
        let trm = Transform::new(10., 0., 0., 10., 20., 30.);
        output.output_character(&trm, 0.5, 1., -0.25, "F", Rgb::BLACK, "a", None);
        let g = &output.into_glyphs()[0];
        assert_eq!(g.origin, Point { x: 20., y: 70. });
        assert_eq!(g.size, 10.);
        assert_eq!(g.bbox, BoundingBox::new(20., 60., 25., 72.5));
    }

    #[test]
    fn offset_media_box_origin_is_its_top_left_corner() {
        let media_box = MediaBox {
            llx: 100.,
            lly: 50.,
            urx: 300.,
            ury: 150.,
        };
        let mut output = GlyphOutput::new(&media_box);
        let trm = Transform::new(10., 0., 0., 10., 120., 130.);
        output.output_character(&trm, 0.5, 1., 0., "F", Rgb::BLACK, "a", None);
        let g = &output.into_glyphs()[0];
        assert_eq!(g.origin, Point { x: 20., y: 20. });
        assert_eq!(media_box.to_user_space(g.origin), Point { x: 120., y: 130. });
    }
}

use std::fmt;

use euclid::Transform2D;

pub struct Space;
pub type Transform = Transform2D<f64, Space, Space>;

#[derive(Debug, Clone, Copy)]
pub struct MediaBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl MediaBox {
    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Maps PDF user space onto top-down page space, whose origin is the
    /// top-left corner of the box.
    pub(crate) fn flip(&self) -> Transform {
        Transform::new(1., 0., 0., -1., -self.llx, self.ury)
    }

    /// A top-down page space point in PDF user space.
    pub(crate) fn to_user_space(&self, p: Point) -> Point {
        Point {
            x: p.x + self.llx,
            y: self.ury - p.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned rectangle in top-down page space: `t < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub t: f64,
    pub r: f64,
    pub b: f64,
    pub l: f64,
}

impl BoundingBox {
    pub fn new(l: f64, t: f64, r: f64, b: f64) -> BoundingBox {
        BoundingBox {
            t: t.min(b),
            r: r.max(l),
            b: b.max(t),
            l: l.min(r),
        }
    }

    pub fn top_left(&self) -> Point {
        Point {
            x: self.l,
            y: self.t,
        }
    }

    pub fn bottom_right(&self) -> Point {
        Point {
            x: self.r,
            y: self.b,
        }
    }

    pub fn width(&self) -> f64 {
        self.r - self.l
    }

    pub fn height(&self) -> f64 {
        self.b - self.t
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.l + self.r) / 2.,
            y: (self.t + self.b) / 2.,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.l && p.x <= self.r && p.y >= self.t && p.y <= self.b
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            t: self.t.min(other.t),
            r: self.r.max(other.r),
            b: self.b.max(other.b),
            l: self.l.min(other.l),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0. && self.height() > 0.)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(t: {:.1}, r: {:.1}, b: {:.1}, l: {:.1})",
            self.t, self.r, self.b, self.l
        )
    }
}

/// A fill color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.,
        g: 0.,
        b: 0.,
    };
    pub const WHITE: Rgb = Rgb {
        r: 1.,
        g: 1.,
        b: 1.,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Rgb {
        Rgb {
            r: r.clamp(0., 1.),
            g: g.clamp(0., 1.),
            b: b.clamp(0., 1.),
        }
    }

    pub fn gray(g: f64) -> Rgb {
        Rgb::new(g, g, g)
    }

    /// Naive CMYK conversion, the same one PDF viewers use without a
    /// color profile.
    pub fn from_cmyk(c: f64, m: f64, y: f64, k: f64) -> Rgb {
        Rgb::new(
            1. - (c + k).min(1.),
            1. - (m + k).min(1.),
            1. - (y + k).min(1.),
        )
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({:.3}, {:.3}, {:.3})", self.r, self.g, self.b)
    }
}

/// Visual style recovered from existing text and reused for its replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct TextProperties {
    pub font: String,
    pub size: f64,
    pub color: Rgb,
}

impl TextProperties {
    pub const DEFAULT_FONT: &'static str = "helv";
    pub const DEFAULT_SIZE: f64 = 11.;
}

impl Default for TextProperties {
    fn default() -> Self {
        TextProperties {
            font: Self::DEFAULT_FONT.to_owned(),
            size: Self::DEFAULT_SIZE,
            color: Rgb::BLACK,
        }
    }
}

/// An occurrence of a searched string on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub page: usize,
    pub rect: BoundingBox,
}

/// A run of uniformly styled text on one line.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BoundingBox,
    pub font_name: String,
    pub font_size: f64,
    pub color: Rgb,
    pub page_num: u32,
}

pub type TextLine = Vec<TextSpan>;
pub type TextPage = Vec<TextLine>;

/// Structured text of a page: lines of styled spans in reading order.
#[derive(Debug, Clone, Default)]
pub struct TextOutput {
    lines: Vec<Vec<TextSpan>>,
}

impl TextOutput {
    /// Get a reference to the lines of text spans.
    pub fn lines(&self) -> &[Vec<TextSpan>] {
        &self.lines
    }

    /// Consume self and return the lines of text spans.
    pub fn into_lines(self) -> Vec<Vec<TextSpan>> {
        self.lines
    }

    pub fn first_span(&self) -> Option<&TextSpan> {
        self.lines.iter().find_map(|line| line.first())
    }
}

impl fmt::Display for TextOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            for span in line {
                write!(f, "{}", span.text)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl From<Vec<Vec<TextSpan>>> for TextOutput {
    fn from(lines: Vec<Vec<TextSpan>>) -> Self {
        TextOutput { lines }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_normalizes_corners() {
        let b = BoundingBox::new(10., 20., 5., 2.);
        assert_eq!((b.l, b.t, b.r, b.b), (5., 2., 10., 20.));
        assert!(b.contains(b.center()));
    }

    #[test]
    fn cmyk_black_is_black() {
        assert_eq!(Rgb::from_cmyk(0., 0., 0., 1.), Rgb::BLACK);
        assert_eq!(Rgb::from_cmyk(0., 0., 0., 0.), Rgb::WHITE);
    }

    #[test]
    fn default_properties() {
        let p = TextProperties::default();
        assert_eq!(p.font, "helv");
        assert_eq!(p.size, 11.);
        assert_eq!(p.color, Rgb::BLACK);
    }
}

//! Text positioning over page content streams
//! Author: kartik4091
//!
//! Tracks the graphics and text state of a content stream closely enough to
//! know where every shown byte lands in user space and how far it advances
//! the text matrix. Shown codes are decoded through the font so that markers
//! are matched on text, across operators of the same text object.

use std::ops::Range;

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use super::fonts::{number, FontMetrics, FontTable};

/// Affine matrix `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.a + y * self.c + self.e, x * self.b + y * self.d + self.f)
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let v: Vec<f32> = operands.iter().filter_map(number).collect();
        (v.len() == 6).then(|| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }
}

/// Text state parameters saved and restored with the graphics state
#[derive(Debug, Clone)]
struct TextParams {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextParams,
}

/// A shown glyph's box in user space, its advance for TJ adjustments and
/// the text it decodes to
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
    /// Horizontal advance in thousandths of a text space unit
    pub advance: f32,
    pub code: u32,
    pub text: String,
}

/// Every glyph shown by one text operator
#[derive(Debug, Clone)]
pub struct ShownText {
    pub op_index: usize,
    /// Counter of the enclosing `BT` ... `ET` text object
    pub block: usize,
    /// Font resource name in effect
    pub font: Vec<u8>,
    pub glyphs: Vec<Glyph>,
    /// Inside `/Artifact` marked content
    pub artifact: bool,
}

/// Axis-aligned rectangle in bottom-up user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ShownText {
    pub fn advances(&self) -> Vec<f32> {
        self.glyphs.iter().map(|g| g.advance).collect()
    }

    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }
}

/// One marker occurrence and the glyphs it covers
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerMatch {
    /// Index into the scanned list and the glyph range within that operator
    pub spans: Vec<(usize, Range<usize>)>,
    pub bounds: Rect,
}

// Share of the font size above and below the baseline used for glyph boxes
const ASCENT: f32 = 0.78;
const DESCENT: f32 = 0.22;

/// Walks content operations and records the placement of shown text
pub struct TextScanner<'a> {
    fonts: &'a FontTable,
}

impl<'a> TextScanner<'a> {
    pub fn new(fonts: &'a FontTable) -> Self {
        Self { fonts }
    }

    pub fn scan(&self, operations: &[Operation]) -> Vec<ShownText> {
        let mut shown = Vec::new();
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = GraphicsState {
            ctm: Matrix::IDENTITY,
            text: TextParams::default(),
        };
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;
        let mut marked: Vec<bool> = Vec::new();
        let mut block = 0usize;

        for (index, op) in operations.iter().enumerate() {
            let operands = op.operands.as_slice();
            let artifact = marked.last().copied().unwrap_or(false);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    block += 1;
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let [Object::Name(name), size] = operands {
                        gs.text.font = name.clone();
                        gs.text.size = number(size).unwrap_or(gs.text.size);
                    }
                }
                "Tc" => set_param(operands, &mut gs.text.char_spacing),
                "Tw" => set_param(operands, &mut gs.text.word_spacing),
                "TL" => set_param(operands, &mut gs.text.leading),
                "Ts" => set_param(operands, &mut gs.text.rise),
                "Tz" => {
                    if let Some(v) = operands.first().and_then(number) {
                        gs.text.h_scale = v / 100.0;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = operands {
                        let (tx, ty) = (number(tx).unwrap_or(0.0), number(ty).unwrap_or(0.0));
                        if op.operator == "TD" {
                            gs.text.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tm = m;
                        tlm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    shown.push(self.show((index, block), operands.get(..1).unwrap_or(&[]), &gs, &mut tm, artifact));
                }
                "TJ" => {
                    let elements = match operands.first() {
                        Some(Object::Array(items)) => items.as_slice(),
                        _ => &[],
                    };
                    shown.push(self.show((index, block), elements, &gs, &mut tm, artifact));
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    shown.push(self.show((index, block), operands.get(..1).unwrap_or(&[]), &gs, &mut tm, artifact));
                }
                "\"" => {
                    if let [aw, ac, string] = operands {
                        gs.text.word_spacing = number(aw).unwrap_or(gs.text.word_spacing);
                        gs.text.char_spacing = number(ac).unwrap_or(gs.text.char_spacing);
                        tlm = Matrix::translate(0.0, -gs.text.leading).then(&tlm);
                        tm = tlm;
                        shown.push(self.show((index, block), std::slice::from_ref(string), &gs, &mut tm, artifact));
                    }
                }
                "BMC" | "BDC" => {
                    let is_artifact = matches!(operands.first(), Some(Object::Name(tag)) if tag == b"Artifact");
                    marked.push(artifact || is_artifact);
                }
                "EMC" => {
                    marked.pop();
                }
                _ => {}
            }
        }
        shown
    }

    fn show(
        &self,
        (op_index, block): (usize, usize),
        elements: &[Object],
        gs: &GraphicsState,
        tm: &mut Matrix,
        artifact: bool,
    ) -> ShownText {
        let params = &gs.text;
        let metrics = self.fonts.get(&params.font);
        let mut glyphs = Vec::new();

        for element in elements {
            match element {
                Object::String(data, _) => {
                    for (code, len) in metrics.codes(data) {
                        let w0 = metrics.width(code);
                        // word spacing applies to the single-byte space only
                        let word = if len == 1 && code == 32 { params.word_spacing } else { 0.0 };
                        let spacing = params.char_spacing + word;
                        let tx = (w0 / 1000.0 * params.size + spacing) * params.h_scale;
                        let trm = tm.then(&gs.ctm);
                        let (ax, ay) = trm.apply(0.0, params.rise - DESCENT * params.size);
                        let (bx, by) = trm.apply(tx, params.rise + ASCENT * params.size);
                        let advance = if params.size != 0.0 {
                            w0 + spacing * 1000.0 / params.size
                        } else {
                            w0
                        };
                        glyphs.push(Glyph {
                            x0: ax.min(bx),
                            x1: ax.max(bx),
                            y0: ay.min(by),
                            y1: ay.max(by),
                            advance,
                            code,
                            text: metrics.decode(code),
                        });
                        *tm = Matrix::translate(tx, 0.0).then(tm);
                    }
                }
                other => {
                    if let Some(n) = number(other) {
                        let tx = -(n / 1000.0) * params.size * params.h_scale;
                        *tm = Matrix::translate(tx, 0.0).then(tm);
                    }
                }
            }
        }

        ShownText {
            op_index,
            block,
            font: params.font.clone(),
            glyphs,
            artifact,
        }
    }
}

fn set_param(operands: &[Object], target: &mut f32) {
    if let Some(v) = operands.first().and_then(number) {
        *target = v;
    }
}

/// Non-overlapping occurrences of `needle`
pub fn find_all<T: PartialEq>(haystack: &[T], needle: &[T]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return found;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack[i..i + needle.len()] == *needle {
            found.push(i..i + needle.len());
            i += needle.len();
        } else {
            i += 1;
        }
    }
    found
}

/// Decoded text of everything outside `/Artifact` marked content
pub fn visible_text(shown: &[ShownText]) -> String {
    shown.iter().filter(|s| !s.artifact).map(ShownText::text).collect()
}

/// Every occurrence of `marker` in the decoded text. Consecutive operators of
/// one text object are searched as a single run, so a marker split over
/// several `Tj`/`TJ` operators is still found.
pub fn find_marker(shown: &[ShownText], marker: &str) -> Vec<MarkerMatch> {
    let needle: Vec<char> = marker.chars().collect();
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }

    let mut start = 0;
    while start < shown.len() {
        let block = shown[start].block;
        let end = shown[start..]
            .iter()
            .position(|s| s.block != block)
            .map_or(shown.len(), |n| start + n);

        let mut chars = Vec::new();
        let mut owners = Vec::new();
        for (item_index, item) in shown.iter().enumerate().take(end).skip(start) {
            for (glyph_index, glyph) in item.glyphs.iter().enumerate() {
                for c in glyph.text.chars() {
                    chars.push(c);
                    owners.push((item_index, glyph_index));
                }
            }
        }
        for range in find_all(&chars[..], &needle[..]) {
            if let Some(found) = covering(shown, &owners[range]) {
                matches.push(found);
            }
        }
        start = end;
    }
    matches
}

/// Groups the owning glyphs of a match per operator
fn covering(shown: &[ShownText], owners: &[(usize, usize)]) -> Option<MarkerMatch> {
    let mut spans: Vec<(usize, Range<usize>)> = Vec::new();
    let mut bounds: Option<Rect> = None;
    for &(item, glyph) in owners {
        match spans.last_mut() {
            Some((last, range)) if *last == item => range.end = range.end.max(glyph + 1),
            _ => spans.push((item, glyph..glyph + 1)),
        }
        let g = &shown[item].glyphs[glyph];
        bounds = Some(match bounds {
            None => Rect {
                x0: g.x0,
                y0: g.y0,
                x1: g.x1,
                y1: g.y1,
            },
            Some(r) => Rect {
                x0: r.x0.min(g.x0),
                y0: r.y0.min(g.y0),
                x1: r.x1.max(g.x1),
                y1: r.y1.max(g.y1),
            },
        });
    }
    Some(MarkerMatch { spans, bounds: bounds? })
}

/// Rewrites one text-showing operation without the glyphs in `ranges`
/// (glyph indices, codes split with `metrics`).
///
/// The result is a `TJ` whose kerning numbers advance by exactly the width of
/// the removed glyphs, so the remaining text keeps its position. `'` and `"`
/// become their explicit line-advance and spacing operators first.
pub fn redact_operation(
    op: &Operation,
    ranges: &[Range<usize>],
    advances: &[f32],
    metrics: &FontMetrics,
) -> Vec<Operation> {
    let operands = op.operands.as_slice();
    let (mut out, elements): (Vec<Operation>, Vec<Object>) = match (op.operator.as_str(), operands) {
        ("Tj", [string, ..]) => (Vec::new(), vec![string.clone()]),
        ("TJ", [Object::Array(items), ..]) => (Vec::new(), items.clone()),
        ("'", [string, ..]) => (vec![Operation::new("T*", vec![])], vec![string.clone()]),
        ("\"", [aw, ac, string]) => (
            vec![
                Operation::new("Tw", vec![aw.clone()]),
                Operation::new("Tc", vec![ac.clone()]),
                Operation::new("T*", vec![]),
            ],
            vec![string.clone()],
        ),
        _ => return vec![op.clone()],
    };

    let mut array = Vec::new();
    let mut kept = Vec::new();
    let mut gap = 0.0f32;
    let mut pos = 0usize;

    for element in elements {
        match element {
            Object::String(data, format) => {
                let mut offset = 0;
                for (_, len) in metrics.codes(&data) {
                    let code = &data[offset..offset + len];
                    offset += len;
                    if ranges.iter().any(|r| r.contains(&pos)) {
                        flush_string(&mut array, &mut kept, &format);
                        gap += advances.get(pos).copied().unwrap_or(0.0);
                    } else {
                        if gap != 0.0 {
                            array.push(Object::Real((-gap).into()));
                            gap = 0.0;
                        }
                        kept.extend_from_slice(code);
                    }
                    pos += 1;
                }
                flush_string(&mut array, &mut kept, &format);
            }
            other => match number(&other) {
                Some(n) => {
                    array.push(Object::Real((n - gap).into()));
                    gap = 0.0;
                }
                None => array.push(other),
            },
        }
    }
    if gap != 0.0 {
        array.push(Object::Real((-gap).into()));
    }

    out.push(Operation::new("TJ", vec![Object::Array(array)]));
    out
}

fn flush_string(array: &mut Vec<Object>, kept: &mut Vec<u8>, format: &StringFormat) {
    if !kept.is_empty() {
        array.push(Object::String(std::mem::take(kept), format.clone()));
    }
}

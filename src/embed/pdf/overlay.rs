//! Overlay content: watermark, QR image, small print and tamper stamps
//! Author: kartik4091

use lopdf::content::Operation;
use lopdf::{dictionary, Object, Stream, StringFormat};

use super::fonts::helvetica_text_width;
use super::page::{flate_stream, PageBox};
use crate::config::WatermarkConfig;
use crate::error::Result;
use crate::qr::QrImage;

/// Resource names used by the overlay; prefixed to stay clear of existing names
pub const FONT: &str = "CsHelv";
pub const BOLD_FONT: &str = "CsHelvB";
pub const WATERMARK_STATE: &str = "CsWm";
pub const STAMP_STATE: &str = "CsStamp";
pub const QR_IMAGE: &str = "CsQr";

const INFO_FONT_SIZE: f32 = 6.0;
const LEGEND_FONT_SIZE: f32 = 5.0;
const LIGHT_GREY: f32 = 0.827;
const DARK_GREY: f32 = 0.663;
const GREY: f32 = 0.5;
const STAMP_TEXT: &str = "MODIFIED / TAMPERED";
const STAMP_BANNER: &str = "This document failed signature verification";

/// What goes onto one page next to the QR
#[derive(Debug, Clone)]
pub struct OverlaySpec<'a> {
    pub page: PageBox,
    /// Lower-left corner of the QR in user space
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub info_text: &'a str,
    pub legend: &'a str,
    pub watermark: &'a WatermarkConfig,
}

/// 8-bit DeviceGray image XObject of the QR symbol
pub fn qr_xobject(qr: &QrImage) -> Result<Stream> {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(qr.width() as i64),
        "Height" => Object::Integer(qr.width() as i64),
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => Object::Integer(8),
    };
    flate_stream(dict, qr.gray_pixels())
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

/// Latin-1 bytes for WinAnsi text; characters outside it become `?`
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u32 as u8 } else { b'?' })
        .collect()
}

fn text_line(font: &str, size: f32, x: f32, y: f32, text: &[u8]) -> Vec<Operation> {
    vec![
        op("BT", vec![]),
        op("Tf", vec![name(font), real(size)]),
        op("Td", vec![real(x), real(y)]),
        op("Tj", vec![Object::String(text.to_vec(), StringFormat::Literal)]),
        op("ET", vec![]),
    ]
}

/// Text centred on (cx, cy), rotated by `degrees`
fn rotated_centered(font: &str, size: f32, cx: f32, cy: f32, degrees: f32, offset: f32, text: &[u8]) -> Vec<Operation> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let width = helvetica_text_width(text, size);
    vec![
        op("BT", vec![]),
        op("Tf", vec![name(font), real(size)]),
        op("Tm", vec![real(cos), real(sin), real(-sin), real(cos), real(cx), real(cy)]),
        op("Td", vec![real(-width / 2.0), real(offset)]),
        op("Tj", vec![Object::String(text.to_vec(), StringFormat::Literal)]),
        op("ET", vec![]),
    ]
}

/// Operations drawing the certificate overlay, all inside `/Artifact` marked
/// content so text extraction and fingerprinting skip them.
pub fn certificate_overlay(spec: &OverlaySpec<'_>) -> Vec<Operation> {
    let mut ops = vec![op("BMC", vec![name("Artifact")]), op("q", vec![])];

    let wm = spec.watermark;
    if wm.enabled && !wm.text.is_empty() {
        let cx = spec.page.llx + spec.page.width() / 2.0;
        let cy = spec.page.lly + spec.page.height() / 2.0;
        ops.push(op("q", vec![]));
        ops.push(op("gs", vec![name(WATERMARK_STATE)]));
        ops.push(op("g", vec![real(LIGHT_GREY)]));
        ops.extend(rotated_centered(FONT, wm.font_size, cx, cy, 45.0, 0.0, &win_ansi(&wm.text)));
        if let Some(secondary) = wm.secondary_text.as_deref().filter(|s| !s.is_empty()) {
            ops.extend(rotated_centered(
                FONT,
                wm.font_size * 0.6,
                cx,
                cy,
                45.0,
                -wm.font_size * 1.5,
                &win_ansi(secondary),
            ));
        }
        ops.push(op("Q", vec![]));
    }

    ops.push(op("q", vec![]));
    ops.push(op(
        "cm",
        vec![real(spec.size), real(0.0), real(0.0), real(spec.size), real(spec.x), real(spec.y)],
    ));
    ops.push(op("Do", vec![name(QR_IMAGE)]));
    ops.push(op("Q", vec![]));

    // small print goes under the QR, or above it when the QR sits on the bottom edge
    let below = spec.y - INFO_FONT_SIZE - LEGEND_FONT_SIZE - 6.0 >= spec.page.lly;
    let (info_y, legend_y) = if below {
        (spec.y - INFO_FONT_SIZE - 2.0, spec.y - INFO_FONT_SIZE - LEGEND_FONT_SIZE - 4.0)
    } else {
        let top = spec.y + spec.size;
        (top + LEGEND_FONT_SIZE + 4.0, top + 2.0)
    };
    if !spec.info_text.is_empty() {
        ops.push(op("g", vec![real(DARK_GREY)]));
        ops.extend(text_line(FONT, INFO_FONT_SIZE, spec.x, info_y, &win_ansi(spec.info_text)));
    }
    if !spec.legend.is_empty() {
        ops.push(op("g", vec![real(GREY)]));
        ops.extend(text_line(FONT, LEGEND_FONT_SIZE, spec.x, legend_y, &win_ansi(spec.legend)));
    }

    ops.push(op("Q", vec![]));
    ops.push(op("EMC", vec![]));
    ops
}

/// Red diagonal stamp across the page plus a banner line at the top
pub fn tamper_overlay(page: PageBox) -> Vec<Operation> {
    let cx = page.llx + page.width() / 2.0;
    let cy = page.lly + page.height() / 2.0;
    let size = (page.width().min(page.height()) / 10.0).clamp(24.0, 72.0);

    let mut ops = vec![
        op("q", vec![]),
        op("gs", vec![name(STAMP_STATE)]),
        op("rg", vec![real(1.0), real(0.0), real(0.0)]),
    ];
    ops.extend(rotated_centered(BOLD_FONT, size, cx, cy, 45.0, 0.0, STAMP_TEXT.as_bytes()));
    ops.push(op("Q", vec![]));

    ops.push(op("q", vec![]));
    ops.push(op("rg", vec![real(0.8), real(0.0), real(0.0)]));
    ops.extend(text_line(
        BOLD_FONT,
        10.0,
        page.llx + 20.0,
        page.ury - 24.0,
        STAMP_BANNER.as_bytes(),
    ));
    ops.push(op("Q", vec![]));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatermarkConfig;

    fn spec(watermark: &WatermarkConfig, y: f32) -> OverlaySpec<'_> {
        OverlaySpec {
            page: PageBox {
                llx: 0.0,
                lly: 0.0,
                urx: 612.0,
                ury: 792.0,
            },
            x: 100.0,
            y,
            size: 60.0,
            info_text: "Verifiable certificate",
            legend: "Validated by Ñandú",
            watermark,
        }
    }

    #[test]
    fn test_overlay_is_marked_artifact() {
        let wm = WatermarkConfig::default();
        let ops = certificate_overlay(&spec(&wm, 300.0));
        assert_eq!(ops.first().unwrap().operator, "BMC");
        assert_eq!(ops.last().unwrap().operator, "EMC");
        assert!(ops.iter().any(|o| o.operator == "Do"));
        assert_eq!(ops.iter().filter(|o| o.operator == "gs").count(), 1);
    }

    #[test]
    fn test_small_print_moves_above_qr_at_page_bottom() {
        let wm = WatermarkConfig {
            enabled: false,
            ..WatermarkConfig::default()
        };
        let ops = certificate_overlay(&spec(&wm, 2.0));
        let ys: Vec<f32> = ops
            .iter()
            .filter(|o| o.operator == "Td")
            .filter_map(|o| super::super::fonts::number(&o.operands[1]))
            .collect();
        assert_eq!(ys.len(), 2);
        assert!(ys.iter().all(|y| *y > 62.0));
    }

    #[test]
    fn test_win_ansi_replaces_wide_characters() {
        assert_eq!(win_ansi("Ñ€"), vec![0xD1, b'?']);
    }
}

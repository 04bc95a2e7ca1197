//! QR rendering of signature bundles
//! Author: kartik4091
//! Created: 2025-06-04

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use qrcode::types::QrError as QrCodeError;
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::config::QrConfig;
use crate::error::{QrError, Result};

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Rendered QR symbol, kept only for the duration of one document
#[derive(Debug, Clone)]
pub struct QrImage {
    image: GrayImage,
    modules: usize,
}

impl QrImage {
    /// Side length in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Number of modules per side, quiet zone excluded
    pub fn modules(&self) -> usize {
        self.modules
    }

    /// Raw 8-bit grayscale samples, row-major
    pub fn gray_pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Encodes `text` with low error correction, `box_size` pixels per module and a
/// `border`-module quiet zone. Text that does not fit is an error, never truncated.
pub fn make_qr(text: &str, box_size: u32, border: u32) -> Result<QrImage> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::L).map_err(|e| match e {
        QrCodeError::DataTooLong => QrError::DataTooLong(text.len()),
        other => QrError::Encoding(other.to_string()),
    })?;

    let modules = code.width();
    let colors = code.to_colors();
    let box_size = box_size.max(1);
    let side = (modules as u32 + 2 * border) * box_size;

    let mut image = GrayImage::from_pixel(side, side, LIGHT);
    for (index, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let col = (index % modules) as u32 + border;
        let row = (index / modules) as u32 + border;
        for dy in 0..box_size {
            for dx in 0..box_size {
                image.put_pixel(col * box_size + dx, row * box_size + dy, DARK);
            }
        }
    }

    debug!("QR symbol: {} modules, {}px", modules, side);
    Ok(QrImage { image, modules })
}

/// Encodes with the session's QR settings
pub fn make_qr_with(text: &str, config: &QrConfig) -> Result<QrImage> {
    make_qr(text, config.box_size, config.border)
}

//! Screenshot capture: dump the board (plus active piece) to a 24-bit BMP.

use crate::board::{ActivePiece, Board, COLS, ROWS};
use crate::pieces::{PieceDef, Rgb};
use anyhow::Result;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description;

/// Pixels per board cell.
const SCALE: usize = 8;

const BG: Rgb = Rgb::new(0x10, 0x10, 0x18);

/// Write `dropblocks-screenshot_YYYY-MM-DD_HH-MM-SS.bmp` into the CWD and
/// return its path.
pub fn save(board: &Board, active: &ActivePiece, def: &PieceDef) -> Result<PathBuf> {
    let (w, h, pixels) = render(board, active, def);
    let bmp = encode_bmp(w, h, &pixels);
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let fmt = format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]")?;
    let path = PathBuf::from(format!("dropblocks-screenshot_{}.bmp", now.format(&fmt)?));
    std::fs::write(&path, bmp)?;
    Ok(path)
}

/// Rasterise the board at [`SCALE`] pixels per cell, active piece on top.
fn render(board: &Board, active: &ActivePiece, def: &PieceDef) -> (usize, usize, Vec<Rgb>) {
    let (w, h) = (COLS * SCALE, ROWS * SCALE);
    let mut pixels = vec![BG; w * h];
    let mut blit = |cx: i32, cy: i32, color: Rgb| {
        if cx < 0 || cx >= COLS as i32 || cy < 0 || cy >= ROWS as i32 {
            return;
        }
        for py in 0..SCALE {
            for px in 0..SCALE {
                let x = cx as usize * SCALE + px;
                let y = cy as usize * SCALE + py;
                pixels[y * w + x] = color;
            }
        }
    };
    for y in 0..ROWS {
        for x in 0..COLS {
            let cell = board.cell(x, y);
            if cell.is_filled() {
                blit(x as i32, y as i32, cell.color());
            }
        }
    }
    for &(cx, cy) in def.cells(active.rot) {
        blit(active.x + cx, active.y + cy, def.color);
    }
    (w, h, pixels)
}

/// Encode pixels (row 0 on top) as a bottom-up 24-bit BI_RGB bitmap.
fn encode_bmp(width: usize, height: usize, pixels: &[Rgb]) -> Vec<u8> {
    let row_bytes = width * 3;
    let padding = (4 - row_bytes % 4) % 4;
    let image_size = (row_bytes + padding) * height;
    let file_size = 54 + image_size;

    let mut out = Vec::with_capacity(file_size);
    // File header.
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&54u32.to_le_bytes());
    // BITMAPINFOHEADER.
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(image_size as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    // Pixel rows, bottom-up, BGR, padded to 4 bytes.
    for y in (0..height).rev() {
        for x in 0..width {
            let p = pixels[y * width + x];
            out.extend_from_slice(&[p.b, p.g, p.r]);
        }
        out.extend(std::iter::repeat_n(0u8, padding));
    }
    out
}

//! PNG encoding for rasterised charts.
//!
//! Two colour types are written:
//! - **Indexed (type 3)** when the image has at most 256 distinct colours,
//!   which is typical for flat charts without anti-aliased text.
//! - **RGBA (type 6)** otherwise.

use std::collections::HashMap;
use std::io::Write;

use rayon::prelude::*;

use crate::error::{RenderError, RenderResult};

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

/// Images at least this many pixels scan for distinct colours in parallel.
const PARALLEL_THRESHOLD: usize = 64 * 64;

type Rgba = [u8; 4];

/// Encode RGBA pixels, choosing indexed output when the colours fit.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_len(pixels, width, height, 4)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

/// Encode RGBA pixels as colour type 6.
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_len(pixels, width, height, 4)?;
    let mut png = Vec::with_capacity(pixels.len() / 2);
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 6));
    write_chunk(&mut png, b"IDAT", &deflate_rows(pixels, width * 4, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode palette indices as colour type 3. A tRNS chunk is written only
/// when some palette entry is not opaque.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[Rgba],
    indices: &[u8],
) -> RenderResult<Vec<u8>> {
    check_len(indices, width, height, 1)?;
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(RenderError::InvalidChart(format!(
            "palette of {} colours",
            palette.len()
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &deflate_rows(indices, width, height)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn check_len(data: &[u8], width: usize, height: usize, bytes_per_pixel: usize) -> RenderResult<()> {
    if width == 0 || height == 0 || data.len() != width * height * bytes_per_pixel {
        return Err(RenderError::ImageSize {
            width: width as u32,
            height: height as u32,
        });
    }
    Ok(())
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    // bit depth, colour type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    ihdr
}

/// Prefix every scanline with filter type 0 and zlib-compress the result.
fn deflate_rows(data: &[u8], row_bytes: usize, height: usize) -> RenderResult<Vec<u8>> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Distinct colours in first-seen order, or `None` past the palette limit.
fn distinct_colors(pixels: &[u8]) -> Option<Vec<Rgba>> {
    let mut seen: HashMap<Rgba, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
    for px in pixels.chunks_exact(4) {
        let color = [px[0], px[1], px[2], px[3]];
        if seen.insert(color, ()).is_none() {
            if colors.len() == MAX_PALETTE_SIZE {
                return None;
            }
            colors.push(color);
        }
    }
    Some(colors)
}

/// Build a palette and per-pixel indices when the image has at most 256
/// colours. Large images are scanned in parallel chunks.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<Rgba>, Vec<u8>)> {
    let pixel_count = pixels.len() / 4;

    let palette = if pixel_count >= PARALLEL_THRESHOLD {
        let chunk = (pixel_count / rayon::current_num_threads()).max(256) * 4;
        let per_chunk: Vec<Vec<Rgba>> = pixels
            .par_chunks(chunk)
            .map(distinct_colors)
            .collect::<Option<Vec<_>>>()?;
        let mut merged = Vec::with_capacity(MAX_PALETTE_SIZE);
        for color in per_chunk.into_iter().flatten() {
            if !merged.contains(&color) {
                if merged.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                merged.push(color);
            }
        }
        merged
    } else {
        distinct_colors(pixels)?
    };

    let lookup: HashMap<Rgba, u8> = palette
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u8))
        .collect();
    let indices = pixels
        .par_chunks_exact(4)
        .map(|px| lookup.get(&[px[0], px[1], px[2], px[3]]).copied().unwrap_or(0))
        .collect();

    Some((palette, indices))
}

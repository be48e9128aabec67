//! SVG to PNG rasterisation with resvg.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::png::create_png_auto;

/// System fonts, loaded once. Text renders without glyphs when none exist.
fn font_database() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            debug!(faces = db.len(), "loaded system fonts");
            Arc::new(db)
        })
        .clone()
}

/// Rasterise an SVG document onto a white background and encode it as PNG.
pub fn svg_to_png(svg: &str) -> RenderResult<Vec<u8>> {
    let mut opt = usvg::Options::default();
    opt.fontdb = font_database();
    let tree = usvg::Tree::from_str(svg, &opt)?;

    let size = tree.size();
    let width = size.width().ceil() as u32;
    let height = size.height().ceil() as u32;
    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(RenderError::ImageSize { width, height })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; PNG wants straight alpha.
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    create_png_auto(&rgba, width as usize, height as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterise_shapes() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
            <rect x="0" y="0" width="10" height="10" fill="#0000ff"/>
        </svg>"##;
        let png = svg_to_png(svg).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        // IHDR width and height
        assert_eq!(&png[16..20], &20u32.to_be_bytes());
        assert_eq!(&png[20..24], &10u32.to_be_bytes());
    }

    #[test]
    fn test_invalid_svg() {
        assert!(matches!(svg_to_png("<not-svg"), Err(RenderError::Svg(_))));
    }
}

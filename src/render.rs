use ab_glyph::{Font, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use rand::{Rng, rngs::SmallRng, seq::IndexedRandom};

use crate::{
    geom::{BoxesMap, GlyphBox, Region},
    resources::{Resources, SizedFont},
};

pub const TEXT_LENGTH_MAX: usize = 20;

/// Rows sampled when probing a region's average color.
const COLOR_STRIP_ROWS: u32 = 20;

const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Pick a draw color that contrasts with the image patch at (x0, y0, w, h).
///
/// Samples a strip at most 20 rows tall, averages each channel, then maps
/// the average: [64,128] -> 255, (128,192] -> 0, otherwise 255 - value.
pub fn contrast_color(img: &RgbImage, x0: u32, y0: u32, w: u32, h: u32) -> Option<Rgb<u8>> {
    if w == 0 || h == 0 || x0 >= img.width() || y0 >= img.height() {
        return None;
    }
    let x1 = (x0 + w).min(img.width());
    let y1 = (y0 + h.min(COLOR_STRIP_ROWS)).min(img.height());

    let mut sums = [0u64; 3];
    for y in y0..y1 {
        for x in x0..x1 {
            let px = img.get_pixel(x, y);
            for (sum, &c) in sums.iter_mut().zip(px.0.iter()) {
                *sum += u64::from(c);
            }
        }
    }
    let count = u64::from(x1 - x0) * u64::from(y1 - y0);
    let mut out = [0u8; 3];
    for (o, sum) in out.iter_mut().zip(sums) {
        *o = invert_channel((sum / count) as u8);
    }
    Some(Rgb(out))
}

fn invert_channel(c: u8) -> u8 {
    match c {
        64..=128 => 255,
        129..=192 => 0,
        _ => 255 - c,
    }
}

/// Placement options for one text run.
#[derive(Default)]
pub struct PlaceOpts<'a> {
    /// Explicit text; `None` draws a random string over the charset.
    pub text: Option<&'a str>,
    /// Explicit font handle; `None` picks one uniformly at random.
    pub font: Option<&'a SizedFont>,
    /// Explicit draw color; `None` derives one from the region.
    pub color: Option<Rgb<u8>>,
    /// Random horizontal start offset up to a quarter of the region width.
    pub random_offset: bool,
    /// Draw a hollow rectangle around every placed glyph (debug aid).
    pub draw_boxes: bool,
}

/// Result of one placement: consumed extent plus the recorded boxes.
pub struct Placed {
    pub width: u32,
    pub height: u32,
    pub boxes: BoxesMap,
}

impl Placed {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            boxes: BoxesMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Draw a run of glyphs left to right inside `region`, stopping before the
/// first glyph that would cross the right or bottom edge. Partial runs are
/// allowed; a region too small for a single glyph yields a zero-size result.
pub fn place_text(
    img: &mut RgbImage,
    region: Region,
    res: &Resources,
    opts: &PlaceOpts,
    rng: &mut SmallRng,
) -> Placed {
    if region.w == 0 || region.h == 0 {
        return Placed::empty();
    }
    let x_offset = if opts.random_offset {
        rng.random_range(0..=region.w / 4)
    } else {
        0
    };
    let x1 = region.x + x_offset;
    let y1 = region.y;
    let w = region.w - x_offset;
    let h = region.h;
    if w == 0 || h == 0 {
        return Placed::empty();
    }

    let sized = opts.font.unwrap_or_else(|| res.random_font(rng));
    let scale = PxScale::from(sized.px as f32);
    let scaled = sized.font.as_scaled(scale);
    let line_h = scaled.height().ceil() as u32;
    if line_h == 0 {
        return Placed::empty();
    }

    let text = match opts.text {
        Some(t) => t.to_string(),
        None => random_text(res, rng),
    };
    let color = opts
        .color
        .or_else(|| contrast_color(img, x1, y1, w, h))
        .unwrap_or(Rgb([0, 0, 0]));
    log::debug!(
        "placing {:?} with {} at {}px in ({},{} {}x{})",
        text,
        sized.file,
        sized.px,
        x1,
        y1,
        w,
        h
    );

    let x_max = region.x + region.w;
    let y_max = region.y + region.h;
    let mut boxes = BoxesMap::new();
    let mut cursor = x1;
    let mut width = 0u32;
    let mut height = 0u32;
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        let glyph_w = scaled.h_advance(sized.font.glyph_id(ch)).ceil() as u32;
        if glyph_w == 0 {
            // zero-advance glyph, nothing to box
            continue;
        }
        let x2 = cursor + glyph_w;
        let y2 = y1 + line_h;
        if x2 >= x_max || y2 >= y_max {
            break;
        }
        draw_text_mut(
            img,
            color,
            cursor as i32,
            y1 as i32,
            scale,
            &sized.font,
            ch.encode_utf8(&mut buf),
        );
        boxes
            .entry(ch.to_string())
            .or_default()
            .push(GlyphBox::new(cursor, y1, x2, y2));
        if opts.draw_boxes {
            draw_hollow_rect_mut(
                img,
                Rect::at(cursor as i32, y1 as i32).of_size(glyph_w.max(1), line_h.max(1)),
                OUTLINE_COLOR,
            );
        }
        if width == 0 {
            width = x_offset;
        }
        width += glyph_w;
        height = height.max(line_h);
        cursor = x2;
    }

    Placed {
        width,
        height,
        boxes,
    }
}

fn random_text(res: &Resources, rng: &mut SmallRng) -> String {
    let len = rng.random_range(1..=TEXT_LENGTH_MAX);
    (0..len)
        .filter_map(|_| res.chars.choose(rng))
        .collect()
}

use image::{RgbImage, imageops};
use log::debug;
use rand::{Rng, rngs::SmallRng, seq::IndexedRandom};

use crate::{
    config::SizeSpec,
    geom::{BoxesMap, Region, merge_boxes},
    render::{PlaceOpts, place_text},
    resources::Resources,
};

/// Pixels reserved on each axis when cropping a background, to keep edge
/// artifacts out of the canvas.
pub const CANVAS_MARGIN: u32 = 5;

/// Crop a randomly positioned `size` region out of a random background.
/// Returns `None` when the chosen background, minus the margin, cannot hold
/// the requested size; the caller treats that as a skipped attempt.
pub fn crop_canvas(res: &Resources, size: SizeSpec, rng: &mut SmallRng) -> Option<RgbImage> {
    let (bg_name, bg) = res.backgrounds.choose(rng)?;
    let (bg_w, bg_h) = bg.dimensions();
    if bg_w <= CANVAS_MARGIN || bg_h <= CANVAS_MARGIN {
        debug!("background {bg_name} is smaller than the reserved margin");
        return None;
    }
    let usable_w = bg_w - CANVAS_MARGIN;
    let usable_h = bg_h - CANVAS_MARGIN;
    if usable_w < size.w || usable_h < size.h {
        debug!(
            "background {bg_name} ({bg_w}x{bg_h}) cannot hold a {}x{} canvas after margin",
            size.w, size.h
        );
        return None;
    }
    let x = rng.random_range(CANVAS_MARGIN..=CANVAS_MARGIN + (usable_w - size.w));
    let y = rng.random_range(CANVAS_MARGIN..=CANVAS_MARGIN + (usable_h - size.h));
    Some(imageops::crop_imm(bg, x, y, size.w, size.h).to_image())
}

/// Build one annotated sample: crop a canvas, then lay out text lines top to
/// bottom with random gaps and optional unlabeled noise around each line.
/// The loop is bounded by canvas height since every iteration either consumes
/// positive height or terminates.
pub fn compose_sample(
    res: &Resources,
    rng: &mut SmallRng,
    draw_boxes: bool,
) -> Option<(RgbImage, BoxesMap)> {
    let &(_, size) = res.sizes.choose(rng)?;
    let mut img = crop_canvas(res, size, rng)?;

    let w0 = size.w;
    let mut h0 = size.h;
    let mut y0 = 0u32;
    let mut all_boxes = BoxesMap::new();

    let mut placed = place_text(
        &mut img,
        Region { x: 0, y: 0, w: w0, h: h0 },
        res,
        &PlaceOpts { random_offset: true, draw_boxes, ..Default::default() },
        rng,
    );
    let mut line_h = placed.height;
    merge_boxes(&mut all_boxes, std::mem::take(&mut placed.boxes));

    while !placed.is_empty() {
        if h0 <= line_h {
            break;
        }
        h0 -= line_h;
        let gap = rng.random_range(0..=h0 / 3);
        h0 -= gap;
        y0 += line_h + gap;

        let mut line_w = 0u32;
        line_h = 0;

        // Noise before the main text: fixed position, boxes discarded so the
        // detector never learns noise as a label.
        if let Some(noise) = res.noise.choose(rng).filter(|n| !n.is_empty()) {
            let p = place_text(
                &mut img,
                Region { x: 0, y: y0, w: w0, h: h0 },
                res,
                &PlaceOpts { text: Some(noise), ..Default::default() },
                rng,
            );
            if p.is_empty() {
                break;
            }
            line_w += p.width;
            line_h = line_h.max(p.height);
        }

        placed = place_text(
            &mut img,
            Region { x: line_w, y: y0, w: w0.saturating_sub(line_w), h: h0 },
            res,
            &PlaceOpts { random_offset: true, draw_boxes, ..Default::default() },
            rng,
        );
        merge_boxes(&mut all_boxes, std::mem::take(&mut placed.boxes));
        if placed.is_empty() {
            break;
        }
        line_w += placed.width;
        line_h = line_h.max(placed.height);

        // Noise after the main text, same rules as before it.
        if let Some(noise) = res.noise.choose(rng).filter(|n| !n.is_empty()) {
            let p = place_text(
                &mut img,
                Region { x: line_w, y: y0, w: w0.saturating_sub(line_w), h: h0 },
                res,
                &PlaceOpts { text: Some(noise), ..Default::default() },
                rng,
            );
            if p.is_empty() {
                break;
            }
            line_h = line_h.max(p.height);
        }
    }

    debug_assert!(
        all_boxes
            .values()
            .flatten()
            .all(|b| b.fits_within(size.w, size.h))
    );
    Some((img, all_boxes))
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;

    use super::*;
    use crate::resources::test_font;

    fn resources_with_bg(w: u32, h: u32) -> Resources {
        Resources {
            backgrounds: vec![("bg".to_string(), RgbImage::from_pixel(w, h, Rgb([20, 20, 20])))],
            fonts: vec![],
            chars: vec!['a'],
            noise: vec![],
            sizes: vec![("50*50".to_string(), SizeSpec { w: 50, h: 50 })],
        }
    }

    #[test]
    fn margin_adjusted_exact_fit_produces_the_single_possible_crop() {
        let res = resources_with_bg(55, 55);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..10 {
            let canvas = crop_canvas(&res, SizeSpec { w: 50, h: 50 }, &mut rng)
                .expect("55x55 background must fit a 50x50 canvas");
            assert_eq!(canvas.dimensions(), (50, 50));
        }
    }

    #[test]
    fn background_without_margin_headroom_is_rejected() {
        let res = resources_with_bg(50, 50);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(crop_canvas(&res, SizeSpec { w: 50, h: 50 }, &mut rng).is_none());
    }

    #[test]
    fn tiny_background_is_rejected() {
        let res = resources_with_bg(4, 4);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(crop_canvas(&res, SizeSpec { w: 1, h: 1 }, &mut rng).is_none());
    }

    #[test]
    fn crop_stays_inside_background() {
        let res = resources_with_bg(200, 120);
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..50 {
            let canvas = crop_canvas(&res, SizeSpec { w: 60, h: 40 }, &mut rng).unwrap();
            assert_eq!(canvas.dimensions(), (60, 40));
        }
    }

    fn drawable_resources() -> Resources {
        Resources {
            backgrounds: vec![(
                "bg".to_string(),
                RgbImage::from_pixel(120, 100, Rgb([30, 30, 30])),
            )],
            fonts: vec![test_font()],
            chars: vec!['a', 'b'],
            noise: vec!["zz".to_string()],
            sizes: vec![("80*70".to_string(), SizeSpec { w: 80, h: 70 })],
        }
    }

    #[test]
    fn samples_carry_only_charset_labels_with_in_bounds_boxes() {
        let res = drawable_resources();
        let mut total = 0usize;
        for seed in 0..50 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let (img, boxes) = compose_sample(&res, &mut rng, false)
                .expect("120x100 background always fits an 80x70 canvas");
            assert_eq!(img.dimensions(), (80, 70));
            for (label, bs) in &boxes {
                // noise text is drawn but must never be labeled
                assert!(label == "a" || label == "b", "unexpected label {label:?}");
                for b in bs {
                    assert!(b.fits_within(80, 70));
                    total += 1;
                }
            }
        }
        assert!(total > 0, "no glyph was ever recorded across 50 seeds");
    }
}

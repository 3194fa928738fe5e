use std::collections::HashMap;

/// Axis-aligned glyph bounding box in canvas pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlyphBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl GlyphBox {
    pub fn new(xmin: u32, ymin: u32, xmax: u32, ymax: u32) -> Self {
        debug_assert!(xmin <= xmax && ymin <= ymax);
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax && self.xmax <= width && self.ymax <= height
    }
}

/// Label -> boxes, per-label order is draw order.
pub type BoxesMap = HashMap<String, Vec<GlyphBox>>;

/// Append `from` into `into`; repeated labels extend the existing sequence.
pub fn merge_boxes(into: &mut BoxesMap, from: BoxesMap) {
    for (label, mut boxes) in from {
        into.entry(label).or_default().append(&mut boxes);
    }
}

/// Rectangular placement region on a canvas.
#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_appends_for_repeated_labels() {
        let mut all = BoxesMap::new();
        let mut first = BoxesMap::new();
        first.insert("a".to_string(), vec![GlyphBox::new(0, 0, 5, 10)]);
        let mut second = BoxesMap::new();
        second.insert("a".to_string(), vec![GlyphBox::new(5, 0, 10, 10)]);
        second.insert("b".to_string(), vec![GlyphBox::new(10, 0, 15, 10)]);

        merge_boxes(&mut all, first);
        merge_boxes(&mut all, second);

        assert_eq!(all["a"].len(), 2);
        assert_eq!(all["a"][0], GlyphBox::new(0, 0, 5, 10));
        assert_eq!(all["a"][1], GlyphBox::new(5, 0, 10, 10));
        assert_eq!(all["b"].len(), 1);
    }

    #[test]
    fn fits_within_rejects_degenerate_and_out_of_bounds() {
        assert!(GlyphBox::new(0, 0, 10, 10).fits_within(10, 10));
        assert!(!GlyphBox::new(0, 0, 11, 10).fits_within(10, 10));
        assert!(!GlyphBox::new(3, 3, 3, 8).fits_within(10, 10));
    }
}

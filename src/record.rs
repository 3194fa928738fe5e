use std::fmt::Write;

use crate::geom::{BoxesMap, GlyphBox};

/// One Pascal-VOC annotation record for a generated image.
pub struct VocAnnotation<'a> {
    pub filename: &'a str,
    pub rel_path: String,
    pub width: u32,
    pub height: u32,
    pub boxes: &'a BoxesMap,
}

impl VocAnnotation<'_> {
    /// Pretty-printed VOC XML, two-space indent. Objects follow map order;
    /// boxes within a label keep draw order.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<annotation>");
        let _ = writeln!(out, "  <folder>Annotation</folder>");
        let _ = writeln!(out, "  <filename>{}</filename>", self.filename);
        let _ = writeln!(out, "  <path>{}</path>", self.rel_path);
        let _ = writeln!(out, "  <source>");
        let _ = writeln!(out, "    <database>Unknown</database>");
        let _ = writeln!(out, "  </source>");
        let _ = writeln!(out, "  <size>");
        let _ = writeln!(out, "    <width>{}</width>", self.width);
        let _ = writeln!(out, "    <height>{}</height>", self.height);
        let _ = writeln!(out, "    <depth>3</depth>");
        let _ = writeln!(out, "  </size>");
        let _ = writeln!(out, "  <segmented>0</segmented>");
        for (label, boxes) in self.boxes {
            for b in boxes {
                write_object(&mut out, label, b);
            }
        }
        let _ = writeln!(out, "</annotation>");
        out
    }
}

fn write_object(out: &mut String, label: &str, b: &GlyphBox) {
    let _ = writeln!(out, "  <object>");
    let _ = writeln!(out, "    <name>{}</name>", escape(label));
    let _ = writeln!(out, "    <pose>Unspecified</pose>");
    let _ = writeln!(out, "    <bndbox>");
    let _ = writeln!(out, "      <xmin>{}</xmin>", b.xmin);
    let _ = writeln!(out, "      <ymin>{}</ymin>", b.ymin);
    let _ = writeln!(out, "      <xmax>{}</xmax>", b.xmax);
    let _ = writeln!(out, "      <ymax>{}</ymax>", b.ymax);
    let _ = writeln!(out, "    </bndbox>");
    let _ = writeln!(out, "    <difficult>0</difficult>");
    let _ = writeln!(out, "  </object>");
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

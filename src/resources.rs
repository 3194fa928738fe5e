use std::{
    fs,
    path::{Path, PathBuf},
};

use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use log::{info, warn};
use rand::{rngs::SmallRng, seq::IndexedRandom};
use thiserror::Error;

use crate::config::{ConfigError, GenConfig, SizeSpec};

const SOLID_BG_SIZE: u32 = 2000;
const SOLID_BG_COLORS: [[u8; 3]; 2] = [[188, 188, 188], [255, 255, 255]];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read background directory {path}: {source}")]
    BgDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read font file {path}: {source}")]
    FontIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse font file {path}")]
    FontParse { path: PathBuf },
    #[error("no (font file, size) combinations configured")]
    NoFonts,
    #[error("character set is empty")]
    EmptyCharset,
    #[error("no permitted image sizes configured")]
    NoSizes,
    #[error(transparent)]
    Size(#[from] ConfigError),
}

/// One font file rendered at one pixel size.
#[derive(Debug)]
pub struct SizedFont {
    pub file: String,
    pub px: u32,
    pub font: FontArc,
}

/// Everything one generation run draws from. Immutable after load.
pub struct Resources {
    pub backgrounds: Vec<(String, RgbImage)>,
    pub fonts: Vec<SizedFont>,
    pub chars: Vec<char>,
    pub noise: Vec<String>,
    pub sizes: Vec<(String, SizeSpec)>,
}

impl Resources {
    pub fn load(cfg: &GenConfig) -> Result<Self, LoadError> {
        let chars: Vec<char> = cfg.chars.chars().collect();
        if chars.is_empty() {
            return Err(LoadError::EmptyCharset);
        }

        let mut sizes = Vec::with_capacity(cfg.image_sizes.len());
        for name in &cfg.image_sizes {
            sizes.push((name.clone(), SizeSpec::parse(name)?));
        }
        if sizes.is_empty() {
            return Err(LoadError::NoSizes);
        }

        let backgrounds = load_backgrounds(&cfg.bg_path)?;
        let fonts = load_fonts(&cfg.font_files, &cfg.font_sizes)?;

        info!(
            "loaded {} backgrounds, {} sized fonts, {} chars, {} noise phrases, {} sizes",
            backgrounds.len(),
            fonts.len(),
            chars.len(),
            cfg.noise_text.len(),
            sizes.len()
        );

        Ok(Self {
            backgrounds,
            fonts,
            chars,
            noise: cfg.noise_text.clone(),
            sizes,
        })
    }

    pub fn random_font(&self, rng: &mut SmallRng) -> &SizedFont {
        // load() guarantees at least one handle
        self.fonts.choose(rng).unwrap()
    }
}

fn load_backgrounds(dir: &Path) -> Result<Vec<(String, RgbImage)>, LoadError> {
    let mut backgrounds = Vec::new();
    scan_bg_dir(dir, &mut backgrounds)?;

    // Two solid canvases so a run works even with an empty directory.
    for color in SOLID_BG_COLORS {
        let name = format!("solid({},{},{})", color[0], color[1], color[2]);
        backgrounds.push((name, RgbImage::from_pixel(SOLID_BG_SIZE, SOLID_BG_SIZE, Rgb(color))));
    }
    Ok(backgrounds)
}

fn scan_bg_dir(dir: &Path, out: &mut Vec<(String, RgbImage)>) -> Result<(), LoadError> {
    let entries = fs::read_dir(dir).map_err(|source| LoadError::BgDir {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            scan_bg_dir(&path, out)?;
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        if !matches!(ext.as_deref(), Some("jpg" | "jpeg" | "gif" | "png")) {
            warn!("skipping non-image background file {}", path.display());
            continue;
        }
        match image::open(&path) {
            Ok(img) => out.push((path.display().to_string(), img.to_rgb8())),
            Err(err) => warn!("skipping unreadable background {}: {err}", path.display()),
        }
    }
    Ok(())
}

fn load_fonts(files: &[PathBuf], sizes: &[u32]) -> Result<Vec<SizedFont>, LoadError> {
    let mut fonts = Vec::with_capacity(files.len() * sizes.len());
    for file in files {
        let bytes = fs::read(file).map_err(|source| LoadError::FontIo {
            path: file.clone(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|_| LoadError::FontParse {
            path: file.clone(),
        })?;
        // Distinct handle per (file, size); sizes for one file coexist.
        for &px in sizes {
            fonts.push(SizedFont {
                file: file.display().to_string(),
                px,
                font: font.clone(),
            });
        }
    }
    if fonts.is_empty() {
        return Err(LoadError::NoFonts);
    }
    Ok(fonts)
}

#[cfg(test)]
pub(crate) fn test_font() -> SizedFont {
    let bytes: &'static [u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSans.ttf"));
    SizedFont {
        file: "assets/fonts/DejaVuSans.ttf".to_string(),
        px: 16,
        font: FontArc::try_from_slice(bytes).unwrap(),
    }
}

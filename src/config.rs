use std::{fs::File, io::BufReader, path::{Path, PathBuf}};

use serde::Deserialize;
use thiserror::Error;

pub const WIDTH_MAX: u32 = 5000;
pub const HEIGHT_MAX: u32 = 5000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("bad image size {0:?}, expected \"<width>*<height>\"")]
    BadSize(String),
    #[error("image size {0:?} exceeds {WIDTH_MAX}x{HEIGHT_MAX}")]
    SizeTooLarge(String),
}

/// Generation configuration, deserialized from a config.json file.
#[derive(Debug, Deserialize)]
pub struct GenConfig {
    #[serde(rename = "BGPath")]
    pub bg_path: PathBuf,
    #[serde(rename = "FontFiles")]
    pub font_files: Vec<PathBuf>,
    #[serde(rename = "FontSizes")]
    pub font_sizes: Vec<u32>,
    #[serde(rename = "Chars")]
    pub chars: String,
    #[serde(rename = "NoiseText", default)]
    pub noise_text: Vec<String>,
    #[serde(rename = "ImageSizes")]
    pub image_sizes: Vec<String>,
}

impl GenConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One permitted output canvas size, parsed from a "<width>*<height>" string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeSpec {
    pub w: u32,
    pub h: u32,
}

impl SizeSpec {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let (w, h) = s
            .split_once('*')
            .ok_or_else(|| ConfigError::BadSize(s.to_string()))?;
        let w: u32 = w
            .trim()
            .parse()
            .map_err(|_| ConfigError::BadSize(s.to_string()))?;
        let h: u32 = h
            .trim()
            .parse()
            .map_err(|_| ConfigError::BadSize(s.to_string()))?;
        if w == 0 || h == 0 {
            return Err(ConfigError::BadSize(s.to_string()));
        }
        if w > WIDTH_MAX || h > HEIGHT_MAX {
            return Err(ConfigError::SizeTooLarge(s.to_string()));
        }
        Ok(Self { w, h })
    }
}

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use image::RgbImage;
use log::{info, warn};
use rand::{rngs::SmallRng, seq::SliceRandom};
use thiserror::Error;

use crate::{geom::BoxesMap, record::VocAnnotation};

const TRAIN_PERCENT: usize = 85;

/// Caller decision for a pre-existing output directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExistingDir {
    Reuse,
    Delete,
    Abort,
}

#[derive(Error, Debug)]
pub enum VocError {
    #[error("duplicate sample file {0}")]
    Duplicate(PathBuf),
    #[error("output directory {0} already exists")]
    Aborted(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Line counts written by [`VocWriter::finish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
}

/// Persists samples into a Pascal-VOC directory layout and finalizes the
/// train/val split lists plus the label map.
#[derive(Debug)]
pub struct VocWriter {
    jpeg_dir: PathBuf,
    anno_dir: PathBuf,
    main_dir: PathBuf,
    label_map_path: PathBuf,
    samples: Vec<String>,
    label_map: HashMap<String, u32>,
}

impl VocWriter {
    /// Set up `JPEGImages/`, `Annotations/` and `ImageSets/Main/` under
    /// `root`. `on_existing` decides the fate of each directory that is
    /// already present. An existing label map at `seed_map` pre-populates
    /// the id assignment; a missing seed path is logged and ignored.
    pub fn create<F>(
        root: &Path,
        seed_map: Option<&Path>,
        on_existing: F,
    ) -> Result<Self, VocError>
    where
        F: Fn(&Path) -> ExistingDir,
    {
        for dir in ["Annotations", "ImageSets", "JPEGImages", "ImageSets/Main"] {
            let path = root.join(dir);
            if path.is_dir() {
                match on_existing(&path) {
                    ExistingDir::Reuse => continue,
                    ExistingDir::Delete => {
                        fs::remove_dir_all(&path)?;
                        fs::create_dir_all(&path)?;
                    }
                    ExistingDir::Abort => return Err(VocError::Aborted(path)),
                }
            } else {
                fs::create_dir_all(&path)?;
            }
        }

        let label_map = match seed_map {
            Some(path) if path.is_file() => {
                let map = load_label_map(path)?;
                info!("seeded label map with {} entries from {}", map.len(), path.display());
                map
            }
            Some(path) => {
                warn!("label map {} does not exist, starting fresh", path.display());
                HashMap::new()
            }
            None => HashMap::new(),
        };

        Ok(Self {
            jpeg_dir: root.join("JPEGImages"),
            anno_dir: root.join("Annotations"),
            main_dir: root.join("ImageSets/Main"),
            label_map_path: root.join("pascal_label_map.pbtxt"),
            samples: Vec::new(),
            label_map,
        })
    }

    pub fn label_map_path(&self) -> &Path {
        &self.label_map_path
    }

    /// Persist one sample: JPEG image plus XML annotation. A name that was
    /// already written in this dataset is a hard error, since overwriting
    /// would break the sample/label correspondence.
    pub fn add_image(
        &mut self,
        name: &str,
        img: &RgbImage,
        boxes: &BoxesMap,
    ) -> Result<(), VocError> {
        let img_path = self.jpeg_dir.join(format!("{name}.jpg"));
        let anno_path = self.anno_dir.join(format!("{name}.xml"));
        if img_path.is_file() {
            return Err(VocError::Duplicate(img_path));
        }
        if anno_path.is_file() {
            return Err(VocError::Duplicate(anno_path));
        }

        img.save(&img_path)?;
        let (width, height) = img.dimensions();
        let anno = VocAnnotation {
            filename: name,
            rel_path: format!("../JPEGImages/{name}.jpg"),
            width,
            height,
            boxes,
        };
        fs::write(&anno_path, anno.to_xml())?;

        // sorted so id assignment does not depend on map iteration order
        let mut labels: Vec<&String> = boxes.keys().collect();
        labels.sort_unstable();
        for label in labels {
            self.assign_label(label);
        }
        self.samples.push(name.to_string());
        Ok(())
    }

    fn assign_label(&mut self, label: &str) -> u32 {
        if let Some(&id) = self.label_map.get(label) {
            return id;
        }
        let id = self.label_map.values().max().copied().unwrap_or(0) + 1;
        self.label_map.insert(label.to_string(), id);
        id
    }

    /// Shuffle sample names, write the 85/15 train/val lists and the label
    /// map. Consumes the writer, so finalization cannot run twice.
    pub fn finish(self, rng: &mut SmallRng) -> Result<SplitCounts, VocError> {
        let mut names = self.samples;
        names.shuffle(rng);
        let n_train = names.len() * TRAIN_PERCENT / 100;

        write_split(&self.main_dir.join("train.txt"), &names[..n_train])?;
        write_split(&self.main_dir.join("val.txt"), &names[n_train..])?;
        save_label_map(&self.label_map, &self.label_map_path)?;

        Ok(SplitCounts {
            train: n_train,
            val: names.len() - n_train,
        })
    }
}

fn write_split(path: &Path, names: &[String]) -> Result<(), VocError> {
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    for name in names {
        // trailing 1 marks every row as a positive sample
        writeln!(file, "{name} 1")?;
    }
    file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

/// Parse a `pascal_label_map.pbtxt` file: repeated
/// `item { id: <int> name: '<string>' }` blocks, whitespace-insensitive.
/// Malformed blocks are skipped.
pub fn load_label_map(path: &Path) -> Result<HashMap<String, u32>, std::io::Error> {
    let text = fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for block in text.split('}') {
        if let Some((name, id)) = parse_block(block) {
            map.insert(name, id);
        }
    }
    Ok(map)
}

fn parse_block(block: &str) -> Option<(String, u32)> {
    let after_id = block.split("id:").nth(1)?;
    let id: u32 = after_id.split_whitespace().next()?.parse().ok()?;
    let after_name = block.split("name:").nth(1)?;
    let name: String = after_name
        .trim_start()
        .trim_start_matches(['\'', '"'])
        .chars()
        .take_while(|c| !matches!(c, '\'' | '"' | '}' | '{') && !c.is_whitespace())
        .collect();
    if name.is_empty() { None } else { Some((name, id)) }
}

/// Write the label map as pbtxt blocks in ascending id order.
pub fn save_label_map(map: &HashMap<String, u32>, path: &Path) -> Result<(), std::io::Error> {
    let mut entries: Vec<(&String, &u32)> = map.iter().collect();
    entries.sort_by_key(|&(_, &id)| id);
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    for (name, id) in entries {
        writeln!(file, "item {{\n id: {id}\n name: '{name}'\n}}")?;
    }
    file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use rand::SeedableRng;

    use super::*;
    use crate::geom::GlyphBox;

    fn boxes_for(labels: &[&str]) -> BoxesMap {
        let mut boxes = BoxesMap::new();
        for (i, label) in labels.iter().enumerate() {
            let x = i as u32 * 4;
            boxes
                .entry(label.to_string())
                .or_default()
                .push(GlyphBox::new(x, 0, x + 4, 8));
        }
        boxes
    }

    fn tiny_image() -> RgbImage {
        RgbImage::from_pixel(16, 16, Rgb([200, 200, 200]))
    }

    #[test]
    fn twenty_samples_split_into_17_train_and_3_val() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer =
            VocWriter::create(tmp.path(), None, |_| ExistingDir::Abort).unwrap();
        let img = tiny_image();
        for i in 0..20 {
            let name = format!("im{i:04}");
            writer.add_image(&name, &img, &boxes_for(&["a", "b"])).unwrap();
        }
        let mut rng = SmallRng::seed_from_u64(3);
        let counts = writer.finish(&mut rng).unwrap();
        assert_eq!(counts, SplitCounts { train: 17, val: 3 });

        let train = fs::read_to_string(tmp.path().join("ImageSets/Main/train.txt")).unwrap();
        let val = fs::read_to_string(tmp.path().join("ImageSets/Main/val.txt")).unwrap();
        let train_lines: Vec<&str> = train.lines().collect();
        let val_lines: Vec<&str> = val.lines().collect();
        assert_eq!(train_lines.len(), 17);
        assert_eq!(val_lines.len(), 3);

        let mut seen: Vec<String> = Vec::new();
        for line in train_lines.iter().chain(val_lines.iter()) {
            let (name, flag) = line.split_once(' ').unwrap();
            assert_eq!(flag, "1");
            seen.push(name.to_string());
        }
        seen.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("im{i:04}")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn duplicate_sample_name_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer =
            VocWriter::create(tmp.path(), None, |_| ExistingDir::Abort).unwrap();
        let img = tiny_image();
        writer.add_image("im0000", &img, &boxes_for(&["a"])).unwrap();
        let err = writer.add_image("im0000", &img, &boxes_for(&["a"])).unwrap_err();
        assert!(matches!(err, VocError::Duplicate(_)));
    }

    #[test]
    fn label_ids_are_contiguous_from_one() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer =
            VocWriter::create(tmp.path(), None, |_| ExistingDir::Abort).unwrap();
        let img = tiny_image();
        writer.add_image("im0000", &img, &boxes_for(&["x", "y"])).unwrap();
        writer.add_image("im0001", &img, &boxes_for(&["y", "z", "w"])).unwrap();
        let map_path = writer.label_map_path().to_path_buf();
        let mut rng = SmallRng::seed_from_u64(0);
        writer.finish(&mut rng).unwrap();

        let map = load_label_map(&map_path).unwrap();
        let mut ids: Vec<u32> = map.values().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn label_ids_are_assigned_in_sorted_label_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = VocWriter::create(tmp.path(), None, |_| ExistingDir::Abort).unwrap();
        writer
            .add_image("im0000", &tiny_image(), &boxes_for(&["d", "a", "c"]))
            .unwrap();
        let map_path = writer.label_map_path().to_path_buf();
        let mut rng = SmallRng::seed_from_u64(0);
        writer.finish(&mut rng).unwrap();

        let map = load_label_map(&map_path).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["c"], 2);
        assert_eq!(map["d"], 3);
    }

    #[test]
    fn label_map_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pascal_label_map.pbtxt");
        let mut map = HashMap::new();
        map.insert("Actor".to_string(), 1);
        map.insert("Guider".to_string(), 2);
        map.insert("Boss".to_string(), 3);
        save_label_map(&map, &path).unwrap();
        assert_eq!(load_label_map(&path).unwrap(), map);
    }

    #[test]
    fn label_map_loader_skips_malformed_blocks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pascal_label_map.pbtxt");
        fs::write(
            &path,
            "item {\r\n id: 1\r\n name: 'Actor'\r\n}\r\nitem { garbage }\nitem{id: x name: 'Bad'}\nitem{ id: 2 name: \"Guider\" }\n",
        )
        .unwrap();
        let map = load_label_map(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["Actor"], 1);
        assert_eq!(map["Guider"], 2);
    }

    #[test]
    fn seeded_label_map_keeps_existing_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let seed_path = tmp.path().join("seed.pbtxt");
        let mut seed = HashMap::new();
        seed.insert("a".to_string(), 1);
        seed.insert("b".to_string(), 2);
        save_label_map(&seed, &seed_path).unwrap();

        let out = tmp.path().join("dataset");
        let mut writer =
            VocWriter::create(&out, Some(&seed_path), |_| ExistingDir::Abort).unwrap();
        writer
            .add_image("im0000", &tiny_image(), &boxes_for(&["b", "c"]))
            .unwrap();
        let map_path = writer.label_map_path().to_path_buf();
        let mut rng = SmallRng::seed_from_u64(0);
        writer.finish(&mut rng).unwrap();

        let map = load_label_map(&map_path).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
        assert_eq!(map["c"], 3);
    }

    #[test]
    fn abort_policy_refuses_existing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("Annotations")).unwrap();
        let err = VocWriter::create(tmp.path(), None, |_| ExistingDir::Abort).unwrap_err();
        assert!(matches!(err, VocError::Aborted(_)));
    }

    #[test]
    fn delete_policy_clears_existing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("JPEGImages/stale.jpg");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();
        let writer = VocWriter::create(tmp.path(), None, |_| ExistingDir::Delete).unwrap();
        assert!(!stale.exists());
        drop(writer);
    }

    #[test]
    fn reuse_policy_keeps_existing_content() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("JPEGImages/stale.jpg");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();
        let _writer = VocWriter::create(tmp.path(), None, |_| ExistingDir::Reuse).unwrap();
        assert!(stale.exists());
    }
}

use std::{
    io,
    path::{Path, PathBuf},
    process::Command,
};

use log::info;

/// Dataset split selector handed to the conversion tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// Invocation of the external `create_pascal_tf_record.py` utility that
/// turns the finished VOC directory into TF record files. Out of scope for
/// generation itself; this only forms the paths and arguments and shells out.
pub struct RecordConversion {
    script: PathBuf,
    data_dir: PathBuf,
    model_dir: PathBuf,
    label_map: PathBuf,
}

impl RecordConversion {
    pub fn new(tool_dir: &Path, data_dir: &Path, model_dir: &Path) -> Self {
        Self {
            script: tool_dir.join("create_pascal_tf_record.py"),
            data_dir: data_dir.to_path_buf(),
            model_dir: model_dir.to_path_buf(),
            label_map: data_dir.join("pascal_label_map.pbtxt"),
        }
    }

    /// `<model dir>/<dataset stem>_<set>.record`
    pub fn output_path(&self, split: Split) -> PathBuf {
        let stem = self
            .data_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        self.model_dir
            .join(format!("{stem}_{}.record", split.as_str()))
    }

    pub fn args(&self, split: Split) -> Vec<String> {
        vec![
            format!("--data_dir={}", self.data_dir.display()),
            "--year=VOC2012".to_string(),
            format!("--set={}", split.as_str()),
            format!("--output_path={}", self.output_path(split).display()),
            format!("--label_map_path={}", self.label_map.display()),
        ]
    }

    pub fn run(&self, split: Split) -> io::Result<()> {
        info!(
            "converting {} set via {}",
            split.as_str(),
            self.script.display()
        );
        let status = Command::new("python")
            .arg(&self.script)
            .args(self.args(split))
            .status()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "record conversion for {} set failed: {status}",
                split.as_str()
            )));
        }
        Ok(())
    }

    /// Copy the final label map next to the record files.
    pub fn copy_label_map(&self) -> io::Result<()> {
        let dest = self.model_dir.join("pascal_label_map.pbtxt");
        std::fs::copy(&self.label_map, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_vector_matches_tool_expectations() {
        let conv = RecordConversion::new(
            Path::new("/opt/od"),
            Path::new("/data/origin/socr_20260829"),
            Path::new("/data/socr"),
        );
        assert_eq!(
            conv.args(Split::Val),
            vec![
                "--data_dir=/data/origin/socr_20260829".to_string(),
                "--year=VOC2012".to_string(),
                "--set=val".to_string(),
                "--output_path=/data/socr/socr_20260829_val.record".to_string(),
                "--label_map_path=/data/origin/socr_20260829/pascal_label_map.pbtxt".to_string(),
            ]
        );
    }

    #[test]
    fn output_path_uses_dataset_stem_and_split() {
        let conv = RecordConversion::new(Path::new("."), Path::new("/tmp/ds"), Path::new("/out"));
        assert_eq!(
            conv.output_path(Split::Train),
            PathBuf::from("/out/ds_train.record")
        );
    }
}

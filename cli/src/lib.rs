use matseg::{DatasetInfo, SegmentError, SegmenterConfig, collect_images};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error("No input images: set 'inputs' or 'input_dir'")]
    MissingInputs,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// A batch job: which images to process, where the results go, and how to segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct JobSpec {
    /// Individual image files
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Folder scanned for jpg/jpeg/png/bmp files
    pub input_dir: Option<PathBuf>,
    /// Where `<stem>_segmented.png` files are written
    pub output_dir: PathBuf,
    /// Annotation index to write; no dataset is built when absent
    pub dataset: Option<PathBuf>,
    /// Write a `<stem>_segmented.txt` coverage file next to each image
    #[serde(default)]
    pub sidecar: bool,
    pub info: Option<DatasetInfo>,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
}

impl JobSpec {
    /// Load JobSpec configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load JobSpec configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load JobSpec configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load JobSpec configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Convert JobSpec to TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Listed inputs followed by the contents of `input_dir`.
    pub fn resolve_inputs(&self) -> Result<Vec<PathBuf>, CliError> {
        let mut paths = self.inputs.clone();
        if let Some(dir) = &self.input_dir {
            paths.extend(collect_images(dir)?);
        }
        if paths.is_empty() {
            return Err(CliError::MissingInputs);
        }
        Ok(paths)
    }
}

/// A single image file, or every image in a folder.
pub fn expand_input(input: &Path) -> Result<Vec<PathBuf>, CliError> {
    let paths = if input.is_dir() {
        collect_images(input)?
    } else {
        vec![input.to_path_buf()]
    };
    if paths.is_empty() {
        return Err(CliError::MissingInputs);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_job_from_toml() {
        let job = JobSpec::from_toml(
            r#"
            input_dir = "micrographs"
            output_dir = "out"
            dataset = "out/annotations.json"
            sidecar = true

            [segmenter]
            strategy = "auto"
            smoothing = true
            "#,
        )
        .expect("Should parse");

        assert_eq!(job.input_dir, Some(PathBuf::from("micrographs")));
        assert!(job.inputs.is_empty());
        assert!(job.sidecar);
        assert_eq!(job.segmenter.strategy, "auto");
        assert_eq!(job.segmenter.seed, 42);
        assert!(job.info.is_none());
    }

    #[test]
    fn test_job_requires_inputs() {
        let job = JobSpec::from_json(r#"{"output_dir": "out"}"#).expect("Should parse");
        assert!(matches!(job.resolve_inputs(), Err(CliError::MissingInputs)));
        assert!(matches!(JobSpec::from_file("job.yaml"), Err(CliError::UnsupportedFileFormat)));
    }

    #[test]
    fn test_resolve_inputs_from_folder() {
        let dir = TempDir::new().expect("Should create temp dir");
        for name in ["b.png", "a.png"] {
            RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
                .save(dir.path().join(name))
                .expect("Should write image");
        }
        let job = JobSpec {
            inputs: vec![PathBuf::from("extra.jpg")],
            input_dir: Some(dir.path().to_path_buf()),
            output_dir: PathBuf::from("out"),
            dataset: None,
            sidecar: false,
            info: None,
            segmenter: SegmenterConfig::default(),
        };

        let paths = job.resolve_inputs().expect("Should resolve");
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], PathBuf::from("extra.jpg"));
        assert!(paths[1].ends_with("a.png"));

        assert_eq!(expand_input(dir.path()).expect("Should expand").len(), 2);
    }
}

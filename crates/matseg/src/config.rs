use std::{fs, path::Path};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    coco::DEFAULT_MIN_AREA,
    error::{Result, SegmentError},
    pipeline::{CoverageMode, LabelSource, Segmenter},
};

/// Segmenter settings as read from a TOML or JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Pass-1 labeling strategy: `auto`, `bright` or `dark`
    pub strategy: String,
    /// Seed for k-means initialization
    pub seed: u64,
    /// Independent k-means initializations per clustering call
    #[schemars(range(min = 1))]
    pub n_init: usize,
    /// Lloyd iterations per initialization
    #[schemars(range(min = 1))]
    pub max_iter: usize,
    /// Convergence tolerance, relative to the mean feature variance
    pub tolerance: f64,
    /// Box-blur the intensity channel before pass 1
    pub smoothing: bool,
    /// Blur radius; 2 gives a 5x5 window
    pub smoothing_radius: u32,
    pub coverage: CoverageMode,
    pub label_source: LabelSource,
    /// Raw cluster count for the `single_pass` label source
    #[schemars(range(min = 2))]
    pub clusters: usize,
    /// Contours enclosing fewer pixels are dropped
    pub min_area: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            strategy: "bright".to_string(),
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            smoothing: false,
            smoothing_radius: 2,
            coverage: CoverageMode::default(),
            label_source: LabelSource::default(),
            clusters: 2,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

impl SegmenterConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            other => Err(SegmentError::InvalidConfig(format!(
                "unsupported config extension {:?}, use .toml or .json",
                other.unwrap_or("")
            ))),
        }
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SegmenterConfig)
    }

    /// Build a segmenter; an unknown strategy name fails here, before any image is touched.
    pub fn build(&self) -> Result<Segmenter> {
        let mut builder = Segmenter::builder()
            .strategy_name(&self.strategy)?
            .seed(self.seed)
            .n_init(self.n_init)
            .max_iter(self.max_iter)
            .tolerance(self.tolerance)
            .coverage(self.coverage)
            .label_source(self.label_source)
            .single_pass_clusters(self.clusters)
            .min_area(self.min_area);
        if self.smoothing {
            builder = builder.with_smoothing(self.smoothing_radius);
        }
        builder.build()
    }
}

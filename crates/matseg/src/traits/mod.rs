use image::GrayImage;
use crate::{error::Result, types::{ClusterResult, FeatureMatrix}};

/// Trait for image preprocessing algorithms
pub trait ImagePreprocessor: Send + Sync {
    /// Preprocess the intensity channel (e.g., smoothing)
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for clustering algorithms.
///
/// Implementations are pure: every call starts from the same seed and state,
/// so one instance can be shared across worker threads.
pub trait Clusterer: Send + Sync {
    /// Partition the rows of `features` into `k` clusters
    fn fit(&self, features: &FeatureMatrix, k: usize) -> Result<ClusterResult>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the outer contours of the non-zero regions of a binary image
    fn extract_contours(&self, image: &GrayImage) -> Result<Vec<Vec<[u32; 2]>>>;
}

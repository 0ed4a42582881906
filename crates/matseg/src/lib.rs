//! # Material Segmentation Library
//!
//! Unsupervised material/background segmentation of micrograph-style images,
//! with export of the resulting masks as COCO-style polygon annotations.
//!
//! ## Core Features
//!
//! - **Two-pass clustering**: k-means on intensity separates material from
//!   background, then k-means on color inside the material region refines it
//! - **Labeling strategies**: `auto` (largest cluster is background), `bright`, `dark`
//! - **Polygon export**: outer contours per category, filtered by area, with
//!   bounding boxes and consecutive dataset ids
//! - **Batch processing**: parallel per-image work over a folder of images
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matseg::{Segmenter, load_image};
//!
//! let segmenter = Segmenter::builder()
//!     .strategy_name("auto")?
//!     .build()?;
//!
//! let image = load_image("sample.png")?;
//! let result = segmenter.segment(&image)?;
//! println!("material coverage: {:.2}%", result.percentage);
//!
//! result.save("output", "sample.png", true)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Building a dataset
//!
//! ```rust,no_run
//! use matseg::{Segmenter, DatasetInfo, annotate_batch, collect_images};
//!
//! let segmenter = Segmenter::builder().build()?;
//! let images = collect_images("micrographs")?;
//! let report = annotate_batch(&segmenter, &images, DatasetInfo::default())?;
//! report.dataset.to_json_file("annotations.json")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod coco;
pub mod config;
pub mod io;
pub mod batch;

// Re-exports for convenience
pub use error::{SegmentError, Result};
pub use types::{Category, ClusterResult, FeatureMatrix, PolygonAnnotation, SemanticAssignment, SourceImage};
pub use traits::*;
pub use algorithms::{KMeans, LabelStrategy};
pub use pipeline::{CoverageMode, LabelSource, Refinement, SegmentationResult, Segmenter, builder::SegmenterBuilder};
pub use coco::{Dataset, DatasetAssembler, DatasetInfo, ImageDescriptor, PolygonConverter, build_dataset};
pub use config::SegmenterConfig;
pub use io::{load_image, load_image_from_bytes, save_segmentation};
pub use batch::{BatchReport, annotate_batch, collect_images, export_batch, segment_batch};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn create_test_image() -> SourceImage {
        let rgb = RgbImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                Rgb([210, 200, 190])
            } else {
                Rgb([25, 30, 35])
            }
        });
        SourceImage::from_rgb(rgb)
    }

    #[test]
    fn test_segment_basic() {
        let segmenter = Segmenter::builder().build().expect("Should build");
        let result = segmenter.segment(&create_test_image()).expect("Should segment");
        assert_eq!(result.percentage, 25.0);
        assert_eq!(result.combined.dimensions(), (40, 40));
    }

    #[test]
    fn test_segment_and_annotate() {
        let segmenter = Segmenter::builder().build().expect("Should build");
        let annotations = segmenter
            .segment_and_annotate(&create_test_image(), 7)
            .expect("Should annotate");

        let material: Vec<&PolygonAnnotation> = annotations
            .iter()
            .filter(|a| a.category_id == Category::Material.id())
            .collect();
        assert_eq!(material.len(), 1);
        assert_eq!(material[0].bbox, [10, 10, 20, 20]);
        assert_eq!(material[0].area, 400.0);
        assert!(annotations.iter().all(|a| a.image_id == 7));
    }

    #[test]
    fn test_config_driven_segmenter() {
        let segmenter = SegmenterConfig::from_toml("strategy = \"dark\"")
            .and_then(|config| config.build())
            .expect("Should build");
        let result = segmenter.segment(&create_test_image()).expect("Should segment");
        assert_eq!(result.percentage, 75.0);
    }
}

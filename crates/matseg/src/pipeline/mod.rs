pub mod builder;

use image::{GrayImage, Luma, Rgb, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};
use tracing::debug;
use crate::{
    algorithms::{FeatureExtractor, LabelStrategy, compact_indices, scatter_labels},
    coco::{PolygonConverter, category_raster},
    error::{Result, SegmentError},
    traits::Clusterer,
    types::{PolygonAnnotation, SemanticAssignment, SourceImage},
};

/// Which mask the reported coverage percentage is computed from
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoverageMode {
    /// Pass-1 mask; the overlay still shows the refined boundary
    #[default]
    Coarse,
    /// Pass-2 mask, matching the overlay
    Refined,
}

/// Which material mask is converted into polygon annotations
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelSource {
    #[default]
    Coarse,
    Refined,
    /// One color clustering over the whole image with majority-size assignment
    SinglePass,
}

/// What happened in the refinement pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refinement {
    /// The material region was clustered by color
    Clustered,
    /// The material region had a single color and was kept whole
    Uniform,
    /// Pass 1 found no material
    Skipped,
}

/// Everything produced by one two-pass run.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// `background_coarse` with `material_refined` drawn on top
    pub combined: RgbImage,
    /// Material coverage in `[0, 100]`
    pub percentage: f64,
    /// Pass-1 material mask (255 = material)
    pub coarse_mask: GrayImage,
    /// Pass-2 material mask, always inside `coarse_mask`
    pub refined_mask: GrayImage,
    pub material_coarse: RgbImage,
    pub background_coarse: RgbImage,
    pub material_refined: RgbImage,
    pub background_refined: RgbImage,
    pub refinement: Refinement,
}

/// Two-pass clustering segmenter.
///
/// Pass 1 clusters intensity over the whole frame and labels the clusters with
/// the configured strategy. Pass 2 clusters color inside the pass-1 material
/// region only, taking the brighter cluster as material.
pub struct Segmenter {
    pub(crate) extractor: FeatureExtractor,
    pub(crate) clusterer: Box<dyn Clusterer>,
    pub(crate) strategy: LabelStrategy,
    pub(crate) coverage: CoverageMode,
    pub(crate) label_source: LabelSource,
    pub(crate) single_pass_clusters: usize,
    pub(crate) converter: PolygonConverter,
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter")
            .field("extractor", &self.extractor)
            .field("strategy", &self.strategy)
            .field("coverage", &self.coverage)
            .field("label_source", &self.label_source)
            .field("single_pass_clusters", &self.single_pass_clusters)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl Segmenter {
    /// Create a new segmenter builder
    pub fn builder() -> builder::SegmenterBuilder {
        builder::SegmenterBuilder::new()
    }

    pub fn strategy(&self) -> LabelStrategy {
        self.strategy
    }

    /// Run both passes and compose the overlay.
    pub fn segment(&self, image: &SourceImage) -> Result<SegmentationResult> {
        let coarse_mask = self.first_pass(image)?;
        let material_coarse = keep_where(image.rgb(), &coarse_mask, true);
        let background_coarse = keep_where(image.rgb(), &coarse_mask, false);

        let region = compact_indices(&coarse_mask);
        let (refined_mask, refinement) = if region.is_empty() {
            debug!("pass 1 found no material, skipping refinement");
            (GrayImage::new(image.width(), image.height()), Refinement::Skipped)
        } else {
            self.second_pass(image, &coarse_mask, &region)?
        };

        let material_refined = keep_where(image.rgb(), &refined_mask, true);
        let background_refined = keep_where(&material_coarse, &refined_mask, false);
        let combined = overlay(&background_coarse, &material_refined);

        let percentage = match self.coverage {
            CoverageMode::Coarse => coverage_percentage(&coarse_mask),
            CoverageMode::Refined => coverage_percentage(&refined_mask),
        };
        debug!(
            coarse_pixels = region.len(),
            ?refinement,
            percentage,
            "segmentation finished"
        );

        Ok(SegmentationResult {
            combined,
            percentage,
            coarse_mask,
            refined_mask,
            material_coarse,
            background_coarse,
            material_refined,
            background_refined,
            refinement,
        })
    }

    /// Polygon annotations for `image`, all tagged with `image_id`.
    pub fn segment_and_annotate(&self, image: &SourceImage, image_id: u64) -> Result<Vec<PolygonAnnotation>> {
        match self.label_source {
            LabelSource::SinglePass => self.annotate_mask(&self.single_pass_mask(image)?, image_id),
            LabelSource::Coarse | LabelSource::Refined => {
                let result = self.segment(image)?;
                self.annotate_segmentation(image, &result, image_id)
            }
        }
    }

    /// Polygon annotations from an existing two-pass result of `image`.
    ///
    /// Only the single-pass label source clusters again.
    pub fn annotate_segmentation(
        &self,
        image: &SourceImage,
        result: &SegmentationResult,
        image_id: u64,
    ) -> Result<Vec<PolygonAnnotation>> {
        match self.label_source {
            LabelSource::Coarse => self.annotate_mask(&result.coarse_mask, image_id),
            LabelSource::Refined => self.annotate_mask(&result.refined_mask, image_id),
            LabelSource::SinglePass => self.annotate_mask(&self.single_pass_mask(image)?, image_id),
        }
    }

    /// Polygon annotations for an already computed material mask
    pub fn annotate_mask(&self, material: &GrayImage, image_id: u64) -> Result<Vec<PolygonAnnotation>> {
        self.converter.convert(&category_raster(material), image_id)
    }

    /// Material mask from one color clustering with `k >= 2` raw clusters,
    /// where the largest cluster is background and the rest are material.
    pub fn single_pass_mask(&self, image: &SourceImage) -> Result<GrayImage> {
        let features = FeatureExtractor::color().extract(image, None)?;
        let result = self.clusterer.fit(&features, self.single_pass_clusters)?;
        debug!(counts = ?result.counts(), "single-pass clustering finished");
        let assignment = LabelStrategy::Auto.assign(&result);
        Ok(mask_from_labels(image.width(), image.height(), |i| {
            assignment.is_material(result.labels[i])
        }))
    }

    fn first_pass(&self, image: &SourceImage) -> Result<GrayImage> {
        let features = self.extractor.extract(image, None)?;
        let result = self.clusterer.fit(&features, 2)?;
        let assignment = self.strategy.assign(&result);
        debug!(
            counts = ?result.counts(),
            centroids = ?result.centroids,
            material = ?assignment.material_clusters(),
            "pass 1 clustering finished"
        );
        Ok(mask_from_labels(image.width(), image.height(), |i| {
            assignment.is_material(result.labels[i])
        }))
    }

    fn second_pass(
        &self,
        image: &SourceImage,
        coarse_mask: &GrayImage,
        region: &[usize],
    ) -> Result<(GrayImage, Refinement)> {
        let features = FeatureExtractor::color().extract(image, Some(region))?;
        let result = match self.clusterer.fit(&features, 2) {
            Ok(result) => result,
            Err(SegmentError::DegenerateInput { distinct, .. }) => {
                debug!(distinct, "material region is uniform, keeping it whole");
                return Ok((coarse_mask.clone(), Refinement::Uniform));
            }
            Err(e) => return Err(e),
        };

        let assignment: SemanticAssignment = LabelStrategy::Bright.assign(&result);
        debug!(
            counts = ?result.counts(),
            centroids = ?result.centroids,
            "pass 2 clustering finished"
        );

        let labels = scatter_labels(region, &result.labels, image.pixel_count());
        let mask = mask_from_labels(image.width(), image.height(), |i| {
            labels[i].is_some_and(|label| assignment.is_material(label))
        });
        Ok((mask, Refinement::Clustered))
    }
}

fn mask_from_labels(width: u32, height: u32, is_material: impl Fn(usize) -> bool) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let index = y as usize * width as usize + x as usize;
        if is_material(index) { Luma([255u8]) } else { Luma([0u8]) }
    })
}

/// Copy pixels where `(mask > 0) == keep`, zero the rest.
pub fn keep_where(rgb: &RgbImage, mask: &GrayImage, keep: bool) -> RgbImage {
    RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        if (mask.get_pixel(x, y).0[0] > 0) == keep {
            *rgb.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// `base` with every non-black pixel of `top` drawn over it.
pub fn overlay(base: &RgbImage, top: &RgbImage) -> RgbImage {
    let mut combined = base.clone();
    for (x, y, pixel) in top.enumerate_pixels() {
        if pixel.0 != [0, 0, 0] {
            combined.put_pixel(x, y, *pixel);
        }
    }
    combined
}

/// Share of non-zero mask pixels, in percent.
pub fn coverage_percentage(mask: &GrayImage) -> f64 {
    let total = mask.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let material = mask.as_raw().iter().filter(|&&v| v > 0).count();
    material as f64 * 100.0 / total as f64
}

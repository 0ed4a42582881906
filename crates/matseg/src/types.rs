use image::{DynamicImage, GrayImage, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use crate::error::{Result, SegmentError};

/// A decoded image with its two retained views.
#[derive(Debug, Clone)]
pub struct SourceImage {
    rgb: RgbImage,
    luma: GrayImage,
}

impl SourceImage {
    pub fn from_rgb(rgb: RgbImage) -> Self {
        let luma = image::imageops::grayscale(&rgb);
        Self { rgb, luma }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::from_rgb(image.to_rgb8())
    }

    /// Full-color view
    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    /// Single-channel intensity view
    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.rgb.width() as usize * self.rgb.height() as usize
    }
}

/// Row-major feature vectors, one row per pixel (or per selected pixel).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    dim: usize,
}

impl FeatureMatrix {
    /// Wrap a flat buffer of `rows * dim` values.
    pub fn new(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(SegmentError::InvalidConfig("feature dimension must be positive".into()));
        }
        if data.len() % dim != 0 {
            return Err(SegmentError::InvalidConfig(format!(
                "feature buffer of {} values is not a multiple of dimension {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { data, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dim)
    }

    /// Count distinct rows, stopping once `limit` have been seen.
    pub fn distinct_rows_up_to(&self, limit: usize) -> usize {
        let mut seen: Vec<&[f32]> = Vec::with_capacity(limit);
        for row in self.iter_rows() {
            if seen.len() >= limit {
                break;
            }
            if !seen.iter().any(|s| *s == row) {
                seen.push(row);
            }
        }
        seen.len()
    }
}

/// Output of one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    /// Cluster id per feature row, in `[0, k)`
    pub labels: Vec<usize>,
    /// One centroid per cluster
    pub centroids: Vec<Vec<f32>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
}

impl ClusterResult {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Number of rows assigned to each cluster
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.k()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Scalar brightness of a centroid: its intensity, or the channel sum for color.
    pub fn centroid_score(&self, cluster: usize) -> f64 {
        self.centroids[cluster].iter().map(|&v| v as f64).sum()
    }
}

/// Semantic category, numbered as in the exported category table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Background = 1,
    Material = 2,
}

impl Category {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Background),
            2 => Some(Self::Material),
            _ => None,
        }
    }
}

/// Mapping from raw cluster id to semantic category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticAssignment {
    categories: Vec<Category>,
}

impl SemanticAssignment {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Assignment where exactly `material` is material and everything else background.
    pub fn single_material(k: usize, material: usize) -> Self {
        let categories = (0..k)
            .map(|i| if i == material { Category::Material } else { Category::Background })
            .collect();
        Self { categories }
    }

    pub fn category_of(&self, cluster: usize) -> Category {
        self.categories[cluster]
    }

    pub fn is_material(&self, cluster: usize) -> bool {
        self.categories[cluster] == Category::Material
    }

    pub fn material_clusters(&self) -> Vec<usize> {
        self.clusters_of(Category::Material)
    }

    pub fn background_clusters(&self) -> Vec<usize> {
        self.clusters_of(Category::Background)
    }

    fn clusters_of(&self, category: Category) -> Vec<usize> {
        self.categories
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == category)
            .map(|(i, _)| i)
            .collect()
    }
}

/// One polygon annotation in dataset form, before an annotation id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolygonAnnotation {
    pub image_id: u64,
    pub category_id: u8,
    /// `[x, y, width, height]` in pixels
    pub bbox: [u32; 4],
    /// Pixels enclosed by the outer contour, holes included
    pub area: f64,
    /// One flat `[x1, y1, x2, y2, ...]` ring
    pub segmentation: Vec<Vec<u32>>,
    pub iscrowd: u8,
}

impl PolygonAnnotation {
    pub fn vertex_count(&self) -> usize {
        self.segmentation.iter().map(|ring| ring.len() / 2).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_source_image_views() {
        let rgb = RgbImage::from_pixel(4, 3, Rgb([200, 200, 200]));
        let image = SourceImage::from_rgb(rgb);
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        assert_eq!(image.pixel_count(), 12);
        assert!(image.luma().pixels().all(|p| p.0[0] == 200));
    }

    #[test]
    fn test_distinct_rows_stops_at_limit() {
        let features = FeatureMatrix::new(vec![1.0, 2.0, 3.0, 1.0], 1).expect("Should build matrix");
        assert_eq!(features.rows(), 4);
        assert_eq!(features.distinct_rows_up_to(2), 2);
        assert_eq!(features.distinct_rows_up_to(10), 3);
    }

    #[test]
    fn test_feature_matrix_rejects_bad_shapes() {
        assert!(matches!(FeatureMatrix::new(vec![1.0; 4], 0), Err(SegmentError::InvalidConfig(_))));
        assert!(matches!(FeatureMatrix::new(vec![1.0; 4], 3), Err(SegmentError::InvalidConfig(_))));
        assert!(FeatureMatrix::new(Vec::new(), 3).expect("Should build matrix").is_empty());
    }

    #[test]
    fn test_category_ids() {
        assert_eq!(Category::Background.id(), 1);
        assert_eq!(Category::Material.id(), 2);
        assert_eq!(Category::Material.name(), "material");
        assert_eq!(Category::from_id(2), Some(Category::Material));
        assert_eq!(Category::from_id(0), None);
    }

    #[test]
    fn test_single_material_assignment() {
        let assignment = SemanticAssignment::single_material(3, 1);
        assert_eq!(assignment.material_clusters(), vec![1]);
        assert_eq!(assignment.background_clusters(), vec![0, 2]);
    }
}

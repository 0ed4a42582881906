use image::{GrayImage, Luma};
use strum::IntoEnumIterator;
use tracing::debug;
use crate::{
    algorithms::{ImageprocContourExtractor, bounding_box, compress_chain, enclosed_pixel_count},
    error::Result,
    traits::ContourExtractor,
    types::{Category, PolygonAnnotation},
};

/// Default minimum enclosed area for an emitted polygon
pub const DEFAULT_MIN_AREA: f64 = 10.0;

/// Minimum number of vertices for an emitted polygon
pub const MIN_VERTICES: usize = 3;

/// Turns a category raster into polygon annotations, one per outer contour.
pub struct PolygonConverter {
    pub min_area: f64,
    contour_extractor: Box<dyn ContourExtractor>,
}

impl std::fmt::Debug for PolygonConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonConverter")
            .field("min_area", &self.min_area)
            .finish_non_exhaustive()
    }
}

impl Default for PolygonConverter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_AREA)
    }
}

impl PolygonConverter {
    pub fn new(min_area: f64) -> Self {
        Self {
            min_area,
            contour_extractor: Box::new(ImageprocContourExtractor),
        }
    }

    /// Replace the contour extractor
    pub fn with_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Box::new(extractor);
        self
    }

    /// Convert a raster of category ids into annotations, background first.
    ///
    /// Pixels holding ids outside the category table belong to no category.
    pub fn convert(&self, categories: &GrayImage, image_id: u64) -> Result<Vec<PolygonAnnotation>> {
        let mut annotations = Vec::new();

        for category in Category::iter() {
            let binary = binary_submask(categories, category);
            let contours = self.contour_extractor.extract_contours(&binary)?;
            let found = contours.len();

            for contour in contours {
                let area = enclosed_pixel_count(&contour);
                if area < self.min_area {
                    continue;
                }
                let vertices = compress_chain(&contour);
                if vertices.len() < MIN_VERTICES {
                    continue;
                }
                annotations.push(PolygonAnnotation {
                    image_id,
                    category_id: category.id(),
                    bbox: bounding_box(&vertices),
                    area,
                    segmentation: vec![vertices.iter().flat_map(|&[x, y]| [x, y]).collect()],
                    iscrowd: 0,
                });
            }
            debug!(
                %category,
                contours = found,
                "category contours extracted"
            );
        }

        Ok(annotations)
    }
}

/// 255 where the raster holds `category`, 0 elsewhere.
pub fn binary_submask(categories: &GrayImage, category: Category) -> GrayImage {
    let id = category.id();
    GrayImage::from_fn(categories.width(), categories.height(), |x, y| {
        if categories.get_pixel(x, y).0[0] == id { Luma([255u8]) } else { Luma([0u8]) }
    })
}

/// Category raster from a binary material mask (non-zero = material).
pub fn category_raster(material: &GrayImage) -> GrayImage {
    GrayImage::from_fn(material.width(), material.height(), |x, y| {
        if material.get_pixel(x, y).0[0] > 0 {
            Luma([Category::Material.id()])
        } else {
            Luma([Category::Background.id()])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_with_square(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 2u8 } else { 1u8 }])
        })
    }

    #[test]
    fn test_square_region_becomes_polygons() {
        let raster = raster_with_square(20, 5, 6, 8);
        let annotations = PolygonConverter::default()
            .convert(&raster, 7)
            .expect("Should convert");

        assert_eq!(annotations.len(), 2);

        let background = &annotations[0];
        assert_eq!(background.category_id, 1);
        assert_eq!(background.bbox, [0, 0, 20, 20]);
        assert_eq!(background.area, 400.0);

        let material = &annotations[1];
        assert_eq!(material.image_id, 7);
        assert_eq!(material.category_id, 2);
        assert_eq!(material.bbox, [5, 6, 8, 8]);
        assert_eq!(material.area, 64.0);
        assert_eq!(material.iscrowd, 0);
        assert_eq!(material.vertex_count(), 4);
        assert_eq!(material.segmentation.len(), 1);
        assert_eq!(material.segmentation[0].len(), 8);
    }

    #[test]
    fn test_small_region_is_dropped() {
        let raster = raster_with_square(12, 4, 4, 2);
        let annotations = PolygonConverter::default()
            .convert(&raster, 1)
            .expect("Should convert");

        assert!(annotations.iter().all(|a| a.category_id != 2));
        assert_eq!(annotations.len(), 1);
    }

    #[test]
    fn test_line_region_is_dropped() {
        let raster = GrayImage::from_fn(30, 5, |x, y| Luma([if y == 2 && x >= 5 && x < 25 { 2u8 } else { 1u8 }]));
        let annotations = PolygonConverter::default()
            .convert(&raster, 1)
            .expect("Should convert");
        assert!(annotations.iter().all(|a| a.category_id != 2));
    }

    #[test]
    fn test_empty_category_yields_nothing() {
        let raster = GrayImage::from_pixel(8, 8, Luma([1u8]));
        let annotations = PolygonConverter::default()
            .convert(&raster, 1)
            .expect("Should convert");
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].category_id, 1);
    }

    /// Reports one fixed square outline for every category
    struct FixedSquareExtractor;

    impl ContourExtractor for FixedSquareExtractor {
        fn extract_contours(&self, _image: &GrayImage) -> Result<Vec<Vec<[u32; 2]>>> {
            Ok(vec![vec![[1, 1], [4, 1], [4, 4], [1, 4]]])
        }
    }

    #[test]
    fn test_custom_contour_extractor() {
        let converter = PolygonConverter::new(5.0).with_contour_extractor(FixedSquareExtractor);
        let annotations = converter
            .convert(&GrayImage::from_pixel(6, 6, Luma([1u8])), 4)
            .expect("Should convert");

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].category_id, 1);
        assert_eq!(annotations[1].category_id, 2);
        for annotation in &annotations {
            assert_eq!(annotation.area, 16.0);
            assert_eq!(annotation.bbox, [1, 1, 4, 4]);
            assert_eq!(annotation.segmentation, vec![vec![1, 1, 4, 1, 4, 4, 1, 4]]);
        }

        let strict = PolygonConverter::new(20.0).with_contour_extractor(FixedSquareExtractor);
        assert!(strict.convert(&GrayImage::new(6, 6), 4).expect("Should convert").is_empty());
    }

    #[test]
    fn test_category_raster_from_mask() {
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([255u8]));
        let raster = category_raster(&mask);
        assert_eq!(raster.as_raw(), &vec![1u8, 2u8]);
    }
}

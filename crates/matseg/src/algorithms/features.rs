use image::{GrayImage, RgbImage};
use crate::{
    algorithms::preprocessing::BoxBlurPreprocessor,
    error::Result,
    traits::ImagePreprocessor,
    types::{FeatureMatrix, SourceImage},
};

/// Which channels become features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    /// One scalar per pixel
    Intensity,
    /// `[r, g, b]` per pixel
    Color,
}

/// Turns an image (or a subset of its pixels) into a feature matrix.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pub mode: FeatureMode,
    /// Applied to the intensity channel only
    pub smoothing: Option<BoxBlurPreprocessor>,
}

impl FeatureExtractor {
    pub fn intensity() -> Self {
        Self { mode: FeatureMode::Intensity, smoothing: None }
    }

    pub fn color() -> Self {
        Self { mode: FeatureMode::Color, smoothing: None }
    }

    pub fn with_smoothing(mut self, radius: u32) -> Self {
        self.smoothing = Some(BoxBlurPreprocessor { radius });
        self
    }

    /// Extract features in raster order, restricted to `selection` when given.
    pub fn extract(&self, image: &SourceImage, selection: Option<&[usize]>) -> Result<FeatureMatrix> {
        match self.mode {
            FeatureMode::Intensity => {
                let luma = match &self.smoothing {
                    Some(blur) => blur.preprocess(image.luma())?,
                    None => image.luma().clone(),
                };
                intensity_features(&luma, selection)
            }
            FeatureMode::Color => color_features(image.rgb(), selection),
        }
    }
}

pub fn intensity_features(luma: &GrayImage, selection: Option<&[usize]>) -> Result<FeatureMatrix> {
    let raw = luma.as_raw();
    let data = match selection {
        Some(indices) => indices.iter().map(|&i| raw[i] as f32).collect(),
        None => raw.iter().map(|&v| v as f32).collect(),
    };
    FeatureMatrix::new(data, 1)
}

pub fn color_features(rgb: &RgbImage, selection: Option<&[usize]>) -> Result<FeatureMatrix> {
    let raw = rgb.as_raw();
    let data = match selection {
        Some(indices) => {
            let mut data = Vec::with_capacity(indices.len() * 3);
            for &i in indices {
                data.extend(raw[i * 3..i * 3 + 3].iter().map(|&v| v as f32));
            }
            data
        }
        None => raw.iter().map(|&v| v as f32).collect(),
    };
    FeatureMatrix::new(data, 3)
}

/// Raster indices of the non-zero pixels of a mask, in scan order.
pub fn compact_indices(mask: &GrayImage) -> Vec<usize> {
    mask.as_raw()
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .map(|(i, _)| i)
        .collect()
}

/// Place labels of a compacted subset back at their raster positions.
///
/// Positions not listed in `indices` stay `None`.
pub fn scatter_labels(indices: &[usize], labels: &[usize], len: usize) -> Vec<Option<usize>> {
    debug_assert_eq!(indices.len(), labels.len());
    let mut full = vec![None; len];
    for (&index, &label) in indices.iter().zip(labels) {
        full[index] = Some(label);
    }
    full
}

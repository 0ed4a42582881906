use image::GrayImage;
use crate::{error::Result, traits::ImagePreprocessor};

/// Box-blur smoothing over a `(2r + 1) x (2r + 1)` window
#[derive(Debug, Clone)]
pub struct BoxBlurPreprocessor {
    pub radius: u32,
}

impl Default for BoxBlurPreprocessor {
    fn default() -> Self {
        Self { radius: 2 }
    }
}

impl ImagePreprocessor for BoxBlurPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        if self.radius == 0 || image.width() == 0 || image.height() == 0 {
            return Ok(image.clone());
        }
        Ok(imageproc::filter::box_filter(image, self.radius, self.radius))
    }
}

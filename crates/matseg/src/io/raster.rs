use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;
use crate::{
    error::Result,
    pipeline::SegmentationResult,
    types::SourceImage,
};

/// Decode an image file into its color and intensity views.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
    let image = image::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), width = image.width(), height = image.height(), "image loaded");
    Ok(SourceImage::from_dynamic(image))
}

/// Decode an in-memory image, guessing the format from its header.
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<SourceImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(SourceImage::from_dynamic(image))
}

/// Files written for one segmented image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedOutput {
    pub image: PathBuf,
    pub sidecar: Option<PathBuf>,
}

/// Output file stem for `source`: whitespace and separators become underscores.
pub fn output_stem(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    stem.chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Write `<stem>_segmented.png` into `out_dir`, plus `<stem>_segmented.txt`
/// holding the coverage percentage when `sidecar` is set.
pub fn save_segmentation<P, Q>(
    result: &SegmentationResult,
    out_dir: P,
    source: Q,
    sidecar: bool,
) -> Result<SavedOutput>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let stem = output_stem(source.as_ref());
    let image_path = out_dir.join(format!("{stem}_segmented.png"));
    result.combined.save(&image_path)?;

    let sidecar_path = if sidecar {
        let path = out_dir.join(format!("{stem}_segmented.txt"));
        fs::write(&path, format!("{:.2}\n", result.percentage))?;
        Some(path)
    } else {
        None
    };

    debug!(path = %image_path.display(), percentage = result.percentage, "segmentation saved");
    Ok(SavedOutput { image: image_path, sidecar: sidecar_path })
}

impl SegmentationResult {
    /// See [`save_segmentation`].
    pub fn save<P: AsRef<Path>, Q: AsRef<Path>>(&self, out_dir: P, source: Q, sidecar: bool) -> Result<SavedOutput> {
        save_segmentation(self, out_dir, source, sidecar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SegmentError, pipeline::Segmenter};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn split_image() -> RgbImage {
        RgbImage::from_fn(8, 4, |x, _| if x < 2 { Rgb([230, 230, 230]) } else { Rgb([10, 10, 10]) })
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().expect("Should create temp dir");
        let path = dir.path().join("sample.png");
        split_image().save(&path).expect("Should write png");

        let image = load_image(&path).expect("Should load");
        assert_eq!((image.width(), image.height()), (8, 4));
        assert_eq!(image.luma().get_pixel(0, 0).0[0], 230);

        let bytes = fs::read(&path).expect("Should read bytes");
        let from_bytes = load_image_from_bytes(&bytes).expect("Should decode");
        assert_eq!(from_bytes.rgb(), image.rgb());
    }

    #[test]
    fn test_undecodable_input() {
        let err = load_image_from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, SegmentError::Load(_)));
    }

    #[test]
    fn test_save_with_sidecar() {
        let dir = TempDir::new().expect("Should create temp dir");
        let segmenter = Segmenter::builder().build().expect("Should build");
        let result = segmenter
            .segment(&SourceImage::from_rgb(split_image()))
            .expect("Should segment");

        let saved = result
            .save(dir.path().join("out"), "my sample.jpg", true)
            .expect("Should save");

        assert!(saved.image.ends_with("my_sample_segmented.png"));
        assert!(saved.image.exists());
        let text = fs::read_to_string(saved.sidecar.expect("Should write sidecar")).expect("Should read");
        assert_eq!(text.trim(), "25.00");
    }
}

//! Folder-level processing.
//!
//! Images are independent of one another, so the per-image work runs on the
//! rayon pool. Dataset ids are handed out afterwards, in input order, by a
//! single [`DatasetAssembler`].

use std::{
    fs,
    path::{Path, PathBuf},
};
use rayon::prelude::*;
use tracing::{info, warn};
use crate::{
    coco::{Dataset, DatasetAssembler, DatasetInfo, ImageDescriptor, UNASSIGNED_IMAGE_ID},
    error::Result,
    io::{SavedOutput, load_image, save_segmentation},
    pipeline::Segmenter,
    types::{PolygonAnnotation, SourceImage},
};

/// File extensions picked up by [`collect_images`]
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Image files directly inside `folder`, sorted by file name.
pub fn collect_images<P: AsRef<Path>>(folder: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Outcome of [`annotate_batch`]
#[derive(Debug)]
pub struct BatchReport {
    pub dataset: Dataset,
    pub processed: usize,
    /// Skipped inputs with the reason they failed
    pub failed: Vec<(PathBuf, String)>,
    /// Files written per processed image, empty when nothing was saved
    pub outputs: Vec<SavedOutput>,
}

/// Segment and annotate every image, then assemble one dataset.
///
/// An image that fails to load or segment is logged and left out; ids stay
/// consecutive over the images that made it.
pub fn annotate_batch(segmenter: &Segmenter, paths: &[PathBuf], info: DatasetInfo) -> Result<BatchReport> {
    let outcomes: Vec<Result<(ImageDescriptor, Vec<PolygonAnnotation>)>> = paths
        .par_iter()
        .map(|path| annotate_one(segmenter, path))
        .collect();

    let mut assembler = DatasetAssembler::new(info);
    let mut failed = Vec::new();
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok((descriptor, annotations)) => {
                assembler.add_image(descriptor, annotations)?;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping image");
                failed.push((path.clone(), e.to_string()));
            }
        }
    }

    let processed = assembler.image_count();
    info!(processed, failed = failed.len(), "batch annotation finished");
    Ok(BatchReport { dataset: assembler.finish(), processed, failed, outputs: Vec::new() })
}

fn annotate_one(segmenter: &Segmenter, path: &Path) -> Result<(ImageDescriptor, Vec<PolygonAnnotation>)> {
    let image = load_image(path)?;
    let annotations = segmenter.segment_and_annotate(&image, UNASSIGNED_IMAGE_ID)?;
    Ok((describe(path, &image), annotations))
}

/// Segment every image once, write its overlay into `out_dir`, and build the
/// dataset from the same segmentation.
pub fn export_batch<P: AsRef<Path> + Sync>(
    segmenter: &Segmenter,
    paths: &[PathBuf],
    out_dir: P,
    sidecar: bool,
    info: DatasetInfo,
) -> Result<BatchReport> {
    let outcomes: Vec<Result<(ImageDescriptor, Vec<PolygonAnnotation>, SavedOutput)>> = paths
        .par_iter()
        .map(|path| {
            let image = load_image(path)?;
            let segmentation = segmenter.segment(&image)?;
            let saved = save_segmentation(&segmentation, out_dir.as_ref(), path, sidecar)?;
            let annotations = segmenter.annotate_segmentation(&image, &segmentation, UNASSIGNED_IMAGE_ID)?;
            info!(path = %path.display(), percentage = segmentation.percentage, "segmented");
            Ok((describe(path, &image), annotations, saved))
        })
        .collect();

    let mut assembler = DatasetAssembler::new(info);
    let mut failed = Vec::new();
    let mut outputs = Vec::new();
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok((descriptor, annotations, saved)) => {
                assembler.add_image(descriptor, annotations)?;
                outputs.push(saved);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping image");
                failed.push((path.clone(), e.to_string()));
            }
        }
    }

    let processed = assembler.image_count();
    info!(processed, failed = failed.len(), "batch export finished");
    Ok(BatchReport { dataset: assembler.finish(), processed, failed, outputs })
}

fn describe(path: &Path, image: &SourceImage) -> ImageDescriptor {
    ImageDescriptor {
        width: image.width(),
        height: image.height(),
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Per-image result of [`segment_batch`]
#[derive(Debug)]
pub struct SegmentOutcome {
    pub source: PathBuf,
    pub result: Result<(f64, SavedOutput)>,
}

/// Segment every image and write its overlay (and optional sidecar) into `out_dir`.
pub fn segment_batch<P: AsRef<Path> + Sync>(
    segmenter: &Segmenter,
    paths: &[PathBuf],
    out_dir: P,
    sidecar: bool,
) -> Vec<SegmentOutcome> {
    let outcomes: Vec<SegmentOutcome> = paths
        .par_iter()
        .map(|path| {
            let result = load_image(path)
                .and_then(|image| segmenter.segment(&image))
                .and_then(|segmentation| {
                    let saved = save_segmentation(&segmentation, out_dir.as_ref(), path, sidecar)?;
                    Ok((segmentation.percentage, saved))
                });
            SegmentOutcome { source: path.clone(), result }
        })
        .collect();

    for outcome in &outcomes {
        match &outcome.result {
            Ok((percentage, _)) => info!(path = %outcome.source.display(), percentage, "segmented"),
            Err(e) => warn!(path = %outcome.source.display(), error = %e, "skipping image"),
        }
    }
    outcomes
}

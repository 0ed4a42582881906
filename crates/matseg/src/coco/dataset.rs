use std::{fs, path::Path};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::info;
use crate::{
    error::{Result, SegmentError},
    types::{Category, PolygonAnnotation},
};

/// Image id carried by annotations produced before the image is registered
pub const UNASSIGNED_IMAGE_ID: u64 = 0;

/// Fixed metadata block at the top of an exported dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetInfo {
    pub description: String,
    pub version: String,
    pub year: u32,
    pub contributor: String,
    pub date_created: String,
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self {
            description: "COCO-format semantic segmentation dataset (polygon annotations) from folder processing".to_string(),
            version: "1.0".to_string(),
            year: 2025,
            contributor: "matseg".to_string(),
            date_created: "2025-03-02".to_string(),
        }
    }
}

/// Image metadata supplied by the caller, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: u64,
    #[serde(flatten)]
    pub annotation: PolygonAnnotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: u8,
    pub name: String,
    pub supercategory: String,
}

/// The exported annotation index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub info: DatasetInfo,
    pub licenses: Vec<serde_json::Value>,
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub categories: Vec<CategoryRecord>,
}

impl Dataset {
    pub fn new(info: DatasetInfo) -> Self {
        Self {
            info,
            licenses: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
            categories: category_table(),
        }
    }

    /// Check id sequences and image references.
    pub fn validate(&self) -> Result<()> {
        for (expected, image) in (1u64..).zip(&self.images) {
            if image.id != expected {
                return Err(SegmentError::Validation(format!(
                    "image id {} found where {} was expected",
                    image.id, expected
                )));
            }
        }
        let image_count = self.images.len() as u64;
        for (expected, record) in (1u64..).zip(&self.annotations) {
            if record.id != expected {
                return Err(SegmentError::Validation(format!(
                    "annotation id {} found where {} was expected",
                    record.id, expected
                )));
            }
            if record.annotation.image_id == UNASSIGNED_IMAGE_ID || record.annotation.image_id > image_count {
                return Err(SegmentError::Validation(format!(
                    "annotation {} references unknown image id {}",
                    record.id, record.annotation.image_id
                )));
            }
            if Category::from_id(record.annotation.category_id).is_none() {
                return Err(SegmentError::Validation(format!(
                    "annotation {} has unknown category id {}",
                    record.id, record.annotation.category_id
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(content)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// `{1: background, 2: material}`
pub fn category_table() -> Vec<CategoryRecord> {
    Category::iter()
        .map(|category| CategoryRecord {
            id: category.id(),
            name: category.name().to_string(),
            supercategory: "none".to_string(),
        })
        .collect()
}

/// Sole authority for image and annotation ids within one dataset.
#[derive(Debug)]
pub struct DatasetAssembler {
    dataset: Dataset,
    next_image_id: u64,
    next_annotation_id: u64,
}

impl Default for DatasetAssembler {
    fn default() -> Self {
        Self::new(DatasetInfo::default())
    }
}

impl DatasetAssembler {
    pub fn new(info: DatasetInfo) -> Self {
        Self {
            dataset: Dataset::new(info),
            next_image_id: 1,
            next_annotation_id: 1,
        }
    }

    /// Append an image descriptor and return its new id.
    pub fn register_image(&mut self, descriptor: ImageDescriptor) -> u64 {
        let id = self.next_image_id;
        self.next_image_id += 1;
        self.dataset.images.push(ImageRecord {
            id,
            width: descriptor.width,
            height: descriptor.height,
            file_name: descriptor.file_name,
        });
        id
    }

    /// Append annotations, each of which must reference an already registered image.
    ///
    /// The whole list is checked before anything is appended.
    pub fn append_annotations(&mut self, annotations: Vec<PolygonAnnotation>) -> Result<()> {
        if let Some(bad) = annotations
            .iter()
            .find(|a| a.image_id == UNASSIGNED_IMAGE_ID || a.image_id >= self.next_image_id)
        {
            return Err(SegmentError::Validation(format!(
                "annotation references image id {} which has not been assigned",
                bad.image_id
            )));
        }
        for annotation in annotations {
            let id = self.next_annotation_id;
            self.next_annotation_id += 1;
            self.dataset.annotations.push(AnnotationRecord { id, annotation });
        }
        Ok(())
    }

    /// Register an image and attach `annotations` to it.
    ///
    /// Annotations carrying [`UNASSIGNED_IMAGE_ID`] are bound to the new image.
    /// Any other image id must already equal the id being assigned; otherwise
    /// nothing is registered and a `Validation` error is returned.
    pub fn add_image(&mut self, descriptor: ImageDescriptor, annotations: Vec<PolygonAnnotation>) -> Result<u64> {
        let image_id = self.next_image_id;
        if let Some(bad) = annotations
            .iter()
            .find(|a| a.image_id != UNASSIGNED_IMAGE_ID && a.image_id != image_id)
        {
            return Err(SegmentError::Validation(format!(
                "annotation for image {} ({}) references image id {}",
                image_id, descriptor.file_name, bad.image_id
            )));
        }

        let image_id = self.register_image(descriptor);
        let annotations = annotations
            .into_iter()
            .map(|annotation| PolygonAnnotation { image_id, ..annotation })
            .collect();
        self.append_annotations(annotations)?;
        Ok(image_id)
    }

    pub fn image_count(&self) -> usize {
        self.dataset.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.dataset.annotations.len()
    }

    pub fn finish(self) -> Dataset {
        info!(
            images = self.dataset.images.len(),
            annotations = self.dataset.annotations.len(),
            "dataset assembled"
        );
        self.dataset
    }
}

/// Assemble a dataset from `(descriptor, annotations)` pairs in input order.
pub fn build_dataset<I>(info: DatasetInfo, entries: I) -> Result<Dataset>
where
    I: IntoIterator<Item = (ImageDescriptor, Vec<PolygonAnnotation>)>,
{
    let mut assembler = DatasetAssembler::new(info);
    for (descriptor, annotations) in entries {
        assembler.add_image(descriptor, annotations)?;
    }
    Ok(assembler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(image_id: u64, category_id: u8) -> PolygonAnnotation {
        PolygonAnnotation {
            image_id,
            category_id,
            bbox: [0, 0, 4, 4],
            area: 16.0,
            segmentation: vec![vec![0, 0, 3, 0, 3, 3, 0, 3]],
            iscrowd: 0,
        }
    }

    fn descriptor(name: &str) -> ImageDescriptor {
        ImageDescriptor { width: 10, height: 8, file_name: name.to_string() }
    }

    #[test]
    fn test_ids_continue_across_images() {
        let dataset = build_dataset(
            DatasetInfo::default(),
            vec![
                (descriptor("a.png"), vec![annotation(0, 1), annotation(0, 2)]),
                (descriptor("b.png"), vec![]),
                (descriptor("c.png"), vec![annotation(0, 2)]),
            ],
        )
        .expect("Should assemble");

        let image_ids: Vec<u64> = dataset.images.iter().map(|i| i.id).collect();
        assert_eq!(image_ids, vec![1, 2, 3]);

        let annotation_ids: Vec<(u64, u64)> = dataset
            .annotations
            .iter()
            .map(|a| (a.id, a.annotation.image_id))
            .collect();
        assert_eq!(annotation_ids, vec![(1, 1), (2, 1), (3, 3)]);
        dataset.validate().expect("Should be valid");
    }

    #[test]
    fn test_unassigned_image_id_is_rejected() {
        let mut assembler = DatasetAssembler::default();
        let id = assembler.register_image(descriptor("a.png"));
        assert_eq!(id, 1);

        let err = assembler
            .append_annotations(vec![annotation(1, 2), annotation(2, 2)])
            .unwrap_err();
        assert!(matches!(err, SegmentError::Validation(_)));
        assert_eq!(assembler.annotation_count(), 0);

        assembler
            .append_annotations(vec![annotation(1, 2)])
            .expect("Should append");
        assert_eq!(assembler.annotation_count(), 1);
    }

    #[test]
    fn test_foreign_image_id_is_rejected() {
        let err = build_dataset(
            DatasetInfo::default(),
            vec![(descriptor("a.png"), vec![annotation(99, 2)])],
        )
        .unwrap_err();
        assert!(matches!(err, SegmentError::Validation(_)));

        let mut assembler = DatasetAssembler::default();
        assert!(assembler.add_image(descriptor("a.png"), vec![annotation(2, 1)]).is_err());
        assert_eq!(assembler.image_count(), 0);

        // An id that already matches the one being assigned is kept
        let id = assembler
            .add_image(descriptor("a.png"), vec![annotation(1, 1), annotation(0, 2)])
            .expect("Should add");
        assert_eq!(id, 1);
        assert_eq!(assembler.annotation_count(), 2);
    }

    #[test]
    fn test_json_shape() {
        let dataset = build_dataset(
            DatasetInfo::default(),
            vec![(descriptor("a.png"), vec![annotation(0, 2)])],
        )
        .expect("Should assemble");

        let value: serde_json::Value = serde_json::from_str(&dataset.to_json().expect("Should serialize"))
            .expect("Should parse");

        assert_eq!(value["licenses"], serde_json::json!([]));
        assert_eq!(value["images"][0]["file_name"], "a.png");
        assert_eq!(value["annotations"][0]["id"], 1);
        assert_eq!(value["annotations"][0]["image_id"], 1);
        assert_eq!(value["annotations"][0]["bbox"], serde_json::json!([0, 0, 4, 4]));
        assert_eq!(value["annotations"][0]["iscrowd"], 0);
        assert_eq!(
            value["categories"],
            serde_json::json!([
                {"id": 1, "name": "background", "supercategory": "none"},
                {"id": 2, "name": "material", "supercategory": "none"}
            ])
        );
        assert_eq!(value["info"]["year"], 2025);
    }

    #[test]
    fn test_from_json_rejects_dangling_reference() {
        let mut dataset = Dataset::new(DatasetInfo::default());
        dataset.annotations.push(AnnotationRecord { id: 1, annotation: annotation(3, 2) });
        let json = dataset.to_json().expect("Should serialize");
        assert!(matches!(Dataset::from_json(&json), Err(SegmentError::Validation(_))));
    }
}

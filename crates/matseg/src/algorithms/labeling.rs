use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use crate::{
    error::{Result, SegmentError},
    types::{Category, ClusterResult, SemanticAssignment},
};

/// Rule that decides which cluster is "material".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelStrategy {
    /// The largest cluster is background, every other cluster is material
    Auto,
    /// The brightest centroid is material
    #[default]
    Bright,
    /// The darkest centroid is material
    Dark,
}

impl LabelStrategy {
    /// Parse a strategy name, failing with `InvalidStrategy` on anything unknown.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse()
            .map_err(|_| SegmentError::InvalidStrategy(name.to_string()))
    }

    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    /// Map every cluster of `result` to a category.
    ///
    /// Ties always leave cluster 0 as background.
    pub fn assign(&self, result: &ClusterResult) -> SemanticAssignment {
        let k = result.k();
        match self {
            Self::Auto => {
                let counts = result.counts();
                let mut background = 0;
                for (cluster, &count) in counts.iter().enumerate() {
                    if count > counts[background] {
                        background = cluster;
                    }
                }
                let categories = (0..k)
                    .map(|c| {
                        if c == background {
                            Category::Background
                        } else {
                            Category::Material
                        }
                    })
                    .collect();
                SemanticAssignment::new(categories)
            }
            Self::Bright => SemanticAssignment::single_material(k, extreme_cluster(result, |a, b| a >= b)),
            Self::Dark => SemanticAssignment::single_material(k, extreme_cluster(result, |a, b| a <= b)),
        }
    }
}

/// Cluster whose score wins under `better`; later ids win ties.
fn extreme_cluster(result: &ClusterResult, better: impl Fn(f64, f64) -> bool) -> usize {
    let mut chosen = 0;
    for cluster in 1..result.k() {
        if better(result.centroid_score(cluster), result.centroid_score(chosen)) {
            chosen = cluster;
        }
    }
    chosen
}

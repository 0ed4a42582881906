use crate::{
    algorithms::{FeatureExtractor, KMeans, LabelStrategy},
    coco::PolygonConverter,
    error::{Result, SegmentError},
    pipeline::{CoverageMode, LabelSource, Segmenter},
    traits::Clusterer,
};

/// Builder for creating segmenters with a fluent API
pub struct SegmenterBuilder {
    strategy: LabelStrategy,
    kmeans: KMeans,
    clusterer: Option<Box<dyn Clusterer>>,
    smoothing_radius: Option<u32>,
    coverage: CoverageMode,
    label_source: LabelSource,
    single_pass_clusters: usize,
    min_area: f64,
}

impl SegmenterBuilder {
    /// Create a new segmenter builder
    pub fn new() -> Self {
        Self {
            strategy: LabelStrategy::default(),
            kmeans: KMeans::default(),
            clusterer: None,
            smoothing_radius: None,
            coverage: CoverageMode::default(),
            label_source: LabelSource::default(),
            single_pass_clusters: 2,
            min_area: crate::coco::DEFAULT_MIN_AREA,
        }
    }

    /// Set the pass-1 labeling strategy
    pub fn strategy(mut self, strategy: LabelStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the pass-1 labeling strategy by name, rejecting unknown names right away
    pub fn strategy_name(self, name: &str) -> Result<Self> {
        let strategy = LabelStrategy::parse(name)?;
        Ok(self.strategy(strategy))
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.kmeans.seed = seed;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.kmeans.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.kmeans.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.kmeans.tolerance = tolerance;
        self
    }

    /// Box-blur the intensity channel before pass 1
    pub fn with_smoothing(mut self, radius: u32) -> Self {
        self.smoothing_radius = Some(radius);
        self
    }

    pub fn coverage(mut self, coverage: CoverageMode) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn label_source(mut self, source: LabelSource) -> Self {
        self.label_source = source;
        self
    }

    /// Raw cluster count for the single-pass variant
    pub fn single_pass_clusters(mut self, k: usize) -> Self {
        self.single_pass_clusters = k;
        self
    }

    pub fn min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Set the clustering engine (replaces the default k-means)
    pub fn set_clusterer<C>(mut self, clusterer: C) -> Self
    where
        C: Clusterer + 'static,
    {
        self.clusterer = Some(Box::new(clusterer));
        self
    }

    /// Validate the settings and build the segmenter
    pub fn build(self) -> Result<Segmenter> {
        if self.single_pass_clusters < 2 {
            return Err(SegmentError::InvalidConfig(format!(
                "single-pass clustering needs at least 2 clusters, got {}",
                self.single_pass_clusters
            )));
        }
        if self.kmeans.n_init == 0 || self.kmeans.max_iter == 0 {
            return Err(SegmentError::InvalidConfig(
                "n_init and max_iter must both be at least 1".to_string(),
            ));
        }
        if !(self.min_area.is_finite() && self.min_area >= 0.0) {
            return Err(SegmentError::InvalidConfig(format!(
                "min_area must be a non-negative number, got {}",
                self.min_area
            )));
        }

        let extractor = match self.smoothing_radius {
            Some(radius) => FeatureExtractor::intensity().with_smoothing(radius),
            None => FeatureExtractor::intensity(),
        };
        let kmeans = self.kmeans;
        let clusterer = self.clusterer.unwrap_or_else(|| Box::new(kmeans));

        Ok(Segmenter {
            extractor,
            clusterer,
            strategy: self.strategy,
            coverage: self.coverage,
            label_source: self.label_source,
            single_pass_clusters: self.single_pass_clusters,
            converter: PolygonConverter::new(self.min_area),
        })
    }
}

impl Default for SegmenterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_fails_before_build() {
        let err = SegmenterBuilder::new()
            .strategy_name("loudest")
            .err()
            .expect("Should reject unknown strategy");
        assert!(matches!(err, SegmentError::InvalidStrategy(_)));
    }

    #[test]
    fn test_builder_settings() {
        let segmenter = Segmenter::builder()
            .strategy_name("dark")
            .expect("Should parse")
            .with_smoothing(2)
            .build()
            .expect("Should build");
        assert_eq!(segmenter.strategy(), LabelStrategy::Dark);
        assert!(segmenter.extractor.smoothing.is_some());
    }

    #[test]
    fn test_rejects_single_cluster_variant() {
        let err = Segmenter::builder().single_pass_clusters(1).build().unwrap_err();
        assert!(matches!(err, SegmentError::InvalidConfig(_)));
    }
}

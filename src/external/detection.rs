//! Recognition capabilities consumed by strategies and the monitor.
//!
//! Two detector families are modelled:
//!
//! - colour-range detection: regions whose HSV values fall inside a bound
//!   and whose contour area exceeds a minimum, reported with their areas;
//! - trained-model detection: a [`ModelBackend`] produces raw candidates and
//!   [`ModelDetector`] applies the confidence threshold, greedy non-max
//!   suppression, and an optional class allow-list.
//!
//! Both report a [`Detection`] whose `found()` mirrors "at least one region".

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::session::{Frame, GameSession, Region, SessionError};

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("capture for detection failed: {0}")]
    Session(#[from] SessionError),
    #[error("detector back-end failed: {0}")]
    Backend(String),
    #[error("invalid detection query: {0}")]
    InvalidQuery(String),
}

/// Colour in HSV space using the 8-bit OpenCV convention (H in 0..=180).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HsvColor {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl HsvColor {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Parameters for a colour-range detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRangeQuery {
    pub min: HsvColor,
    pub max: HsvColor,
    /// Regions with an area at or below this value are discarded.
    pub min_area: f64,
}

impl ColorRangeQuery {
    pub fn new(min: HsvColor, max: HsvColor, min_area: f64) -> Self {
        Self { min, max, min_area }
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.min.h > self.max.h || self.min.s > self.max.s || self.min.v > self.max.v {
            return Err(DetectionError::InvalidQuery(format!(
                "lower bound {:?} exceeds upper bound {:?}",
                self.min, self.max
            )));
        }
        if self.min_area < 0.0 {
            return Err(DetectionError::InvalidQuery("negative minimum area".into()));
        }
        Ok(())
    }
}

/// Regions found by a detector with one value per region (area, class id…).
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<T> {
    pub regions: Vec<Region>,
    pub values: Vec<T>,
}

impl<T> Detection<T> {
    pub fn empty() -> Self {
        Self {
            regions: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, region: Region, value: T) {
        self.regions.push(region);
        self.values.push(value);
    }

    pub fn found(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &T)> {
        self.regions.iter().zip(self.values.iter())
    }
}

impl<T> Default for Detection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Colour-range region detection.
pub trait ColorRangeDetector: Send + Sync {
    fn detect(
        &self,
        frame: &Frame,
        query: &ColorRangeQuery,
    ) -> Result<Detection<f64>, DetectionError>;
}

/// Parameters for a trained-model detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelQuery {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Class allow-list; empty keeps every class.
    pub classes: Vec<u32>,
}

impl ModelQuery {
    pub fn new(score_threshold: f32, nms_threshold: f32) -> Self {
        Self {
            score_threshold,
            nms_threshold,
            classes: Vec::new(),
        }
    }

    pub fn with_classes<I>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        self.classes = classes.into_iter().collect();
        self
    }

    fn allows(&self, class_id: u32) -> bool {
        self.classes.is_empty() || self.classes.contains(&class_id)
    }
}

impl Default for ModelQuery {
    fn default() -> Self {
        Self::new(0.4, 0.45)
    }
}

/// Raw box emitted by a model before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub region: Region,
    pub score: f32,
    pub class_id: u32,
}

/// Inference back-end (ONNX runtime, remote service, …).
pub trait ModelBackend: Send + Sync {
    fn infer(&self, frame: &Frame) -> Result<Vec<Candidate>, DetectionError>;
}

/// Greedy non-max suppression.
///
/// Candidates under `score_threshold` are dropped, the rest are visited in
/// descending score order and a candidate is kept only if its IoU with every
/// already kept box is at most `nms_threshold`. Returns indices into
/// `candidates`, best first.
pub fn non_max_suppression(
    candidates: &[Candidate],
    score_threshold: f32,
    nms_threshold: f32,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&idx| candidates[idx].score >= score_threshold)
        .collect();
    order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for idx in order {
        let region = &candidates[idx].region;
        let overlaps = kept
            .iter()
            .any(|&other| candidates[other].region.iou(region) > nms_threshold);
        if !overlaps {
            kept.push(idx);
        }
    }
    kept
}

/// Trained-model detector wrapping a [`ModelBackend`].
pub struct ModelDetector<B> {
    backend: B,
}

impl<B: ModelBackend> ModelDetector<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run inference and return surviving regions with their class ids.
    pub fn detect(
        &self,
        frame: &Frame,
        query: &ModelQuery,
    ) -> Result<Detection<u32>, DetectionError> {
        let candidates = self.backend.infer(frame)?;
        let mut detection = Detection::empty();
        for idx in non_max_suppression(&candidates, query.score_threshold, query.nms_threshold) {
            let candidate = &candidates[idx];
            if query.allows(candidate.class_id) {
                detection.push(candidate.region, candidate.class_id);
            }
        }
        Ok(detection)
    }
}

/// Presence check for a watched on-screen indicator (health bar, buff icon…).
#[async_trait]
pub trait IndicatorProbe: Send + Sync {
    fn name(&self) -> &str;
    async fn present(&self, session: &dyn GameSession) -> Result<bool, DetectionError>;
}

/// Indicator recognised by colour inside a fixed screen region.
pub struct ColorIndicator {
    name: String,
    region: Region,
    query: ColorRangeQuery,
    detector: Arc<dyn ColorRangeDetector>,
}

impl ColorIndicator {
    pub fn new(
        name: impl Into<String>,
        region: Region,
        query: ColorRangeQuery,
        detector: Arc<dyn ColorRangeDetector>,
    ) -> Self {
        Self {
            name: name.into(),
            region,
            query,
            detector,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Capture the indicator region and run the colour query on it.
    pub fn locate(&self, session: &dyn GameSession) -> Result<Detection<f64>, DetectionError> {
        let frame = session.capture(Some(self.region))?;
        self.detector.detect(&frame, &self.query)
    }
}

#[async_trait]
impl IndicatorProbe for ColorIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn present(&self, session: &dyn GameSession) -> Result<bool, DetectionError> {
        Ok(self.locate(session)?.found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: i32, score: f32, class_id: u32) -> Candidate {
        Candidate {
            region: Region::new(x, 0, 10, 10),
            score,
            class_id,
        }
    }

    struct FixedBackend(Vec<Candidate>);

    impl ModelBackend for FixedBackend {
        fn infer(&self, _frame: &Frame) -> Result<Vec<Candidate>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn suppression_keeps_highest_scoring_overlap() {
        let candidates = vec![
            candidate(0, 0.6, 1),
            candidate(1, 0.9, 1),
            candidate(50, 0.5, 2),
            candidate(80, 0.1, 3),
        ];
        let kept = non_max_suppression(&candidates, 0.4, 0.45);
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn model_detector_applies_allow_list() {
        let detector = ModelDetector::new(FixedBackend(vec![
            candidate(0, 0.9, 1),
            candidate(40, 0.8, 2),
            candidate(80, 0.7, 3),
        ]));
        let frame = Frame::filled(1, 1, [0, 0, 0]);

        let all = detector.detect(&frame, &ModelQuery::default()).unwrap();
        assert_eq!(all.values, vec![1, 2, 3]);

        let filtered = detector
            .detect(&frame, &ModelQuery::default().with_classes([3]))
            .unwrap();
        assert!(filtered.found());
        assert_eq!(filtered.values, vec![3]);
        assert_eq!(filtered.regions, vec![Region::new(80, 0, 10, 10)]);
    }

    /// Reports one region when the captured frame is wider than `min_width`.
    struct WidthDetector {
        min_width: u32,
    }

    impl ColorRangeDetector for WidthDetector {
        fn detect(
            &self,
            frame: &Frame,
            query: &ColorRangeQuery,
        ) -> Result<Detection<f64>, DetectionError> {
            query.validate()?;
            let mut detection = Detection::empty();
            if frame.width > self.min_width {
                detection.push(Region::new(0, 0, frame.width, frame.height), 42.0);
            }
            Ok(detection)
        }
    }

    fn health_query() -> ColorRangeQuery {
        ColorRangeQuery::new(HsvColor::new(0, 120, 120), HsvColor::new(10, 255, 255), 5.0)
    }

    #[tokio::test]
    async fn color_indicator_probes_its_region() {
        let session = crate::test_support::StaticSession::shared();
        let wide = ColorIndicator::new(
            "health bar",
            Region::new(100, 650, 300, 12),
            health_query(),
            Arc::new(WidthDetector { min_width: 200 }),
        );
        let narrow = ColorIndicator::new(
            "buff icon",
            Region::new(100, 650, 30, 30),
            health_query(),
            Arc::new(WidthDetector { min_width: 200 }),
        );

        assert_eq!(wide.name(), "health bar");
        assert!(wide.present(&*session).await.unwrap());
        assert!(!narrow.present(&*session).await.unwrap());
        assert_eq!(wide.locate(&*session).unwrap().values, vec![42.0]);
    }

    #[test]
    fn color_query_rejects_inverted_bounds() {
        let query = ColorRangeQuery::new(HsvColor::new(90, 0, 0), HsvColor::new(10, 255, 255), 5.0);
        assert!(matches!(query.validate(), Err(DetectionError::InvalidQuery(_))));
    }
}

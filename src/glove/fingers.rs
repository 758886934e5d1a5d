//! Flex samples and per-finger thresholding
//!
//! Turns raw flex readings into [`FingerVector`]s. Only changes are
//! reported, so a finger held past its threshold yields one activation.

use std::str::FromStr;

use crate::chord::{FingerVector, FINGER_COUNT};

use super::aggregator::MeanAggregator;

/// Default threshold for every finger
pub const DEFAULT_SENSITIVITY: u16 = 15;

/// Raw flex readings, one per finger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlexSample([u16; FINGER_COUNT]);

impl FlexSample {
    pub fn new(values: [u16; FINGER_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[u16; FINGER_COUNT] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleParseError {
    #[error("expected 5 flex values, got {0}")]
    WrongCount(usize),

    #[error("invalid flex value {0:?}")]
    InvalidValue(String),
}

impl FromStr for FlexSample {
    type Err = SampleParseError;

    /// Parse five integers separated by whitespace and/or commas
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();

        if fields.len() != FINGER_COUNT {
            return Err(SampleParseError::WrongCount(fields.len()));
        }

        let mut values = [0u16; FINGER_COUNT];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|_| SampleParseError::InvalidValue(field.to_string()))?;
        }

        Ok(Self::new(values))
    }
}

/// Signed flex values after smoothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlexDeltas([i32; FINGER_COUNT]);

impl FlexDeltas {
    pub fn new(values: [i32; FINGER_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[i32; FINGER_COUNT] {
        &self.0
    }
}

impl From<FlexSample> for FlexDeltas {
    fn from(sample: FlexSample) -> Self {
        Self(sample.0.map(i32::from))
    }
}

/// Per-finger activation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensitivity([u16; FINGER_COUNT]);

impl Sensitivity {
    pub fn new(thresholds: [u16; FINGER_COUNT]) -> Self {
        Self(thresholds)
    }

    /// Same threshold for every finger
    pub fn uniform(threshold: u16) -> Self {
        Self([threshold; FINGER_COUNT])
    }

    pub fn thresholds(&self) -> &[u16; FINGER_COUNT] {
        &self.0
    }

    /// A finger is active when strictly above its threshold
    pub fn detect(&self, deltas: &FlexDeltas) -> FingerVector {
        let mut active = [false; FINGER_COUNT];
        for (finger, is_active) in active.iter_mut().enumerate() {
            *is_active = deltas.0[finger] > i32::from(self.0[finger]);
        }
        FingerVector::new(active)
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::uniform(DEFAULT_SENSITIVITY)
    }
}

/// Thresholding settings for the glove listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GloveSettings {
    pub sensitivity: Sensitivity,
    /// Moving-mean window, 0 disables smoothing
    pub aggregation_window: usize,
}

/// Converts samples into finger vectors, reporting changes only
#[derive(Debug, Clone)]
pub struct FingerTracker {
    aggregator: Option<MeanAggregator>,
    settings: GloveSettings,
    last: FingerVector,
}

impl FingerTracker {
    pub fn new(settings: GloveSettings) -> Self {
        Self {
            aggregator: new_aggregator(settings.aggregation_window),
            settings,
            last: FingerVector::default(),
        }
    }

    /// Switch to new settings, keeping smoothing history where possible.
    ///
    /// Returns false when nothing changed.
    pub fn apply(&mut self, settings: GloveSettings) -> bool {
        if settings == self.settings {
            return false;
        }

        let window = settings.aggregation_window;
        if window != self.settings.aggregation_window {
            if window == 0 {
                self.aggregator = None;
            } else if let Some(aggregator) = &mut self.aggregator {
                aggregator.set_window(window);
            } else {
                self.aggregator = new_aggregator(window);
            }
        }

        self.settings = settings;
        true
    }

    /// Process a sample, returning the new vector if it differs from the last
    pub fn process(&mut self, sample: FlexSample) -> Option<FingerVector> {
        let deltas = match &mut self.aggregator {
            Some(aggregator) => aggregator.push_and_aggregate(sample),
            None => sample.into(),
        };

        let fingers = self.settings.sensitivity.detect(&deltas);
        if fingers == self.last {
            return None;
        }

        self.last = fingers;
        Some(fingers)
    }
}

fn new_aggregator(window: usize) -> Option<MeanAggregator> {
    (window > 0).then(|| MeanAggregator::new(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sensitivity: Sensitivity) -> GloveSettings {
        GloveSettings {
            sensitivity,
            aggregation_window: 0,
        }
    }

    #[test]
    fn test_parse_whitespace_and_commas() {
        let sample: FlexSample = "1 2,3 ,4\t5".parse().unwrap();
        assert_eq!(sample.values(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "1 2 3".parse::<FlexSample>(),
            Err(SampleParseError::WrongCount(3))
        );
        assert_eq!(
            "1 2 3 4 x".parse::<FlexSample>(),
            Err(SampleParseError::InvalidValue("x".into()))
        );
        assert!("1 2 3 4 70000".parse::<FlexSample>().is_err());
    }

    #[test]
    fn test_threshold_is_strict() {
        let sensitivity = Sensitivity::new([10, 20, 30, 40, 50]);
        let fingers = sensitivity.detect(&FlexDeltas::new([11, 20, 31, 0, -5]));
        assert_eq!(fingers.as_array(), &[true, false, true, false, false]);
    }

    #[test]
    fn test_tracker_reports_changes_only() {
        let mut tracker = FingerTracker::new(raw(Sensitivity::default()));

        assert_eq!(tracker.process(FlexSample::new([0; 5])), None);

        let pressed = tracker.process(FlexSample::new([0, 40, 0, 0, 0]));
        assert_eq!(pressed.and_then(|v| v.first_active()).map(|f| f.number()), Some(2));
        assert_eq!(tracker.process(FlexSample::new([0, 50, 0, 0, 0])), None);

        let released = tracker.process(FlexSample::new([0, 0, 0, 0, 0]));
        assert_eq!(released, Some(FingerVector::default()));
    }

    #[test]
    fn test_tracker_with_aggregation() {
        let mut tracker = FingerTracker::new(GloveSettings {
            aggregation_window: 3,
            ..raw(Sensitivity::default())
        });
        for _ in 0..3 {
            assert_eq!(tracker.process(FlexSample::new([100; 5])), None);
        }

        // mean of [100, 100, 200] is 133, deviation 67 > 15
        let bent = tracker.process(FlexSample::new([200, 100, 100, 100, 100]));
        assert_eq!(bent, Some(FingerVector::new([true, false, false, false, false])));

        // Holding still settles back below the threshold.
        tracker.process(FlexSample::new([200, 100, 100, 100, 100]));
        let settled = tracker.process(FlexSample::new([200, 100, 100, 100, 100]));
        assert_eq!(settled, Some(FingerVector::default()));
    }

    #[test]
    fn test_raised_threshold_releases_finger() {
        let mut tracker = FingerTracker::new(raw(Sensitivity::default()));
        let bent = FlexSample::new([0, 20, 0, 0, 0]);

        assert_eq!(
            tracker.process(bent),
            Some(FingerVector::new([false, true, false, false, false]))
        );

        assert!(tracker.apply(raw(Sensitivity::uniform(30))));
        assert_eq!(tracker.process(bent), Some(FingerVector::default()));
    }

    #[test]
    fn test_apply_same_settings_is_noop() {
        let mut tracker = FingerTracker::new(raw(Sensitivity::default()));
        assert!(!tracker.apply(raw(Sensitivity::default())));
    }

    #[test]
    fn test_toggle_aggregation_at_runtime() {
        let mut tracker = FingerTracker::new(raw(Sensitivity::default()));
        assert_eq!(tracker.process(FlexSample::new([100; 5])), Some(FingerVector::new([true; 5])));

        // With smoothing on, a steady reading has no deviation.
        assert!(tracker.apply(GloveSettings {
            aggregation_window: 4,
            ..raw(Sensitivity::default())
        }));
        assert_eq!(tracker.process(FlexSample::new([100; 5])), Some(FingerVector::default()));

        assert!(tracker.apply(raw(Sensitivity::default())));
        assert_eq!(tracker.process(FlexSample::new([100; 5])), Some(FingerVector::new([true; 5])));
    }
}

//! Moving-mean smoothing of flex samples
//!
//! Each output is the latest sample minus the mean of the last `window`
//! samples, so a finger reads high while it is bending and settles back
//! toward zero once it holds still.

use std::collections::VecDeque;

use crate::chord::FINGER_COUNT;

use super::fingers::{FlexDeltas, FlexSample};

#[derive(Debug, Clone)]
pub struct MeanAggregator {
    rows: VecDeque<FlexSample>,
    window: usize,
}

impl MeanAggregator {
    /// Create an aggregator over `window` samples.
    ///
    /// `window` must be non-zero.
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "aggregation window must be non-zero");

        Self {
            rows: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Push a sample and return its deviation from the window mean
    pub fn push_and_aggregate(&mut self, sample: FlexSample) -> FlexDeltas {
        while self.rows.len() >= self.window {
            self.rows.pop_front();
        }
        self.rows.push_back(sample);

        let len = self.rows.len() as i64;
        let mut deltas = [0i32; FINGER_COUNT];
        for (finger, delta) in deltas.iter_mut().enumerate() {
            let sum: i64 = self.rows.iter().map(|row| i64::from(row.values()[finger])).sum();
            let mean = sum / len;
            *delta = (i64::from(sample.values()[finger]) - mean) as i32;
        }

        FlexDeltas::new(deltas)
    }

    /// Resize the window, dropping the oldest samples when it shrinks
    pub fn set_window(&mut self, window: usize) {
        assert!(window > 0, "aggregation window must be non-zero");

        self.window = window;
        if self.rows.len() > window {
            self.rows.drain(..self.rows.len() - window);
        }
    }
}

//! Rolling delta history.

use motiongate_common::error::{MotionError, MotionResult};

/// Fixed-capacity circular buffer of the most recent per-frame deltas.
///
/// Capacity is set once at construction and never changes.
#[derive(Debug, Clone)]
pub struct DeltaHistory {
    values: Vec<f64>,
    filled: usize,
    write_index: usize,
}

impl DeltaHistory {
    /// Allocate a history holding `len` deltas.
    pub fn new(len: usize) -> MotionResult<Self> {
        if len == 0 {
            return Err(MotionError::config("delta history length must be at least 1"));
        }

        let mut values = Vec::new();
        values.try_reserve_exact(len).map_err(|e| {
            MotionError::allocation(format!("delta history of {len} entries: {e}"))
        })?;
        values.resize(len, 0.0);

        Ok(Self {
            values,
            filled: 0,
            write_index: 0,
        })
    }

    /// Record a delta, evicting the oldest once the window is full.
    pub fn push(&mut self, delta: f64) {
        self.values[self.write_index] = delta;
        self.write_index = (self.write_index + 1) % self.values.len();
        self.filled = (self.filled + 1).min(self.values.len());
    }

    /// Mean of the recorded deltas; 0.0 before the first push.
    pub fn average(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        // Slots fill from index 0, so the first `filled` are always live.
        let sum: f64 = self.values[..self.filled].iter().sum();
        sum / self.filled as f64
    }

    /// The most recently pushed delta; 0.0 before the first push.
    pub fn last(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        let len = self.values.len();
        self.values[(self.write_index + len - 1) % len]
    }

    /// Window size.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Number of live entries, at most [`DeltaHistory::capacity`].
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_history_averages_to_zero() {
        let history = DeltaHistory::new(4).unwrap();
        assert_eq!(history.average(), 0.0);
        assert_eq!(history.last(), 0.0);
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 4);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(matches!(
            DeltaHistory::new(0),
            Err(MotionError::Config { .. })
        ));
    }

    #[test]
    fn partial_window_uses_only_pushed_values() {
        let mut history = DeltaHistory::new(5).unwrap();
        history.push(0.2);
        history.push(0.4);
        assert_eq!(history.len(), 2);
        assert!((history.average() - 0.3).abs() < 1e-12);
        assert_eq!(history.last(), 0.4);
    }

    #[test]
    fn full_window_evicts_oldest_first() {
        let mut history = DeltaHistory::new(3).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0] {
            history.push(v);
        }
        assert_eq!(history.len(), 3);
        assert!((history.average() - 3.0).abs() < 1e-12);
        assert_eq!(history.last(), 4.0);

        history.push(10.0);
        assert!((history.average() - (3.0 + 4.0 + 10.0) / 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn average_matches_mean_of_recent_window(
            capacity in 1usize..12,
            values in proptest::collection::vec(0.0f64..1.0, 1..40),
        ) {
            let mut history = DeltaHistory::new(capacity).unwrap();
            for &v in &values {
                history.push(v);
            }

            let window = &values[values.len().saturating_sub(capacity)..];
            let expected = window.iter().sum::<f64>() / window.len() as f64;
            prop_assert!((history.average() - expected).abs() < 1e-9);
            prop_assert_eq!(history.len(), window.len());
            prop_assert_eq!(history.capacity(), capacity);
            prop_assert_eq!(history.last(), *values.last().unwrap());
        }
    }
}

use std::collections::VecDeque;

/// Samples kept while dragging.
pub const MAX_KINETIC_SAMPLES: usize = 5;
/// Velocity multiplier applied on every coasting tick.
pub const FRICTION: f64 = 0.95;
/// Coasting tick period in milliseconds.
pub const TIME_INTERVAL_MS: u64 = 25;
/// A release this long after the last move is a drop, not a fling.
pub const SLOW_RELEASE_MS: u64 = 100;
/// Coasting stops once the per-tick speed falls to this.
pub const MIN_SPEED: f64 = std::f64::consts::SQRT_2;

/// Pointer position in screen cells plus milliseconds since the press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KineticSample {
    pub x: i32,
    pub y: i32,
    pub t_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReleaseDecision {
    /// Keep moving horizontally at `velocity` cells per tick.
    Coast { velocity: f64 },
    /// Slide back to rest.
    Return,
}

#[derive(Debug, Clone, Default)]
pub struct KineticTracker {
    samples: VecDeque<KineticSample>,
}

impl KineticTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: KineticSample) {
        self.samples.push_back(sample);
        while self.samples.len() > MAX_KINETIC_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Decides what happens when the pointer is released at `x` after
    /// `t_ms`. Needs a full window of samples and a release that follows
    /// the last move closely; the velocity is measured from the oldest
    /// sample in the window.
    pub fn release(&self, x: i32, t_ms: u64) -> ReleaseDecision {
        if self.samples.len() < MAX_KINETIC_SAMPLES {
            return ReleaseDecision::Return;
        }
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return ReleaseDecision::Return;
        };
        if t_ms.saturating_sub(newest.t_ms) > SLOW_RELEASE_MS {
            return ReleaseDecision::Return;
        }
        let dt = t_ms.saturating_sub(oldest.t_ms).max(1) as f64;
        let dx = f64::from(x - oldest.x);
        ReleaseDecision::Coast {
            velocity: 1000.0 * dx / dt / TIME_INTERVAL_MS as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(points: &[(u64, i32)]) -> KineticTracker {
        let mut tracker = KineticTracker::new();
        for &(t_ms, x) in points {
            tracker.push(KineticSample { x, y: 0, t_ms });
        }
        tracker
    }

    const FLING: [(u64, i32); 5] = [(0, 0), (25, 40), (50, 80), (75, 140), (100, 220)];

    #[test]
    fn test_window_is_bounded() {
        let tracker = tracker(&[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]);
        assert_eq!(tracker.len(), MAX_KINETIC_SAMPLES);
        assert_eq!(tracker.samples.front().map(|s| s.t_ms), Some(2));
    }

    #[test]
    fn test_fast_release_coasts() {
        match tracker(&FLING).release(310, 110) {
            ReleaseDecision::Coast { velocity } => {
                let expected = 1000.0 * 310.0 / 110.0 / 25.0;
                assert!((velocity - expected).abs() < 1e-9);
            }
            other => panic!("expected coast, got {:?}", other),
        }
    }

    #[test]
    fn test_slow_release_returns() {
        assert_eq!(tracker(&FLING).release(310, 400), ReleaseDecision::Return);
    }

    #[test]
    fn test_gap_of_exactly_limit_still_coasts() {
        assert!(matches!(
            tracker(&FLING).release(230, 200),
            ReleaseDecision::Coast { .. }
        ));
    }

    #[test]
    fn test_too_few_samples_returns() {
        assert_eq!(
            tracker(&FLING[..4]).release(310, 80),
            ReleaseDecision::Return
        );
    }

    #[test]
    fn test_leftward_fling_is_negative() {
        let samples = [(0, 0), (10, -10), (20, -20), (30, -30), (40, -40)];
        match tracker(&samples).release(-50, 50) {
            ReleaseDecision::Coast { velocity } => assert!(velocity < 0.0),
            other => panic!("expected coast, got {:?}", other),
        }
    }

    #[test]
    fn test_same_millisecond_does_not_divide_by_zero() {
        let samples = [(7, 0), (7, 1), (7, 2), (7, 3), (7, 4)];
        match tracker(&samples).release(5, 7) {
            ReleaseDecision::Coast { velocity } => assert!(velocity.is_finite()),
            other => panic!("expected coast, got {:?}", other),
        }
    }
}

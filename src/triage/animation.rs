/// Easing curves used by the card animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    InQuad,
    InOutQuad,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// A value driven from `from` to `to` over `duration_ms`, sampled by the
/// caller's clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: (f64, f64),
    to: (f64, f64),
    start_ms: u64,
    duration_ms: u64,
    easing: Easing,
}

impl Tween {
    pub fn new(
        from: (i32, i32),
        to: (i32, i32),
        start_ms: u64,
        duration_ms: u64,
        easing: Easing,
    ) -> Self {
        Self {
            from: (f64::from(from.0), f64::from(from.1)),
            to: (f64::from(to.0), f64::from(to.1)),
            start_ms,
            duration_ms,
            easing,
        }
    }

    pub fn progress(&self, now_ms: u64) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.start_ms) as f64;
        (elapsed / self.duration_ms as f64).min(1.0)
    }

    pub fn is_finished(&self, now_ms: u64) -> bool {
        self.progress(now_ms) >= 1.0
    }

    pub fn value(&self, now_ms: u64) -> (i32, i32) {
        let k = self.easing.apply(self.progress(now_ms));
        let x = self.from.0 + (self.to.0 - self.from.0) * k;
        let y = self.from.1 + (self.to.1 - self.from.1) * k;
        (x.round() as i32, y.round() as i32)
    }

    pub fn end(&self) -> (i32, i32) {
        (self.to.0.round() as i32, self.to.1.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::InQuad, Easing::InOutQuad] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
        assert_eq!(Easing::InOutQuad.apply(0.5), 0.5);
        assert_eq!(Easing::InQuad.apply(0.5), 0.25);
        assert_eq!(Easing::InOutQuad.apply(0.25), 0.125);
    }

    #[test]
    fn test_tween_samples_clock() {
        let tween = Tween::new((0, 10), (100, 0), 1_000, 200, Easing::Linear);
        assert_eq!(tween.value(900), (0, 10));
        assert_eq!(tween.value(1_100), (50, 5));
        assert!(!tween.is_finished(1_199));
        assert!(tween.is_finished(1_200));
        assert_eq!(tween.value(5_000), (100, 0));
        assert_eq!(tween.end(), (100, 0));
    }

    #[test]
    fn test_zero_duration_is_done() {
        let tween = Tween::new((3, 3), (0, 0), 10, 0, Easing::InQuad);
        assert!(tween.is_finished(10));
        assert_eq!(tween.value(10), (0, 0));
    }
}

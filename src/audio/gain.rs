// src/audio/gain.rs
// Gain stage with linear-ramp automation

/// Gain value over engine time.
///
/// Holds a single linear segment from `(start_time, start_value)` to
/// `(end_time, target)`. Scheduling a new ramp first pins the value the
/// current segment has reached at `now`, so ramps never jump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParam {
    start_time: f64,
    start_value: f32,
    end_time: f64,
    target: f32,
}

impl GainParam {
    pub fn new(value: f32) -> Self {
        Self {
            start_time: f64::NEG_INFINITY,
            start_value: value,
            end_time: f64::NEG_INFINITY,
            target: value,
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        if t >= self.end_time {
            return self.target;
        }
        if t <= self.start_time {
            return self.start_value;
        }

        let progress = ((t - self.start_time) / (self.end_time - self.start_time)) as f32;
        self.start_value + (self.target - self.start_value) * progress
    }

    /// Jump to `value` immediately, dropping any scheduled ramp.
    pub fn set(&mut self, value: f32) {
        *self = Self::new(value);
    }

    /// Ramp linearly from the value at `now` to `target` over `duration` seconds.
    pub fn ramp_to(&mut self, now: f64, target: f32, duration: f64) {
        if duration <= 0.0 {
            self.set(target);
            return;
        }

        let current = self.value_at(now);
        self.start_time = now;
        self.start_value = current;
        self.end_time = now + duration;
        self.target = target;
    }

    pub fn is_ramping(&self, t: f64) -> bool {
        t < self.end_time && self.start_value != self.target
    }

    /// Value the gain settles at once the current ramp ends.
    pub fn target(&self) -> f32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_gain() {
        let gain = GainParam::new(0.4);
        assert_eq!(gain.value_at(0.0), 0.4);
        assert_eq!(gain.value_at(1000.0), 0.4);
        assert!(!gain.is_ramping(0.0));
    }

    #[test]
    fn test_linear_ramp() {
        let mut gain = GainParam::new(1.0);
        gain.ramp_to(2.0, 0.0, 0.1);

        assert_eq!(gain.value_at(2.0), 1.0);
        assert!((gain.value_at(2.05) - 0.5).abs() < 1e-4);
        assert_eq!(gain.value_at(2.2), 0.0);
        assert!(gain.is_ramping(2.05));
        assert!(!gain.is_ramping(2.2));
    }

    #[test]
    fn test_ramp_interrupts_from_current_value() {
        let mut gain = GainParam::new(1.0);
        gain.ramp_to(0.0, 0.0, 1.0);

        // Halfway through, retarget upwards
        gain.ramp_to(0.5, 1.0, 0.5);
        assert!((gain.value_at(0.5) - 0.5).abs() < 1e-4);
        assert!((gain.value_at(0.75) - 0.75).abs() < 1e-4);
        assert_eq!(gain.value_at(1.0), 1.0);
    }

    #[test]
    fn test_zero_duration_ramp_jumps() {
        let mut gain = GainParam::new(0.2);
        gain.ramp_to(5.0, 0.9, 0.0);
        assert_eq!(gain.value_at(5.0), 0.9);
        assert_eq!(gain.target(), 0.9);
    }
}

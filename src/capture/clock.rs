use std::fmt;

/// Position of a frame as `minute:second`, plus its 1-based ordinal within the second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTimestamp {
    pub minute: u32,
    pub second: u32,
    pub frame: u32,
}

impl fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}#{}", self.minute, self.second, self.frame)
    }
}

/// Assigns timestamps to consecutive frames at a whole-number frame rate
#[derive(Debug, Clone)]
pub struct FrameClock {
    fps: u32,
    next: FrameTimestamp,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            next: FrameTimestamp {
                minute: 0,
                second: 0,
                frame: 1,
            },
        }
    }

    /// Round a measured rate, falling back when it is missing or unusable
    pub fn from_rate(rate: Option<f64>, fallback: u32) -> Self {
        let fps = rate
            .filter(|r| r.is_finite() && *r >= 0.5)
            .map_or(fallback, |r| r.round() as u32);
        Self::new(fps)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Timestamp of the current frame; advances the clock
    pub fn tick(&mut self) -> FrameTimestamp {
        let current = self.next;

        self.next.frame += 1;
        if self.next.frame > self.fps {
            self.next.frame = 1;
            self.next.second += 1;
            if self.next.second == 60 {
                self.next.second = 0;
                self.next.minute += 1;
            }
        }

        current
    }
}

/// Which frames get sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Every frame
    Full,
    /// Every frame of each `interval`-th second
    Filtered { interval: u32 },
}

impl SamplingMode {
    pub fn includes(&self, timestamp: &FrameTimestamp) -> bool {
        match *self {
            SamplingMode::Full => true,
            SamplingMode::Filtered { interval } => timestamp.second % interval.max(1) == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(minute: u32, second: u32, frame: u32) -> FrameTimestamp {
        FrameTimestamp {
            minute,
            second,
            frame,
        }
    }

    #[test]
    fn frames_wrap_into_seconds() {
        let mut clock = FrameClock::new(30);
        let stamps: Vec<_> = (0..32).map(|_| clock.tick()).collect();

        assert_eq!(stamps[0], ts(0, 0, 1));
        assert_eq!(stamps[29], ts(0, 0, 30));
        assert_eq!(stamps[30], ts(0, 1, 1));
        assert_eq!(stamps[31], ts(0, 1, 2));
    }

    #[test]
    fn seconds_wrap_into_minutes() {
        let mut clock = FrameClock::new(2);
        let last = (0..121).map(|_| clock.tick()).last().unwrap();

        assert_eq!(last, ts(1, 0, 1));
    }

    #[test]
    fn measured_rate_is_rounded() {
        assert_eq!(FrameClock::from_rate(Some(29.97), 25).fps(), 30);
        assert_eq!(FrameClock::from_rate(None, 25).fps(), 25);
        assert_eq!(FrameClock::from_rate(Some(f64::NAN), 25).fps(), 25);
        assert_eq!(FrameClock::from_rate(Some(0.0), 25).fps(), 25);
    }

    #[test]
    fn filtered_mode_keeps_every_tenth_second() {
        let mode = SamplingMode::Filtered { interval: 10 };

        assert!(mode.includes(&ts(0, 0, 1)));
        assert!(mode.includes(&ts(0, 0, 30)));
        assert!(!mode.includes(&ts(0, 1, 1)));
        assert!(mode.includes(&ts(2, 50, 12)));
        assert!(SamplingMode::Full.includes(&ts(0, 1, 1)));
    }

    #[test]
    fn timestamp_display() {
        assert_eq!(ts(1, 5, 12).to_string(), "1:05#12");
    }
}

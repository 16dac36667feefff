/// One update tick of the map view.
///
/// Times are host milliseconds. `elapsed_ms` is zero on the first tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTick {
    /// 0-based tick index.
    pub index: u64,
    /// Host time at this tick (ms).
    pub time_ms: f64,
    /// Time since the previous tick (ms).
    pub elapsed_ms: f64,
}

/// Turns absolute host timestamps into `FrameTick`s.
#[derive(Debug, Default)]
pub struct FrameClock {
    next_index: u64,
    last_time_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, time_ms: f64) -> FrameTick {
        // Host clocks can step backwards on pause/resume.
        let elapsed_ms = self
            .last_time_ms
            .map(|last| (time_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_time_ms = Some(time_ms);
        let index = self.next_index;
        self.next_index += 1;
        FrameTick {
            index,
            time_ms,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameClock, FrameTick};
    use pretty_assertions::assert_eq;

    #[test]
    fn first_tick_has_zero_elapsed() {
        let mut clock = FrameClock::new();
        assert_eq!(
            clock.tick(1000.0),
            FrameTick {
                index: 0,
                time_ms: 1000.0,
                elapsed_ms: 0.0
            }
        );
    }

    #[test]
    fn elapsed_is_difference_of_host_times() {
        let mut clock = FrameClock::new();
        clock.tick(10.0);
        let t = clock.tick(26.5);
        assert_eq!(t.index, 1);
        assert_eq!(t.elapsed_ms, 16.5);
    }

    #[test]
    fn backwards_clock_clamps_to_zero() {
        let mut clock = FrameClock::new();
        clock.tick(100.0);
        assert_eq!(clock.tick(50.0).elapsed_ms, 0.0);
    }
}

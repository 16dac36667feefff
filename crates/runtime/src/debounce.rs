/// Delayed single-shot value: a newer `schedule` replaces the pending one.
///
/// The countdown is advanced explicitly with each tick's elapsed time, so the
/// debounce fires deterministically on the tick where it reaches zero.
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    delay_ms: f64,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    remaining_ms: f64,
}

impl<T> Debounce<T> {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn remaining_ms(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.remaining_ms)
    }

    pub fn schedule(&mut self, value: T) {
        self.schedule_with_delay(value, self.delay_ms);
    }

    pub fn schedule_with_delay(&mut self, value: T, delay_ms: f64) {
        self.pending = Some(Pending {
            value,
            remaining_ms: delay_ms,
        });
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }

    /// Advance the countdown; yields the value once it has run out.
    pub fn tick(&mut self, elapsed_ms: f64) -> Option<T> {
        let pending = self.pending.as_mut()?;
        pending.remaining_ms -= elapsed_ms;
        if pending.remaining_ms > 0.0 {
            return None;
        }
        self.pending.take().map(|p| p.value)
    }
}

/// Per-tick work allowance for incremental jobs (canvas repaint, lookups).
///
/// Budgets count abstract work units rather than wall-clock time, so a
/// painter that stops mid-way resumes at the same place on every replay.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameBudget {
    remaining_units: u32,
    spent_units: u32,
}

impl FrameBudget {
    pub fn new(units: u32) -> Self {
        Self {
            remaining_units: units,
            spent_units: 0,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn spent_units(&self) -> u32 {
        self.spent_units
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units == 0
    }

    /// Returns `true` and deducts `units` if the budget covers them.
    pub fn try_consume(&mut self, units: u32) -> bool {
        if self.remaining_units < units {
            return false;
        }
        self.remaining_units -= units;
        self.spent_units = self.spent_units.saturating_add(units);
        true
    }
}

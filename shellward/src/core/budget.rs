//! Turn budget shared by the primary conversation and pre-tasks.

/// Counts model round-trips against a fixed cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBudget {
    used: u32,
    max: u32,
}

impl TurnBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// Reserve one turn. Returns false once the cap has been reached.
    pub fn try_take(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

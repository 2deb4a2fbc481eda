//! # Bounded restart budget.
//!
//! [`RestartBudget`] counts automatic relaunches of one supervised process.
//! Each crash consumes one unit; once the budget is spent no further restart
//! happens and the watchdog escalates instead.
//!
//! ```text
//! max = 2
//! crash #1 → try_consume() = Some(1) → relaunch
//! crash #2 → try_consume() = Some(2) → relaunch
//! crash #3 → try_consume() = None    → CrashBudgetExhausted (once)
//! ```

/// Bounded counter of automatic restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartBudget {
    max: u32,
    used: u32,
}

impl RestartBudget {
    /// Creates a budget allowing `max` restarts.
    pub fn new(max: u32) -> Self {
        Self { max, used: 0 }
    }

    /// Consumes one unit. Returns the 1-based restart number, or `None` once exhausted.
    pub fn try_consume(&mut self) -> Option<u32> {
        if self.used >= self.max {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    /// Units left.
    pub fn remaining(&self) -> u32 {
        self.max - self.used
    }

    /// Units consumed so far.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// True when no restart is left.
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

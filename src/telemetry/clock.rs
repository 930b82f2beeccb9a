//! Clock abstraction for receipt timestamps

use chrono::{DateTime, Local};

/// Source of local receipt timestamps
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall-clock time from the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_reports_current_time() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now().timestamp() > 1_577_836_800);
    }
}

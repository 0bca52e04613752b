//! Fault injection for exercising client failure paths.

use std::time::Duration;

use miniboard_client::Error;

/// Which requests to fail or slow down next.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Number of upcoming selects to fail.
    pub fail_fetches: u32,
    /// Number of upcoming inserts to fail.
    pub fail_inserts: u32,
    /// Number of upcoming updates to fail.
    pub fail_updates: u32,
    /// Number of upcoming deletes to fail.
    pub fail_deletes: u32,
    /// Delay applied to select responses after the rows were read.
    pub fetch_latency: Duration,
}

/// Request kinds subject to fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Fetch,
    Insert,
    Update,
    Delete,
}

impl FaultPlan {
    /// Consume one pending failure for `kind`, if any.
    pub fn take(&mut self, kind: RequestKind) -> Result<(), Error> {
        let counter = match kind {
            RequestKind::Fetch => &mut self.fail_fetches,
            RequestKind::Insert => &mut self.fail_inserts,
            RequestKind::Update => &mut self.fail_updates,
            RequestKind::Delete => &mut self.fail_deletes,
        };
        if *counter == 0 {
            return Ok(());
        }
        *counter -= 1;
        Err(Error::Connection(format!("injected {kind:?} failure")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_failures() {
        let mut plan = FaultPlan {
            fail_inserts: 2,
            ..FaultPlan::default()
        };

        assert!(plan.take(RequestKind::Fetch).is_ok());
        assert!(plan.take(RequestKind::Insert).is_err());
        assert!(plan.take(RequestKind::Insert).is_err());
        assert!(plan.take(RequestKind::Insert).is_ok());
    }
}

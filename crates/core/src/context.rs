//! Per-run logging context.
//!
//! A [`RunContext`] is created once per invocation and passed explicitly to
//! the components that log or mutate the route tree. Every event emitted
//! inside its span carries the run id.

use chrono::{DateTime, Utc};
use tracing::{info_span, Span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    span: Span,
}

impl RunContext {
    pub fn new() -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            started_at: Utc::now(),
            span: info_span!("run", run_id = %run_id),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The span every event of this run is recorded under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Wall-clock time since the run started.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new();
        let b = RunContext::new();
        assert_ne!(a.run_id(), b.run_id());
        assert!(a.elapsed() >= chrono::Duration::zero());
    }
}

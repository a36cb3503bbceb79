use super::DecisionEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Periodically expire pending queries and stale query responses
///
/// Runs for the life of the process, independent of message traffic.
pub async fn run_janitor(engine: Arc<DecisionEngine>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let report = engine.sweep();
        debug!(
            pending_expired = report.pending_expired,
            responses_expired = report.responses_expired,
            changes_expired = report.changes_expired,
            "Janitor sweep complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use std::time::Instant;

    #[tokio::test]
    async fn test_janitor_expires_stale_queries() {
        let engine = Arc::new(DecisionEngine::new(EngineConfig::default()));
        let stale = Instant::now()
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        engine.register_query_at("lamp1", stale).unwrap();
        engine.register_query("lamp2").unwrap();

        let handle = tokio::spawn(run_janitor(engine.clone(), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(!engine.pending_queries().is_pending("lamp1"));
        assert!(engine.pending_queries().is_pending("lamp2"));
    }
}

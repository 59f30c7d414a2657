//! Per-wrapper injection metrics (§4.2 step 7: "Record one of
//! {first-try success, retried success, failure} in injection metrics.").

use std::sync::atomic::{AtomicU64, Ordering};

use relay_router::InjectionOutcome;

#[derive(Debug, Default)]
pub struct InjectionMetrics {
    success_first_try: AtomicU64,
    success_retried: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionMetricsSnapshot {
    pub success_first_try: u64,
    pub success_retried: u64,
    pub failed: u64,
}

impl InjectionMetrics {
    pub fn record(&self, outcome: InjectionOutcome) {
        let counter = match outcome {
            InjectionOutcome::VerifiedFirstTry => &self.success_first_try,
            InjectionOutcome::VerifiedRetried => &self.success_retried,
            InjectionOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InjectionMetricsSnapshot {
        InjectionMetricsSnapshot {
            success_first_try: self.success_first_try.load(Ordering::Relaxed),
            success_retried: self.success_retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_outcome_kind() {
        let metrics = InjectionMetrics::default();
        metrics.record(InjectionOutcome::VerifiedFirstTry);
        metrics.record(InjectionOutcome::VerifiedRetried);
        metrics.record(InjectionOutcome::VerifiedRetried);
        metrics.record(InjectionOutcome::Failed);

        let snap = metrics.snapshot();
        assert_eq!(snap.success_first_try, 1);
        assert_eq!(snap.success_retried, 2);
        assert_eq!(snap.failed, 1);
    }
}

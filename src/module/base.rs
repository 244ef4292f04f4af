//! Shared module internals: identity, atomic counters, and the score cell.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{CalculateScore, Counts, Mid, ModuleSummary};

/// The state every concrete module embeds. Counter reads and writes are
/// atomic; the type itself is freely shareable behind an `Arc`.
pub struct ModuleBase {
    mid: Mid,
    addr: String,
    score: AtomicU64,
    score_calculator: Option<CalculateScore>,
    called_count: AtomicU64,
    accepted_count: AtomicU64,
    completed_count: AtomicU64,
    handling_number: AtomicU64,
}

impl ModuleBase {
    pub fn new(mid: Mid, score_calculator: Option<CalculateScore>) -> Self {
        let addr = mid.addr_string();
        ModuleBase {
            mid,
            addr,
            score: AtomicU64::new(0),
            score_calculator,
            called_count: AtomicU64::new(0),
            accepted_count: AtomicU64::new(0),
            completed_count: AtomicU64::new(0),
            handling_number: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &Mid {
        &self.mid
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::SeqCst)
    }

    pub fn set_score(&self, score: u64) {
        self.score.store(score, Ordering::SeqCst);
    }

    pub fn score_calculator(&self) -> Option<CalculateScore> {
        self.score_calculator.clone()
    }

    pub fn called_count(&self) -> u64 {
        self.called_count.load(Ordering::SeqCst)
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted_count.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::SeqCst)
    }

    pub fn handling_number(&self) -> u64 {
        self.handling_number.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> Counts {
        Counts {
            called_count: self.called_count(),
            accepted_count: self.accepted_count(),
            completed_count: self.completed_count(),
            handling_number: self.handling_number(),
        }
    }

    pub fn summary(&self) -> ModuleSummary {
        let counts = self.counts();
        ModuleSummary {
            id: self.mid.clone(),
            called: counts.called_count,
            accepted: counts.accepted_count,
            completed: counts.completed_count,
            handling: counts.handling_number,
            extra: None,
        }
    }

    pub fn incr_called_count(&self) {
        self.called_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn incr_accepted_count(&self) {
        self.accepted_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn incr_completed_count(&self) {
        self.completed_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn incr_handling_number(&self) {
        self.handling_number.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decr_handling_number(&self) {
        self.handling_number.fetch_sub(1, Ordering::SeqCst);
    }

    /// Marks one call as in flight; the in-flight count drops when the guard
    /// does, on every exit path.
    pub fn handling_guard(&self) -> HandlingGuard<'_> {
        self.incr_handling_number();
        HandlingGuard { base: self }
    }

    /// Resets every counter to zero.
    pub fn clear(&self) {
        self.called_count.store(0, Ordering::SeqCst);
        self.accepted_count.store(0, Ordering::SeqCst);
        self.completed_count.store(0, Ordering::SeqCst);
        self.handling_number.store(0, Ordering::SeqCst);
    }
}

/// RAII handle for the in-flight counter.
pub struct HandlingGuard<'a> {
    base: &'a ModuleBase,
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.base.decr_handling_number();
    }
}

/// Implements [`Module`](super::Module) by delegating to a `base: ModuleBase`
/// field, the counterpart of the original design's embedded base instance.
macro_rules! impl_module_delegation {
    ($ty:ty) => {
        impl crate::module::Module for $ty {
            fn id(&self) -> &crate::module::Mid {
                self.base.id()
            }

            fn addr(&self) -> &str {
                self.base.addr()
            }

            fn score(&self) -> u64 {
                self.base.score()
            }

            fn set_score(&self, score: u64) {
                self.base.set_score(score)
            }

            fn score_calculator(&self) -> Option<crate::module::CalculateScore> {
                self.base.score_calculator()
            }

            fn called_count(&self) -> u64 {
                self.base.called_count()
            }

            fn accepted_count(&self) -> u64 {
                self.base.accepted_count()
            }

            fn completed_count(&self) -> u64 {
                self.base.completed_count()
            }

            fn handling_number(&self) -> u64 {
                self.base.handling_number()
            }

            fn counts(&self) -> crate::module::Counts {
                self.base.counts()
            }

            fn summary(&self) -> crate::module::ModuleSummary {
                self.base.summary()
            }
        }
    };
}

pub(crate) use impl_module_delegation;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleType;
    use std::sync::Arc;

    fn base() -> ModuleBase {
        ModuleBase::new(Mid::new(ModuleType::Downloader, 1, None), None)
    }

    #[test]
    fn counters_move_independently() {
        let base = base();
        base.incr_called_count();
        base.incr_called_count();
        base.incr_accepted_count();
        base.incr_completed_count();
        let counts = base.counts();
        assert_eq!(counts.called_count, 2);
        assert_eq!(counts.accepted_count, 1);
        assert_eq!(counts.completed_count, 1);
        assert_eq!(counts.handling_number, 0);
    }

    #[test]
    fn handling_guard_balances_on_drop() {
        let base = base();
        {
            let _guard = base.handling_guard();
            assert_eq!(base.handling_number(), 1);
            {
                let _inner = base.handling_guard();
                assert_eq!(base.handling_number(), 2);
            }
            assert_eq!(base.handling_number(), 1);
        }
        assert_eq!(base.handling_number(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let base = base();
        base.incr_called_count();
        base.incr_accepted_count();
        base.incr_handling_number();
        base.clear();
        assert_eq!(base.counts(), Counts::default());
    }

    #[test]
    fn custom_score_calculator_is_returned() {
        let calc: crate::module::CalculateScore = Arc::new(|counts| counts.called_count * 100);
        let base = ModuleBase::new(Mid::new(ModuleType::Pipeline, 9, None), Some(calc));
        base.incr_called_count();
        let stored = base.score_calculator().expect("calculator should be set");
        assert_eq!(stored(base.counts()), 100);
    }

    #[test]
    fn summary_reflects_identity_and_counts() {
        let base = base();
        base.incr_called_count();
        let summary = base.summary();
        assert_eq!(summary.id.to_string(), "D1");
        assert_eq!(summary.called, 1);
        assert_eq!(summary.extra, None);
    }
}

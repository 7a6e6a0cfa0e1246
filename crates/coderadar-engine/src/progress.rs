use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum wall-clock gap between `storing` progress emissions.
pub const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Phases an `IndexerEngine` operation passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Embedding,
    Storing,
    Complete,
}

/// Payload for a `storing`-phase progress tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoringProgress {
    pub documents_indexed: usize,
    pub total_documents: usize,
    pub docs_per_sec: f64,
    pub eta_seconds: Option<f64>,
    pub percent_complete: f64,
}

/// Sink a caller (typically the CLI) implements to observe progress.
/// `coderadar-cli` wires this to `indicatif`; the engine has no knowledge
/// of terminal rendering.
pub trait ProgressSink: Send + Sync {
    fn phase(&self, phase: Phase);
    fn storing(&self, progress: StoringProgress);
}

/// No-op sink for callers (and tests) that don't care about progress.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn phase(&self, _phase: Phase) {}
    fn storing(&self, _progress: StoringProgress) {}
}

/// Wraps a `ProgressSink`, applying the ~100ms minimum inter-emit interval
/// to `storing` ticks; phase transitions always pass through immediately.
pub struct ThrottledProgress<S: ProgressSink> {
    inner: S,
    last_emit: Mutex<Option<Instant>>,
}

impl<S: ProgressSink> ThrottledProgress<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, last_emit: Mutex::new(None) }
    }

    pub fn phase(&self, phase: Phase) {
        self.inner.phase(phase);
    }

    /// `force` bypasses the interval, used for the first and last tick of a
    /// batch run so callers always see 0% and 100%.
    pub fn storing(&self, progress: StoringProgress, force: bool) {
        let mut last_emit = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
        let due = match *last_emit {
            Some(t) => t.elapsed() >= MIN_PROGRESS_INTERVAL,
            None => true,
        };
        if force || due {
            self.inner.storing(progress);
            *last_emit = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        phases: AtomicUsize,
        storings: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn phase(&self, _phase: Phase) {
            self.phases.fetch_add(1, Ordering::SeqCst);
        }

        fn storing(&self, _progress: StoringProgress) {
            self.storings.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn phase_transitions_are_never_throttled() {
        let throttled = ThrottledProgress::new(CountingSink { phases: AtomicUsize::new(0), storings: AtomicUsize::new(0) });
        throttled.phase(Phase::Scanning);
        throttled.phase(Phase::Embedding);
        throttled.phase(Phase::Storing);
        assert_eq!(throttled.inner.phases.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rapid_storing_ticks_are_throttled_unless_forced() {
        let throttled = ThrottledProgress::new(CountingSink { phases: AtomicUsize::new(0), storings: AtomicUsize::new(0) });
        for _ in 0..5 {
            throttled.storing(StoringProgress::default(), false);
        }
        assert_eq!(throttled.inner.storings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forced_ticks_always_emit() {
        let throttled = ThrottledProgress::new(CountingSink { phases: AtomicUsize::new(0), storings: AtomicUsize::new(0) });
        for _ in 0..3 {
            throttled.storing(StoringProgress::default(), true);
        }
        assert_eq!(throttled.inner.storings.load(Ordering::SeqCst), 3);
    }
}

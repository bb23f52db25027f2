use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ScenarioStats {
    pub produced: u64,
    pub consumed: u64,
    /// Producer attempts that found the queue full.
    pub write_stalls: u64,
    /// Consumer attempts that found the queue empty.
    pub read_stalls: u64,
    /// Deepest fill level the consumer observed.
    pub max_depth: usize,
    pub mismatches: u64,
    /// Stream position of the first corrupted byte.
    pub first_mismatch: Option<u64>,
}

impl ScenarioStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub trait StatsSink: Clone + Send + Sync + 'static {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R;

    fn snapshot(&self) -> ScenarioStats {
        self.with_stats(|stats| *stats)
    }
}

#[derive(Clone, Default)]
pub struct ArcStatsSink(pub Arc<Mutex<ScenarioStats>>);

impl StatsSink for ArcStatsSink {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_record() {
        let sink = ArcStatsSink::default();
        let worker = sink.clone();
        worker.with_stats(|stats| {
            stats.produced = 42;
            stats.first_mismatch = Some(7);
        });
        assert_eq!(sink.snapshot().produced, 42);

        sink.with_stats(ScenarioStats::reset);
        assert_eq!(worker.snapshot(), ScenarioStats::default());
    }
}

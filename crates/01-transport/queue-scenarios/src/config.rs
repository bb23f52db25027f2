use std::time::Duration;

use mirror_queue::QueueConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Producer writes random-sized chunks as fast as the consumer drains them.
    Flood { total_bytes: u64, max_chunk: usize },
    /// Producer writes `burst_bytes`, then waits for the queue to empty.
    Burst { bursts: u32, burst_bytes: usize },
    /// Consumer sleeps between small reads so the producer keeps hitting a full queue.
    Backpressure {
        total_bytes: u64,
        max_chunk: usize,
        consumer_delay: Duration,
    },
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Flood { .. } => "flood",
            ScenarioKind::Burst { .. } => "burst",
            ScenarioKind::Backpressure { .. } => "backpressure",
        }
    }

    /// Bytes the producer streams over the whole run.
    pub fn total_bytes(&self) -> u64 {
        match *self {
            ScenarioKind::Flood { total_bytes, .. }
            | ScenarioKind::Backpressure { total_bytes, .. } => total_bytes,
            ScenarioKind::Burst {
                bursts,
                burst_bytes,
            } => bursts as u64 * burst_bytes as u64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    pub min_capacity: usize,
    pub seed: u64,
    /// Use `begin_*`/commit grants instead of the copying API.
    pub zero_copy: bool,
    /// Back the queue with a named shm object instead of an anonymous one.
    pub shm_name: Option<String>,
}

impl ScenarioConfig {
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;
    pub const DEFAULT_SEED: u64 = 0xC0FFEE;

    pub fn new(kind: ScenarioKind) -> Self {
        Self {
            kind,
            min_capacity: Self::DEFAULT_CAPACITY,
            seed: Self::DEFAULT_SEED,
            zero_copy: false,
            shm_name: None,
        }
    }

    pub fn flood(total_bytes: u64, max_chunk: usize) -> Self {
        Self::new(ScenarioKind::Flood {
            total_bytes,
            max_chunk,
        })
    }

    pub fn burst(bursts: u32, burst_bytes: usize) -> Self {
        Self::new(ScenarioKind::Burst {
            bursts,
            burst_bytes,
        })
    }

    pub fn backpressure(total_bytes: u64, max_chunk: usize, consumer_delay: Duration) -> Self {
        Self::new(ScenarioKind::Backpressure {
            total_bytes,
            max_chunk,
            consumer_delay,
        })
    }

    pub fn with_capacity(mut self, min_capacity: usize) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_zero_copy(mut self, zero_copy: bool) -> Self {
        self.zero_copy = zero_copy;
        self
    }

    pub fn with_shm_name(mut self, name: Option<String>) -> Self {
        self.shm_name = name;
        self
    }

    pub fn queue_config(&self) -> QueueConfig {
        match &self.shm_name {
            Some(name) => QueueConfig::named(name.clone(), self.min_capacity),
            None => QueueConfig::anonymous(self.min_capacity),
        }
    }
}

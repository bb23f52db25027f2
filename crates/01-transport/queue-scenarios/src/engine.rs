use std::thread;
use std::time::{Duration, Instant};

use mirror_queue::{Consumer, MirrorQueue, Producer, QueueResult};
use rand::prelude::*;
use tracing::{debug, info};

use crate::config::{ScenarioConfig, ScenarioKind};
use crate::stats::{ScenarioStats, StatsSink};

/// Position-indexed byte stream, so both sides agree regardless of chunking.
#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    seed: u64,
}

impl Pattern {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    #[inline]
    pub fn byte(&self, pos: u64) -> u8 {
        ((pos ^ self.seed).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 56) as u8
    }

    pub fn fill(&self, start: u64, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.byte(start + i as u64);
        }
    }

    /// Index of the first byte in `buf` that differs from the stream at `start`.
    pub fn first_mismatch(&self, start: u64, buf: &[u8]) -> Option<usize> {
        buf.iter()
            .enumerate()
            .position(|(i, byte)| *byte != self.byte(start + i as u64))
    }
}

/// Outcome of a finished scenario run.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub queue_name: String,
    pub capacity: usize,
    pub elapsed: Duration,
    pub stats: ScenarioStats,
}

impl ScenarioReport {
    pub fn throughput_mib_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.stats.consumed as f64 / (1024.0 * 1024.0) / secs
    }
}

pub struct ScenarioEngine<S> {
    config: ScenarioConfig,
    stats: S,
}

impl<S> ScenarioEngine<S>
where
    S: StatsSink,
{
    pub fn new(config: ScenarioConfig, stats: S) -> Self {
        Self { config, stats }
    }

    /// Creates the queue, streams the configured bytes across two threads, and
    /// returns what both sides recorded.
    pub fn run(&self) -> QueueResult<ScenarioReport> {
        let queue = MirrorQueue::with_config(&self.config.queue_config())?;
        let capacity = queue.capacity();
        let queue_name = queue.name().to_owned();
        let (producer, consumer) = queue.split();
        let pattern = Pattern::new(self.config.seed);
        let name = self.config.kind.name();

        info!(
            scenario = name,
            queue = queue_name.as_str(),
            capacity,
            bytes = self.config.kind.total_bytes(),
            zero_copy = self.config.zero_copy,
            "starting scenario"
        );

        self.stats.with_stats(ScenarioStats::reset);
        let started = Instant::now();
        thread::scope(|scope| {
            scope.spawn(|| produce(producer, &self.config, pattern, &self.stats));
            consume(consumer, &self.config, pattern, &self.stats);
        });
        let elapsed = started.elapsed();

        let report = ScenarioReport {
            name,
            queue_name,
            capacity,
            elapsed,
            stats: self.stats.snapshot(),
        };
        info!(
            scenario = name,
            elapsed_ms = elapsed.as_millis() as u64,
            mib_s = report.throughput_mib_s(),
            "scenario finished"
        );
        Ok(report)
    }
}

fn produce<S: StatsSink>(
    mut producer: Producer,
    config: &ScenarioConfig,
    pattern: Pattern,
    stats: &S,
) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut scratch = Vec::new();
    let mut sent = 0u64;
    let mut stalls = 0u64;

    let mut push_until = |producer: &mut Producer, end: u64, max_chunk: usize, rng: &mut StdRng| {
        while sent < end {
            let want = rng.gen_range(1..=max_chunk.max(1)).min((end - sent) as usize);
            let written = push(producer, config.zero_copy, pattern, sent, want, &mut scratch);
            if written == 0 {
                stalls += 1;
                thread::yield_now();
            }
            sent += written as u64;
        }
    };

    match config.kind {
        ScenarioKind::Flood {
            total_bytes,
            max_chunk,
        }
        | ScenarioKind::Backpressure {
            total_bytes,
            max_chunk,
            ..
        } => push_until(&mut producer, total_bytes, max_chunk, &mut rng),
        ScenarioKind::Burst {
            bursts,
            burst_bytes,
        } => {
            let mut end = 0u64;
            for burst in 0..bursts {
                end += burst_bytes as u64;
                push_until(&mut producer, end, burst_bytes, &mut rng);
                while producer.readable_space() > 0 {
                    thread::yield_now();
                }
                debug!(burst, "burst drained");
            }
        }
    }

    stats.with_stats(|stats| {
        stats.produced = sent;
        stats.write_stalls = stalls;
    });
}

fn push(
    producer: &mut Producer,
    zero_copy: bool,
    pattern: Pattern,
    pos: u64,
    want: usize,
    scratch: &mut Vec<u8>,
) -> usize {
    if zero_copy {
        let Some(mut grant) = producer.begin_write() else {
            return 0;
        };
        let len = want.min(grant.len());
        pattern.fill(pos, &mut grant[..len]);
        return grant.commit(len);
    }

    scratch.resize(want, 0);
    pattern.fill(pos, scratch);
    producer.write(scratch)
}

fn consume<S: StatsSink>(
    mut consumer: Consumer,
    config: &ScenarioConfig,
    pattern: Pattern,
    stats: &S,
) {
    let total = config.kind.total_bytes();
    let (limit, delay) = match config.kind {
        ScenarioKind::Backpressure {
            max_chunk,
            consumer_delay,
            ..
        } => (
            max_chunk.min(consumer.capacity() / 4).max(1),
            Some(consumer_delay),
        ),
        _ => (consumer.capacity(), None),
    };

    let mut scratch = vec![0u8; limit];
    let mut received = 0u64;
    let mut local = ScenarioStats::default();

    while received < total {
        local.max_depth = local.max_depth.max(consumer.readable_space());
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let read = if config.zero_copy {
            consumer.generic_read(limit, |buf| {
                check(&pattern, received, buf, &mut local);
                buf.len()
            })
        } else {
            let read = consumer.read(&mut scratch);
            check(&pattern, received, &scratch[..read], &mut local);
            read
        };

        if read == 0 {
            local.read_stalls += 1;
            thread::yield_now();
        }
        received += read as u64;
    }

    stats.with_stats(|stats| {
        stats.consumed = received;
        stats.read_stalls = local.read_stalls;
        stats.max_depth = local.max_depth;
        stats.mismatches = local.mismatches;
        stats.first_mismatch = local.first_mismatch;
    });
}

fn check(pattern: &Pattern, start: u64, buf: &[u8], stats: &mut ScenarioStats) {
    if let Some(offset) = pattern.first_mismatch(start, buf) {
        stats.mismatches += 1;
        stats.first_mismatch.get_or_insert(start + offset as u64);
    }
}

use crate::config::{ScenarioConfig, ScenarioKind};
use crate::engine::ScenarioReport;

pub type CheckResult = Result<(), String>;

/// Every produced byte arrived once, in order, unmodified.
pub fn verify_stream(report: &ScenarioReport, expected_bytes: u64) -> CheckResult {
    let stats = &report.stats;
    if stats.produced != expected_bytes {
        return Err(format!(
            "producer sent {} bytes, expected {}",
            stats.produced, expected_bytes
        ));
    }
    if stats.consumed != stats.produced {
        return Err(format!(
            "consumer received {} bytes, producer sent {}",
            stats.consumed, stats.produced
        ));
    }
    if stats.mismatches > 0 {
        return Err(format!(
            "{} corrupted reads, first at stream offset {}",
            stats.mismatches,
            stats.first_mismatch.unwrap_or_default()
        ));
    }
    if stats.max_depth > report.capacity {
        return Err(format!(
            "observed depth {} exceeds capacity {}",
            stats.max_depth, report.capacity
        ));
    }
    Ok(())
}

pub fn verify_flood(report: &ScenarioReport, total_bytes: u64) -> CheckResult {
    verify_stream(report, total_bytes)
}

pub fn verify_burst(report: &ScenarioReport, bursts: u32, burst_bytes: usize) -> CheckResult {
    verify_stream(report, bursts as u64 * burst_bytes as u64)?;
    // The queue drains between bursts, so a burst that fits never fills it twice over.
    if burst_bytes <= report.capacity && report.stats.max_depth > burst_bytes {
        return Err(format!(
            "depth {} exceeded burst size {}",
            report.stats.max_depth, burst_bytes
        ));
    }
    Ok(())
}

pub fn verify_backpressure(report: &ScenarioReport, total_bytes: u64) -> CheckResult {
    verify_stream(report, total_bytes)?;
    if total_bytes > report.capacity as u64 && report.stats.write_stalls == 0 {
        return Err("producer never observed a full queue".to_string());
    }
    Ok(())
}

pub fn verify(report: &ScenarioReport, config: &ScenarioConfig) -> CheckResult {
    match config.kind {
        ScenarioKind::Flood { total_bytes, .. } => verify_flood(report, total_bytes),
        ScenarioKind::Burst {
            bursts,
            burst_bytes,
        } => verify_burst(report, bursts, burst_bytes),
        ScenarioKind::Backpressure { total_bytes, .. } => verify_backpressure(report, total_bytes),
    }
}

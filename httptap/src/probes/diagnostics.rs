use aya::maps::PerCpuArray;
use aya::Ebpf;
use httptap_common::{
    STAT_COUNT, STAT_DISCARDED, STAT_DROPPED_NO_SPACE, STAT_PENDING_REFUSED, STAT_SUBMITTED,
};

use crate::capture::StatsSnapshot;
use crate::domain::ProbeError;

/// Read the kernel's per-CPU `STATS` counters, summed across CPUs
///
/// The kernel does not track correlation misses; that field stays zero.
///
/// # Errors
/// Returns an error if the `STATS` map is missing or cannot be read
pub fn read_kernel_stats(bpf: &Ebpf) -> Result<StatsSnapshot, ProbeError> {
    let map = bpf.map("STATS").ok_or_else(|| ProbeError::MapNotFound("STATS".to_string()))?;
    let stats: PerCpuArray<_, u64> = PerCpuArray::try_from(map)?;

    let mut totals = [0u64; STAT_COUNT as usize];
    for (index, total) in (0..STAT_COUNT).zip(totals.iter_mut()) {
        let per_cpu = stats.get(&index, 0)?;
        *total = per_cpu.iter().sum();
    }
    Ok(snapshot_from_counters(&totals))
}

fn snapshot_from_counters(totals: &[u64; STAT_COUNT as usize]) -> StatsSnapshot {
    StatsSnapshot {
        submitted: totals[STAT_SUBMITTED as usize],
        dropped_no_space: totals[STAT_DROPPED_NO_SPACE as usize],
        discarded: totals[STAT_DISCARDED as usize],
        pending_refused: totals[STAT_PENDING_REFUSED as usize],
        correlation_misses: 0,
    }
}

/// Print drop diagnostics for the capture side
pub fn print_capture_diagnostics(stats: &StatsSnapshot) {
    println!("\n🔍 Capture diagnostics:");
    println!("   - Events submitted: {}", stats.submitted);
    println!("   - Dropped (ring full): {}", stats.dropped_no_space);
    println!("   - Discarded (copy failed): {}", stats.discarded);
    println!("   - Reads not tracked (insert failed): {}", stats.pending_refused);
    if stats.lost() > 0 {
        println!("   ⚠️  {} matching events never reached userspace", stats.lost());
    }
}

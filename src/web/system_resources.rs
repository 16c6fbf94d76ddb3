use sysinfo::System;

use instructor_embed_types::{DispatchParameters, SystemResources};

use crate::{sys_info, sys_warn};

// Constants for pool sizing
pub const WORKER_CPU_FRACTION: f64 = 0.75; // Leave a quarter of the cores for the server
pub const MEMORY_BUDGET_FRACTION: f64 = 0.5; // Share of available RAM the encode work may use
pub const BYTES_PER_UNIT: f64 = 1024.0 * 1024.0; // Estimated memory per (instruction, text) pair
pub const MIN_CHUNK_SIZE: usize = 4;
pub const MAX_CHUNK_SIZE: usize = 32;
pub const BYTES_TO_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot CPU count and memory. Called once at startup.
pub fn sample_system_resources() -> SystemResources {
    let sys = System::new_all();

    let mut cpu_count = sys.cpus().len();
    if cpu_count == 0 {
        cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        sys_warn!("sysinfo reported no CPUs, using available_parallelism = {}", cpu_count);
    }

    let resources = SystemResources {
        cpu_count,
        total_memory: sys.total_memory(),
        available_memory: sys.available_memory(),
    };

    sys_info!(
        "Detected {} CPUs, {:.2} GB RAM ({:.2} GB available)",
        resources.cpu_count,
        resources.total_memory as f64 / BYTES_TO_GB,
        resources.available_memory as f64 / BYTES_TO_GB
    );

    resources
}

/// Derive worker count and chunk size from a resource snapshot.
///
/// This is a heuristic, not a measurement: `BYTES_PER_UNIT` is a fixed guess
/// of what one pair costs while encoding.
pub fn derive_dispatch_parameters(resources: &SystemResources) -> DispatchParameters {
    let max_workers = ((resources.cpu_count as f64 * WORKER_CPU_FRACTION).floor() as usize).max(1);

    let memory_units = resources.available_memory as f64 * MEMORY_BUDGET_FRACTION / BYTES_PER_UNIT;
    let per_worker = (memory_units / max_workers as f64).floor() as usize;
    let chunk_size = per_worker.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);

    DispatchParameters {
        max_workers,
        chunk_size,
    }
}

/// Apply operator overrides; the invariants still hold afterwards.
pub fn apply_overrides(
    derived: DispatchParameters,
    max_workers: Option<usize>,
    chunk_size: Option<usize>,
) -> DispatchParameters {
    DispatchParameters {
        max_workers: max_workers.unwrap_or(derived.max_workers).max(1),
        chunk_size: chunk_size
            .unwrap_or(derived.chunk_size)
            .clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
    }
}

/// Name of the environment override used to pin worker concurrency.
pub const CONCURRENCY_ENV_VAR: &str = "DEV_AGENT_CONCURRENCY";

/// An explicit override always wins; otherwise `min(8, max(2, cpus/2))`. Always >= 1.
pub fn effective_workers(env_override: Option<usize>, logical_cpus: usize) -> usize {
    if let Some(n) = env_override {
        return n.max(1);
    }
    let derived = (logical_cpus / 2).clamp(2, 8);
    derived.max(1)
}

/// Reads `DEV_AGENT_CONCURRENCY` from the process environment and combines
/// it with the detected CPU count. Kept separate from `effective_workers`
/// so the pure policy stays independently testable: the env read is I/O,
/// the derivation is not.
pub fn effective_workers_from_env() -> usize {
    let override_value = std::env::var(CONCURRENCY_ENV_VAR)
        .ok()
        .and_then(|v| v.parse::<usize>().ok());
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    effective_workers(override_value, cpus)
}

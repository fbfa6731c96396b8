use anyhow::{Result, anyhow};
use core_affinity::{CoreId, get_core_ids, set_for_current};

/// Number of logical cores visible to the process.
pub fn available_cores() -> usize {
    get_core_ids().map(|ids| ids.len()).unwrap_or(1)
}

/// Pin the current thread to the `n`-th available core, wrapping around
/// when `n` exceeds the core count. Returns the core id actually pinned.
pub fn try_pin_nth(n: usize) -> Result<usize> {
    let ids = get_core_ids().ok_or_else(|| anyhow!("cannot enumerate core ids"))?;
    if ids.is_empty() {
        return Err(anyhow!("no cores available"));
    }
    let core: CoreId = ids[n % ids.len()];
    if set_for_current(core) {
        Ok(core.id)
    } else {
        Err(anyhow!("cannot pin to core {}", core.id))
    }
}

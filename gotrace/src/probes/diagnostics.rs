use anyhow::{Context, Result};
use aya::maps::HashMap;
use aya::Ebpf;
use gotrace_common::CALL_STARTS_MAP;

/// Count entries still waiting in `CALL_STARTS`.
///
/// A non-zero count at shutdown means calls whose return was never seen:
/// functions still running, return probes disabled, panics, or goroutines
/// that resumed on another thread.
///
/// # Errors
/// Returns an error if the `CALL_STARTS` map cannot be accessed
pub fn pending_call_count(bpf: &Ebpf) -> Result<usize> {
    let starts: HashMap<_, u32, u64> = HashMap::try_from(
        bpf.map(CALL_STARTS_MAP).context("CALL_STARTS map not found")?,
    )?;
    Ok(starts.keys().filter(Result::is_ok).count())
}

/// The shutdown line about calls that never returned, if there is one.
///
/// Without return probes nothing ever clears `CALL_STARTS`, so the count is
/// not read at all when `entry_only` is set.
///
/// # Errors
/// Propagates the error from `count`
pub fn pending_calls_report<F>(entry_only: bool, count: F) -> Result<Option<String>>
where
    F: FnOnce() -> Result<usize>,
{
    if entry_only {
        return Ok(None);
    }
    let pending = count()?;
    Ok((pending > 0).then(|| format!("pending: {pending} call(s) without an observed return")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_only_skips_pending_count() {
        let report = pending_calls_report(true, || panic!("count must not be read")).unwrap();
        assert_eq!(report, None);
    }

    #[test]
    fn test_pending_line_only_when_calls_remain() {
        assert_eq!(pending_calls_report(false, || Ok(0)).unwrap(), None);
        let line = pending_calls_report(false, || Ok(3)).unwrap().unwrap();
        assert!(line.contains("3 call(s)"));
    }

    #[test]
    fn test_count_error_propagates() {
        let result = pending_calls_report(false, || anyhow::bail!("map gone"));
        assert!(result.is_err());
    }
}

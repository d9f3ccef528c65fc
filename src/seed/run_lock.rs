//! Run-lock arithmetic
//!
//! A run lock is a caller-committed counter keeping the seed from going idle
//! before N further generations occur. Supplying a positive lock while the
//! counter is 0 starts a run; the triggering generation counts as the first,
//! so the stored value is `lock - 1`. Each later generation decrements the
//! counter; at 0 a fresh positive lock is required to keep going. The
//! counter never increases mid-run.

use crate::error::{AppError, Result};

/// Precondition checked before a job is allowed anywhere near the queue:
/// a free seed (counter at 0) needs a positive lock to generate
pub fn gate(remaining: u32, lock: Option<u32>) -> Result<()> {
    if remaining == 0 && !lock.is_some_and(|l| l > 0) {
        return Err(AppError::RunLocked);
    }
    Ok(())
}

/// Counter value to store with the generation that just completed
pub fn next_remaining(previous: u32, lock: Option<u32>) -> u32 {
    if previous > 0 {
        previous - 1
    } else {
        lock.map_or(0, |l| l.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_seed_requires_lock() {
        assert!(gate(0, None).is_err());
        assert!(gate(0, Some(0)).is_err());
        assert!(gate(0, Some(3)).is_ok());
        assert!(gate(2, None).is_ok());
    }

    #[test]
    fn test_run_counts_down_from_lock() {
        // Starting a run of 3: the first generation leaves 2
        assert_eq!(next_remaining(0, Some(3)), 2);
        // Continuing without a lock
        assert_eq!(next_remaining(2, None), 1);
        assert_eq!(next_remaining(1, None), 0);
        // Exhausted run is rejected until a new lock arrives
        assert!(gate(0, None).is_err());
    }

    #[test]
    fn test_active_run_ignores_new_lock() {
        // A lock supplied mid-run does not extend the run
        assert_eq!(next_remaining(2, Some(50)), 1);
    }

    #[test]
    fn test_lock_of_one_is_single_shot() {
        assert_eq!(next_remaining(0, Some(1)), 0);
    }
}

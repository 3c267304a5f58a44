//! Consumed-nullifier set.
//!
//! A nullifier moves from unused to used exactly once and never
//! reverts, so the set is insert-only. It carries no interior locking;
//! the payment ledger owns one inside its settlement mutex so the
//! check-and-mark stays atomic with record append.

use pinvault_types::{PinVaultError, PinVaultResult};
use std::collections::HashSet;

pub const DEFAULT_CAPACITY: usize = 1_000_000;

pub struct NullifierSet {
    used: HashSet<[u8; 32]>,
    capacity: usize,
}

impl Default for NullifierSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NullifierSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { used: HashSet::new(), capacity }
    }

    pub fn is_used(&self, nullifier: &[u8; 32]) -> bool {
        self.used.contains(nullifier)
    }

    /// Mark a nullifier consumed. Fails with [`PinVaultError::Replay`]
    /// if already present. A full set is a hard operational error, not
    /// grounds for evicting old entries: forgetting a nullifier would
    /// reopen a settled payment for replay.
    pub fn mark_used(&mut self, nullifier: [u8; 32]) -> PinVaultResult<()> {
        if self.used.contains(&nullifier) {
            return Err(PinVaultError::Replay);
        }
        if self.used.len() >= self.capacity {
            return Err(PinVaultError::Internal("nullifier set is at capacity".into()));
        }
        self.used.insert(nullifier);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

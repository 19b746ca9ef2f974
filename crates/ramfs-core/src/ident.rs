// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node identifier allocation

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out node identifiers. Every call must return a value never
/// returned before by the same allocator.
#[cfg_attr(test, mockall::automock)]
pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> u64;
}

/// Monotonic counter allocator
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator for SequentialIds {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

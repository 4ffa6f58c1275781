//! Process-wide version stamps for mutable matrices.
//!
//! Every mutation draws a fresh stamp, so two distinct states never share a
//! version even when a matrix is replaced wholesale behind a shared handle.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

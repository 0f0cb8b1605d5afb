//! Global configuration for graph-engine runtime behavior.
//!
//! This module provides thread-safe global configuration that affects
//! invariant checking without adding overhead to the hot merge path.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag gating expensive internal consistency checks.
///
/// Mirrors the original engine's compile-time `DEBUG_SVL` switch as a
/// runtime toggle: `SVLocus::check_state()` / `SVLocusSet::check_state()`
/// walk every node and edge to confirm the graph's structural invariants
/// hold, which is too costly to run unconditionally on every `merge`.
static DEBUG_CHECKS: AtomicBool = AtomicBool::new(false);

/// Enable debug-mode invariant checking.
///
/// When enabled, `check_state()` calls perform a full graph consistency
/// scan (every `inodes` entry resolves, no edge crosses a locus boundary,
/// disjointness holds per chromosome after `merge_self_overlap`). Intended
/// for tests and development builds, not hot-path production use.
#[inline]
pub fn set_debug_checks(enabled: bool) {
    DEBUG_CHECKS.store(enabled, Ordering::Release);
}

/// Check if debug-mode invariant checking is enabled.
#[inline]
pub fn is_debug_checks_enabled() -> bool {
    DEBUG_CHECKS.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_disabled() {
        set_debug_checks(false);
        assert!(!is_debug_checks_enabled());
    }

    #[test]
    fn test_enable_disable() {
        set_debug_checks(true);
        assert!(is_debug_checks_enabled());
        set_debug_checks(false);
        assert!(!is_debug_checks_enabled());
    }
}

//! Deterministic, shardable iteration over the edges of a finalized graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::locus::NodeIndex;
use crate::locus_set::SVLocusSet;

/// One unordered edge of the finalized graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInfo {
    pub locus_idx: u32,
    pub node_a: NodeIndex,
    pub node_b: NodeIndex,
}

/// Enumerates all unordered edges of a [`SVLocusSet`] assigned to one of
/// `bin_count` bins, in deterministic `(locus_idx, min(a,b), max(a,b))`
/// order.
///
/// Supports a cooperative cancellation token checked between edges: a
/// `merge` in flight always runs to completion, but the retriever itself
/// may stop early between edges.
pub struct EdgeRetriever {
    edges: Vec<EdgeInfo>,
    position: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl EdgeRetriever {
    /// Build a retriever over `set`'s edges assigned to `bin_index` of
    /// `bin_count` total bins.
    pub fn new(set: &SVLocusSet, bin_count: u32, bin_index: u32) -> Self {
        debug_assert!(bin_count >= 1);
        debug_assert!(bin_index < bin_count);

        let mut all_edges = Vec::new();
        for (locus_idx, locus) in set.loci().iter().enumerate() {
            for (node_idx, node) in locus.nodes() {
                for target in node.edges.keys() {
                    if node_idx <= *target {
                        all_edges.push(EdgeInfo {
                            locus_idx: locus_idx as u32,
                            node_a: node_idx,
                            node_b: *target,
                        });
                    }
                }
            }
        }
        all_edges.sort_by_key(|e| (e.locus_idx, e.node_a, e.node_b));

        let edges = all_edges
            .into_iter()
            .enumerate()
            .filter(|(k, _)| (*k as u32) % bin_count == bin_index)
            .map(|(_, e)| e)
            .collect();

        Self {
            edges,
            position: 0,
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation token, checked between edges.
    pub fn with_cancellation(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Advance to, and return, the next edge. Returns `None` once
    /// exhausted or cancelled.
    pub fn next_edge(&mut self) -> Option<EdgeInfo> {
        if self.is_cancelled() {
            return None;
        }
        let edge = *self.edges.get(self.position)?;
        self.position += 1;
        Some(edge)
    }

    /// The edge returned by the most recent `next_edge` call, if any.
    pub fn get(&self) -> Option<EdgeInfo> {
        if self.position == 0 {
            return None;
        }
        self.edges.get(self.position - 1).copied()
    }

    pub fn total_edges(&self) -> usize {
        self.edges.len()
    }
}

impl Iterator for EdgeRetriever {
    type Item = EdgeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_edge()
    }
}

//! A single connected component of the SV evidence graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::interval::GenomeInterval;

pub type NodeIndex = u32;

/// A directed, saturating evidence count between two nodes.
///
/// A conceptual undirected edge between nodes A and B is represented by
/// two directed `SVLocusEdge`s, `A -> B` and `B -> A`, each with its own
/// count; evidence tallied while A is the "from" node is kept distinct
/// from evidence tallied later when B becomes the "from" node. Collapsing
/// this to one undirected count would lose that distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SVLocusEdge {
    pub count: u16,
}

impl SVLocusEdge {
    pub fn new(count: u16) -> Self {
        Self { count }
    }

    /// Merge another edge's count into this one, saturating at `u16::MAX`.
    pub fn merge_edge(&mut self, other: &SVLocusEdge) {
        self.count = self.count.saturating_add(other.count);
    }
}

/// One node of the evidence graph: a genomic interval hypothesizing a
/// breakend, plus the directed edges linking it to other nodes in the
/// same locus.
#[derive(Debug, Clone)]
pub struct SVLocusNode {
    pub count: u16,
    pub interval: GenomeInterval,
    pub evidence_range: GenomeInterval,
    pub edges: BTreeMap<NodeIndex, SVLocusEdge>,
}

impl SVLocusNode {
    fn new(interval: GenomeInterval, count: u16) -> Self {
        Self {
            count,
            evidence_range: interval,
            interval,
            edges: BTreeMap::new(),
        }
    }

    /// Sum of all out-edge counts.
    pub fn out_count(&self) -> u32 {
        self.edges.values().map(|e| e.count as u32).sum()
    }
}

/// An ordered sequence of [`SVLocusNode`]s forming one connected component
/// (or a single isolated node) of the evidence graph.
///
/// Invariants (enforced by construction, verified by
/// [`SVLocus::check_state`]): edges never cross locus boundaries; the
/// interval graph within a locus is connected (or has length 1); a node
/// with an empty interval never exists after [`SVLocus::merge_self_overlap`].
#[derive(Debug, Clone, Default)]
pub struct SVLocus {
    nodes: Vec<SVLocusNode>,
    locus_index: u32,
}

impl SVLocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locus_index(&self) -> u32 {
        self.locus_index
    }

    pub fn set_locus_index(&mut self, index: u32) {
        self.locus_index = index;
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, idx: NodeIndex) -> &SVLocusNode {
        &self.nodes[idx as usize]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut SVLocusNode {
        &mut self.nodes[idx as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &SVLocusNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as NodeIndex, n))
    }

    /// Add a new node with `count` observations rooted at it.
    pub fn add_node(&mut self, interval: GenomeInterval, count: u16) -> NodeIndex {
        let idx = self.nodes.len() as NodeIndex;
        self.nodes.push(SVLocusNode::new(interval, count));
        idx
    }

    /// Add a remote node: same as [`SVLocus::add_node`] with `count = 0`.
    pub fn add_remote_node(&mut self, interval: GenomeInterval) -> NodeIndex {
        self.add_node(interval, 0)
    }

    pub fn set_node_evidence(&mut self, node: NodeIndex, range: GenomeInterval) {
        self.nodes[node as usize].evidence_range = range;
    }

    /// Insert one directed edge in each direction between `from` and `to`.
    ///
    /// Precondition: no edge in either direction already exists. Only
    /// `from -> to` carries `from_count` on first link.
    pub fn link_nodes(&mut self, from: NodeIndex, to: NodeIndex, from_count: u16, to_count: u16) {
        debug_assert!(!self.nodes[from as usize].edges.contains_key(&to));
        debug_assert!(!self.nodes[to as usize].edges.contains_key(&from));
        self.nodes[from as usize].edges.insert(to, SVLocusEdge::new(from_count));
        self.nodes[to as usize].edges.insert(from, SVLocusEdge::new(to_count));
    }

    /// Join `from` into `to`: out-edges are folded into `to`'s out-edges,
    /// in-edges are retargeted to `to`, intervals and evidence ranges are
    /// unioned, and `from` is erased. `from` and `to` must be distinct
    /// nodes of this locus on the same chromosome.
    pub fn merge_node(&mut self, from: NodeIndex, to: NodeIndex) {
        debug_assert_ne!(from, to);

        // 1. fold from's out-edges into to's out-edges.
        let from_edges: Vec<(NodeIndex, SVLocusEdge)> =
            self.nodes[from as usize].edges.iter().map(|(k, v)| (*k, *v)).collect();
        for (target, edge) in &from_edges {
            if *target == to {
                continue;
            }
            self.nodes[to as usize]
                .edges
                .entry(*target)
                .or_default()
                .merge_edge(edge);
        }

        // 2. retarget every in-edge y -> from to y -> to, summing counts.
        for (target, _) in &from_edges {
            if *target == to {
                continue;
            }
            if let Some(back_edge) = self.nodes[*target as usize].edges.remove(&from) {
                self.nodes[*target as usize]
                    .edges
                    .entry(to)
                    .or_default()
                    .merge_edge(&back_edge);
            }
        }

        // 3. union intervals and evidence ranges.
        let from_interval = self.nodes[from as usize].interval;
        let from_evidence = self.nodes[from as usize].evidence_range;
        let from_count = self.nodes[from as usize].count;
        {
            let to_node = &mut self.nodes[to as usize];
            to_node.interval = to_node.interval.union(&from_interval);
            to_node.evidence_range = to_node.evidence_range.union(&from_evidence);
            // 4. fold observation count.
            to_node.count = to_node.count.saturating_add(from_count);
        }

        // 5. erase from (drop any residual from<->to edge pair first).
        self.nodes[to as usize].edges.remove(&from);
        self.erase_node(from);
    }

    /// Remove `node`, shifting all higher indices down by one and
    /// remapping every edge that refers to them.
    ///
    /// Returns the mapping old-index -> new-index for every node that was
    /// NOT removed, so callers (notably [`crate::locus_set::SVLocusSet`])
    /// can keep their own index alongside this locus up to date.
    pub fn erase_node(&mut self, node: NodeIndex) -> Vec<(NodeIndex, NodeIndex)> {
        let removed = node;
        self.nodes.remove(removed as usize);

        let mut remap = Vec::with_capacity(self.nodes.len());
        for old in 0..(self.nodes.len() as NodeIndex + 1) {
            if old == removed {
                continue;
            }
            let new = if old > removed { old - 1 } else { old };
            remap.push((old, new));
        }

        for n in self.nodes.iter_mut() {
            let remapped: BTreeMap<NodeIndex, SVLocusEdge> = n
                .edges
                .iter()
                .filter(|(k, _)| **k != removed)
                .map(|(k, v)| {
                    let new_k = if *k > removed { *k - 1 } else { *k };
                    (new_k, *v)
                })
                .collect();
            n.edges = remapped;
        }

        remap
    }

    /// Find any pair of nodes within this locus whose intervals
    /// intersect, merge them, and repeat to fixpoint.
    ///
    /// Returns the sequence of (erased_old_index, resulting_remap) pairs
    /// applied, in case a caller is tracking external node identities.
    pub fn merge_self_overlap(&mut self) {
        loop {
            let mut found = None;
            'outer: for i in 0..self.nodes.len() {
                for j in (i + 1)..self.nodes.len() {
                    if self.nodes[i].interval.intersects(&self.nodes[j].interval) {
                        found = Some((i as NodeIndex, j as NodeIndex));
                        break 'outer;
                    }
                }
            }
            match found {
                Some((a, b)) => self.merge_node(b, a),
                None => break,
            }
        }
    }

    /// Iterative (stack-based) search for all node indices reachable from
    /// `start`, used to validate locus connectedness.
    pub fn find_connected(&self, start: NodeIndex) -> std::collections::BTreeSet<NodeIndex> {
        let mut connected = std::collections::BTreeSet::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !connected.insert(idx) {
                continue;
            }
            for neighbor in self.nodes[idx as usize].edges.keys() {
                if !connected.contains(neighbor) {
                    stack.push(*neighbor);
                }
            }
        }
        connected
    }

    pub fn total_observation_count(&self) -> u64 {
        self.nodes.iter().map(|n| n.count as u64).sum()
    }

    pub fn total_edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    /// Sum of in-edge counts pointing at `node` (i.e. edges `y -> node`).
    pub fn get_node_in_count(&self, node: NodeIndex) -> u32 {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i as NodeIndex != node)
            .filter_map(|(_, n)| n.edges.get(&node))
            .map(|e| e.count as u32)
            .sum()
    }

    /// True iff every in-edge and out-edge of `node` has count strictly
    /// below `min_merge_edge_count`.
    fn is_noise_node(&self, min_merge_edge_count: u16, node: NodeIndex) -> bool {
        let out_ok = self.nodes[node as usize]
            .edges
            .values()
            .all(|e| e.count < min_merge_edge_count);
        if !out_ok {
            return false;
        }
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i as NodeIndex != node)
            .all(|(_, n)| match n.edges.get(&node) {
                Some(e) => e.count < min_merge_edge_count,
                None => true,
            })
    }

    /// Remove all in-edges of `node` (edges `other -> node`) whose count is
    /// below `min_merge_edge_count`, clearing the reciprocal `node -> other`
    /// edge at the same time. Returns every node (including `node` itself)
    /// left with no edges as a result of this clearing.
    fn clean_node_core(&mut self, min_merge_edge_count: u16, node: NodeIndex) -> BTreeSet<NodeIndex> {
        let weak_in: Vec<NodeIndex> = (0..self.nodes.len() as NodeIndex)
            .filter(|&other| other != node)
            .filter(|&other| {
                self.nodes[other as usize]
                    .edges
                    .get(&node)
                    .is_some_and(|e| e.count < min_merge_edge_count)
            })
            .collect();

        let mut newly_empty = BTreeSet::new();
        for other in weak_in {
            self.nodes[other as usize].edges.remove(&node);
            self.nodes[node as usize].edges.remove(&other);
            if self.nodes[other as usize].edges.is_empty() {
                newly_empty.insert(other);
            }
        }
        if self.nodes[node as usize].edges.is_empty() {
            newly_empty.insert(node);
        }
        newly_empty
    }

    /// Remove noise in-edges and delete nodes that become edgeless.
    /// Returns the total evidence count removed.
    pub fn clean(&mut self, min_merge_edge_count: u16) -> u64 {
        if min_merge_edge_count == 0 {
            return 0;
        }

        let mut empty_nodes: BTreeSet<NodeIndex> = BTreeSet::new();
        for idx in 0..self.nodes.len() as NodeIndex {
            if !self.is_noise_node(min_merge_edge_count, idx) {
                continue;
            }
            empty_nodes.extend(self.clean_node_core(min_merge_edge_count, idx));
        }

        let mut removed_evidence = 0u64;
        for idx in empty_nodes.into_iter().rev() {
            removed_evidence += self.nodes[idx as usize].count as u64;
            self.erase_node(idx);
        }
        removed_evidence
    }

    /// Debug-mode internal consistency check, gated by
    /// [`crate::config::is_debug_checks_enabled`].
    pub fn check_state(&self, check_connected: bool) -> Result<(), String> {
        let n = self.nodes.len() as NodeIndex;
        for (idx, node) in self.nodes.iter().enumerate() {
            for target in node.edges.keys() {
                if *target >= n {
                    return Err(format!("node {idx} has edge to out-of-range node {target}"));
                }
                if !self.nodes[*target as usize].edges.contains_key(&(idx as NodeIndex)) {
                    return Err(format!("edge {idx} -> {target} has no reciprocal edge"));
                }
            }
        }
        if check_connected && !self.nodes.is_empty() {
            let connected = self.find_connected(0);
            if connected.len() != self.nodes.len() {
                return Err(format!(
                    "locus is not connected: {} of {} nodes reachable from node 0",
                    connected.len(),
                    self.nodes.len()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(chrom: u32, b: i64, e: i64) -> GenomeInterval {
        GenomeInterval::new(chrom, b, e)
    }

    #[test]
    fn test_add_node_and_link() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_remote_node(iv(2, 500, 600));
        locus.link_nodes(a, b, 1, 0);

        assert_eq!(locus.node(a).edges.get(&b).unwrap().count, 1);
        assert_eq!(locus.node(b).edges.get(&a).unwrap().count, 0);
        assert_eq!(locus.node(a).count, 1);
        assert_eq!(locus.node(b).count, 0);
    }

    #[test]
    fn test_merge_self_overlap_idempotent() {
        let mut locus = SVLocus::new();
        locus.add_node(iv(1, 100, 200), 1);
        locus.add_node(iv(1, 150, 250), 1);
        locus.add_node(iv(1, 300, 400), 1);

        locus.merge_self_overlap();
        let once = locus.len();
        locus.merge_self_overlap();
        assert_eq!(locus.len(), once);
        assert_eq!(once, 2);
    }

    #[test]
    fn test_merge_self_overlap_disjoint_after() {
        let mut locus = SVLocus::new();
        locus.add_node(iv(1, 100, 200), 1);
        locus.add_node(iv(1, 150, 250), 1);
        locus.add_node(iv(1, 240, 400), 1);
        locus.merge_self_overlap();

        let intervals: Vec<GenomeInterval> = locus.nodes().map(|(_, n)| n.interval).collect();
        for i in 0..intervals.len() {
            for j in (i + 1)..intervals.len() {
                assert!(!intervals[i].intersects(&intervals[j]));
            }
        }
    }

    #[test]
    fn test_merge_node_sums_counts_and_unions_interval() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_node(iv(1, 150, 250), 1);
        let remote = locus.add_remote_node(iv(2, 500, 600));
        locus.link_nodes(a, remote, 1, 0);
        // b also links to a different remote to check edge folding.
        let remote2 = locus.add_remote_node(iv(3, 700, 800));
        locus.link_nodes(b, remote2, 1, 0);

        locus.merge_node(b, a);

        assert_eq!(locus.len(), 3); // remote, remote2, merged a
        let merged = locus.nodes().find(|(_, n)| n.interval.chrom_id == 1).unwrap().1;
        assert_eq!(merged.interval.begin, 100);
        assert_eq!(merged.interval.end, 250);
        assert_eq!(merged.count, 2);
        assert_eq!(merged.edges.len(), 2);
    }

    #[test]
    fn test_edge_symmetry_after_merges() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_node(iv(1, 150, 250), 1);
        let remote = locus.add_remote_node(iv(2, 500, 600));
        locus.link_nodes(a, remote, 1, 0);
        locus.link_nodes(b, remote, 1, 0);
        locus.merge_self_overlap();

        for (idx, node) in locus.nodes() {
            for (target, _) in node.edges.iter() {
                assert!(
                    locus.node(*target).edges.contains_key(&idx),
                    "missing reciprocal edge {target} -> {idx}"
                );
            }
        }
    }

    #[test]
    fn test_clean_removes_noise_nodes() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 5);
        let noisy = locus.add_remote_node(iv(2, 500, 600));
        locus.link_nodes(a, noisy, 1, 0);

        // Both edges of this pair fall below the threshold, so the whole
        // locus is noise: both nodes end up edgeless and are erased.
        let removed = locus.clean(2);
        assert_eq!(removed, 5);
        assert_eq!(locus.len(), 0);
    }

    #[test]
    fn test_clean_preserves_nodes_with_strong_support() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_remote_node(iv(2, 500, 600));
        let c = locus.add_remote_node(iv(3, 900, 1000));
        locus.link_nodes(a, b, 3, 3);
        locus.link_nodes(a, c, 1, 1);

        let removed = locus.clean(2);
        assert_eq!(removed, 0); // c is a remote node, carries no observation count
        assert_eq!(locus.len(), 2);
        assert!(locus.node(a).edges.contains_key(&b));
        assert!(!locus.node(a).edges.contains_key(&c));
    }

    #[test]
    fn test_find_connected() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_remote_node(iv(2, 500, 600));
        locus.link_nodes(a, b, 1, 0);
        let connected = locus.find_connected(a);
        assert_eq!(connected.len(), 2);
    }

    #[test]
    fn test_check_state_detects_broken_reciprocal_edge() {
        let mut locus = SVLocus::new();
        let a = locus.add_node(iv(1, 100, 200), 1);
        let b = locus.add_remote_node(iv(2, 500, 600));
        locus.node_mut(a).edges.insert(b, SVLocusEdge::new(1));
        // deliberately omit the reciprocal edge
        assert!(locus.check_state(false).is_err());
    }
}

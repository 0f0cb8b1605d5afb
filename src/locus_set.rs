//! The mutable evidence graph container: an ordered collection of
//! [`SVLocus`]es plus an interval-keyed index for fast overlap lookup.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::config::is_debug_checks_enabled;
use crate::error::{GraphError, Result};
use crate::interval::GenomeInterval;
use crate::locus::{NodeIndex, SVLocus};

/// One entry of the `(chrom, begin)`-ordered interval index.
#[derive(Debug, Clone, Copy)]
struct INode {
    begin: i64,
    end: i64,
    locus_idx: u32,
    node_idx: NodeIndex,
}

/// The global SV evidence graph: a set of loci (connected components),
/// plus an index mapping genomic intervals back to the node that covers
/// them.
///
/// `inodes` is rebuilt wholesale after each `merge`/`combine_loci`/`clean`
/// call rather than updated incrementally, trading incremental-update
/// complexity for straightforward correctness under the graph's frequent
/// index shifts.
#[derive(Debug, Clone, Default)]
pub struct SVLocusSet {
    loci: Vec<SVLocus>,
    inodes: FxHashMap<u32, Vec<INode>>,
}

impl SVLocusSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loci(&self) -> &[SVLocus] {
        &self.loci
    }

    pub fn locus(&self, idx: u32) -> &SVLocus {
        &self.loci[idx as usize]
    }

    /// Number of locus slots, including empty holes left by `combine_loci`.
    pub fn len(&self) -> usize {
        self.loci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loci.iter().all(|l| l.is_empty())
    }

    pub fn total_observation_count(&self) -> u64 {
        self.loci.iter().map(|l| l.total_observation_count()).sum()
    }

    pub fn total_edge_count(&self) -> usize {
        self.loci.iter().map(|l| l.total_edge_count()).sum()
    }

    /// All `(locus_idx, node_idx)` pairs whose node interval intersects
    /// `query`, in deterministic `(chrom, begin)` order.
    fn intersect_set(&self, query: &GenomeInterval) -> Vec<(u32, NodeIndex)> {
        let bucket = match self.inodes.get(&query.chrom_id) {
            Some(b) => b,
            None => return Vec::new(),
        };
        let start = bucket.partition_point(|n| n.begin < query.begin);

        let mut hits = Vec::new();
        for n in bucket[start..].iter() {
            if n.begin >= query.end {
                break;
            }
            if n.begin < query.end && query.begin < n.end {
                hits.push((n.locus_idx, n.node_idx));
            }
        }
        for n in bucket[..start].iter().rev() {
            if n.begin < query.end && query.begin < n.end {
                hits.push((n.locus_idx, n.node_idx));
            } else {
                break;
            }
        }
        hits
    }

    /// Rebuild `inodes` completely from the current `loci`. O(total
    /// node count); called after every graph-mutating operation.
    fn rebuild_inodes(&mut self) {
        self.inodes.clear();
        for (locus_idx, locus) in self.loci.iter().enumerate() {
            for (node_idx, node) in locus.nodes() {
                self.inodes
                    .entry(node.interval.chrom_id)
                    .or_default()
                    .push(INode {
                        begin: node.interval.begin,
                        end: node.interval.end,
                        locus_idx: locus_idx as u32,
                        node_idx,
                    });
            }
        }
        for bucket in self.inodes.values_mut() {
            bucket.sort_by_key(|n| (n.begin, n.end));
        }
    }

    /// Append `from`'s nodes (with edge indices offset) into `to`, then
    /// empty `from`'s slot. `to`'s slot is retained even if `from` was
    /// already empty.
    pub fn combine_loci(&mut self, from: u32, to: u32) {
        if from as usize >= self.loci.len() {
            return;
        }
        if self.loci[from as usize].is_empty() {
            return;
        }
        if from == to {
            return;
        }

        let offset = self.loci[to as usize].len() as NodeIndex;
        let from_locus = std::mem::take(&mut self.loci[from as usize]);

        for (_, node) in from_locus.nodes() {
            let new_idx = self.loci[to as usize].add_node(node.interval, node.count);
            self.loci[to as usize].set_node_evidence(new_idx, node.evidence_range);
        }
        for (old_idx, node) in from_locus.nodes() {
            let new_from = offset + old_idx;
            for (target, edge) in node.edges.iter() {
                let new_target = offset + *target;
                self.loci[to as usize]
                    .node_mut(new_from)
                    .edges
                    .insert(new_target, *edge);
            }
        }
    }

    /// Ingest a single-observation (or otherwise small) locus into the
    /// graph, consolidating any existing nodes it overlaps.
    ///
    /// Every input node is first copied verbatim (same interval) into the
    /// target locus; only after all of them have landed do we replicate
    /// `input_locus`'s own internal edges and run `merge_self_overlap` to
    /// fold overlapping nodes together. Deferring the fold this way avoids
    /// tracking node indices through the shifts `merge_node`/`erase_node`
    /// cause mid-ingestion. `merge_self_overlap` re-scans from scratch
    /// after every fold it performs, so it's immune to those shifts, while
    /// per-node index bookkeeping here would not be.
    pub fn merge(&mut self, input_locus: &SVLocus) -> Result<()> {
        let start_locus_idx = self.loci.len() as u32;
        let mut locus_idx = start_locus_idx;

        for (_, input_node) in input_locus.nodes() {
            let intersect = self.intersect_set(&input_node.interval);

            if !intersect.is_empty() {
                for (other_locus, _) in &intersect {
                    if *other_locus < locus_idx {
                        locus_idx = *other_locus;
                    }
                }
                self.combine_loci(start_locus_idx, locus_idx);
                for (other_locus, _) in &intersect {
                    self.combine_loci(*other_locus, locus_idx);
                }
            }

            if locus_idx as usize >= self.loci.len() {
                self.loci.resize_with(locus_idx as usize + 1, SVLocus::default);
            }
            let new_idx = self.loci[locus_idx as usize].add_node(input_node.interval, input_node.count);
            self.loci[locus_idx as usize].set_node_evidence(new_idx, input_node.evidence_range);

            self.rebuild_inodes();
        }

        // Locate each just-copied node by interval: copying never alters a
        // node's interval, so every input node has an exact-match,
        // not-yet-claimed counterpart in loci[locus_idx] at this point.
        let mut claimed: std::collections::HashSet<NodeIndex> = std::collections::HashSet::new();
        let mut copied: Vec<NodeIndex> = Vec::with_capacity(input_locus.len());
        for (_, input_node) in input_locus.nodes() {
            let found = self.loci[locus_idx as usize]
                .nodes()
                .find(|(idx, n)| n.interval == input_node.interval && !claimed.contains(idx))
                .map(|(idx, _)| idx)
                .expect("every input node was just copied into loci[locus_idx]");
            claimed.insert(found);
            copied.push(found);
        }

        // replicate input_locus's own internal edges (e.g. local<->remote)
        // among the freshly copied nodes.
        for (input_idx, input_node) in input_locus.nodes() {
            let from = copied[input_idx as usize];
            for (target, edge) in input_node.edges.iter() {
                let to = copied[*target as usize];
                if from == to {
                    continue;
                }
                let locus = &mut self.loci[locus_idx as usize];
                match locus.node(from).edges.get(&to).copied() {
                    Some(mut existing) => {
                        existing.merge_edge(edge);
                        locus.node_mut(from).edges.insert(to, existing);
                    }
                    None => {
                        locus.node_mut(from).edges.insert(to, *edge);
                    }
                }
            }
        }

        self.loci[locus_idx as usize].merge_self_overlap();
        self.rebuild_inodes();

        if is_debug_checks_enabled() {
            self.check_state().map_err(GraphError::InvariantViolation)?;
        }

        Ok(())
    }

    /// Remove low-evidence noise from every locus. Returns total evidence
    /// removed.
    pub fn clean(&mut self, min_merge_edge_count: u16) -> u64 {
        let removed = self
            .loci
            .iter_mut()
            .map(|l| l.clean(min_merge_edge_count))
            .sum();
        self.rebuild_inodes();
        removed
    }

    /// Full consistency check across every locus plus the index.
    pub fn check_state(&self) -> std::result::Result<(), String> {
        for locus in self.loci.iter() {
            locus.check_state(!locus.is_empty())?;
        }

        let mut expected: FxHashMap<(u32, NodeIndex), GenomeInterval> = FxHashMap::default();
        for (locus_idx, locus) in self.loci.iter().enumerate() {
            for (node_idx, node) in locus.nodes() {
                expected.insert((locus_idx as u32, node_idx), node.interval);
            }
        }

        let mut seen = 0usize;
        for bucket in self.inodes.values() {
            for n in bucket {
                match expected.get(&(n.locus_idx, n.node_idx)) {
                    Some(iv) if iv.begin == n.begin && iv.end == n.end => seen += 1,
                    _ => {
                        return Err(format!(
                            "inodes entry ({}, {}) does not match current node state",
                            n.locus_idx, n.node_idx
                        ))
                    }
                }
            }
        }
        if seen != expected.len() {
            return Err(format!(
                "inodes index has {seen} entries but {} nodes exist",
                expected.len()
            ));
        }

        // disjointness: within a chromosome bucket, no two entries may overlap.
        for bucket in self.inodes.values() {
            for w in bucket.windows(2) {
                if w[0].locus_idx == w[1].locus_idx && w[0].end > w[1].begin {
                    return Err("overlapping nodes found within a locus after merge".to_string());
                }
            }
        }

        Ok(())
    }

    /// Write the graph to the development text format (§ `#locus`, `node`,
    /// `edge` lines). Not a genomics interchange format.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (locus_idx, locus) in self.loci.iter().enumerate() {
            if locus.is_empty() {
                continue;
            }
            writeln!(writer, "#locus {locus_idx}")?;
            for (node_idx, node) in locus.nodes() {
                writeln!(
                    writer,
                    "node\t{node_idx}\t{}\t{}\t{}\t{}\t{}\t{}",
                    node.interval.chrom_id,
                    node.interval.begin,
                    node.interval.end,
                    node.count,
                    node.evidence_range.begin,
                    node.evidence_range.end,
                )?;
            }
            for (node_idx, node) in locus.nodes() {
                for (target, edge) in node.edges.iter() {
                    writeln!(writer, "edge\t{node_idx}\t{target}\t{}", edge.count)?;
                }
            }
        }
        Ok(())
    }

    /// Read a graph back from the text format written by
    /// [`SVLocusSet::write`].
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut set = Self::new();
        let mut current: Option<SVLocus> = None;

        let flush = |set: &mut Self, current: &mut Option<SVLocus>| {
            if let Some(locus) = current.take() {
                set.loci.push(locus);
            }
        };

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(_rest) = trimmed.strip_prefix("#locus") {
                flush(&mut set, &mut current);
                current = Some(SVLocus::new());
                continue;
            }
            let fields: Vec<&str> = trimmed.split('\t').collect();
            let parse_err = |message: String| GraphError::Parse {
                line: line_no + 1,
                message,
            };
            match fields.first().copied() {
                Some("node") => {
                    if fields.len() != 8 {
                        return Err(parse_err(format!("expected 8 node columns, got {}", fields.len())));
                    }
                    let locus = current.get_or_insert_with(SVLocus::new);
                    let chrom_id: u32 = fields[2].parse().map_err(|_| parse_err("bad chrom_id".into()))?;
                    let begin: i64 = fields[3].parse().map_err(|_| parse_err("bad begin".into()))?;
                    let end: i64 = fields[4].parse().map_err(|_| parse_err("bad end".into()))?;
                    let count: u16 = fields[5].parse().map_err(|_| parse_err("bad count".into()))?;
                    let ev_begin: i64 = fields[6].parse().map_err(|_| parse_err("bad evidence begin".into()))?;
                    let ev_end: i64 = fields[7].parse().map_err(|_| parse_err("bad evidence end".into()))?;
                    let interval = GenomeInterval::new(chrom_id, begin, end);
                    let idx = locus.add_node(interval, count);
                    locus.set_node_evidence(idx, GenomeInterval::new(chrom_id, ev_begin, ev_end));
                }
                Some("edge") => {
                    if fields.len() != 4 {
                        return Err(parse_err(format!("expected 4 edge columns, got {}", fields.len())));
                    }
                    let locus = current.get_or_insert_with(SVLocus::new);
                    let from: NodeIndex = fields[1].parse().map_err(|_| parse_err("bad from index".into()))?;
                    let to: NodeIndex = fields[2].parse().map_err(|_| parse_err("bad to index".into()))?;
                    let count: u16 = fields[3].parse().map_err(|_| parse_err("bad edge count".into()))?;
                    locus.node_mut(from).edges.insert(to, crate::locus::SVLocusEdge::new(count));
                }
                _ => {
                    return Err(parse_err(format!("unrecognized record kind '{}'", fields[0])));
                }
            }
        }
        flush(&mut set, &mut current);
        set.rebuild_inodes();
        Ok(set)
    }
}

/// Build an independent `SVLocusSet` from a sequence of single-observation
/// loci (e.g. one partition's worth of scanner output), then drain it one
/// locus at a time into `target` through the same `merge` primitive used
/// for online ingestion. Parallel *building* followed by serial folding,
/// never a parallel merge.
pub fn merge_locus_set(target: &mut SVLocusSet, donor: SVLocusSet) -> Result<()> {
    for locus in donor.loci.iter().filter(|l| !l.is_empty()) {
        target.merge(locus)?;
    }
    Ok(())
}

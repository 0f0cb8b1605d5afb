#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! A structural-variant evidence-graph engine for paired-end sequencing
//! alignments.
//!
//! Read pairs are turned into small "single-observation" loci by
//! [`scanner::SVLocusScanner`], which are then folded one at a time into a
//! global [`locus_set::SVLocusSet`], an undirected multigraph whose nodes
//! are genomic intervals and whose edges carry weighted pair-support
//! counts. Once the graph is built, [`edge_retriever::EdgeRetriever`]
//! enumerates its edges in deterministic, shardable order for downstream
//! scoring.
//!
//! # Example
//!
//! ```rust,no_run
//! use sv_locus_graph::{locus::SVLocus, locus_set::SVLocusSet, interval::GenomeInterval};
//!
//! let mut set = SVLocusSet::new();
//! let mut locus = SVLocus::new();
//! let local = locus.add_node(GenomeInterval::new(1, 1000, 1040), 1);
//! let remote = locus.add_remote_node(GenomeInterval::new(2, 5000, 5040));
//! locus.link_nodes(local, remote, 1, 0);
//! set.merge(&locus).unwrap();
//! ```

pub mod commands;
pub mod config;
pub mod edge_retriever;
pub mod error;
pub mod interval;
pub mod locus;
pub mod locus_set;
pub mod pairstats;
pub mod read_group_stats;
pub mod scanner;

pub use edge_retriever::{EdgeInfo, EdgeRetriever};
pub use error::{GraphError, Result};
pub use interval::{BreakendState, GenomeInterval};
pub use locus::{SVLocus, SVLocusEdge, SVLocusNode};
pub use locus_set::{merge_locus_set, SVLocusSet};
pub use pairstats::{Orientation, PairStats, PairStatsSummary};
pub use read_group_stats::ReadGroupStatsSet;
pub use scanner::{AlignmentRecord, Breakend, ReadScannerOptions, SVLocusScanner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{BuildCommand, ShardCommand};
    pub use crate::edge_retriever::{EdgeInfo, EdgeRetriever};
    pub use crate::error::{GraphError, Result};
    pub use crate::interval::{BreakendState, GenomeInterval};
    pub use crate::locus::{SVLocus, SVLocusEdge, SVLocusNode};
    pub use crate::locus_set::{merge_locus_set, SVLocusSet};
    pub use crate::pairstats::{Orientation, PairStats};
    pub use crate::read_group_stats::ReadGroupStatsSet;
    pub use crate::scanner::{AlignmentRecord, ReadScannerOptions, SVLocusScanner};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_merge_workflow() {
        let mut set = SVLocusSet::new();

        let mut a = SVLocus::new();
        let a_local = a.add_node(GenomeInterval::new(1, 100, 200), 1);
        let a_remote = a.add_remote_node(GenomeInterval::new(2, 500, 600));
        a.link_nodes(a_local, a_remote, 1, 0);
        set.merge(&a).unwrap();

        let mut b = SVLocus::new();
        let b_local = b.add_node(GenomeInterval::new(1, 150, 250), 1);
        let b_remote = b.add_remote_node(GenomeInterval::new(2, 550, 650));
        b.link_nodes(b_local, b_remote, 1, 0);
        set.merge(&b).unwrap();

        assert_eq!(set.total_observation_count(), 2);
        assert_eq!(set.loci().iter().filter(|l| !l.is_empty()).count(), 1);
    }

    #[test]
    fn test_edge_retriever_workflow() {
        let mut set = SVLocusSet::new();
        let mut locus = SVLocus::new();
        let local = locus.add_node(GenomeInterval::new(1, 100, 200), 1);
        let remote = locus.add_remote_node(GenomeInterval::new(2, 500, 600));
        locus.link_nodes(local, remote, 1, 0);
        set.merge(&locus).unwrap();

        let edges: Vec<_> = EdgeRetriever::new(&set, 1, 0).collect();
        assert_eq!(edges.len(), 1);
    }
}

//! `shard`: emit one bin's worth of edges from a finalized graph.

use std::io::Write;
use std::path::Path;

use crate::edge_retriever::EdgeRetriever;
use crate::error::Result;
use crate::locus_set::SVLocusSet;

/// Loads a finalized graph and writes one line per [`crate::edge_retriever::EdgeInfo`]
/// in the requested bin. Bin 0 additionally emits a header line.
#[derive(Debug, Clone, Copy)]
pub struct ShardCommand {
    pub bin_count: u32,
    pub bin_index: u32,
}

impl ShardCommand {
    pub fn new(bin_count: u32, bin_index: u32) -> Self {
        Self { bin_count, bin_index }
    }

    pub fn run<P: AsRef<Path>, W: Write>(&self, graph_path: P, writer: &mut W) -> Result<()> {
        let set = SVLocusSet::read(graph_path)?;
        let retriever = EdgeRetriever::new(&set, self.bin_count, self.bin_index);

        if self.bin_index == 0 {
            writeln!(writer, "#locus_idx\tnode_a\tnode_b")?;
        }
        for edge in retriever {
            writeln!(writer, "{}\t{}\t{}", edge.locus_idx, edge.node_a, edge.node_b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::GenomeInterval;
    use crate::locus::SVLocus;

    #[test]
    fn test_shard_emits_header_only_for_bin_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");

        let mut set = SVLocusSet::new();
        let mut locus = SVLocus::new();
        let a = locus.add_node(GenomeInterval::new(1, 100, 200), 1);
        let b = locus.add_remote_node(GenomeInterval::new(2, 500, 600));
        locus.link_nodes(a, b, 1, 0);
        set.merge(&locus).unwrap();
        set.write(&path).unwrap();

        let mut out0 = Vec::new();
        ShardCommand::new(1, 0).run(&path, &mut out0).unwrap();
        assert!(String::from_utf8(out0).unwrap().starts_with('#'));

        let mut out1 = Vec::new();
        ShardCommand::new(2, 1).run(&path, &mut out1).unwrap();
        assert!(!String::from_utf8(out1).unwrap().starts_with('#'));
    }
}

//! `build`: scan alignment inputs into a finalized evidence graph.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::commands::demo_align::read_demo_alignments;
use crate::error::Result;
use crate::locus_set::{merge_locus_set, SVLocusSet};
use crate::read_group_stats::ReadGroupStatsSet;
use crate::scanner::{ReadScannerOptions, SVLocusScanner};

/// Builds a finalized [`SVLocusSet`] from a stats file and a list of
/// alignment inputs.
///
/// Each alignment file is scanned into its own independent `SVLocusSet` in
/// parallel, then folded serially into one set via [`merge_locus_set`]
/// since `merge` itself is not safe for concurrent writers.
#[derive(Debug, Clone)]
pub struct BuildCommand {
    pub options: ReadScannerOptions,
    pub min_merge_edge_count: u16,
}

impl Default for BuildCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildCommand {
    pub fn new() -> Self {
        Self {
            options: ReadScannerOptions::default(),
            min_merge_edge_count: 0,
        }
    }

    pub fn with_options(mut self, options: ReadScannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_min_merge_edge_count(mut self, count: u16) -> Self {
        self.min_merge_edge_count = count;
        self
    }

    pub fn run<P: AsRef<Path>>(&self, stats_path: P, alignments: &[PathBuf], out_path: P) -> Result<()> {
        let rss = ReadGroupStatsSet::read(stats_path)?;
        let scanner = SVLocusScanner::new(self.options, &rss);

        let shards: Vec<SVLocusSet> = alignments
            .par_iter()
            .map(|path| -> Result<SVLocusSet> {
                let rg_index = rss.group_index(&path.to_string_lossy()).unwrap_or(0);
                let records = read_demo_alignments(path)?;
                let mut shard = SVLocusSet::new();
                for record in &records {
                    if scanner.is_read_filtered(record) {
                        continue;
                    }
                    if let Some(locus) = scanner.sv_locus(record, rg_index)? {
                        shard.merge(&locus)?;
                    }
                }
                Ok(shard)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut combined = SVLocusSet::new();
        for shard in shards {
            merge_locus_set(&mut combined, shard)?;
        }

        if self.min_merge_edge_count > 0 {
            let removed = combined.clean(self.min_merge_edge_count);
            log::info!("cleaned {removed} units of low-evidence support");
        }

        combined.write(out_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairstats::{Orientation, PairStats};

    #[test]
    fn test_build_end_to_end_on_demo_alignments() {
        let dir = tempfile::tempdir().unwrap();
        let stats_path = dir.path().join("stats.tsv");
        let mut rss = ReadGroupStatsSet::new();
        rss.insert(
            dir.path().join("reads.tsv").to_string_lossy().to_string(),
            PairStats {
                median: 300.0,
                sd: 50.0,
                orientation: Orientation::Fr,
            },
        );
        rss.write(&stats_path).unwrap();

        let reads_path = dir.path().join("reads.tsv");
        std::fs::write(
            &reads_path,
            "1\t1000\t100M\tpaired,first\t1\t100000\t3000\t60\n\
             1\t1000\t100M\tpaired,first\t1\t100050\t3050\t60\n",
        )
        .unwrap();

        let out_path = dir.path().join("graph.txt");
        let cmd = BuildCommand::new();
        cmd.run(&stats_path, &[reads_path], &out_path).unwrap();

        let graph = SVLocusSet::read(&out_path).unwrap();
        assert!(graph.total_observation_count() >= 1);
    }
}

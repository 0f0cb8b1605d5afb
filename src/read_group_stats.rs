//! Keyed collection of [`PairStats`], serializable to a stable text format.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::GraphError;
use crate::pairstats::{Orientation, PairStats};

pub type Result<T> = std::result::Result<T, GraphError>;

/// An indexed collection of [`PairStats`] keyed by alignment-file or
/// read-group identifier.
///
/// Keys are assigned stable integer handles in insertion order so the
/// scanner's hot path can look up stats by index instead of hashing
/// strings per read.
#[derive(Debug, Clone, Default)]
pub struct ReadGroupStatsSet {
    keys: Vec<String>,
    stats: Vec<PairStats>,
}

impl ReadGroupStatsSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the stats for `key`, returning its stable index.
    pub fn insert(&mut self, key: impl Into<String>, stats: PairStats) -> u32 {
        let key = key.into();
        if let Some(idx) = self.keys.iter().position(|k| k == &key) {
            self.stats[idx] = stats;
            idx as u32
        } else {
            self.keys.push(key);
            self.stats.push(stats);
            (self.keys.len() - 1) as u32
        }
    }

    /// Stable integer handle for `key`, if present.
    pub fn group_index(&self, key: &str) -> Option<u32> {
        self.keys.iter().position(|k| k == key).map(|i| i as u32)
    }

    /// Stats for a given stable index.
    pub fn get(&self, index: u32) -> Option<PairStats> {
        self.stats.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|s| s.as_str())
    }

    /// Merge another set into this one. On key collision, `other`'s value
    /// wins (used to recombine independently-built per-shard stats, same
    /// "later writer wins" rule as the locus-set merge's target-locus
    /// consolidation).
    pub fn merge(&mut self, other: &ReadGroupStatsSet) {
        for (key, stats) in other.keys.iter().zip(other.stats.iter()) {
            self.insert(key.clone(), *stats);
        }
    }

    /// Read a stats set from a tab-delimited file:
    /// `# key  sd  median  orientation` header, one row per group.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut set = Self::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() != 4 {
                return Err(GraphError::Parse {
                    line: line_no + 1,
                    message: format!("expected 4 tab-delimited columns, got {}", fields.len()),
                });
            }
            let key = fields[0].to_string();
            let sd: f64 = fields[1].parse().map_err(|_| GraphError::Parse {
                line: line_no + 1,
                message: format!("invalid sd value: '{}'", fields[1]),
            })?;
            let median: f64 = fields[2].parse().map_err(|_| GraphError::Parse {
                line: line_no + 1,
                message: format!("invalid median value: '{}'", fields[2]),
            })?;
            let orientation = Orientation::from_tag(fields[3]);
            set.insert(
                key,
                PairStats {
                    median,
                    sd,
                    orientation,
                },
            );
        }
        Ok(set)
    }

    /// Write the set to a tab-delimited file, round-tripping the four
    /// value columns bytewise with [`ReadGroupStatsSet::read`].
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "# key\tsd\tmedian\torientation")?;
        for (key, stats) in self.keys.iter().zip(self.stats.iter()) {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                key,
                stats.sd,
                stats.median,
                stats.orientation.as_tag()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stats() -> PairStats {
        PairStats {
            median: 300.5,
            sd: 45.25,
            orientation: Orientation::Fr,
        }
    }

    #[test]
    fn test_insert_and_index() {
        let mut set = ReadGroupStatsSet::new();
        let idx = set.insert("sample1.bam", sample_stats());
        assert_eq!(idx, 0);
        assert_eq!(set.group_index("sample1.bam"), Some(0));
        assert_eq!(set.get(0), Some(sample_stats()));
    }

    #[test]
    fn test_insert_update_same_key() {
        let mut set = ReadGroupStatsSet::new();
        set.insert("a", sample_stats());
        let mut updated = sample_stats();
        updated.median = 999.0;
        let idx = set.insert("a", updated);
        assert_eq!(idx, 0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().median, 999.0);
    }

    #[test]
    fn test_roundtrip_write_read() {
        let mut set = ReadGroupStatsSet::new();
        set.insert("a.bam", sample_stats());
        set.insert("b.bam", PairStats { median: 150.0, sd: 10.0, orientation: Orientation::Rf });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.tsv");
        set.write(&path).unwrap();
        let read_back = ReadGroupStatsSet::read(&path).unwrap();

        assert_eq!(read_back.len(), set.len());
        for key in set.keys() {
            let a = set.get(set.group_index(key).unwrap()).unwrap();
            let b = read_back.get(read_back.group_index(key).unwrap()).unwrap();
            assert_eq!(a.sd, b.sd);
            assert_eq!(a.median, b.median);
            assert_eq!(a.orientation, b.orientation);
        }
    }

    #[test]
    fn test_merge_other_wins_on_collision() {
        let mut a = ReadGroupStatsSet::new();
        a.insert("x", sample_stats());
        let mut b = ReadGroupStatsSet::new();
        b.insert("x", PairStats { median: 1.0, sd: 1.0, orientation: Orientation::Rr });
        b.insert("y", sample_stats());

        a.merge(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(a.group_index("x").unwrap()).unwrap().median, 1.0);
    }

    #[test]
    fn test_read_rejects_malformed_row() {
        let content = "# key\tsd\tmedian\torientation\nonly\ttwo\n";
        let err = ReadGroupStatsSet::read_from(content.as_bytes()).unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }
}

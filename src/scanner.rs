//! Read-pair evidence scanning: the transformer between raw alignment
//! records and [`SingleObservationLocus`] graph fragments.

use crate::error::{GraphError, Result};
use crate::interval::{BreakendState, GenomeInterval};
use crate::locus::SVLocus;
use crate::read_group_stats::ReadGroupStatsSet;

/// Smallest breakend interval ever proposed, regardless of fragment-size
/// statistics.
const MIN_PAIR_BREAKEND_SIZE: i64 = 40;

/// Hard template-size cutoff above which a non-chimeric pair is still
/// treated as SV evidence.
const ANOMALOUS_TEMPLATE_SIZE: i32 = 2000;

/// A single CIGAR operation, already decoded by the [`AlignmentRecord`]
/// implementor. Only the operations relevant to breakend geometry are
/// distinguished; the scanner does not parse CIGAR strings itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub len: u32,
    pub kind: CigarOpKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpKind {
    Match,
    Insert,
    Delete,
    SoftClip,
    HardClip,
}

impl CigarOp {
    pub fn new(len: u32, kind: CigarOpKind) -> Self {
        Self { len, kind }
    }
}

/// Sum of the read-consuming length of a CIGAR (everything but deletions).
fn apath_read_length(ops: &[CigarOp]) -> u32 {
    ops.iter()
        .filter(|op| !matches!(op.kind, CigarOpKind::Delete))
        .map(|op| op.len)
        .sum()
}

/// Sum of the reference-consuming length of a CIGAR.
fn apath_ref_length(ops: &[CigarOp]) -> u32 {
    ops.iter()
        .filter(|op| matches!(op.kind, CigarOpKind::Match | CigarOpKind::Delete))
        .map(|op| op.len)
        .sum()
}

/// Soft-clip length at the start of the CIGAR.
fn apath_read_lead_size(ops: &[CigarOp]) -> u32 {
    ops.first()
        .filter(|op| matches!(op.kind, CigarOpKind::SoftClip))
        .map(|op| op.len)
        .unwrap_or(0)
}

/// Soft-clip length at the end of the CIGAR.
fn apath_read_trail_size(ops: &[CigarOp]) -> u32 {
    ops.last()
        .filter(|op| matches!(op.kind, CigarOpKind::SoftClip))
        .map(|op| op.len)
        .unwrap_or(0)
}

/// The alignment-record collaborator interface.
/// Alignment-file decoding itself is out of scope; implementors adapt
/// whatever record type their I/O layer reads into these accessors.
pub trait AlignmentRecord {
    fn chrom_id(&self) -> u32;
    /// 1-based leftmost mapped position.
    fn pos(&self) -> i64;
    fn cigar_ops(&self) -> &[CigarOp];

    fn is_paired(&self) -> bool;
    fn is_proper_pair_flag(&self) -> bool;
    fn is_unmapped(&self) -> bool;
    fn is_mate_unmapped(&self) -> bool;
    fn is_reverse_strand(&self) -> bool;
    fn is_mate_reverse_strand(&self) -> bool;
    fn is_first_in_pair(&self) -> bool;
    fn is_second_in_pair(&self) -> bool;
    fn is_secondary(&self) -> bool;
    fn is_duplicate(&self) -> bool;
    fn is_vendor_fail(&self) -> bool;
    fn is_chimeric(&self) -> bool;

    fn mate_chrom_id(&self) -> u32;
    /// 1-based leftmost mapped position of the mate.
    fn mate_pos(&self) -> i64;

    fn template_size(&self) -> i32;
    fn map_qual(&self) -> u8;

    #[inline]
    fn is_fwd_strand(&self) -> bool {
        !self.is_reverse_strand()
    }

    #[inline]
    fn is_mate_fwd_strand(&self) -> bool {
        !self.is_mate_reverse_strand()
    }
}

/// Admission thresholds controlling what the scanner treats as usable
/// evidence. Mirrors the original's command-line-derived option struct.
#[derive(Debug, Clone, Copy)]
pub struct ReadScannerOptions {
    pub min_mapq: u8,
    pub breakend_edge_trim_prob: f64,
    pub proper_pair_trim_prob: f64,
}

impl Default for ReadScannerOptions {
    fn default() -> Self {
        Self {
            min_mapq: 15,
            breakend_edge_trim_prob: 0.15,
            proper_pair_trim_prob: 0.01,
        }
    }
}

/// A cached `[min, max)`-style quantile range, computed once per read
/// group at scanner construction.
#[derive(Debug, Clone, Copy, Default)]
struct Range {
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CachedReadGroupStats {
    breakend_region: Range,
    proper_pair: Range,
}

/// The SV-evidence read-pair transformer: stateless aside from the
/// per-read-group stats it caches at construction.
pub struct SVLocusScanner {
    opt: ReadScannerOptions,
    stats: Vec<CachedReadGroupStats>,
}

impl SVLocusScanner {
    /// Build a scanner from already-loaded stats, one cache entry per
    /// group in `rss`'s insertion order.
    pub fn new(opt: ReadScannerOptions, rss: &ReadGroupStatsSet) -> Self {
        let stats = (0..rss.len() as u32)
            .map(|idx| {
                let pair_stats = rss.get(idx).expect("index within len() is always present");
                let breakend_region = Range {
                    min: pair_stats.quantile(opt.breakend_edge_trim_prob).max(0.0),
                    max: pair_stats.quantile(1.0 - opt.breakend_edge_trim_prob),
                };
                let proper_pair = Range {
                    min: pair_stats.quantile(opt.proper_pair_trim_prob).max(0.0),
                    max: pair_stats.quantile(1.0 - opt.proper_pair_trim_prob),
                };
                CachedReadGroupStats {
                    breakend_region,
                    proper_pair,
                }
            })
            .collect();
        Self { opt, stats }
    }

    /// Fast admission test: vendor-failed, duplicate, secondary, or
    /// below minimum mapping quality.
    pub fn is_read_filtered<R: AlignmentRecord>(&self, read: &R) -> bool {
        if read.is_vendor_fail() {
            return true;
        }
        if read.is_duplicate() {
            return true;
        }
        if read.is_secondary() {
            return true;
        }
        if read.map_qual() < self.opt.min_mapq {
            return true;
        }
        false
    }

    /// Custom proper-pair test driven by the cached fragment-size range
    /// rather than the aligner's own proper-pair flag.
    pub fn is_proper_pair<R: AlignmentRecord>(&self, read: &R, rg_index: u32) -> bool {
        if read.is_unmapped() || read.is_mate_unmapped() {
            return false;
        }
        if read.chrom_id() != read.mate_chrom_id() {
            return false;
        }

        let ppr = &self.stats[rg_index as usize].proper_pair;
        let fragment_size = read.template_size().unsigned_abs() as f64;
        if fragment_size > ppr.max || fragment_size < ppr.min {
            return false;
        }

        match read.pos().cmp(&read.mate_pos()) {
            std::cmp::Ordering::Less => read.is_fwd_strand() && !read.is_mate_fwd_strand(),
            std::cmp::Ordering::Greater => !read.is_fwd_strand() && read.is_mate_fwd_strand(),
            std::cmp::Ordering::Equal => read.is_fwd_strand() != read.is_mate_fwd_strand(),
        }
    }

    /// Produces a locus only when the read is chimeric.
    ///
    /// Reads failing [`SVLocusScanner::is_read_filtered`] never produce an
    /// observation, regardless of their chimeric status.
    pub fn chimeric_locus<R: AlignmentRecord>(
        &self,
        read: &R,
        rg_index: u32,
    ) -> Result<Option<SVLocus>> {
        if self.is_read_filtered(read) {
            return Ok(None);
        }
        if !read.is_chimeric() {
            return Ok(None);
        }
        self.build_locus(read, rg_index).map(Some)
    }

    /// Produces a locus when the read is chimeric, or its fragment is
    /// anomalously large.
    ///
    /// Reads failing [`SVLocusScanner::is_read_filtered`] never produce an
    /// observation.
    pub fn sv_locus<R: AlignmentRecord>(&self, read: &R, rg_index: u32) -> Result<Option<SVLocus>> {
        if self.is_read_filtered(read) {
            return Ok(None);
        }
        if !read.is_chimeric() && (read.template_size().abs() < ANOMALOUS_TEMPLATE_SIZE) {
            return Ok(None);
        }
        self.build_locus(read, rg_index).map(Some)
    }

    fn build_locus<R: AlignmentRecord>(&self, read: &R, rg_index: u32) -> Result<SVLocus> {
        let rstats = &self.stats[rg_index as usize];
        let (local_be, remote_be, evidence_range) = Self::read_breakends_impl(rstats, read, None);

        if local_be.interval.is_empty() || remote_be.interval.is_empty() {
            return Err(GraphError::InputCorruption(format!(
                "empty breakend interval proposed from read at {}:{}",
                read.chrom_id(),
                read.pos()
            )));
        }

        let mut locus = SVLocus::new();
        let local_node = locus.add_node(local_be.interval, 1);
        locus.set_node_evidence(local_node, evidence_range);
        let remote_node = locus.add_remote_node(remote_be.interval);
        locus.link_nodes(local_node, remote_node, 1, 0);
        locus.merge_self_overlap();
        Ok(locus)
    }

    /// Compute local and remote breakend intervals for a read pair.
    /// If `remote` is absent, the remote read's size is estimated to
    /// equal the local read's, with no clipping assumed.
    pub fn breakend_pair<R: AlignmentRecord>(
        &self,
        local: &R,
        remote: Option<&R>,
        rg_index: u32,
    ) -> (Breakend, Breakend) {
        let rstats = &self.stats[rg_index as usize];
        let (local_be, remote_be, _evidence_range) = Self::read_breakends_impl(rstats, local, remote);
        (local_be, remote_be)
    }

    fn read_breakends_impl<R: AlignmentRecord>(
        rstats: &CachedReadGroupStats,
        local: &R,
        remote: Option<&R>,
    ) -> (Breakend, Breakend, GenomeInterval) {
        let local_ops = local.cigar_ops();
        let read_size = apath_read_length(local_ops) as i64;
        let local_ref_length = apath_ref_length(local_ops) as i64;

        let local_non_insert = if local.is_fwd_strand() {
            read_size - apath_read_trail_size(local_ops) as i64
        } else {
            read_size - apath_read_lead_size(local_ops) as i64
        };

        let (remote_non_insert, remote_ref_length) = match remote {
            Some(remote_read) => {
                let remote_ops = remote_read.cigar_ops();
                let remote_read_size = apath_read_length(remote_ops) as i64;
                let remote_ref_length = apath_ref_length(remote_ops) as i64;
                let non_insert = if remote_read.is_fwd_strand() {
                    remote_read_size - apath_read_trail_size(remote_ops) as i64
                } else {
                    remote_read_size - apath_read_lead_size(remote_ops) as i64
                };
                (non_insert, remote_ref_length)
            }
            None => (local_non_insert, local_ref_length),
        };

        let total_non_insert = local_non_insert + remote_non_insert;
        let breakend_size = MIN_PAIR_BREAKEND_SIZE
            .max((rstats.breakend_region.max - total_non_insert as f64) as i64);

        let start_ref = local.pos() - 1;
        let end_ref = start_ref + local_ref_length;

        let local_breakend = if local.is_fwd_strand() {
            Breakend {
                interval: GenomeInterval::new(local.chrom_id(), end_ref, end_ref + breakend_size),
                state: BreakendState::RightOpen,
            }
        } else {
            Breakend {
                interval: GenomeInterval::new(local.chrom_id(), start_ref - breakend_size, start_ref),
                state: BreakendState::LeftOpen,
            }
        };

        let remote_start_ref = local.mate_pos() - 1;
        let remote_end_ref = remote_start_ref + remote_ref_length;
        let remote_breakend = if local.is_mate_fwd_strand() {
            Breakend {
                interval: GenomeInterval::new(
                    local.mate_chrom_id(),
                    remote_end_ref,
                    remote_end_ref + breakend_size,
                ),
                state: BreakendState::RightOpen,
            }
        } else {
            Breakend {
                interval: GenomeInterval::new(
                    local.mate_chrom_id(),
                    remote_start_ref - breakend_size,
                    remote_start_ref,
                ),
                state: BreakendState::LeftOpen,
            }
        };

        let evidence_range = GenomeInterval::new(local.chrom_id(), start_ref, end_ref);
        (local_breakend, remote_breakend, evidence_range)
    }
}

/// A proposed breakend interval plus which side is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakend {
    pub interval: GenomeInterval,
    pub state: BreakendState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairstats::{Orientation, PairStats};

    #[derive(Debug, Clone)]
    struct FakeRead {
        chrom_id: u32,
        pos: i64,
        cigar: Vec<CigarOp>,
        reverse: bool,
        mate_reverse: bool,
        mate_chrom_id: u32,
        mate_pos: i64,
        template_size: i32,
        map_qual: u8,
        chimeric: bool,
        duplicate: bool,
        secondary: bool,
        vendor_fail: bool,
        unmapped: bool,
        mate_unmapped: bool,
    }

    impl FakeRead {
        fn simple(chrom_id: u32, pos: i64, mate_pos: i64, template_size: i32) -> Self {
            Self {
                chrom_id,
                pos,
                cigar: vec![CigarOp::new(100, CigarOpKind::Match)],
                reverse: false,
                mate_reverse: true,
                mate_chrom_id: chrom_id,
                mate_pos,
                template_size,
                map_qual: 60,
                chimeric: false,
                duplicate: false,
                secondary: false,
                vendor_fail: false,
                unmapped: false,
                mate_unmapped: false,
            }
        }
    }

    impl AlignmentRecord for FakeRead {
        fn chrom_id(&self) -> u32 {
            self.chrom_id
        }
        fn pos(&self) -> i64 {
            self.pos
        }
        fn cigar_ops(&self) -> &[CigarOp] {
            &self.cigar
        }
        fn is_paired(&self) -> bool {
            true
        }
        fn is_proper_pair_flag(&self) -> bool {
            true
        }
        fn is_unmapped(&self) -> bool {
            self.unmapped
        }
        fn is_mate_unmapped(&self) -> bool {
            self.mate_unmapped
        }
        fn is_reverse_strand(&self) -> bool {
            self.reverse
        }
        fn is_mate_reverse_strand(&self) -> bool {
            self.mate_reverse
        }
        fn is_first_in_pair(&self) -> bool {
            true
        }
        fn is_second_in_pair(&self) -> bool {
            false
        }
        fn is_secondary(&self) -> bool {
            self.secondary
        }
        fn is_duplicate(&self) -> bool {
            self.duplicate
        }
        fn is_vendor_fail(&self) -> bool {
            self.vendor_fail
        }
        fn is_chimeric(&self) -> bool {
            self.chimeric
        }
        fn mate_chrom_id(&self) -> u32 {
            self.mate_chrom_id
        }
        fn mate_pos(&self) -> i64 {
            self.mate_pos
        }
        fn template_size(&self) -> i32 {
            self.template_size
        }
        fn map_qual(&self) -> u8 {
            self.map_qual
        }
    }

    fn scanner_with_stats() -> SVLocusScanner {
        let mut rss = ReadGroupStatsSet::new();
        rss.insert(
            "sample",
            PairStats {
                median: 300.0,
                sd: 50.0,
                orientation: Orientation::Fr,
            },
        );
        SVLocusScanner::new(ReadScannerOptions::default(), &rss)
    }

    #[test]
    fn test_is_read_filtered_on_mapq() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 100, 500, 400);
        read.map_qual = 5;
        assert!(scanner.is_read_filtered(&read));
        read.map_qual = 60;
        assert!(!scanner.is_read_filtered(&read));
    }

    #[test]
    fn test_is_read_filtered_flags() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 100, 500, 400);
        read.duplicate = true;
        assert!(scanner.is_read_filtered(&read));
    }

    #[test]
    fn test_is_proper_pair_orientation() {
        let scanner = scanner_with_stats();
        let read = FakeRead::simple(1, 100, 400, 300);
        assert!(scanner.is_proper_pair(&read, 0));

        let mut bad = read.clone();
        bad.reverse = true;
        bad.mate_reverse = true;
        assert!(!scanner.is_proper_pair(&bad, 0));
    }

    #[test]
    fn test_is_proper_pair_rejects_cross_chromosome() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 100, 400, 300);
        read.mate_chrom_id = 2;
        assert!(!scanner.is_proper_pair(&read, 0));
    }

    #[test]
    fn test_sv_locus_none_for_normal_fragment() {
        let scanner = scanner_with_stats();
        let read = FakeRead::simple(1, 100, 400, 300);
        assert!(scanner.sv_locus(&read, 0).unwrap().is_none());
    }

    #[test]
    fn test_sv_locus_fires_on_anomalous_template_size() {
        let scanner = scanner_with_stats();
        let read = FakeRead::simple(1, 100, 100_000, 3000);
        let locus = scanner.sv_locus(&read, 0).unwrap().unwrap();
        assert_eq!(locus.len(), 2);
        assert_eq!(locus.total_observation_count(), 1);
    }

    #[test]
    fn test_chimeric_locus_requires_chimeric_flag() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 100, 5_000_000, 300);
        assert!(scanner.chimeric_locus(&read, 0).unwrap().is_none());
        read.chimeric = true;
        assert!(scanner.chimeric_locus(&read, 0).unwrap().is_some());
    }

    #[test]
    fn test_filtered_reads_never_produce_an_observation() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 100, 100_000, 3000);
        read.chimeric = true;
        read.map_qual = 5;
        assert!(scanner.is_read_filtered(&read));
        assert!(scanner.sv_locus(&read, 0).unwrap().is_none());
        assert!(scanner.chimeric_locus(&read, 0).unwrap().is_none());
    }

    #[test]
    fn test_breakend_geometry_forward_strand_right_open() {
        let scanner = scanner_with_stats();
        let read = FakeRead::simple(1, 1000, 100_000, 3000);
        let (local_be, _remote_be) = scanner.breakend_pair(&read, None, 0);
        assert_eq!(local_be.state, BreakendState::RightOpen);
        assert_eq!(local_be.interval.begin, 1000 - 1 + 100);
        assert!(local_be.interval.len() >= MIN_PAIR_BREAKEND_SIZE);
    }

    #[test]
    fn test_breakend_geometry_reverse_strand_left_open() {
        let scanner = scanner_with_stats();
        let mut read = FakeRead::simple(1, 1000, 100_000, 3000);
        read.reverse = true;
        let (local_be, _remote_be) = scanner.breakend_pair(&read, None, 0);
        assert_eq!(local_be.state, BreakendState::LeftOpen);
        assert_eq!(local_be.interval.end, 1000 - 1);
    }

    #[test]
    fn test_cigar_helpers() {
        let ops = vec![
            CigarOp::new(5, CigarOpKind::SoftClip),
            CigarOp::new(90, CigarOpKind::Match),
            CigarOp::new(3, CigarOpKind::Delete),
            CigarOp::new(5, CigarOpKind::SoftClip),
        ];
        assert_eq!(apath_read_length(&ops), 5 + 90 + 5);
        assert_eq!(apath_ref_length(&ops), 90 + 3);
        assert_eq!(apath_read_lead_size(&ops), 5);
        assert_eq!(apath_read_trail_size(&ops), 5);
    }
}

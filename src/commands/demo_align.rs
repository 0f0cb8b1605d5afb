//! A minimal tab-delimited alignment record source used by `build` and by
//! tests. Real alignment-file decoding is out of scope for this crate; this
//! format exists only to exercise [`crate::scanner::SVLocusScanner`] without
//! an external BAM/CRAM dependency.
//!
//! Columns: `chrom_id  pos  cigar  flags  mate_chrom_id  mate_pos
//! template_size  map_qual`. `cigar` is a comma-separated list of
//! `<len><op>` tokens (`M`, `I`, `D`, `S`, `H`); `flags` is a comma-separated
//! list of flag names (or `-` for none) drawn from `paired`, `proper_pair`,
//! `unmapped`, `mate_unmapped`, `reverse`, `mate_reverse`, `first`,
//! `second`, `secondary`, `duplicate`, `vendor_fail`, `chimeric`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{GraphError, Result};
use crate::scanner::{AlignmentRecord, CigarOp, CigarOpKind};

#[derive(Debug, Clone, Default)]
pub struct DemoAlignmentRecord {
    chrom_id: u32,
    pos: i64,
    cigar: Vec<CigarOp>,
    paired: bool,
    proper_pair: bool,
    unmapped: bool,
    mate_unmapped: bool,
    reverse: bool,
    mate_reverse: bool,
    first: bool,
    second: bool,
    secondary: bool,
    duplicate: bool,
    vendor_fail: bool,
    chimeric: bool,
    mate_chrom_id: u32,
    mate_pos: i64,
    template_size: i32,
    map_qual: u8,
}

impl AlignmentRecord for DemoAlignmentRecord {
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
        self.paired
    }
    fn is_proper_pair_flag(&self) -> bool {
        self.proper_pair
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
        self.first
    }
    fn is_second_in_pair(&self) -> bool {
        self.second
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

fn parse_cigar(field: &str, line_no: usize) -> Result<Vec<CigarOp>> {
    if field == "-" {
        return Ok(Vec::new());
    }
    field
        .split(',')
        .map(|token| {
            let split_at = token
                .find(|c: char| !c.is_ascii_digit())
                .ok_or_else(|| GraphError::Parse {
                    line: line_no,
                    message: format!("invalid cigar token '{token}'"),
                })?;
            let len: u32 = token[..split_at].parse().map_err(|_| GraphError::Parse {
                line: line_no,
                message: format!("invalid cigar length in '{token}'"),
            })?;
            let kind = match &token[split_at..] {
                "M" => CigarOpKind::Match,
                "I" => CigarOpKind::Insert,
                "D" => CigarOpKind::Delete,
                "S" => CigarOpKind::SoftClip,
                "H" => CigarOpKind::HardClip,
                other => {
                    return Err(GraphError::Parse {
                        line: line_no,
                        message: format!("unknown cigar op '{other}'"),
                    })
                }
            };
            Ok(CigarOp::new(len, kind))
        })
        .collect()
}

fn apply_flag(record: &mut DemoAlignmentRecord, flag: &str, line_no: usize) -> Result<()> {
    match flag {
        "paired" => record.paired = true,
        "proper_pair" => record.proper_pair = true,
        "unmapped" => record.unmapped = true,
        "mate_unmapped" => record.mate_unmapped = true,
        "reverse" => record.reverse = true,
        "mate_reverse" => record.mate_reverse = true,
        "first" => record.first = true,
        "second" => record.second = true,
        "secondary" => record.secondary = true,
        "duplicate" => record.duplicate = true,
        "vendor_fail" => record.vendor_fail = true,
        "chimeric" => record.chimeric = true,
        other => {
            return Err(GraphError::Parse {
                line: line_no,
                message: format!("unknown flag '{other}'"),
            })
        }
    }
    Ok(())
}

/// Read demo alignment records from a tab-delimited file.
pub fn read_demo_alignments<P: AsRef<Path>>(path: P) -> Result<Vec<DemoAlignmentRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() != 8 {
            return Err(GraphError::Parse {
                line: line_no + 1,
                message: format!("expected 8 tab-delimited columns, got {}", fields.len()),
            });
        }

        let mut record = DemoAlignmentRecord {
            chrom_id: fields[0].parse().map_err(|_| GraphError::Parse {
                line: line_no + 1,
                message: "invalid chrom_id".to_string(),
            })?,
            pos: fields[1].parse().map_err(|_| GraphError::Parse {
                line: line_no + 1,
                message: "invalid pos".to_string(),
            })?,
            cigar: parse_cigar(fields[2], line_no + 1)?,
            ..Default::default()
        };

        if fields[3] != "-" {
            for flag in fields[3].split(',') {
                apply_flag(&mut record, flag, line_no + 1)?;
            }
        }

        record.mate_chrom_id = fields[4].parse().map_err(|_| GraphError::Parse {
            line: line_no + 1,
            message: "invalid mate_chrom_id".to_string(),
        })?;
        record.mate_pos = fields[5].parse().map_err(|_| GraphError::Parse {
            line: line_no + 1,
            message: "invalid mate_pos".to_string(),
        })?;
        record.template_size = fields[6].parse().map_err(|_| GraphError::Parse {
            line: line_no + 1,
            message: "invalid template_size".to_string(),
        })?;
        record.map_qual = fields[7].parse().map_err(|_| GraphError::Parse {
            line: line_no + 1,
            message: "invalid map_qual".to_string(),
        })?;

        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cigar_basic() {
        let ops = parse_cigar("5S,90M,5S", 1).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].kind, CigarOpKind::SoftClip);
        assert_eq!(ops[1].len, 90);
    }

    #[test]
    fn test_parse_cigar_rejects_unknown_op() {
        assert!(parse_cigar("10Z", 1).is_err());
    }

    #[test]
    fn test_read_demo_alignments_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.tsv");
        std::fs::write(
            &path,
            "1\t1000\t100M\tpaired,first\t1\t100000\t3000\t60\n",
        )
        .unwrap();

        let records = read_demo_alignments(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chrom_id(), 1);
        assert_eq!(records[0].template_size(), 3000);
        assert!(records[0].is_paired());
        assert!(records[0].is_first_in_pair());
    }
}

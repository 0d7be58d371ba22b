use crate::cigar;
use crate::types::RefPos;
use anyhow::{Context, Result};
use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

/// Orientation of an alignment; also the mate slot it occupies in a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn slot(self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }
}

/// One mapped alignment, decoupled from the container it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub name: String,
    /// Reference sequence name.
    pub chrom: String,
    /// 0-based alignment start.
    pub pos: RefPos,
    /// CIGAR as `(length, kind)` pairs.
    pub cigar: Vec<(u32, CigarKind)>,
    /// Stored read bases; empty when the record has none (`*`).
    pub sequence: Vec<u8>,
    pub strand: Strand,
    pub is_proper_pair: bool,
    /// Mate reference name; `None` when unknown.
    pub mate_chrom: Option<String>,
    /// 0-based mate alignment start, `-1` when unknown.
    pub mate_pos: RefPos,
}

impl AlignmentRecord {
    pub fn projected_length(&self) -> usize {
        cigar::projected_length(self.sequence.len(), &self.cigar)
    }

    /// Decode a BAM record. Returns `None` for records with no placement on
    /// a reference.
    pub fn from_bam(record: &bam::Record, ref_names: &[String]) -> Result<Option<Self>> {
        let flags = record.flags();
        if flags.is_unmapped() {
            return Ok(None);
        }
        let (Some(ref_id), Some(start)) = (record.reference_sequence_id(), record.alignment_start())
        else {
            return Ok(None);
        };
        let ref_id = ref_id.context("invalid reference sequence id")?;
        let chrom = ref_names
            .get(ref_id)
            .with_context(|| format!("reference sequence id {ref_id} not in header"))?
            .clone();
        let pos = start.context("invalid alignment start")?.get() as RefPos - 1;

        let mate_chrom = match record.mate_reference_sequence_id() {
            Some(id) => {
                let id = id.context("invalid mate reference sequence id")?;
                ref_names.get(id).cloned()
            }
            None => None,
        };
        let mate_pos = match record.mate_alignment_start() {
            Some(p) => p.context("invalid mate alignment start")?.get() as RefPos - 1,
            None => -1,
        };

        let cigar = record
            .cigar()
            .iter()
            .map(|op| op.map(|op| (op.len() as u32, op.kind())))
            .collect::<std::io::Result<Vec<_>>>()
            .context("invalid CIGAR")?;

        let name = record
            .name()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();

        Ok(Some(Self {
            name,
            chrom,
            pos,
            cigar,
            sequence: record.sequence().iter().collect(),
            strand: if flags.is_reverse_complemented() {
                Strand::Reverse
            } else {
                Strand::Forward
            },
            is_proper_pair: flags.is_properly_segmented(),
            mate_chrom,
            mate_pos,
        }))
    }
}

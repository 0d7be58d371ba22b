use crate::record::AlignmentRecord;
use anyhow::{Context, Result};
use noodles::bam;
use noodles::bgzf;
use noodles::sam;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use std::fs::File;
use std::io;
use std::path::Path;

pub struct BamInput {
    pub header: sam::Header,
    /// Reference names indexed by reference sequence id.
    pub ref_names: Vec<String>,
    pub reader: bam::io::Reader<bgzf::io::Reader<File>>,
}

pub fn open_bam(path: &Path) -> Result<BamInput> {
    let mut reader = bam::io::reader::Builder::default()
        .build_from_path(path)
        .with_context(|| format!("failed to open BAM {}", path.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("failed to read BAM header of {}", path.display()))?;
    let ref_names = header
        .reference_sequences()
        .keys()
        .map(|n| n.to_string())
        .collect();
    Ok(BamInput { header, ref_names, reader })
}

/// True when the header promises that records of one read are contiguous
/// (`SO:queryname` or `GO:query`).
pub fn declares_name_grouping(header: &sam::Header) -> bool {
    header.header().is_some_and(|hd| {
        let fields = hd.other_fields();
        fields
            .get(&header_tag::SORT_ORDER)
            .is_some_and(|v| v == "queryname")
            || fields
                .get(&header_tag::GROUP_ORDER)
                .is_some_and(|v| v == "query")
    })
}

impl BamInput {
    /// Mapped alignments in file order; unmapped records are counted and
    /// skipped.
    pub fn alignments(&mut self) -> Alignments<'_> {
        Alignments {
            records: Box::new(self.reader.records()),
            ref_names: &self.ref_names,
            unmapped: 0,
        }
    }
}

pub struct Alignments<'a> {
    records: Box<dyn Iterator<Item = io::Result<bam::Record>> + 'a>,
    ref_names: &'a [String],
    unmapped: u64,
}

impl Alignments<'_> {
    pub fn unmapped(&self) -> u64 {
        self.unmapped
    }
}

impl Iterator for Alignments<'_> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e).context("failed to read BAM record")),
            };
            match AlignmentRecord::from_bam(&record, self.ref_names) {
                Ok(Some(aln)) => return Some(Ok(aln)),
                Ok(None) => self.unmapped += 1,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

//! Name sort of a BAM, run ahead of the main pass when the input is not
//! already grouped by read.
//!
//! Records are held in memory, so this is meant for inputs that fit in RAM;
//! larger files should be sorted externally (`samtools sort -n`).

use crate::read_name;
use anyhow::{Context, Result};
use bstr::BString;
use noodles::bam;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use std::fs::File;
use std::path::Path;

/// Copy of `header` declaring `SO:queryname`.
fn queryname_header(header: &sam::Header) -> sam::Header {
    let mut out = header.clone();
    let hd = out.header_mut().get_or_insert_with(Map::default);
    hd.other_fields_mut()
        .insert(header_tag::SORT_ORDER, BString::from("queryname"));
    hd.other_fields_mut().shift_remove(&header_tag::GROUP_ORDER);
    out
}

/// Stable sort by mate group, then full read name; records without a name
/// sort first.
///
/// Sorting on the raw name alone can split a group: `a/1`, `a/10`, `a/2`
/// reduce to `a`, `a0`, `a`.
pub fn sort_records(records: &mut [RecordBuf]) {
    records.sort_by_cached_key(|record| {
        let name = record.name().map(|n| n.to_string()).unwrap_or_default();
        (read_name::group_key(&name).into_owned(), name)
    });
}

/// Sort `input` by read name into a new BAM at `output`.
pub fn sort_by_name(input: &Path, output: &Path) -> Result<u64> {
    let mut reader = bam::io::reader::Builder::default()
        .build_from_path(input)
        .with_context(|| format!("failed to open BAM {}", input.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("failed to read BAM header of {}", input.display()))?;

    let mut records = reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<RecordBuf>>>()
        .context("failed to read BAM record")?;
    tracing::info!(records = records.len(), "read records for sorting");
    sort_records(&mut records);

    let out_header = queryname_header(&header);
    let file = File::create(output)
        .with_context(|| format!("failed to create sorted BAM {}", output.display()))?;
    let mut writer = bam::io::Writer::new(file);
    writer.write_header(&out_header)?;
    for record in &records {
        writer.write_alignment_record(&out_header, record)?;
    }
    writer.get_mut().try_finish()?;

    tracing::info!(output = %output.display(), "sort complete");
    Ok(records.len() as u64)
}

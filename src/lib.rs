//! fraglen-rs: fragment lengths from name-grouped alignments.
//!
//! Records are read in one forward pass. Each run of records sharing a read
//! group (the read name with its `/1`, `/2` or ` 1`, ` 2` suffix removed) is
//! collected in a [`PairWindow`]; at the end of the run every single read and
//! every completed proper pair becomes one [`Fragment`] row.
//!
//! # Library usage
//!
//! ```no_run
//! use fraglen_rs::{FragmentWriter, GroupingConfig, resolve_stream};
//! use fraglen_rs::bam_input::open_bam;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut bam = open_bam(Path::new("sample.namesorted.bam"))?;
//! let mut writer = FragmentWriter::create(Path::new("sample.fraglen.csv"))?;
//! let stats = resolve_stream(bam.alignments(), &mut writer, &GroupingConfig::default())?;
//! writer.finish()?;
//! println!("{} pairs", stats.pairs);
//! # Ok(())
//! # }
//! ```

pub mod bam_input;
pub mod cigar;
pub mod cli;
pub mod fragment;
pub mod pipeline;
pub mod plot;
pub mod read_name;
pub mod record;
pub mod sort;
pub mod window;

pub(crate) mod types;

// Flat re-exports for the most commonly used public types.
pub use fragment::{Fragment, FragmentKind, FragmentWriter};
pub use pipeline::{GroupingConfig, GroupingError, Stats, resolve_stream};
pub use read_name::{MateNumber, group_key, mate_number};
pub use record::{AlignmentRecord, Strand};
pub use types::RefPos;
pub use window::{Admission, FlushOutcome, PairWindow};

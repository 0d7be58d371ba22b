//! Fragment rows and the tab-separated writer for them.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::types::RefPos;

pub const HEADER: &str = "type\tchr\tpos\tlen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Measured from one read.
    Single,
    /// Spanned by two properly paired mates.
    Paired,
}

impl FragmentKind {
    pub fn tag(self) -> char {
        match self {
            FragmentKind::Single => 'S',
            FragmentKind::Paired => 'P',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub chrom: String,
    /// 0-based start on `chrom`.
    pub pos: RefPos,
    /// Span along the reference.
    pub len: i64,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{:>15}\t{:>6}",
            self.kind.tag(),
            self.chrom,
            self.pos,
            self.len
        )
    }
}

/// Append-only writer of fragment rows.
pub struct FragmentWriter<W: Write> {
    inner: W,
    written: u64,
}

impl FragmentWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output file {}", path.display()))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> FragmentWriter<W> {
    /// Wrap `inner` and write the column header.
    pub fn new(mut inner: W) -> Result<Self> {
        writeln!(inner, "{HEADER}").context("failed to write output header")?;
        Ok(Self { inner, written: 0 })
    }

    pub fn write(&mut self, fragment: &Fragment) -> Result<()> {
        writeln!(self.inner, "{fragment}").context("failed to write fragment")?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'a>(&mut self, fragments: impl IntoIterator<Item = &'a Fragment>) -> Result<()> {
        for fragment in fragments {
            self.write(fragment)?;
        }
        Ok(())
    }

    /// Rows written so far, header excluded.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush().context("failed to flush output")?;
        Ok(self.inner)
    }
}

use crate::bam_input;
use crate::cli::Args;
use crate::fragment::{Fragment, FragmentWriter};
use crate::plot;
use crate::read_name;
use crate::record::AlignmentRecord;
use crate::sort;
use crate::types::HashSet;
use crate::window::{Admission, FlushOutcome, PairWindow};
use anyhow::{Context, Result, anyhow};
use crossfire::mpmc;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

const PROGRESS_INTERVAL: u64 = 1_000_000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_reads: u64,
    pub unmapped_reads: u64,
    pub read_groups: u64,
    pub singles: u64,
    pub pairs: u64,
    pub dropped_pairs: u64,
    pub slot_overwrites: u64,
    pub single_overwrites: u64,
}

impl Stats {
    fn record_admission(&mut self, admission: Admission) {
        match admission {
            Admission::SlotOverwritten(_) => self.slot_overwrites += 1,
            Admission::SingleOverwritten => self.single_overwrites += 1,
            Admission::NewPair | Admission::PairCompleted | Admission::Single => {}
        }
    }

    fn record_flush(&mut self, outcome: &FlushOutcome) {
        self.singles += outcome.singles() as u64;
        self.pairs += outcome.pairs() as u64;
        self.dropped_pairs += outcome.dropped_pairs.len() as u64;
    }

    fn merge(&mut self, other: &Stats) {
        self.total_reads += other.total_reads;
        self.unmapped_reads += other.unmapped_reads;
        self.read_groups += other.read_groups;
        self.singles += other.singles;
        self.pairs += other.pairs;
        self.dropped_pairs += other.dropped_pairs;
        self.slot_overwrites += other.slot_overwrites;
        self.single_overwrites += other.single_overwrites;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    #[error(
        "read group `{key}` reappears at record {record} after it was closed; \
         input must be grouped by read name (rerun with --sort)"
    )]
    UnsortedInput { key: String, record: u64 },
}

#[derive(Debug, Clone)]
pub struct GroupingConfig {
    /// Fail when a read group reappears after its boundary.
    pub check_order: bool,
    /// Worker threads resolving groups; `1` resolves inline.
    pub threads: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self { check_order: true, threads: 1 }
    }
}

/// Tracks the current group key and, optionally, every key already closed.
///
/// The closed set holds one entry per finished group, so checked runs use
/// memory proportional to the number of reads.
struct GroupTracker {
    current: Option<String>,
    closed: Option<HashSet<String>>,
}

enum Boundary {
    Same,
    /// A new group starts; the previous one (if any) is complete.
    Changed,
}

impl GroupTracker {
    fn new(check_order: bool) -> Self {
        Self {
            current: None,
            closed: check_order.then(HashSet::default),
        }
    }

    fn observe(&mut self, key: &str, record: u64) -> Result<Boundary, GroupingError> {
        if self.current.as_deref() == Some(key) {
            return Ok(Boundary::Same);
        }
        if let Some(closed) = &mut self.closed {
            if closed.contains(key) {
                return Err(GroupingError::UnsortedInput { key: key.to_string(), record });
            }
            if let Some(prev) = self.current.take() {
                closed.insert(prev);
            }
        }
        self.current = Some(key.to_string());
        Ok(Boundary::Changed)
    }
}

fn log_flush(group: &str, outcome: &FlushOutcome) {
    for key in &outcome.dropped_pairs {
        tracing::debug!(group, pair_key = %key, "dropping pair with a missing mate");
    }
}

fn log_admission(group: &str, admission: Admission) {
    match admission {
        Admission::SlotOverwritten(strand) => {
            tracing::debug!(group, ?strand, "mate slot overwritten");
        }
        Admission::SingleOverwritten => {
            tracing::debug!(group, "single read overwritten");
        }
        Admission::NewPair | Admission::PairCompleted | Admission::Single => {}
    }
}

fn log_progress(total_reads: u64) {
    if total_reads % PROGRESS_INTERVAL == 0 {
        tracing::info!(reads = total_reads, "processing");
    }
}

/// Resolve every group of `records` and write its fragments to `writer`.
///
/// Records must arrive grouped by [`read_name::group_key`]; with
/// `config.check_order` a violation is reported as
/// [`GroupingError::UnsortedInput`].
pub fn resolve_stream<I, W>(
    records: I,
    writer: &mut FragmentWriter<W>,
    config: &GroupingConfig,
) -> Result<Stats>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
    W: Write + Send,
{
    if config.threads > 1 {
        return resolve_parallel(records, writer, config);
    }

    let mut stats = Stats::default();
    let mut tracker = GroupTracker::new(config.check_order);
    let mut window = PairWindow::new();
    let mut group = String::new();

    for result in records {
        let record = result?;
        stats.total_reads += 1;
        log_progress(stats.total_reads);

        let key = read_name::group_key(&record.name);
        if let Boundary::Changed = tracker.observe(&key, stats.total_reads)? {
            if stats.read_groups > 0 {
                flush_window(&mut window, &group, writer, &mut stats)?;
            }
            stats.read_groups += 1;
            group.clear();
            group.push_str(&key);
        }
        drop(key);

        let admission = window.admit(&group, record);
        log_admission(&group, admission);
        stats.record_admission(admission);
    }

    if stats.read_groups > 0 {
        flush_window(&mut window, &group, writer, &mut stats)?;
    }

    Ok(stats)
}

fn flush_window<W: Write>(
    window: &mut PairWindow,
    group: &str,
    writer: &mut FragmentWriter<W>,
    stats: &mut Stats,
) -> Result<()> {
    let outcome = window.flush();
    log_flush(group, &outcome);
    stats.record_flush(&outcome);
    writer.write_all(&outcome.fragments)
}

/// Admit one complete group into a fresh window and flush it.
fn resolve_group(group: &str, records: Vec<AlignmentRecord>) -> (Vec<Fragment>, Stats) {
    let mut stats = Stats::default();
    let mut window = PairWindow::new();
    for record in records {
        let admission = window.admit(group, record);
        log_admission(group, admission);
        stats.record_admission(admission);
    }
    let outcome = window.flush();
    log_flush(group, &outcome);
    stats.record_flush(&outcome);
    (outcome.fragments, stats)
}

struct WorkItem {
    idx: usize,
    key: String,
    group: Vec<AlignmentRecord>,
}

struct ResultItem {
    idx: usize,
    fragments: Vec<Fragment>,
    stats: Stats,
}

/// Groups are cut on the calling thread, resolved by a worker pool and
/// written back in input order, so output matches [`resolve_stream`] with a
/// single thread.
fn resolve_parallel<I, W>(
    records: I,
    writer: &mut FragmentWriter<W>,
    config: &GroupingConfig,
) -> Result<Stats>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
    W: Write + Send,
{
    crossfire::detect_backoff_cfg();
    let worker_count = config.threads;
    let cap = worker_count.saturating_mul(4).max(8);
    let (tx_work, rx_work) = mpmc::bounded_blocking::<WorkItem>(cap);
    let (tx_res, rx_res) = mpmc::unbounded_blocking::<ResultItem>();

    let mut stats = Stats::default();
    let mut tracker = GroupTracker::new(config.check_order);

    thread::scope(|scope| -> Result<()> {
        for _ in 0..worker_count {
            let rx_work = rx_work.clone();
            let tx_res = tx_res.clone();
            scope.spawn(move || {
                while let Ok(item) = rx_work.recv() {
                    let (fragments, stats) = resolve_group(&item.key, item.group);
                    let _ = tx_res.send(ResultItem { idx: item.idx, fragments, stats });
                }
            });
        }
        drop(tx_res);
        drop(rx_work);

        let output = scope.spawn(move || -> Result<Stats> {
            let mut resolved = Stats::default();
            let mut pending: BTreeMap<usize, ResultItem> = BTreeMap::new();
            let mut next_idx = 0usize;
            while let Ok(item) = rx_res.recv() {
                pending.insert(item.idx, item);
                while let Some(item) = pending.remove(&next_idx) {
                    writer.write_all(&item.fragments)?;
                    resolved.merge(&item.stats);
                    next_idx += 1;
                }
            }
            if !pending.is_empty() {
                return Err(anyhow!("worker pool stopped before group {next_idx} was resolved"));
            }
            Ok(resolved)
        });

        let mut group_idx = 0usize;
        let mut key = String::new();
        let mut group: Vec<AlignmentRecord> = Vec::new();

        let read_result = (|| -> Result<()> {
            for result in records {
                let record = result?;
                stats.total_reads += 1;
                log_progress(stats.total_reads);

                let record_key = read_name::group_key(&record.name);
                if let Boundary::Changed = tracker.observe(&record_key, stats.total_reads)? {
                    if !group.is_empty() {
                        tx_work
                            .send(WorkItem {
                                idx: group_idx,
                                key: std::mem::take(&mut key),
                                group: std::mem::take(&mut group),
                            })
                            .map_err(|_| anyhow!("worker channel closed"))?;
                        group_idx += 1;
                    }
                    stats.read_groups += 1;
                    key.push_str(&record_key);
                }
                drop(record_key);
                group.push(record);
            }

            if !group.is_empty() {
                tx_work
                    .send(WorkItem {
                        idx: group_idx,
                        key: std::mem::take(&mut key),
                        group: std::mem::take(&mut group),
                    })
                    .map_err(|_| anyhow!("worker channel closed"))?;
            }
            Ok(())
        })();

        drop(tx_work);

        let resolved = output
            .join()
            .map_err(|_| anyhow!("fragment writer thread panicked"))??;
        read_result?;
        stats.merge(&resolved);
        Ok(())
    })?;

    Ok(stats)
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fraglen".to_string())
}

/// Default output path: `<input stem>.fraglen.csv` in the working directory.
pub fn default_output_path(in_bam: &Path) -> PathBuf {
    PathBuf::from(format!("{}.fraglen.csv", base_name(in_bam)))
}

pub fn run(args: &Args) -> Result<Stats> {
    let base = base_name(&args.in_bam);
    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.in_bam));

    // Keeps the sorted copy alive until the pass is done.
    let sorted_dir = if args.sort {
        let dir = tempfile::Builder::new()
            .prefix("fraglen-sort.")
            .tempdir()
            .context("failed to create temporary directory for sorting")?;
        let sorted = dir.path().join(format!("sorted.{base}.bam"));
        tracing::info!(input = %args.in_bam.display(), "sorting by read name");
        sort::sort_by_name(&args.in_bam, &sorted)?;
        Some((dir, sorted))
    } else {
        None
    };
    let bam_path = sorted_dir
        .as_ref()
        .map_or(args.in_bam.as_path(), |(_, p)| p.as_path());

    let mut bam = bam_input::open_bam(bam_path)?;
    if !args.sort && !bam_input::declares_name_grouping(&bam.header) {
        tracing::warn!(
            input = %bam_path.display(),
            "header does not declare query-name order; records of one read must be contiguous"
        );
    }

    let mut writer = FragmentWriter::create(&out_path)?;
    let config = GroupingConfig {
        check_order: !args.assume_sorted && !args.sort,
        threads: args.threads.max(1) as usize,
    };

    tracing::info!(input = %bam_path.display(), output = %out_path.display(), "analyzing");
    let mut alignments = bam.alignments();
    let mut stats = resolve_stream(alignments.by_ref(), &mut writer, &config)?;
    stats.unmapped_reads = alignments.unmapped();
    stats.total_reads += stats.unmapped_reads;
    writer.finish()?;
    drop(alignments);
    drop(bam);
    drop(sorted_dir);

    if let Some(script) = &args.plot_script {
        plot::render(script, &out_path, &base);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Strand;
    use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

    fn aln(name: &str, pos: i64, len: u32) -> AlignmentRecord {
        AlignmentRecord {
            name: name.to_string(),
            chrom: "chr1".to_string(),
            pos,
            cigar: vec![(len, CigarKind::Match)],
            sequence: vec![b'G'; len as usize],
            strand: Strand::Forward,
            is_proper_pair: false,
            mate_chrom: None,
            mate_pos: -1,
        }
    }

    fn paired(name: &str, pos: i64, mate_pos: i64, strand: Strand) -> AlignmentRecord {
        AlignmentRecord {
            strand,
            is_proper_pair: true,
            mate_chrom: Some("chr1".to_string()),
            mate_pos,
            ..aln(name, pos, 50)
        }
    }

    fn run_lines(records: Vec<AlignmentRecord>, config: &GroupingConfig) -> Result<(Vec<String>, Stats)> {
        let mut writer = FragmentWriter::new(Vec::new())?;
        let stats = resolve_stream(records.into_iter().map(Ok), &mut writer, config)?;
        let out = String::from_utf8(writer.finish()?)?;
        Ok((out.lines().map(str::to_string).collect(), stats))
    }

    fn squash(line: &str) -> String {
        line.split('\t').map(str::trim).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn single_and_pair_in_one_group() {
        let records = vec![
            aln("frag", 100, 50),
            paired("frag/1", 200, 280, Strand::Forward),
            paired("frag/2", 280, 200, Strand::Reverse),
        ];
        let (lines, stats) = run_lines(records, &GroupingConfig::default()).unwrap();
        let rows: Vec<String> = lines[1..].iter().map(|l| squash(l)).collect();
        assert_eq!(rows, vec!["S chr1 100 50", "P chr1 200 130"]);
        assert_eq!(stats.read_groups, 1);
        assert_eq!(stats.singles, 1);
        assert_eq!(stats.pairs, 1);
    }

    #[test]
    fn boundaries_flush_previous_group() {
        let records = vec![
            paired("a/1", 10, 60, Strand::Forward),
            paired("a/2", 60, 10, Strand::Reverse),
            paired("b/2", 500, 400, Strand::Reverse),
            paired("b/1", 400, 500, Strand::Forward),
            aln("c", 7, 20),
        ];
        let (lines, stats) = run_lines(records, &GroupingConfig::default()).unwrap();
        let rows: Vec<String> = lines[1..].iter().map(|l| squash(l)).collect();
        assert_eq!(rows, vec!["P chr1 10 100", "P chr1 400 150", "S chr1 7 20"]);
        assert_eq!(stats.read_groups, 3);
    }

    #[test]
    fn mate_split_across_groups_is_dropped() {
        let records = vec![
            paired("a/1", 10, 60, Strand::Forward),
            aln("b", 5, 5),
        ];
        let (lines, stats) = run_lines(records, &GroupingConfig::default()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(stats.dropped_pairs, 1);
    }

    #[test]
    fn reappearing_group_is_an_error() {
        let records = vec![aln("a", 1, 5), aln("b", 2, 5), aln("a/2", 3, 5)];
        let err = run_lines(records, &GroupingConfig::default()).unwrap_err();
        match err.downcast_ref::<GroupingError>() {
            Some(GroupingError::UnsortedInput { key, record }) => {
                assert_eq!(key, "a");
                assert_eq!(*record, 3);
            }
            None => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn order_check_can_be_disabled() {
        let records = vec![aln("a", 1, 5), aln("b", 2, 5), aln("a", 3, 6)];
        let config = GroupingConfig { check_order: false, threads: 1 };
        let (lines, stats) = run_lines(records, &config).unwrap();
        // the reappearing group is emitted a second time
        assert_eq!(lines.len(), 4);
        assert_eq!(stats.read_groups, 3);
    }

    #[test]
    fn empty_stream_writes_only_header() {
        let (lines, stats) = run_lines(Vec::new(), &GroupingConfig::default()).unwrap();
        assert_eq!(lines, vec!["type\tchr\tpos\tlen".to_string()]);
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn parallel_output_matches_sequential() {
        let mut records = Vec::new();
        for i in 0..500i64 {
            let name = format!("tmpl{i:04}");
            let p = i * 37;
            records.push(paired(&format!("{name}/1"), p, p + 120, Strand::Forward));
            records.push(paired(&format!("{name}/2"), p + 120, p, Strand::Reverse));
            if i % 7 == 0 {
                records.push(aln(&name, p + 3, 40));
            }
        }

        let (seq_lines, seq_stats) = run_lines(records.clone(), &GroupingConfig::default()).unwrap();
        let config = GroupingConfig { check_order: true, threads: 4 };
        let (par_lines, par_stats) = run_lines(records, &config).unwrap();
        assert_eq!(seq_lines, par_lines);
        assert_eq!(seq_stats, par_stats);
    }

    #[test]
    fn parallel_mode_reports_unsorted_input() {
        let records = vec![aln("a", 1, 5), aln("b", 2, 5), aln("a", 3, 5)];
        let config = GroupingConfig { check_order: true, threads: 2 };
        let err = run_lines(records, &config).unwrap_err();
        assert!(err.downcast_ref::<GroupingError>().is_some());
    }

    #[test]
    fn default_output_uses_input_stem() {
        assert_eq!(
            default_output_path(Path::new("/data/run7/sample.bam")),
            PathBuf::from("sample.fraglen.csv")
        );
    }
}

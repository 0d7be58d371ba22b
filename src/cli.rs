use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fraglen-rs",
    about = "Estimate fragment lengths from name-grouped BAM alignments",
    version
)]
pub struct Args {
    /// Input BAM, grouped by read name unless --sort is given
    pub in_bam: PathBuf,

    /// Output table [default: <input stem>.fraglen.csv]
    #[arg(short = 'o', long = "output", value_name = "TSV")]
    pub output: Option<PathBuf>,

    /// Sort the input by read name before analysis
    #[arg(short = 's', long)]
    pub sort: bool,

    /// Number of threads (CPUs) used to resolve read groups
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: u8,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Skip the check that every read group appears in one contiguous run
    ///
    /// The check keeps every finished group name in memory until the end of
    /// the input, so memory grows with the number of reads. Pass this for
    /// very large inputs already sorted by `samtools sort -n`.
    #[arg(long)]
    pub assume_sorted: bool,

    /// R script rendering the table; run as `Rscript <script> <table> <stem>`
    #[arg(long, value_name = "R")]
    pub plot_script: Option<PathBuf>,
}

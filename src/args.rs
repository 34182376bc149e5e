use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Reconstruct block propagation timelines from block profiler CSV logs")]
pub struct Args {
    /// Profiler CSV file, or a directory searched for *.csv files
    #[arg(short = 'l', long = "log-path")]
    pub log_path: PathBuf,

    /// Only analyze the earliest N announced blocks (optional)
    #[arg(short = 'n', long = "max-blocks")]
    pub max_blocks: Option<usize>,

    /// Write per-block metrics as CSV
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write the aggregate summary as JSON
    #[arg(long = "json")]
    pub json: Option<PathBuf>,

    /// Worker threads for per-block resolution (1 = sequential)
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    pub jobs: usize,

    /// Metrics a block must fully resolve to count as fully resolved
    /// (defaults to all of them)
    #[arg(long = "require", value_delimiter = ',')]
    pub require: Vec<String>,
}

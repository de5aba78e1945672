use std::path::PathBuf;

use clap::Parser;

use crate::delta_stepper::Policy;
use crate::logger::LoggingLevel;

/// Distributed delta-stepping single-source shortest paths.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file, or a directory holding one `<rank>.in` per rank
    pub input: PathBuf,

    /// Output file, or a directory receiving one `<rank>.out` per rank
    pub output: PathBuf,

    /// Bucket width
    #[arg(default_value_t = 10)]
    pub delta: i64,

    /// Vertex the distances are measured from
    #[arg(long, default_value_t = 0)]
    pub root: usize,

    /// Enable the inner/outer-short edge split (default)
    #[arg(long, overrides_with = "noios")]
    pub ios: bool,
    /// Disable the inner/outer-short edge split
    #[arg(long)]
    pub noios: bool,

    /// Enable the light/heavy edge split, consulted when the
    /// inner/outer-short split is off (default)
    #[arg(long, overrides_with = "nopruning")]
    pub pruning: bool,
    /// Disable the light/heavy edge split
    #[arg(long)]
    pub nopruning: bool,

    /// Enable same-phase consumption of locally owned targets (default)
    #[arg(long, overrides_with = "nolocal_bypass")]
    pub local_bypass: bool,
    /// Disable same-phase consumption of locally owned targets
    #[arg(long)]
    pub nolocal_bypass: bool,

    /// Reserved; accepted and ignored
    #[arg(long, overrides_with = "nohybrid")]
    pub hybrid: bool,
    /// Reserved; accepted and ignored
    #[arg(long)]
    pub nohybrid: bool,

    /// Trust the inputs to contain each edge at most once and skip the
    /// multi-edge collapse
    #[arg(long)]
    pub assume_nomultiedge: bool,

    /// Per-rank log verbosity
    #[arg(long, value_enum, default_value = "progress")]
    pub logging: LoggingLevel,

    /// Log a progress line every this many epochs
    #[arg(long, default_value_t = 10)]
    pub progress_freq: u64,

    /// Append a JSONL run record here (rank 0 only)
    #[arg(long)]
    pub record_file: Option<PathBuf>,
}

impl Cli {
    pub fn policy(&self) -> Policy {
        Policy {
            ios: !self.noios,
            pruning: !self.nopruning,
            local_bypass: !self.nolocal_bypass,
            hybrid: !self.nohybrid,
        }
    }

    pub fn input_for(&self, rank: usize) -> PathBuf {
        if self.input.is_dir() {
            self.input.join(format!("{rank}.in"))
        } else {
            self.input.clone()
        }
    }

    pub fn output_for(&self, rank: usize) -> PathBuf {
        if self.output.is_dir() {
            self.output.join(format!("{rank}.out"))
        } else {
            self.output.clone()
        }
    }

    pub fn describe(&self) {
        let policy = self.policy();
        println!("input:           {}", self.input.display());
        println!("output:          {}", self.output.display());
        println!("delta:           {}", self.delta);
        println!("root:            {}", self.root);
        println!("ios:             {}", policy.ios);
        println!("pruning:         {}", policy.pruning);
        println!("local bypass:    {}", policy.local_bypass);
        println!("trim multiedges: {}", !self.assume_nomultiedge);
        println!("logging:         {:?}", self.logging);
    }
}

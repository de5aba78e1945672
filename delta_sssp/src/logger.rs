//! Per-rank leveled logging.
//!
//! The solver takes a logger by reference instead of reaching for a
//! process-global sink, so the test suite can run it silently and the
//! binary can point each rank at its own file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoggingLevel {
    None,
    Progress,
    Debug,
}

#[derive(Debug)]
pub struct RankLogger {
    level: LoggingLevel,
    rank: usize,
    sink: Option<BufWriter<File>>,
}

impl RankLogger {
    /// A logger that swallows everything.
    pub fn disabled() -> Self {
        RankLogger {
            level: LoggingLevel::None,
            rank: 0,
            sink: None,
        }
    }

    /// Open `path` for this rank. `LoggingLevel::None` leaves the file
    /// untouched.
    pub fn create(path: &Path, level: LoggingLevel, rank: usize) -> io::Result<Self> {
        let sink = if level == LoggingLevel::None {
            None
        } else {
            Some(BufWriter::new(File::create(path)?))
        };
        Ok(RankLogger { level, rank, sink })
    }

    pub fn progress_on(&self) -> bool {
        self.level >= LoggingLevel::Progress
    }

    pub fn debug_on(&self) -> bool {
        self.level >= LoggingLevel::Debug
    }

    pub fn progress(&mut self, msg: &str) {
        if self.progress_on() {
            self.write_line(msg);
        }
    }

    pub fn debug(&mut self, msg: &str) {
        if self.debug_on() {
            self.write_line(msg);
        }
    }

    fn write_line(&mut self, msg: &str) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(sink, "[{}] {}", self.rank, msg);
            let _ = sink.flush();
        }
    }
}

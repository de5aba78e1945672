use thiserror::Error;

/// Errors surfaced by the solver library.
///
/// Every kind aborts the whole job; there is no per-vertex recovery. The
/// binary maps `Invariant` to a distinct exit code so a harness can tell a
/// broken run from a misconfigured one.
#[derive(Debug, Error)]
pub enum SsspError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid data: {0}")]
    Data(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl SsspError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SsspError::Invariant(_) => 2,
            _ => 1,
        }
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Which side of the pipeline an engine sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Reader,
    Converter,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Reader => f.write_str("reader"),
            EngineKind::Converter => f.write_str("converter"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SpeakError {
    #[error("no supported {kind}s installed: {}", .supported.join(", "))]
    NoEngineFound {
        kind: EngineKind,
        supported: Vec<&'static str>,
    },

    #[error("desired {kind} not found or supported: {name}")]
    UnsupportedEngine { kind: EngineKind, name: String },

    #[error("no text received on standard input")]
    EmptyInput,

    #[error("file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("output directory does not exist: {}", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("invalid argument string {input:?}: {reason}")]
    ArgFormat { input: String, reason: String },

    #[error("failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name} exited with {status}")]
    ConverterFailed { name: String, status: ExitStatus },

    #[error("failed while waiting for {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("interrupted")]
    Interrupted,

    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl SpeakError {
    /// Process exit status reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SpeakError::Io(_) => 1,
            SpeakError::NoEngineFound { .. } => 2,
            SpeakError::UnsupportedEngine { .. } => 3,
            SpeakError::EmptyInput => 4,
            SpeakError::OutputExists(_) => 5,
            SpeakError::ArgFormat { .. } => 6,
            SpeakError::OutputDirMissing(_) => 7,
            SpeakError::Spawn { .. } => 8,
            SpeakError::ConverterFailed { .. } => 9,
            SpeakError::Wait { .. } => 10,
            SpeakError::Config(_) => 11,
            SpeakError::Interrupted => 130,
        }
    }
}

pub type SpeakResult<T> = Result<T, SpeakError>;

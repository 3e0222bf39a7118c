use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{SpeakError, SpeakResult};
use crate::utils::{replace_invalid_chars, truncate_chars};

pub const MAX_TITLE_CHARS: usize = 99;
const FALLBACK_TITLE: &str = "untitled";

/// Text collected from standard input, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPayload {
    pub title: String,
    pub text: String,
    pub temp_dir: PathBuf,
}

impl InputPayload {
    /// Input without a single visible character is rejected.
    pub fn from_lines(lines: Vec<String>, temp_dir: PathBuf) -> SpeakResult<Self> {
        if lines.iter().all(|line| line.trim().is_empty()) {
            return Err(SpeakError::EmptyInput);
        }
        let title = derive_title(&lines);
        let text = lines.join("\n");
        Ok(Self {
            title,
            text,
            temp_dir,
        })
    }

    /// Write the text to a fresh file in the temp dir, named after the title.
    /// The file is created exclusively and removed when the handle is dropped.
    pub fn stage(&self) -> SpeakResult<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(&self.title)
            .tempfile_in(&self.temp_dir)?;
        file.write_all(self.text.as_bytes())?;
        file.flush()?;
        debug!("Staged {} bytes in {}", self.text.len(), file.path().display());
        Ok(file)
    }
}

/// Title from the first line with visible content, capped and made safe for use
/// as a file name.
pub fn derive_title(lines: &[String]) -> String {
    let first = lines
        .iter()
        .find(|line| !line.trim().is_empty())
        .map(String::as_str)
        .unwrap_or_default();
    let title = replace_invalid_chars(truncate_chars(first, MAX_TITLE_CHARS));
    let title = title.trim();
    // "." and ".." name directories, not files.
    if title.chars().all(|c| c == '.') {
        FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    }
}

pub fn collect<R: BufRead>(reader: R, temp_dir: PathBuf) -> SpeakResult<InputPayload> {
    let lines = reader.lines().collect::<io::Result<Vec<String>>>()?;
    debug!("Read {} lines from standard input", lines.len());
    InputPayload::from_lines(lines, temp_dir)
}

/// Read all of standard input. Ctrl-C while waiting for text ends the process
/// with a success status; nothing has been written yet.
pub async fn read_stdin(temp_dir: PathBuf) -> SpeakResult<InputPayload> {
    if io::stdin().is_terminal() {
        info!("Reading text from standard input, finish with Ctrl-D");
    }

    debug!("Waiting for text on standard input");
    let reading = tokio::task::spawn_blocking(move || collect(io::stdin().lock(), temp_dir));

    tokio::select! {
        joined = reading => joined.map_err(|e| SpeakError::Io(io::Error::other(e)))?,
        Ok(()) = tokio::signal::ctrl_c() => {
            println!();
            // The blocking reader thread cannot be cancelled, so leave now.
            std::process::exit(0);
        }
    }
}

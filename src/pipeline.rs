//! Runs the reader and the converter as two processes joined by a pipe.
//!
//! The reader's stdout becomes the converter's stdin; the parent keeps no
//! handle to the pipe once both are running, so the converter sees end of
//! stream as soon as the reader exits. The temporary input file is removed on
//! every path out of [`execute`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::discovery::{SelectedConverter, SelectedEngine};
use crate::error::{SpeakError, SpeakResult};
use crate::input::InputPayload;

/// Everything needed for one run, consumed by [`execute`].
#[derive(Debug)]
pub struct Plan {
    pub reader: SelectedEngine,
    pub converter: SelectedConverter,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    InputStaged,
    ProcessesSpawned,
    Waiting,
    Completed,
    Failed,
    Cleaned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct Tracker {
    stage: Stage,
}

impl Tracker {
    fn advance(&mut self, next: Stage) {
        debug!("Pipeline {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Stage the input, run both processes, and wait for the converter.
///
/// A non-zero exit of the reader is only logged: whatever it managed to write
/// has already been handed to the converter, so the output may be truncated.
pub async fn execute(plan: Plan, payload: &InputPayload) -> SpeakResult<()> {
    let mut tracker = Tracker { stage: Stage::Idle };
    let staged = payload.stage()?;
    tracker.advance(Stage::InputStaged);

    let result = run_processes(&plan, staged.path(), &mut tracker).await;
    tracker.advance(if result.is_ok() {
        Stage::Completed
    } else {
        Stage::Failed
    });

    debug!("Removing temporary file: {}", staged.path().display());
    if let Err(e) = staged.close() {
        warn!("Failed to remove temporary file: {}", e);
    }
    tracker.advance(Stage::Cleaned);
    result
}

async fn run_processes(
    plan: &Plan,
    input_file: &Path,
    tracker: &mut Tracker,
) -> SpeakResult<()> {
    let reader_args = plan.reader.command_line(input_file);
    let converter_args = plan.converter.engine.command_line(&plan.output);
    debug!("Final reader command: {} {:?}", plan.reader.name(), reader_args);
    debug!(
        "Final converter command: {} {:?}",
        plan.converter.engine.name(),
        converter_args
    );

    let mut reader = Command::new(&plan.reader.path)
        .args(&reader_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| SpeakError::Spawn {
            name: plan.reader.name().to_string(),
            source,
        })?;

    let stream: Stdio = match reader.stdout.take() {
        Some(stdout) => stdout.try_into().map_err(SpeakError::Io)?,
        None => {
            abort(&mut reader, plan.reader.name()).await;
            return Err(SpeakError::Io(std::io::Error::other(
                "reader stdout was not captured",
            )));
        }
    };

    let spawned = {
        let mut command = Command::new(&plan.converter.engine.path);
        command
            .args(&converter_args)
            .stdin(stream)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        // The command (and its copy of the pipe) is dropped with this scope.
        command.spawn()
    };
    let mut converter = match spawned {
        Ok(child) => child,
        Err(source) => {
            abort(&mut reader, plan.reader.name()).await;
            return Err(SpeakError::Spawn {
                name: plan.converter.engine.name().to_string(),
                source,
            });
        }
    };
    tracker.advance(Stage::ProcessesSpawned);

    info!(
        "Converting with {} | {} into {}",
        plan.reader.name(),
        plan.converter.engine.name(),
        plan.output.display()
    );

    tracker.advance(Stage::Waiting);
    let waited = tokio::select! {
        status = converter.wait() => status.map_err(|source| SpeakError::Wait {
            name: plan.converter.engine.name().to_string(),
            source,
        }),
        Ok(()) = tokio::signal::ctrl_c() => Err(SpeakError::Interrupted),
    };

    let status = match waited {
        Ok(status) => status,
        Err(e) => {
            error!("{}", e);
            abort(&mut converter, plan.converter.engine.name()).await;
            abort(&mut reader, plan.reader.name()).await;
            return Err(e);
        }
    };

    check_reader(&mut reader, plan.reader.name()).await?;

    if !status.success() {
        error!(
            "{} failed for output {}",
            plan.converter.engine.name(),
            plan.output.display()
        );
        return Err(SpeakError::ConverterFailed {
            name: plan.converter.engine.name().to_string(),
            status,
        });
    }

    info!("Audio written to {}", plan.output.display());
    Ok(())
}

/// Reap the reader once the converter is done; its exit status does not decide
/// the outcome of the run. A reader that hangs on can still be interrupted.
async fn check_reader(reader: &mut Child, name: &str) -> SpeakResult<()> {
    debug!("Waiting for {} to finish", name);
    let waited = tokio::select! {
        status = reader.wait() => Some(status),
        Ok(()) = tokio::signal::ctrl_c() => None,
    };
    match waited {
        Some(Ok(status)) if status.success() => debug!("{} finished", name),
        Some(Ok(status)) => warn!("{} exited with {}; the audio may be truncated", name, status),
        Some(Err(e)) => warn!("Could not collect {} exit status: {}", name, e),
        None => {
            error!("Interrupted while waiting for {}", name);
            abort(reader, name).await;
            return Err(SpeakError::Interrupted);
        }
    }
    Ok(())
}

/// Kill a child and reap it, ignoring a child that already exited.
async fn abort(child: &mut Child, name: &str) {
    if let Err(e) = child.start_kill() {
        debug!("{} was not running: {}", name, e);
    }
    if let Err(e) = child.wait().await {
        warn!("Could not reap {}: {}", name, e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::discovery::{Probe, select};
    use crate::engines::REGISTRY;
    use std::fs;
    use std::io::Cursor;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const ESPEAK: &str = r#"#!/bin/sh
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-f" ]; then /bin/cat "$2"; shift; fi
  shift
done
"#;

    const OGGENC: &str = r#"#!/bin/sh
out=""
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
/bin/cat > "$out"
"#;

    struct Fixture {
        bin: TempDir,
        tmp: TempDir,
        out: TempDir,
    }

    fn fixture(reader: &str, converter: &str) -> Fixture {
        let bin = TempDir::new().unwrap();
        for (name, body) in [("espeak", reader), ("oggenc", converter)] {
            let path = bin.path().join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        Fixture {
            bin,
            tmp: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        }
    }

    impl Fixture {
        fn plan(&self, payload: &InputPayload) -> Plan {
            let probe = Probe::with_search_path(self.bin.path().as_os_str());
            let selection = select(&REGISTRY, &probe, None, None).unwrap();
            let output = self
                .out
                .path()
                .join(format!("{}{}", payload.title, selection.converter.extension));
            Plan {
                reader: selection.reader,
                converter: selection.converter,
                output,
            }
        }

        fn payload(&self, text: &str) -> InputPayload {
            crate::input::collect(Cursor::new(text.to_string()), self.tmp.path().to_path_buf())
                .unwrap()
        }

        fn temp_files(&self) -> usize {
            fs::read_dir(self.tmp.path()).unwrap().count()
        }
    }

    #[tokio::test]
    async fn pipes_reader_into_converter_and_cleans_up() {
        let fx = fixture(ESPEAK, OGGENC);
        let payload = fx.payload("Hello\nWorld\n");
        let plan = fx.plan(&payload);
        let output = plan.output.clone();

        execute(plan, &payload).await.unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "Hello\nWorld");
        assert_eq!(output.extension().unwrap(), "ogg");
        assert_eq!(fx.temp_files(), 0);
    }

    #[tokio::test]
    async fn failing_reader_still_produces_output() {
        let reader = "#!/bin/sh\nprintf partial\nexit 1\n";
        let fx = fixture(reader, OGGENC);
        let payload = fx.payload("Hello\n");
        let plan = fx.plan(&payload);
        let output = plan.output.clone();

        execute(plan, &payload).await.unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "partial");
        assert_eq!(fx.temp_files(), 0);
    }

    #[tokio::test]
    async fn converter_failure_is_reported_and_temp_removed() {
        let converter = "#!/bin/sh\n/bin/cat > /dev/null\nexit 3\n";
        let fx = fixture(ESPEAK, converter);
        let payload = fx.payload("Hello\n");
        let plan = fx.plan(&payload);

        let err = execute(plan, &payload).await.unwrap_err();

        assert!(matches!(err, SpeakError::ConverterFailed { ref name, .. } if name == "oggenc"));
        assert_eq!(fx.temp_files(), 0);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_and_temp_removed() {
        let fx = fixture(ESPEAK, OGGENC);
        let payload = fx.payload("Hello\n");
        let mut plan = fx.plan(&payload);
        plan.converter.engine.path = fx.bin.path().join("missing-oggenc");

        let err = execute(plan, &payload).await.unwrap_err();

        assert!(matches!(err, SpeakError::Spawn { ref name, .. } if name == "oggenc"));
        assert_eq!(fx.temp_files(), 0);
    }
}

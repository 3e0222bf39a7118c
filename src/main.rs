mod args;
mod config;
mod discovery;
mod engines;
mod error;
mod input;
mod output;
mod pipeline;
mod utils;

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use args::Args;
use config::{FileConfig, Settings};
use discovery::Probe;
use engines::REGISTRY;
use error::{SpeakError, SpeakResult};
use pipeline::Plan;

const LICENSE_NOTICE: &str = "
speak-to-file  This program comes with ABSOLUTELY NO WARRANTY.
This is free software, and you are welcome to redistribute it
under certain conditions. For more information please visit:
https://www.gnu.org/licenses/gpl-3.0.en.html
";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.license {
        println!("{LICENSE_NOTICE}");
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose);
    debug!("{:?}", args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// `-v` forces debug output; otherwise `RUST_LOG` applies, defaulting to warnings only.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> SpeakResult<()> {
    let probe = Probe::from_env();

    if args.list_engines {
        print!("{}", discovery::describe(&discovery::installed(&REGISTRY, &probe)));
        return Ok(());
    }

    // Validation that leaves no trace: settings, engines, output location.
    let file_config = FileConfig::load(args.config.as_deref()).map_err(SpeakError::Config)?;
    let settings = Settings::resolve(&args, file_config)?;
    debug!(?settings, "Resolved settings");

    let mut selection = discovery::select(
        &REGISTRY,
        &probe,
        settings.reader.as_deref(),
        settings.converter.as_deref(),
    )?;
    settings.output.precheck(settings.overwrite)?;

    let payload = input::read_stdin(std::env::temp_dir()).await?;
    info!("Title: {}", payload.title);

    let cwd = std::env::current_dir()?;
    let output = settings.output.resolve(
        &cwd,
        &payload.title,
        selection.converter.extension,
        settings.overwrite,
    )?;
    debug!("Final output: {}", output.display());

    selection.reader.merge_args(&settings.reader_args);
    selection.converter.engine.merge_args(&settings.converter_args);

    let plan = Plan {
        reader: selection.reader,
        converter: selection.converter,
        output,
    };
    pipeline::execute(plan, &payload).await?;

    debug!("Finished execution");
    Ok(())
}

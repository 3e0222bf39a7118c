use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "speak-to-file")]
#[command(about = "Read text from stdin, speak it with a TTS engine and encode it to an audio file", long_about = None)]
#[command(version)]
pub struct Args {
    /// Output file or directory (default: <title><extension> in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// TTS engine to use (espeak, festival, flite, mimic)
    #[arg(long, env = "SPEAK_TO_FILE_READER")]
    pub reader: Option<String>,

    /// Extra reader arguments, e.g. "-v=de,-s=150"; "key=" passes a bare flag
    #[arg(long, allow_hyphen_values = true)]
    pub reader_args: Option<String>,

    /// Audio converter to use (ffmpeg, avconv, oggenc, opusenc, lame)
    #[arg(long, env = "SPEAK_TO_FILE_CONVERTER")]
    pub converter: Option<String>,

    /// Extra converter arguments, e.g. "-q:a=3"; "key=" passes a bare flag
    #[arg(long, allow_hyphen_values = true)]
    pub converter_args: Option<String>,

    /// JSON configuration file
    #[arg(long, env = "SPEAK_TO_FILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// List installed readers and converters and exit
    #[arg(long)]
    pub list_engines: bool,

    /// More output
    #[arg(short, long)]
    pub verbose: bool,

    /// Display license
    #[arg(short, long)]
    pub license: bool,
}

// speak-to-file configuration: optional JSON file merged under the command line

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::args::Args;
use crate::engines::{ArgMap, ArgValue, split_args};
use crate::error::{SpeakError, SpeakResult};
use crate::output::OutputRequest;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Preferred reader
    pub reader: Option<String>,

    /// Preferred converter
    pub converter: Option<String>,

    /// Directory for output files when `--output` is not given
    pub output_dir: Option<PathBuf>,

    pub overwrite: Option<bool>,

    /// Extra reader arguments; `true` is a bare flag, `false` removes a default flag
    pub reader_args: Map<String, Value>,

    /// Extra converter arguments, same rules as `reader_args`
    pub converter_args: Map<String, Value>,
}

impl FileConfig {
    /// `$XDG_CONFIG_HOME/speak-to-file/config.json`, else `~/.config/speak-to-file/config.json`
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join("speak-to-file").join("config.json"))
    }

    /// Load an explicitly named file (which must exist), or the default file if
    /// present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Convert a JSON argument object, keeping key order.
fn json_args(map: &Map<String, Value>) -> Result<ArgMap> {
    let mut args = ArgMap::new();
    for (key, value) in map {
        let value = match value {
            Value::Bool(flag) => ArgValue::Flag(*flag),
            Value::String(s) => ArgValue::Value(s.clone()),
            Value::Number(n) => ArgValue::Value(n.to_string()),
            other => anyhow::bail!("argument {key:?} must be a string, number or boolean, got {other}"),
        };
        args.insert(key.clone(), value);
    }
    Ok(args)
}

/// Everything the run needs from the command line and the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub reader: Option<String>,
    pub converter: Option<String>,
    pub reader_args: ArgMap,
    pub converter_args: ArgMap,
    pub output: OutputRequest,
    pub overwrite: bool,
}

impl Settings {
    /// Command line wins over the config file; argument maps are merged key by key.
    pub fn resolve(args: &Args, file: FileConfig) -> SpeakResult<Self> {
        let mut reader_args = json_args(&file.reader_args).map_err(SpeakError::Config)?;
        if let Some(raw) = &args.reader_args {
            reader_args.merge(&split_args(raw)?);
        }
        let mut converter_args = json_args(&file.converter_args).map_err(SpeakError::Config)?;
        if let Some(raw) = &args.converter_args {
            converter_args.merge(&split_args(raw)?);
        }

        let output = match (&args.output, file.output_dir) {
            (Some(output), _) => OutputRequest::parse(Some(output.as_path())),
            (None, Some(dir)) => OutputRequest {
                dir: Some(dir),
                file: None,
            },
            (None, None) => OutputRequest::default(),
        };

        Ok(Self {
            reader: args.reader.clone().or(file.reader),
            converter: args.converter.clone().or(file.converter),
            reader_args,
            converter_args,
            output,
            overwrite: args.overwrite || file.overwrite.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::glue_args;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["speak-to-file"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "reader": "flite",
            "converter": "lame",
            "output_dir": "/srv/audio",
            "overwrite": true,
            "reader_args": {"-voice": "slt", "--setf": 1.5},
            "converter_args": {"-V": 4, "-m": false}
        }"#;
        let config = FileConfig::parse(json).unwrap();
        assert_eq!(config.reader.as_deref(), Some("flite"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/audio")));
        assert_eq!(config.overwrite, Some(true));
        assert_eq!(
            glue_args(&json_args(&config.reader_args).unwrap()),
            ["-voice", "slt", "--setf", "1.5"]
        );
        assert_eq!(glue_args(&json_args(&config.converter_args).unwrap()), ["-V", "4"]);
    }

    #[test]
    fn parse_empty_config() {
        assert_eq!(FileConfig::parse("{}").unwrap(), FileConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::parse(r#"{"speed": 2}"#).is_err());
    }

    #[test]
    fn nested_argument_values_are_rejected() {
        let config = FileConfig::parse(r#"{"reader_args": {"-x": [1, 2]}}"#).unwrap();
        let err = Settings::resolve(&args(&[]), config).unwrap_err();
        assert!(matches!(err, SpeakError::Config(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(FileConfig::load(Some(dir.path().join("nope.json").as_path())).is_err());
    }

    #[test]
    fn command_line_overrides_config() {
        let config = FileConfig::parse(
            r#"{"reader": "flite", "reader_args": {"-s": "120", "-v": "en"}, "output_dir": "books"}"#,
        )
        .unwrap();
        let settings = Settings::resolve(
            &args(&["--reader", "espeak", "--reader-args", "-s=150", "-o", "talk.ogg"]),
            config,
        )
        .unwrap();
        assert_eq!(settings.reader.as_deref(), Some("espeak"));
        assert_eq!(glue_args(&settings.reader_args), ["-s", "150", "-v", "en"]);
        assert_eq!(settings.output.file.as_deref(), Some("talk.ogg"));
        assert_eq!(settings.output.dir, None);
        assert!(!settings.overwrite);
    }

    #[test]
    fn config_output_dir_used_without_output_flag() {
        let config = FileConfig::parse(r#"{"output_dir": "books", "overwrite": true}"#).unwrap();
        let settings = Settings::resolve(&args(&[]), config).unwrap();
        assert_eq!(settings.output.dir, Some(PathBuf::from("books")));
        assert_eq!(settings.output.file, None);
        assert!(settings.overwrite);
    }

    #[test]
    fn malformed_cli_args_fail_before_anything_runs() {
        let err = Settings::resolve(&args(&["--converter-args", "-q=1=2"]), FileConfig::default())
            .unwrap_err();
        assert!(matches!(err, SpeakError::ArgFormat { .. }));
    }
}

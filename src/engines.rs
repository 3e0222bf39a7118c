//! Static knowledge about the external programs this tool drives.
//!
//! Every engine gets a default argument template and a rule for where the
//! file path goes on its command line. Arguments are kept as discrete tokens
//! and are never passed through a shell.

use std::ffi::OsString;
use std::path::Path;

use crate::error::{SpeakError, SpeakResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// `true` emits the key alone, `false` drops it.
    Flag(bool),
    Value(String),
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Value(value.to_string())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Flag(value)
    }
}

/// Insertion-ordered argument mapping. Re-inserting a key overrides its value
/// but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgMap {
    entries: Vec<(String, ArgValue)>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Override entries of `self` with those of `other`, key by key.
    pub fn merge(&mut self, other: &ArgMap) {
        for (key, value) in other.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ArgValue)> {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for ArgMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ArgMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Flatten an argument mapping into command line tokens.
pub fn glue_args(args: &ArgMap) -> Vec<String> {
    let mut tokens = Vec::new();
    for (key, value) in args.iter() {
        match value {
            ArgValue::Flag(true) => tokens.push(key.clone()),
            ArgValue::Flag(false) => {}
            ArgValue::Value(v) => {
                tokens.push(key.clone());
                tokens.push(v.clone());
            }
        }
    }
    tokens
}

/// Parse the `key=value,key2=,...` mini-format used by `--reader-args` and
/// `--converter-args`. An empty value marks a bare flag.
pub fn split_args(input: &str) -> SpeakResult<ArgMap> {
    let format_error = |reason: &str| SpeakError::ArgFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut map = ArgMap::new();
    for entry in input.split(',') {
        let mut parts = entry.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(if entry.contains('=') {
                format_error(&format!("entry {entry:?} has more than one '='"))
            } else {
                format_error(&format!("entry {entry:?} is not of the form key=value"))
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format_error(&format!("entry {entry:?} has an empty key")));
        }
        let value = value.trim();
        if value.is_empty() {
            map.insert(key, true);
        } else {
            map.insert(key, value);
        }
    }
    Ok(map)
}

/// Where an engine expects the file it reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSlot {
    /// Passed as the value of this flag.
    Flag(&'static str),
    /// Appended as the last token.
    Trailing,
}

/// Default template entry: `None` is a bare flag.
pub type TemplateArg = (&'static str, Option<&'static str>);

#[derive(Debug)]
pub struct EngineSpec {
    pub name: &'static str,
    pub defaults: &'static [TemplateArg],
    pub path_slot: PathSlot,
}

impl EngineSpec {
    pub fn default_args(&self) -> ArgMap {
        self.defaults
            .iter()
            .map(|&(key, value)| match value {
                Some(v) => (key, ArgValue::from(v)),
                None => (key, ArgValue::Flag(true)),
            })
            .collect()
    }

    /// Final argv (without the program itself) with `path` placed in this
    /// engine's slot.
    pub fn command_line(&self, args: &ArgMap, path: &Path) -> Vec<OsString> {
        splice_path(self.path_slot, args, path)
    }
}

/// The path always comes last; a user-supplied value for the path flag is
/// dropped so the engine reads or writes exactly one file.
pub fn splice_path(slot: PathSlot, args: &ArgMap, path: &Path) -> Vec<OsString> {
    let mut tokens: Vec<OsString> = match slot {
        PathSlot::Flag(flag) => {
            let rest: ArgMap = args
                .iter()
                .filter(|(key, _)| key != flag)
                .cloned()
                .collect();
            let mut tokens: Vec<OsString> = glue_args(&rest).into_iter().map(OsString::from).collect();
            tokens.push(OsString::from(flag));
            tokens
        }
        PathSlot::Trailing => glue_args(args).into_iter().map(OsString::from).collect(),
    };
    tokens.push(path.as_os_str().to_owned());
    tokens
}

#[derive(Debug)]
pub struct ConverterSpec {
    pub engine: EngineSpec,
    /// Extension of the files this converter writes, dot included.
    pub extension: &'static str,
}

/// Supported engines, most preferred first.
#[derive(Debug)]
pub struct Registry {
    pub readers: &'static [EngineSpec],
    pub converters: &'static [ConverterSpec],
}

impl Registry {
    pub fn reader_names(&self) -> Vec<&'static str> {
        self.readers.iter().map(|r| r.name).collect()
    }

    pub fn converter_names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.engine.name).collect()
    }
}

const FFMPEG_DEFAULTS: &[TemplateArg] = &[
    ("-hide_banner", None),
    ("-i", Some("pipe:0")),
    ("-c:a", Some("libvorbis")),
    ("-q:a", Some("1")),
    ("-ac", Some("1")),
    ("-ar", Some("22050")),
    ("-y", None),
];

pub static REGISTRY: Registry = Registry {
    readers: &[
        EngineSpec {
            name: "espeak",
            defaults: &[("-s", Some("195")), ("--stdout", None)],
            path_slot: PathSlot::Flag("-f"),
        },
        EngineSpec {
            name: "festival",
            defaults: &[("--tts", None)],
            path_slot: PathSlot::Trailing,
        },
        EngineSpec {
            name: "flite",
            defaults: &[("-o", Some("/dev/stdout"))],
            path_slot: PathSlot::Flag("-f"),
        },
        EngineSpec {
            name: "mimic",
            defaults: &[("-o", Some("/dev/stdout"))],
            path_slot: PathSlot::Flag("-f"),
        },
    ],
    converters: &[
        ConverterSpec {
            engine: EngineSpec {
                name: "ffmpeg",
                defaults: FFMPEG_DEFAULTS,
                path_slot: PathSlot::Trailing,
            },
            extension: ".ogg",
        },
        ConverterSpec {
            engine: EngineSpec {
                name: "avconv",
                defaults: FFMPEG_DEFAULTS,
                path_slot: PathSlot::Trailing,
            },
            extension: ".ogg",
        },
        ConverterSpec {
            engine: EngineSpec {
                name: "oggenc",
                defaults: &[
                    ("-q", Some("1")),
                    ("--resample", Some("22050")),
                    ("--downmix", None),
                    ("-", None),
                ],
                path_slot: PathSlot::Flag("-o"),
            },
            extension: ".ogg",
        },
        ConverterSpec {
            engine: EngineSpec {
                name: "opusenc",
                defaults: &[
                    ("--bitrate", Some("32")),
                    ("--vbr", None),
                    ("--downmix-mono", None),
                    ("-", None),
                ],
                path_slot: PathSlot::Trailing,
            },
            extension: ".ogg",
        },
        ConverterSpec {
            engine: EngineSpec {
                name: "lame",
                defaults: &[("-V", Some("8")), ("-m", Some("m")), ("-", None)],
                path_slot: PathSlot::Trailing,
            },
            extension: ".mp3",
        },
    ],
};

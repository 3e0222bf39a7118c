use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engines::{ArgMap, ConverterSpec, EngineSpec, Registry};
use crate::error::{EngineKind, SpeakError, SpeakResult};

/// An engine picked for this run, with its executable resolved.
#[derive(Debug)]
pub struct SelectedEngine {
    pub spec: &'static EngineSpec,
    pub path: PathBuf,
    pub args: ArgMap,
}

impl SelectedEngine {
    fn new(spec: &'static EngineSpec, path: PathBuf) -> Self {
        Self {
            spec,
            path,
            args: spec.default_args(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Apply user overrides on top of the defaults.
    pub fn merge_args(&mut self, overrides: &ArgMap) {
        self.args.merge(overrides);
    }

    pub fn command_line(&self, file: &Path) -> Vec<OsString> {
        self.spec.command_line(&self.args, file)
    }
}

#[derive(Debug)]
pub struct SelectedConverter {
    pub engine: SelectedEngine,
    pub extension: &'static str,
}

#[derive(Debug)]
pub struct Selection {
    pub reader: SelectedEngine,
    pub converter: SelectedConverter,
}

/// Looks up executables either on `PATH` or on an explicit search path.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    search_path: Option<OsString>,
}

impl Probe {
    pub fn from_env() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(name, Some(paths.as_os_str()), cwd)
            }
            None => which::which(name),
        };
        found.ok()
    }
}

/// Installed engines in preference order.
#[derive(Debug)]
pub struct Installed {
    pub readers: Vec<(&'static EngineSpec, PathBuf)>,
    pub converters: Vec<(&'static ConverterSpec, PathBuf)>,
}

pub fn installed(registry: &'static Registry, probe: &Probe) -> Installed {
    let readers = registry
        .readers
        .iter()
        .filter_map(|spec| probe.locate(spec.name).map(|path| (spec, path)))
        .collect();
    let converters = registry
        .converters
        .iter()
        .filter_map(|spec| probe.locate(spec.engine.name).map(|path| (spec, path)))
        .collect();
    let found = Installed {
        readers,
        converters,
    };
    debug!(
        readers = ?found.readers.iter().map(|(s, p)| (s.name, p)).collect::<Vec<_>>(),
        converters = ?found.converters.iter().map(|(s, p)| (s.engine.name, p)).collect::<Vec<_>>(),
        "Probed installed engines"
    );
    found
}

/// Pick one reader and one converter, honoring explicit requests.
pub fn select(
    registry: &'static Registry,
    probe: &Probe,
    reader: Option<&str>,
    converter: Option<&str>,
) -> SpeakResult<Selection> {
    let found = installed(registry, probe);

    if found.readers.is_empty() {
        return Err(SpeakError::NoEngineFound {
            kind: EngineKind::Reader,
            supported: registry.reader_names(),
        });
    }
    if found.converters.is_empty() {
        return Err(SpeakError::NoEngineFound {
            kind: EngineKind::Converter,
            supported: registry.converter_names(),
        });
    }

    let (reader_spec, reader_path) =
        pick(found.readers, reader, |spec| spec.name, EngineKind::Reader)?;
    let (converter_spec, converter_path) = pick(
        found.converters,
        converter,
        |spec| spec.engine.name,
        EngineKind::Converter,
    )?;

    debug!(
        reader = reader_spec.name,
        converter = converter_spec.engine.name,
        "Selected engines"
    );

    Ok(Selection {
        reader: SelectedEngine::new(reader_spec, reader_path),
        converter: SelectedConverter {
            engine: SelectedEngine::new(&converter_spec.engine, converter_path),
            extension: converter_spec.extension,
        },
    })
}

fn pick<T>(
    installed: Vec<(&'static T, PathBuf)>,
    requested: Option<&str>,
    name_of: impl Fn(&T) -> &'static str,
    kind: EngineKind,
) -> SpeakResult<(&'static T, PathBuf)> {
    let mut candidates = installed.into_iter();
    let picked = match requested {
        Some(name) => candidates.find(|(spec, _)| name_of(*spec) == name),
        None => candidates.next(),
    };
    picked.ok_or_else(|| SpeakError::UnsupportedEngine {
        kind,
        name: requested.unwrap_or_default().to_string(),
    })
}

/// Render the installed engines for `--list-engines`.
pub fn describe(found: &Installed) -> String {
    let mut out = String::from("Readers:\n");
    if found.readers.is_empty() {
        out.push_str("  (none)\n");
    }
    for (spec, path) in &found.readers {
        out.push_str(&format!("  {:<10}{}\n", spec.name, path.display()));
    }
    out.push_str("Converters:\n");
    if found.converters.is_empty() {
        out.push_str("  (none)\n");
    }
    for (spec, path) in &found.converters {
        out.push_str(&format!(
            "  {:<10}{} ({})\n",
            spec.engine.name,
            path.display(),
            spec.extension
        ));
    }
    out
}

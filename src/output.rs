use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{SpeakError, SpeakResult};
use crate::utils::replace_invalid_chars;

/// Where the user asked the audio to go, split into directory and file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRequest {
    pub dir: Option<PathBuf>,
    pub file: Option<String>,
}

impl OutputRequest {
    /// Split an `--output` value. A value naming an existing directory, or
    /// ending in a separator, is treated as a directory.
    pub fn parse(output: Option<&Path>) -> Self {
        let Some(output) = output else {
            return Self::default();
        };
        let raw = output.as_os_str().to_string_lossy();
        if output.is_dir() || raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) {
            return Self {
                dir: Some(output.to_path_buf()),
                file: None,
            };
        }
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        let file = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self { dir, file }
    }

    /// Checks that can run before any input is read: the directory must exist
    /// and an explicitly named file must not.
    pub fn precheck(&self, overwrite: bool) -> SpeakResult<()> {
        if let Some(dir) = &self.dir {
            if !dir.is_dir() {
                return Err(SpeakError::OutputDirMissing(dir.clone()));
            }
        }
        if let Some(file) = &self.file {
            let path = match &self.dir {
                Some(dir) => dir.join(file),
                None => PathBuf::from(file),
            };
            if !overwrite && path.exists() {
                return Err(SpeakError::OutputExists(path));
            }
        }
        Ok(())
    }

    /// Final absolute output path for a run.
    pub fn resolve(
        &self,
        cwd: &Path,
        title: &str,
        extension: &str,
        overwrite: bool,
    ) -> SpeakResult<PathBuf> {
        let dir = match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };
        debug!("Processed output dir: {}", dir.display());

        let file = match &self.file {
            None => format!("{title}{extension}"),
            Some(file) => replace_invalid_chars(&with_extension(file, extension)),
        };
        debug!("Processed output file: {}", file);

        let target = dir.join(file);
        if !overwrite && target.exists() {
            return Err(SpeakError::OutputExists(target));
        }
        Ok(target)
    }
}

/// Force `file` to carry `extension` (dot included), warning when a different
/// extension had to be replaced.
fn with_extension(file: &str, extension: &str) -> String {
    let expected = extension.trim_start_matches('.');
    let path = Path::new(file);
    match path.extension().and_then(|e| e.to_str()) {
        Some(given) if given == expected => file.to_string(),
        Some(given) if !given.is_empty() => {
            warn!(
                "Given extension: .{} not supported; replacing with {}",
                given, extension
            );
            path.with_extension(expected).to_string_lossy().into_owned()
        }
        _ => format!("{}.{}", file.trim_end_matches('.'), expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_to_cwd_and_title() {
        let cwd = TempDir::new().unwrap();
        let path = OutputRequest::default()
            .resolve(cwd.path(), "My Title", ".ogg", false)
            .unwrap();
        assert_eq!(path, cwd.path().join("My Title.ogg"));
    }

    #[test]
    fn split_dir_and_file() {
        let req = OutputRequest::parse(Some(Path::new("books/ch1.ogg")));
        assert_eq!(req.dir, Some(PathBuf::from("books")));
        assert_eq!(req.file.as_deref(), Some("ch1.ogg"));

        let req = OutputRequest::parse(Some(Path::new("ch1.ogg")));
        assert_eq!(req.dir, None);
        assert_eq!(req.file.as_deref(), Some("ch1.ogg"));
    }

    #[test]
    fn existing_directory_or_trailing_slash_is_a_dir() {
        let tmp = TempDir::new().unwrap();
        let req = OutputRequest::parse(Some(tmp.path()));
        assert_eq!(req.dir.as_deref(), Some(tmp.path()));
        assert_eq!(req.file, None);

        let req = OutputRequest::parse(Some(Path::new("not-yet/")));
        assert_eq!(req.file, None);
    }

    #[test]
    fn relative_dir_is_made_absolute() {
        let cwd = TempDir::new().unwrap();
        let req = OutputRequest {
            dir: Some(PathBuf::from("out")),
            file: Some("a.mp3".into()),
        };
        let path = req.resolve(cwd.path(), "t", ".mp3", false).unwrap();
        assert_eq!(path, cwd.path().join("out").join("a.mp3"));
        assert!(path.is_absolute());
    }

    #[test]
    fn mismatched_extension_is_replaced() {
        assert_eq!(with_extension("talk.mp3", ".ogg"), "talk.ogg");
        assert_eq!(with_extension("my.talk.wav", ".mp3"), "my.talk.mp3");
    }

    #[test]
    fn missing_extension_is_appended() {
        assert_eq!(with_extension("talk", ".ogg"), "talk.ogg");
        assert_eq!(with_extension("talk.", ".ogg"), "talk.ogg");
        assert_eq!(with_extension("talk.ogg", ".ogg"), "talk.ogg");
    }

    #[test]
    fn file_name_is_sanitized() {
        let cwd = TempDir::new().unwrap();
        let req = OutputRequest {
            dir: None,
            file: Some("what?*.ogg".into()),
        };
        let path = req.resolve(cwd.path(), "t", ".ogg", false).unwrap();
        assert_eq!(path, cwd.path().join("what.ogg"));
    }

    #[test]
    fn existing_target_requires_overwrite() {
        let cwd = TempDir::new().unwrap();
        let existing = cwd.path().join("My Title.ogg");
        fs::write(&existing, "keep").unwrap();

        let err = OutputRequest::default()
            .resolve(cwd.path(), "My Title", ".ogg", false)
            .unwrap_err();
        assert!(matches!(err, SpeakError::OutputExists(ref p) if *p == existing));
        assert_eq!(fs::read_to_string(&existing).unwrap(), "keep");

        let path = OutputRequest::default()
            .resolve(cwd.path(), "My Title", ".ogg", true)
            .unwrap();
        assert_eq!(path, existing);
    }

    #[test]
    fn precheck_rejects_missing_dir_and_existing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = OutputRequest {
            dir: Some(tmp.path().join("nope")),
            file: None,
        };
        assert!(matches!(
            missing.precheck(false).unwrap_err(),
            SpeakError::OutputDirMissing(_)
        ));

        fs::write(tmp.path().join("a.ogg"), "x").unwrap();
        let existing = OutputRequest {
            dir: Some(tmp.path().to_path_buf()),
            file: Some("a.ogg".into()),
        };
        assert!(matches!(
            existing.precheck(false).unwrap_err(),
            SpeakError::OutputExists(_)
        ));
        assert!(existing.precheck(true).is_ok());
    }
}

//! Azure CLI executable discovery.
//!
//! `Locator::system()` -> platform install paths, then `which az` / `where az`.
//! The first resolved path is memoized for the life of the `Locator`; the
//! server owns a single instance so that is the life of the process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

/// Install guidance surfaced when no strategy resolves the executable.
pub const INSTALL_HINT: &str = "Azure CLI not found. Please install Azure CLI from: https://aka.ms/installazurecliwindows";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("{hint}")]
    NotFound { hint: String },
}

/// OS "find command on PATH" query, e.g. `which az`.
#[derive(Debug, Clone)]
pub struct SearchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SearchCommand {
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Resolves (once) the absolute path of the external executable.
#[derive(Debug)]
pub struct Locator {
    candidates: Vec<PathBuf>,
    search: Option<SearchCommand>,
    resolved: OnceCell<PathBuf>,
}

impl Locator {
    pub fn new(candidates: Vec<PathBuf>, search: Option<SearchCommand>) -> Self {
        Self {
            candidates,
            search,
            resolved: OnceCell::new(),
        }
    }

    /// Platform defaults for the `az` executable.
    pub fn system() -> Self {
        let (candidates, search): (&[&str], SearchCommand) = if cfg!(windows) {
            (
                &[
                    r"C:\Program Files\Microsoft SDKs\Azure\CLI2\wbin\az.cmd",
                    r"C:\Program Files (x86)\Microsoft SDKs\Azure\CLI2\wbin\az.cmd",
                ],
                SearchCommand::new("where", &["az"]),
            )
        } else if cfg!(target_os = "macos") {
            (
                &["/opt/homebrew/bin/az", "/usr/local/bin/az"],
                SearchCommand::new("which", &["az"]),
            )
        } else {
            (
                &["/usr/bin/az", "/usr/local/bin/az"],
                SearchCommand::new("which", &["az"]),
            )
        };
        Self::new(candidates.iter().map(PathBuf::from).collect(), Some(search))
    }

    /// A locator that only ever considers `path`.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self::new(vec![path.into()], None)
    }

    /// Return the cached path, probing on first use only.
    ///
    /// Concurrent first callers wait on the same initialization; a failed
    /// probe leaves the cell empty so a later call may succeed.
    pub async fn locate(&self) -> Result<&Path, LocateError> {
        self.resolved
            .get_or_try_init(|| self.probe())
            .await
            .map(PathBuf::as_path)
    }

    /// The memoized path, if a probe already succeeded.
    #[cfg(test)]
    pub fn cached(&self) -> Option<&Path> {
        self.resolved.get().map(PathBuf::as_path)
    }

    /// Forget the memoized path. Test builds only; it also needs `&mut`,
    /// which the shared (`Arc`) locator in a running server never hands out.
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.resolved.take();
    }

    async fn probe(&self) -> Result<PathBuf, LocateError> {
        for candidate in &self.candidates {
            if candidate.exists() {
                debug!(path = %candidate.display(), "azure cli found at install location");
                return Ok(candidate.clone());
            }
        }

        if let Some(search) = &self.search {
            match search_first_line(search).await {
                Some(found) => {
                    debug!(path = %found.display(), "azure cli found on PATH");
                    return Ok(found);
                }
                None => debug!(program = %search.program.display(), "PATH search found nothing"),
            }
        }

        Err(LocateError::NotFound {
            hint: INSTALL_HINT.to_string(),
        })
    }
}

async fn search_first_line(search: &SearchCommand) -> Option<PathBuf> {
    let output = Command::new(&search.program)
        .args(&search.args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("az-second");
        std::fs::write(&second, "").unwrap();
        let locator = Locator::new(vec![dir.path().join("missing"), second.clone()], None);
        assert_eq!(locator.locate().await.unwrap(), second.as_path());
    }

    #[tokio::test]
    async fn cached_path_survives_removal() {
        let dir = tempfile::tempdir().unwrap();
        let az = dir.path().join("az");
        std::fs::write(&az, "").unwrap();
        let locator = Locator::fixed(&az);

        let first = locator.locate().await.unwrap().to_path_buf();
        std::fs::remove_file(&az).unwrap();
        // no re-probe: the file is gone but the answer is unchanged
        for _ in 0..3 {
            assert_eq!(locator.locate().await.unwrap(), first.as_path());
        }
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::new(
            vec![dir.path().join("nope")],
            Some(SearchCommand::new(dir.path().join("no-which"), &["az"])),
        );
        let err = locator.locate().await.unwrap_err();
        assert!(err.to_string().contains("Azure CLI not found"));
        assert!(locator.cached().is_none());
    }

    #[tokio::test]
    async fn reset_forces_a_new_probe() {
        let dir = tempfile::tempdir().unwrap();
        let az = dir.path().join("az");
        std::fs::write(&az, "").unwrap();
        let mut locator = Locator::fixed(&az);
        locator.locate().await.unwrap();

        std::fs::remove_file(&az).unwrap();
        locator.reset();
        assert!(locator.locate().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_probes_once() {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let calls = dir.path().join("calls");
        let which = dir.path().join("slow-which");
        std::fs::write(
            &which,
            format!(
                "#!/bin/sh\necho probe >> '{}'\nsleep 0.2\necho /opt/az\n",
                calls.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&which, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = Arc::new(Locator::new(vec![], Some(SearchCommand::new(&which, &["az"]))));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locator = Arc::clone(&locator);
                tokio::spawn(async move { locator.locate().await.map(Path::to_path_buf) })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), Path::new("/opt/az"));
        }
        let probes = std::fs::read_to_string(&calls).unwrap();
        assert_eq!(probes.lines().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn search_fallback_takes_first_line() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let which = dir.path().join("fake-which");
        std::fs::write(&which, "#!/bin/sh\nprintf '/opt/az/bin/az\\n/usr/bin/az\\n'\n").unwrap();
        std::fs::set_permissions(&which, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = Locator::new(vec![], Some(SearchCommand::new(&which, &["az"])));
        assert_eq!(
            locator.locate().await.unwrap(),
            Path::new("/opt/az/bin/az")
        );
    }
}

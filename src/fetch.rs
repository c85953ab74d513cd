use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use suppaftp::FtpStream;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Only remote names ending with this are candidates.
    pub extension: String,
}

/// A remote directory mirrored to one fixed local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub remote_dir: String,
    pub local_path: PathBuf,
}

/// Download the most recent snapshot of `target.remote_dir` over the local
/// file. On any failure the previous local file is left as it was.
/// Returns the remote name that was fetched.
pub fn fetch_latest(settings: &FtpSettings, target: &FetchTarget) -> PipelineResult<String> {
    let ftp_err = |step: &str, e: suppaftp::FtpError| {
        PipelineError::FetchFailure(format!(
            "{} on {}:{}: {}",
            step, settings.host, settings.port, e
        ))
    };

    let mut ftp = FtpStream::connect((settings.host.as_str(), settings.port))
        .map_err(|e| ftp_err("connect", e))?;
    ftp.login(settings.user.as_str(), settings.password.as_str())
        .map_err(|e| ftp_err("login", e))?;
    ftp.cwd(target.remote_dir.as_str())
        .map_err(|e| ftp_err("cwd", e))?;

    let names = ftp.nlst(None).map_err(|e| ftp_err("list", e))?;
    debug!("{} entries in {}", names.len(), target.remote_dir);
    let latest = select_latest(&names, &settings.extension)
        .ok_or_else(|| {
            PipelineError::FetchFailure(format!(
                "no {} file in {}",
                settings.extension, target.remote_dir
            ))
        })?
        .to_string();

    info!("Downloading {} to {}", latest, target.local_path.display());
    let contents = ftp
        .retr_as_buffer(&latest)
        .map_err(|e| ftp_err("download", e))?
        .into_inner();
    ftp.quit().ok();

    replace_atomically(&target.local_path, &contents)?;
    Ok(latest)
}

/// Most recent candidate by name sort, as the snapshot names carry their
/// timestamp.
pub fn select_latest<'a>(names: &'a [String], extension: &str) -> Option<&'a str> {
    names
        .iter()
        .map(|n| n.rsplit('/').next().unwrap_or(n.as_str()))
        .filter(|n| n.ends_with(extension))
        .max()
}

/// Write to a temporary file next to `path` and rename it over `path`.
pub fn replace_atomically(path: &Path, contents: &[u8]) -> PipelineResult<()> {
    let io_err = |error: std::io::Error| PipelineError::Io {
        path: path.display().to_string(),
        error,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn latest_by_name_sort() {
        let list = names(&[
            "gen_20261015.csv",
            "gen_20261016.csv",
            "notes.txt",
            "gen_20261014.csv",
        ]);
        assert_eq!(select_latest(&list, ".csv"), Some("gen_20261016.csv"));
    }

    #[test]
    fn extension_filter_applies_before_sorting() {
        let list = names(&["gen_20261015.csv", "zz_latest.txt"]);
        assert_eq!(select_latest(&list, ".csv"), Some("gen_20261015.csv"));
    }

    #[test]
    fn listed_paths_are_reduced_to_names() {
        let list = names(&["/exports/a.csv", "/exports/b.csv"]);
        assert_eq!(select_latest(&list, ".csv"), Some("b.csv"));
    }

    #[test]
    fn no_candidates() {
        assert_eq!(select_latest(&names(&["readme.md"]), ".csv"), None);
        assert_eq!(select_latest(&[], ".csv"), None);
    }

    #[test]
    fn replace_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("generacion_actual.csv");
        replace_atomically(&path, b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");
        replace_atomically(&path, b"second, longer").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second, longer");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}

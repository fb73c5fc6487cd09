use std::env;
use std::fs;
use std::path::PathBuf;

/// Filesystem layout for everything the backend persists.
///
/// Uploaded source files, per-session index snapshots, chat history and the
/// document snapshot all live under one data directory so that wiping it
/// resets the whole system.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chat_history_dir: PathBuf,
    pub history_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::with_data_dir(discover_data_dir())
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let upload_dir = data_dir.join("uploads");
        let index_dir = data_dir.join("indexes");
        let chat_history_dir = data_dir.join("chat_history");
        let history_path = chat_history_dir.join("history.json");
        let snapshot_path = chat_history_dir.join("session.json");
        let log_dir = data_dir.join("logs");

        for dir in [
            &data_dir,
            &upload_dir,
            &index_dir,
            &chat_history_dir,
            &log_dir,
        ] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            upload_dir,
            index_dir,
            chat_history_dir,
            history_path,
            snapshot_path,
            log_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("DOCUCHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data");
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("DocuChat");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("DocuChat");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("docuchat")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_layout_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(tmp.path().join("docuchat"));

        assert!(paths.upload_dir.is_dir());
        assert!(paths.index_dir.is_dir());
        assert!(paths.chat_history_dir.is_dir());
        assert_eq!(paths.history_path.file_name().unwrap(), "history.json");
        assert_eq!(paths.snapshot_path.file_name().unwrap(), "session.json");
    }
}

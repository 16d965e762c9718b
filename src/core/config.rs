use std::path::{Path, PathBuf};

/// Production endpoint of the agent API.
pub const DEFAULT_API_URL: &str = "https://api.bankr.bot";

const API_URL_ENV: &str = "PUNTER_API_URL";
const DATA_DIR_ENV: &str = "PUNTER_DATA_DIR";

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent API base URL, trailing slashes trimmed.
    pub api_url: String,
    /// Root data directory. Unix default: `~/.punter`.
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var(API_URL_ENV).ok().as_deref(),
            std::env::var(DATA_DIR_ENV).ok().as_deref(),
        )
    }

    fn resolve(api_url: Option<&str>, data_dir: Option<&str>) -> Self {
        let api_url = api_url
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        let data_dir = match data_dir.map(str::trim).filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .expect("Could not find home directory")
                .join(".punter"),
        };

        Self { api_url, data_dir }
    }

    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault.db")
    }

    /// Create the data directory if needed, with owner-only permissions.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        restrict_dir_permissions(&self.data_dir);
        Ok(())
    }
}

/// Set restrictive directory permissions (0o700 on Unix, no-op elsewhere).
pub fn restrict_dir_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Set restrictive file permissions (0o600 on Unix, no-op elsewhere).
pub fn restrict_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    let _ = path;
}

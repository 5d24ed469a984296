use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Startup settings, read once from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads `.env` if present, then reads `IMAGE_STORAGE_DIR`,
    /// `IMAGE_STORE_PORT` and `IMAGE_STORE_MAX_UPLOAD_MB`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let storage_dir = non_empty("IMAGE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_dir);
        let port = non_empty("IMAGE_STORE_PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let max_upload_mb = non_empty("IMAGE_STORE_MAX_UPLOAD_MB")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        Self {
            storage_dir,
            port,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn default_storage_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(mut base) => {
            base.push("image-store");
            base
        }
        None => PathBuf::from("storage"),
    }
}

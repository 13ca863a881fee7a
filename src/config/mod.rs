use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string (e.g., "sqlite://dam-packer.db")
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Directory scanned for operation profile `.txt` files
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: String,

    /// Root under which per-job working directories are created
    #[serde(default = "default_work_root")]
    pub work_root: String,

    /// Seconds the job processor sleeps between empty polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Shared secret expected in the `x-api-key` header on job submission
    pub api_key: String,

    /// Transfer tool binary to invoke for copies and remote checksums
    #[serde(default = "default_rclone_binary")]
    pub rclone_binary: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://dam-packer.db".to_string()
}

fn default_profiles_dir() -> String {
    "profiles".to_string()
}

fn default_work_root() -> String {
    std::env::temp_dir()
        .join("dam-packer")
        .to_string_lossy()
        .into_owned()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_rclone_binary() -> String {
    "rclone".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

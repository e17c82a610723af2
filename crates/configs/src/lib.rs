use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Read-write (master) connection URL.
    pub master_url: String,
    /// Read-only (replica) connection URL; falls back to the master URL.
    #[serde(default)]
    pub replica_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Fill missing URLs from the environment, replica defaulting to master.
    pub fn normalize_from_env(&mut self) {
        if self.master_url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.master_url = url;
            }
        }
        if self.replica_url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_REPLICA_URL") {
                self.replica_url = url;
            }
        }
        if self.replica_url.trim().is_empty() {
            self.replica_url = self.master_url.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.master_url.trim().is_empty() {
            return Err(anyhow!(
                "database.master_url is empty; provide it in config.toml or the DATABASE_URL environment variable"
            ));
        }
        for (name, url) in [("master_url", &self.master_url), ("replica_url", &self.replica_url)] {
            let lower = url.to_lowercase();
            if !(lower.starts_with("postgresql://")
                || lower.starts_with("postgres://")
                || lower.starts_with("sqlite:"))
            {
                return Err(anyhow!("database.{name} must start with postgresql://, postgres:// or sqlite:"));
            }
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive integer seconds"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DatabaseConfig {
        DatabaseConfig {
            master_url: "postgres://localhost/registry".into(),
            replica_url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 3600,
            acquire_timeout_secs: 30,
            sqlx_logging: false,
        }
    }

    #[test]
    fn replica_defaults_to_master() {
        let mut cfg = base();
        cfg.normalize_from_env();
        assert_eq!(cfg.replica_url, cfg.master_url);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_scheme() {
        let mut cfg = base();
        cfg.master_url = "mysql://localhost/x".into();
        cfg.normalize_from_env();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_pool_bounds() {
        let mut cfg = base();
        cfg.min_connections = 5;
        cfg.max_connections = 2;
        cfg.normalize_from_env();
        assert!(cfg.validate().is_err());
    }
}

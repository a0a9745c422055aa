use std::path::{Path, PathBuf};

use madrasa_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_FILES: [&str; 3] = ["config.yml", "config.yaml", "config.toml"];

/// Resolves the config directory and builds an `AppConfig` from the config
/// file, a `.env` file and `MADRASA_*` environment variables.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(default_config_dir);
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// First existing config file in the config directory, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.is_file())
    }

    pub fn load(&self) -> Result<AppConfig> {
        let env_file = self.config_dir.join(".env");
        if env_file.is_file() {
            dotenvy::from_path(&env_file)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", env_file.display())))?;
        } else {
            // A missing .env in the working directory is not an error.
            let _ = dotenvy::dotenv();
        }

        let mut config = match self.config_path() {
            Some(path) => {
                info!("loading config from {}", path.display());
                load_file(&path)?
            }
            None => {
                debug!(
                    "no config file in {}, using defaults",
                    self.config_dir.display()
                );
                AppConfig::default()
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".madrasa")
}

pub fn load_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(&contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

/// Apply `MADRASA_HOST`, `MADRASA_PORT`, `MADRASA_DATABASE_PATH` and
/// `MADRASA_LOG` on top of file values.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("MADRASA_HOST") {
        config.gateway.host = host;
    }
    if let Some(port) = lookup("MADRASA_PORT") {
        config.gateway.port = port
            .parse()
            .map_err(|_| Error::Config(format!("invalid MADRASA_PORT: {port}")))?;
    }
    if let Some(path) = lookup("MADRASA_DATABASE_PATH") {
        config.database.path = Some(PathBuf::from(path));
    }
    if let Some(level) = lookup("MADRASA_LOG") {
        config.log_level = Some(level);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_yaml_config_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yml"),
            "gateway:\n  port: 6000\ndatabase:\n  path: /tmp/school.db\n",
        )
        .unwrap();

        let loader = ConfigLoader::new(Some(dir.path().to_path_buf()));
        let config = load_file(&loader.config_path().unwrap()).unwrap();
        assert_eq!(config.gateway.port, 6000);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/school.db"));
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\n[gateway]\nhost = \"0.0.0.0\"\n").unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(Some(dir.path().to_path_buf()));
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(matches!(load_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MADRASA_HOST", "0.0.0.0"),
                ("MADRASA_PORT", "8081"),
                ("MADRASA_DATABASE_PATH", "/data/prod.db"),
            ]),
        )
        .unwrap();

        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 8081);
        assert_eq!(config.database_path(), PathBuf::from("/data/prod.db"));
    }

    #[test]
    fn invalid_port_override_is_config_error() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("MADRASA_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("MADRASA_PORT"));
    }
}

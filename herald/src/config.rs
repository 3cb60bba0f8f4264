use relay::config::Config as RelayConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "herald".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            sentry_dsn: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::config::BufferMode;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            logging:
                level: debug
                sentry_dsn: https://public@sentry.example.com/1
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            relay:
                listener:
                    host: 0.0.0.0
                    port: 8888
                admin_listener:
                    host: 127.0.0.1
                    port: 8889
                base_path: /user/alice/
                buffer:
                    mode: shared
                    max_pending: 50
                auth:
                    users:
                        - name: alice
                          token: secret
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.common.logging.level, "debug");
        assert_eq!(
            config.common.logging.sentry_dsn.as_deref(),
            Some("https://public@sentry.example.com/1")
        );
        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "herald");

        assert_eq!(config.relay.listener.host, "0.0.0.0");
        assert_eq!(config.relay.admin_listener.as_ref().map(|l| l.port), Some(8889));
        assert_eq!(config.relay.base_path, "/user/alice/");
        assert_eq!(config.relay.buffer.mode, BufferMode::Shared);
        assert_eq!(config.relay.buffer.max_pending, 50);
        assert_eq!(config.relay.auth.users[0].name, "alice");
        assert!(config.relay.validate().is_ok());
    }

    #[test]
    fn minimal_config() {
        let tmp = write_tmp_file("relay: {}\n");
        let config = Config::from_file(tmp.path()).expect("load config");
        assert_eq!(config, Config::default());
        assert_eq!(config.common.logging.level, "info");
        assert!(config.common.metrics.is_none());
    }

    #[test]
    fn bad_config() {
        let tmp = write_tmp_file("relay:\n  buffer:\n    mode: sideways\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/herald.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}

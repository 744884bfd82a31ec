/// 配置管理
///
/// 默认值 -> PROBE_* 环境变量 -> 校验

use common::models::constants::{
    DEFAULT_METHOD_TIMEOUT_SECS, DEFAULT_SERVER_URL, DEFAULT_WORKSPACE,
};
use common::utils::short_id;
use common::{Error, Result};
use serde::Deserialize;
use validator::Validate;

/// 环境变量前缀
const ENV_PREFIX: &str = "PROBE";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(url)]
    pub server_url: String,
    #[validate(length(min = 1))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(range(min = 1, max = 600))]
    pub method_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load(env: config::Environment) -> Result<Self> {
        let cfg: Config = config::Config::builder()
            .set_default("server_url", DEFAULT_SERVER_URL)
            .and_then(|b| b.set_default("workspace", DEFAULT_WORKSPACE))
            .and_then(|b| b.set_default("client_id", format!("rust-probe-client-{}", short_id())))
            .and_then(|b| b.set_default("method_timeout_secs", DEFAULT_METHOD_TIMEOUT_SECS as i64))
            .and_then(|b| b.set_default("log_level", "info"))
            .map_err(config_error)?
            .add_source(env)
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        cfg.validate()
            .map_err(|e| Error::InvalidArgument(format!("配置校验失败: {}", e)))?;
        Ok(cfg)
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::load(env(&[])).unwrap();
        assert_eq!(cfg.server_url, "http://localhost:9527");
        assert_eq!(cfg.workspace, "default");
        assert!(cfg.client_id.starts_with("rust-probe-client-"));
        assert_eq!(cfg.method_timeout_secs, 30);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let cfg = Config::load(env(&[
            ("PROBE_SERVER_URL", "ws://10.0.0.2:9000/ws"),
            ("PROBE_WORKSPACE", "lab"),
            ("PROBE_CLIENT_ID", "probe-7"),
            ("PROBE_METHOD_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.server_url, "ws://10.0.0.2:9000/ws");
        assert_eq!(cfg.workspace, "lab");
        assert_eq!(cfg.client_id, "probe-7");
        assert_eq!(cfg.method_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::load(env(&[("PROBE_SERVER_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = Config::load(env(&[("PROBE_METHOD_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = Config::load(env(&[("PROBE_WORKSPACE", "")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}

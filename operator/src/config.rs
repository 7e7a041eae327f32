use crate::{Error, Result};
use std::time::Duration;

pub const DEFAULT_TENANT_LABEL: &str = "reconciling.io/tenant";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9000";
pub const DEFAULT_REQUEUE_SECONDS: u64 = 900;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespaces carrying this label are tenants
    pub tenant_label: String,
    pub listen_addr: String,
    /// Delay before converging an unchanged tenant again
    pub requeue: Duration,
    /// Log as json lines instead of text
    pub log_json: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            tenant_label: DEFAULT_TENANT_LABEL.to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            requeue: Duration::from_secs(DEFAULT_REQUEUE_SECONDS),
            log_json: false,
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source, unset or empty values keep their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let mut config = Self::default();
        if let Some(label) = get("TENANT_LABEL") {
            config.tenant_label = label;
        }
        if let Some(addr) = get("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(secs) = get("REQUEUE_SECONDS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|_| Error::InvalidConfig("REQUEUE_SECONDS", secs.clone()))?;
            config.requeue = Duration::from_secs(secs);
        }
        if let Some(format) = get("LOG_FORMAT") {
            config.log_json = match format.as_str() {
                "json" => true,
                "text" => false,
                _ => return Err(Error::InvalidConfig("LOG_FORMAT", format)),
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.tenant_label, "reconciling.io/tenant");
        assert_eq!(config.requeue, Duration::from_secs(900));
    }

    #[test]
    fn test_overrides() {
        let config = OperatorConfig::from_lookup(lookup(&[
            ("TENANT_LABEL", "example.org/tenant"),
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("REQUEUE_SECONDS", "60"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.tenant_label, "example.org/tenant");
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.requeue, Duration::from_secs(60));
        assert!(config.log_json);
    }

    #[test]
    fn test_empty_keeps_default() {
        let config = OperatorConfig::from_lookup(lookup(&[("TENANT_LABEL", "")])).unwrap();
        assert_eq!(config.tenant_label, DEFAULT_TENANT_LABEL);
    }

    #[test]
    fn test_invalid_values() {
        let err = OperatorConfig::from_lookup(lookup(&[("REQUEUE_SECONDS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig("REQUEUE_SECONDS", ref v) if v == "soon"));
        assert!(OperatorConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}

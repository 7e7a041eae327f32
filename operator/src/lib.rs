use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reconcile Error: {0}")]
    ReconcilingError(#[from] reconciling::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Missing object key {0}")]
    MissingObjectKey(&'static str),

    #[error("Invalid value {1:?} for {0}")]
    InvalidConfig(&'static str, String),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Logging setup Error: {0}")]
    LoggingError(#[from] tracing_subscriber::util::TryInitError),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[must_use]
    pub fn metric_label(&self) -> String {
        match self {
            Error::ReconcilingError(e) => e.metric_label(),
            Error::KubeError(_) => "kube".to_string(),
            Error::MissingObjectKey(_) => "missing_object_key".to_string(),
            Error::InvalidConfig(_, _) => "invalid_config".to_string(),
            Error::IoError(_) => "io".to_string(),
            Error::LoggingError(_) => "logging".to_string(),
        }
    }

    /// Lost a race with another writer: worth retrying soon
    #[must_use]
    pub fn is_race(&self) -> bool {
        matches!(self, Error::ReconcilingError(e) if e.is_conflict() || e.is_already_exists())
    }
}

pub static OPERATOR: &str = "reconciling-operator";
pub static MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Environment driven settings
pub mod config;
pub use config::OperatorConfig;

/// State machinery for kube, as exposeable to actix
pub mod manager;
pub use manager::Manager;

/// Children converged into every tenant namespace
pub mod tenant;

/// Metrics
mod metrics;
pub use metrics::Metrics;

#[cfg(test)]
mod tests {
    use super::*;
    use reconciling::Identity;

    #[test]
    fn test_races_are_retried_soon() {
        let id = Identity::new("ConfigMap", "tenant-a", "tenant-info");
        assert!(Error::from(reconciling::Error::Conflict(id.clone(), "stale".into())).is_race());
        assert!(Error::from(reconciling::Error::AlreadyExists(id.clone())).is_race());
        assert!(!Error::from(reconciling::Error::NotFound(id)).is_race());
        assert!(!Error::MissingObjectKey(".metadata.uid").is_race());
    }

    #[test]
    fn test_metric_label_from_engine() {
        let id = Identity::new("ConfigMap", "tenant-a", "tenant-info");
        assert_eq!(Error::from(reconciling::Error::Conflict(id, String::new())).metric_label(), "conflict");
        assert_eq!(Error::MissingObjectKey(".metadata.name").metric_label(), "missing_object_key");
    }
}

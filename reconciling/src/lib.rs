//! Declarative convergence of kubernetes objects.
//!
//! A caller describes the desired state of an object as an [`ObjectCreator`]: a pure
//! function receiving the current object (or an empty one) and returning the wanted one.
//! [`ensure_named_object`] fetches the current object, runs the creator, compares the
//! result with what the store holds and only then creates or updates it.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} already exists")]
    AlreadyExists(Identity),

    #[error("Conflict while updating {0}: {1}")]
    Conflict(Identity, String),

    #[error("{0} not found")]
    NotFound(Identity),

    #[error("Failed to generate {0}: {1}")]
    GenerationError(Identity, #[source] Box<Error>),

    #[error("K8s error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cannot convert object to {0}: {1}")]
    ConversionError(String, #[source] serde_json::Error),

    #[error("Error: {0}")]
    Other(String),
}
impl Error {
    #[must_use]
    pub fn metric_label(&self) -> String {
        match self {
            Error::AlreadyExists(_) => "already_exists",
            Error::Conflict(_, _) => "conflict",
            Error::NotFound(_) => "not_found",
            Error::GenerationError(_, _) => "generation",
            Error::KubeError(_) => "kube",
            Error::SerializationError(_) => "serialization",
            Error::ConversionError(_, _) => "conversion",
            Error::Other(_) => "other",
        }
        .to_string()
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_, _))
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod creator;
pub mod dynamic;
pub mod ensure;
pub mod equality;
pub mod identity;
pub mod kinds;
pub mod memstore;
pub mod record;
pub mod store;
pub mod workload;

pub use creator::{NamedCreatorFactory, ObjectCreator, ObjectModifier};
pub use ensure::{Outcome, ensure_named_object, reconcile_named_objects};
pub use equality::{DiffReporter, NoopDiffReporter, TracingDiffReporter};
pub use identity::Identity;
pub use record::{Comparison, Reconcilable};
pub use store::{CachedStore, KubeStore, ObjectStore};

#[cfg(test)]
mod tests {
    use super::*;

    fn ident() -> Identity {
        Identity::new("ConfigMap", "ns1", "cfg")
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Conflict(ident(), "stale".into()).is_conflict());
        assert!(Error::AlreadyExists(ident()).is_already_exists());
        assert!(Error::NotFound(ident()).is_not_found());
        assert!(!Error::Other("boom".into()).is_conflict());
    }

    #[test]
    fn test_error_display_carries_identity() {
        let msg = Error::AlreadyExists(ident()).to_string();
        assert_eq!(msg, "ConfigMap ns1/cfg already exists");
        let msg = Error::GenerationError(ident(), Box::new(Error::Other("no upstream".into()))).to_string();
        assert!(msg.contains("ConfigMap ns1/cfg"));
        assert!(msg.contains("no upstream"));
    }

    #[test]
    fn test_metric_label() {
        assert_eq!(Error::Conflict(ident(), String::new()).metric_label(), "conflict");
        assert_eq!(Error::Other(String::new()).metric_label(), "other");
    }
}

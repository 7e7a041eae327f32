use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// How two objects of a kind are compared before deciding to write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Field by field; missing, `null`, empty collections and empty string members are the same thing
    Semantic,
    /// Both sides serialized with sorted keys and integral floats folded to integers,
    /// then compared byte for byte. For loosely typed payloads.
    Canonical,
}

/// An object kind the engine knows how to converge.
///
/// Implemented for the typed kinds in [`crate::kinds`] and for
/// [`kube::api::DynamicObject`] in [`crate::dynamic`].
pub trait Reconcilable: Resource + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The value handed to a creator when the object does not exist yet
    fn empty(dyntype: &Self::DynamicType) -> Self;

    fn comparison() -> Comparison {
        Comparison::Semantic
    }
}

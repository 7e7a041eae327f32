use kube::Resource;
use std::fmt;

/// Kind, namespace and name of one object in the store.
///
/// The namespace is empty for cluster scoped kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl Identity {
    #[must_use]
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Identity of the object `name` of kind `K` in `namespace`
    #[must_use]
    pub fn of<K: Resource>(dyntype: &K::DynamicType, namespace: &str, name: &str) -> Self {
        Self::new(&K::kind(dyntype), namespace, name)
    }

    /// Identity as read from the metadata of an object
    #[must_use]
    pub fn from_object<K: Resource>(obj: &K, dyntype: &K::DynamicType) -> Self {
        let meta = obj.meta();
        Self::new(
            &K::kind(dyntype),
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default(),
        )
    }

    /// Namespace as expected by the kubernetes API: `None` for cluster scoped objects
    #[must_use]
    pub fn namespace_opt(&self) -> Option<&str> {
        if self.namespace.is_empty() {
            None
        } else {
            Some(self.namespace.as_str())
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
        }
    }
}

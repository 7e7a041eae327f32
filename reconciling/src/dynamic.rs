//! Loosely typed objects and the adapters between them and the typed kinds.
use crate::{Comparison, Error, ObjectCreator, Reconcilable, Result};
use kube::{
    Resource,
    api::{ApiResource, DynamicObject, TypeMeta},
};

impl Reconcilable for DynamicObject {
    fn empty(dyntype: &ApiResource) -> Self {
        DynamicObject::new("", dyntype)
    }

    /// Payloads coming back from the API server may carry numbers with another
    /// representation than the one sent, so compare the canonical form.
    fn comparison() -> Comparison {
        Comparison::Canonical
    }
}

fn type_meta<K: Resource<DynamicType = ()>>() -> TypeMeta {
    TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    }
}

/// Decode a dynamic object as the typed kind `K`.
///
/// # Panics
/// When `obj` is of another kind: handing an object to the adapter of another kind is a
/// wiring bug, not something to recover from.
pub fn narrow<K>(mut obj: DynamicObject) -> Result<K>
where
    K: Reconcilable + Resource<DynamicType = ()>,
{
    let expected = type_meta::<K>();
    let types = obj.types.get_or_insert_with(|| expected.clone());
    assert!(
        types.kind == expected.kind && types.api_version == expected.api_version,
        "{}/{} handed to the {}/{} adapter",
        types.api_version,
        types.kind,
        expected.api_version,
        expected.kind
    );
    let value = serde_json::to_value(&obj)?;
    serde_json::from_value(value).map_err(|e| Error::ConversionError(expected.kind, e))
}

/// Encode a typed object as a dynamic one
pub fn widen<K>(obj: &K) -> Result<DynamicObject>
where
    K: Reconcilable + Resource<DynamicType = ()>,
{
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// Adapter running a typed creator on dynamic objects of the same kind
pub fn erase<K>(creator: ObjectCreator<K>) -> ObjectCreator<DynamicObject>
where
    K: Reconcilable + Resource<DynamicType = ()>,
{
    Box::new(move |existing: DynamicObject| {
        let typed = narrow::<K>(existing)?;
        widen(&creator(typed)?)
    })
}

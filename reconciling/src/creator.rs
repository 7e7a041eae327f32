use crate::{Reconcilable, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Computes the desired object from the current one.
///
/// Receives a private copy of the stored object, or [`Reconcilable::empty`] when it does
/// not exist yet, and may modify it in place. Must be deterministic: the same input
/// always produces the same output, otherwise every reconcile would write.
pub type ObjectCreator<K> = Box<dyn Fn(K) -> Result<K> + Send + Sync>;

/// Wraps a creator with a cross cutting concern
pub type ObjectModifier<K> = Box<dyn Fn(ObjectCreator<K>) -> ObjectCreator<K> + Send + Sync>;

/// Returns the name of the object and the creator for it
pub type NamedCreatorFactory<K> = Box<dyn Fn() -> (String, ObjectCreator<K>) + Send + Sync>;

/// Apply `modifiers` to `creator` in order: the last one runs last on the result
pub fn apply_modifiers<K: Reconcilable>(creator: ObjectCreator<K>, modifiers: &[ObjectModifier<K>]) -> ObjectCreator<K> {
    modifiers.iter().fold(creator, |c, modifier| modifier(c))
}

/// Force the name of the created object
pub fn with_name<K: Reconcilable>(name: &str) -> ObjectModifier<K> {
    let name = name.to_string();
    Box::new(move |create: ObjectCreator<K>| -> ObjectCreator<K> {
        let name = name.clone();
        Box::new(move |existing: K| {
            let mut obj = create(existing)?;
            obj.meta_mut().name = Some(name.clone());
            Ok(obj)
        })
    })
}

/// Force the namespace of the created object. An empty namespace clears it.
pub fn with_namespace<K: Reconcilable>(namespace: &str) -> ObjectModifier<K> {
    let namespace = if namespace.is_empty() {
        None
    } else {
        Some(namespace.to_string())
    };
    Box::new(move |create: ObjectCreator<K>| -> ObjectCreator<K> {
        let namespace = namespace.clone();
        Box::new(move |existing: K| {
            let mut obj = create(existing)?;
            obj.meta_mut().namespace = namespace.clone();
            Ok(obj)
        })
    })
}

/// Replace the owner references of the created object with `owner`.
///
/// Runs after the wrapped creator so the creator cannot drop the reference: deleting the
/// owner then garbage collects the object.
pub fn owner_ref_wrapper<K: Reconcilable>(owner: OwnerReference) -> ObjectModifier<K> {
    Box::new(move |create: ObjectCreator<K>| -> ObjectCreator<K> {
        let owner = owner.clone();
        Box::new(move |existing: K| {
            let mut obj = create(existing)?;
            obj.meta_mut().owner_references = Some(vec![owner.clone()]);
            Ok(obj)
        })
    })
}

/// Ownership modifier pointing to `parent` as controller.
/// `None` until the parent has been stored and got a uid.
pub fn controller_owner<P, K>(parent: &P) -> Option<ObjectModifier<K>>
where
    P: Resource<DynamicType = ()>,
    K: Reconcilable,
{
    parent.controller_owner_ref(&()).map(owner_ref_wrapper)
}

/// Merge `labels` into the labels of the created object, overriding same keys
pub fn labels_wrapper<K: Reconcilable>(labels: BTreeMap<String, String>) -> ObjectModifier<K> {
    Box::new(move |create: ObjectCreator<K>| -> ObjectCreator<K> {
        let labels = labels.clone();
        Box::new(move |existing: K| {
            let mut obj = create(existing)?;
            obj.labels_mut().extend(labels.clone());
            Ok(obj)
        })
    })
}

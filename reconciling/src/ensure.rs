use crate::{
    DiffReporter, Error, Identity, NamedCreatorFactory, ObjectCreator, ObjectModifier, ObjectStore,
    Reconcilable, Result,
    creator::{apply_modifiers, with_name, with_namespace},
    equality::objects_equal,
};
use tracing::{debug, info, warn};

/// What [`ensure_named_object`] did to the store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        }
    }

    /// Whether a write was issued
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

/// Converge the object at `identity` toward what `creator` computes.
///
/// Namespace and name are forced from `identity` on the creator result. When the object
/// is absent the creator gets [`Reconcilable::empty`] and the result is created; when it
/// exists the creator gets a copy and the result is only written if it differs from the
/// stored object. Store errors are returned unchanged: nothing here retries.
pub async fn ensure_named_object<K, S>(
    identity: &Identity,
    creator: ObjectCreator<K>,
    store: &S,
    reporter: &dyn DiffReporter,
) -> Result<Outcome>
where
    K: Reconcilable,
    S: ObjectStore<K> + ?Sized,
{
    let create = with_name(&identity.name)(with_namespace(&identity.namespace)(creator));
    let generate = |current: K| create(current).map_err(|e| Error::GenerationError(identity.clone(), Box::new(e)));

    match store.get(identity).await? {
        None => {
            let desired = generate(K::empty(store.dyntype()))?;
            store.create(&desired).await?;
            info!("Created {identity}");
            Ok(Outcome::Created)
        }
        Some(existing) => {
            let desired = generate(existing.clone())?;
            if objects_equal(&desired, &existing, identity, reporter) {
                debug!("{identity} is up to date");
                return Ok(Outcome::Unchanged);
            }
            store.update(&desired).await?;
            info!("Updated {identity}");
            Ok(Outcome::Updated)
        }
    }
}

/// Ensure every object produced by `factories` in `namespace`.
///
/// Each creator is scoped to `namespace` and its factory name, then wrapped with
/// `modifiers` in order. Stops at the first failure and returns it as is.
pub async fn reconcile_named_objects<K, S>(
    factories: &[NamedCreatorFactory<K>],
    namespace: &str,
    store: &S,
    reporter: &dyn DiffReporter,
    modifiers: &[ObjectModifier<K>],
) -> Result<Vec<Outcome>>
where
    K: Reconcilable,
    S: ObjectStore<K> + ?Sized,
{
    reconcile_with_defaults(factories, namespace, store, reporter, &[], modifiers).await
}

/// Same as [`reconcile_named_objects`] with kind `defaults` applied first, right on the
/// factory creator.
pub(crate) async fn reconcile_with_defaults<K, S>(
    factories: &[NamedCreatorFactory<K>],
    namespace: &str,
    store: &S,
    reporter: &dyn DiffReporter,
    defaults: &[ObjectModifier<K>],
    modifiers: &[ObjectModifier<K>],
) -> Result<Vec<Outcome>>
where
    K: Reconcilable,
    S: ObjectStore<K> + ?Sized,
{
    let mut outcomes = Vec::with_capacity(factories.len());
    for factory in factories {
        let (name, create) = factory();
        let identity = Identity::of::<K>(store.dyntype(), namespace, &name);
        let create = apply_modifiers(create, defaults);
        let create = with_name(&name)(with_namespace(namespace)(create));
        let create = apply_modifiers(create, modifiers);
        match ensure_named_object(&identity, create, store, reporter).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!("Failed to ensure {identity}: {e}");
                return Err(e);
            }
        }
    }
    Ok(outcomes)
}

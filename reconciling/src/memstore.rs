//! In-memory object store.
//!
//! Behaves like the API server on the points the engine relies on: resource versions
//! bump on every write, stale updates fail with a conflict and duplicate creates with
//! already-exists. Counts calls so tests can assert on the writes performed.
use crate::{Error, Identity, ObjectStore, Reconcilable, Result};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Store call that can be armed to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Get,
    Create,
    Update,
}

type Failure = Box<dyn FnOnce(&Identity) -> Error + Send>;

struct State<K> {
    objects: BTreeMap<(String, String), K>,
    version: u64,
    gets: usize,
    creates: usize,
    updates: usize,
    armed: Vec<(Operation, Failure)>,
}

pub struct MemoryStore<K: Reconcilable> {
    dyntype: K::DynamicType,
    state: Mutex<State<K>>,
}

impl<K: Reconcilable<DynamicType = ()>> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new_with(())
    }
}

impl<K: Reconcilable> MemoryStore<K> {
    #[must_use]
    pub fn new_with(dyntype: K::DynamicType) -> Self {
        Self {
            dyntype,
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                version: 0,
                gets: 0,
                creates: 0,
                updates: 0,
                armed: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(obj: &K) -> (String, String) {
        let meta = obj.meta();
        (
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    /// Write `obj` directly, as another client would, bumping its resource version.
    /// Not counted as a call.
    pub fn put(&self, mut obj: K) -> K {
        let mut state = self.state();
        state.version += 1;
        obj.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(Self::key(&obj), obj.clone());
        obj
    }

    /// Stored object, if any
    #[must_use]
    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.state()
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Make the next `operation` fail with the error built by `failure`
    pub fn arm<F>(&self, operation: Operation, failure: F)
    where
        F: FnOnce(&Identity) -> Error + Send + 'static,
    {
        self.state().armed.push((operation, Box::new(failure)));
    }

    fn take_armed(state: &mut State<K>, operation: Operation) -> Option<Failure> {
        let pos = state.armed.iter().position(|(op, _)| *op == operation)?;
        Some(state.armed.remove(pos).1)
    }

    #[must_use]
    pub fn gets(&self) -> usize {
        self.state().gets
    }

    #[must_use]
    pub fn creates(&self) -> usize {
        self.state().creates
    }

    #[must_use]
    pub fn updates(&self) -> usize {
        self.state().updates
    }

    /// Creates and updates so far
    #[must_use]
    pub fn writes(&self) -> usize {
        let state = self.state();
        state.creates + state.updates
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Reconcilable,
    K::DynamicType: Send + Sync,
{
    fn dyntype(&self) -> &K::DynamicType {
        &self.dyntype
    }

    async fn get(&self, identity: &Identity) -> Result<Option<K>> {
        let mut state = self.state();
        state.gets += 1;
        if let Some(failure) = Self::take_armed(&mut state, Operation::Get) {
            return Err(failure(identity));
        }
        Ok(state
            .objects
            .get(&(identity.namespace.clone(), identity.name.clone()))
            .cloned())
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let identity = Identity::from_object(obj, &self.dyntype);
        let mut state = self.state();
        state.creates += 1;
        if let Some(failure) = Self::take_armed(&mut state, Operation::Create) {
            return Err(failure(&identity));
        }
        let key = Self::key(obj);
        if state.objects.contains_key(&key) {
            return Err(Error::AlreadyExists(identity));
        }
        state.version += 1;
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let identity = Identity::from_object(obj, &self.dyntype);
        let mut state = self.state();
        state.updates += 1;
        if let Some(failure) = Self::take_armed(&mut state, Operation::Update) {
            return Err(failure(&identity));
        }
        let key = Self::key(obj);
        let current = match state.objects.get(&key) {
            Some(current) => current.meta().resource_version.clone(),
            None => return Err(Error::NotFound(identity)),
        };
        let wanted = obj.meta().resource_version.clone();
        if wanted.is_some() && wanted != current {
            return Err(Error::Conflict(
                identity,
                format!(
                    "the object has been modified (version {} instead of {})",
                    current.unwrap_or_default(),
                    wanted.unwrap_or_default()
                ),
            ));
        }
        state.version += 1;
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(state.version.to_string());
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

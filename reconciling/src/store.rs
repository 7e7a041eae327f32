use crate::{Error, Identity, Reconcilable, Result};
use async_trait::async_trait;
use kube::{
    Client,
    api::{GetParams, PostParams},
    core::Request,
    runtime::reflector::{ObjectRef, Store},
};
use std::hash::Hash;

/// The object store the engine converges against.
///
/// `get` maps "not found" to `None`; `create` fails with [`Error::AlreadyExists`] when
/// another writer won the race and `update` with [`Error::Conflict`] on a stale resource
/// version. No implementation retries.
#[async_trait]
pub trait ObjectStore<K: Reconcilable>: Send + Sync {
    fn dyntype(&self) -> &K::DynamicType;
    async fn get(&self, identity: &Identity) -> Result<Option<K>>;
    async fn create(&self, obj: &K) -> Result<K>;
    async fn update(&self, obj: &K) -> Result<K>;
}

/// Turn an API error into the engine error taxonomy
pub(crate) fn classify(e: kube::Error, identity: &Identity) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => Error::NotFound(identity.clone()),
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            Error::AlreadyExists(identity.clone())
        }
        kube::Error::Api(ae) if ae.code == 409 => Error::Conflict(identity.clone(), ae.message),
        e => Error::KubeError(e),
    }
}

// ── API server ────────────────────────────────────────────────────────────────

/// Store talking to the API server.
///
/// Builds raw requests from the resource url so the same code serves namespaced,
/// cluster scoped and dynamic kinds.
pub struct KubeStore<K: Reconcilable> {
    client: Client,
    dyntype: K::DynamicType,
}

impl<K: Reconcilable<DynamicType = ()>> KubeStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client, dyntype: () }
    }
}

impl<K: Reconcilable> KubeStore<K> {
    /// Store for a kind known only at runtime (ie: a `DynamicObject` with its `ApiResource`)
    #[must_use]
    pub fn new_with(client: Client, dyntype: K::DynamicType) -> Self {
        Self { client, dyntype }
    }

    fn request(&self, namespace: Option<&str>) -> Request {
        Request::new(K::url_path(&self.dyntype, namespace))
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Reconcilable,
    K::DynamicType: Send + Sync,
{
    fn dyntype(&self) -> &K::DynamicType {
        &self.dyntype
    }

    async fn get(&self, identity: &Identity) -> Result<Option<K>> {
        let req = self
            .request(identity.namespace_opt())
            .get(&identity.name, &GetParams::default())
            .map_err(kube::Error::BuildRequest)?;
        match self.client.request::<K>(req).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let identity = Identity::from_object(obj, &self.dyntype);
        let req = self
            .request(identity.namespace_opt())
            .create(&PostParams::default(), serde_json::to_vec(obj)?)
            .map_err(kube::Error::BuildRequest)?;
        self.client
            .request::<K>(req)
            .await
            .map_err(|e| classify(e, &identity))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let identity = Identity::from_object(obj, &self.dyntype);
        let req = self
            .request(identity.namespace_opt())
            .replace(&identity.name, &PostParams::default(), serde_json::to_vec(obj)?)
            .map_err(kube::Error::BuildRequest)?;
        self.client
            .request::<K>(req)
            .await
            .map_err(|e| classify(e, &identity))
    }
}

// ── Informer cache ────────────────────────────────────────────────────────────

/// Reads from a reflector cache, writes to the API server.
///
/// The cache may lag behind: a stale read ends in a conflict on update, which the
/// caller handles like any other conflict. The cache may also watch a subset of the
/// kind (ie: behind a label selector), so a miss is read again from `writer` before
/// the engine decides to create.
pub struct CachedStore<K, W = KubeStore<K>>
where
    K: Reconcilable,
    K::DynamicType: Eq + Hash + Clone,
{
    reader: Store<K>,
    writer: W,
}

impl<K, W> CachedStore<K, W>
where
    K: Reconcilable,
    K::DynamicType: Eq + Hash + Clone,
    W: ObjectStore<K>,
{
    #[must_use]
    pub fn new(reader: Store<K>, writer: W) -> Self {
        Self { reader, writer }
    }
}

#[async_trait]
impl<K, W> ObjectStore<K> for CachedStore<K, W>
where
    K: Reconcilable,
    K::DynamicType: Eq + Hash + Clone + Send + Sync,
    W: ObjectStore<K>,
{
    fn dyntype(&self) -> &K::DynamicType {
        self.writer.dyntype()
    }

    async fn get(&self, identity: &Identity) -> Result<Option<K>> {
        let mut key = ObjectRef::<K>::new_with(&identity.name, self.writer.dyntype().clone());
        if let Some(ns) = identity.namespace_opt() {
            key = key.within(ns);
        }
        if let Some(obj) = self.reader.get(&key) {
            return Ok(Some((*obj).clone()));
        }
        self.writer.get(identity).await
    }

    async fn create(&self, obj: &K) -> Result<K> {
        self.writer.create(obj).await
    }

    async fn update(&self, obj: &K) -> Result<K> {
        self.writer.update(obj).await
    }
}

use crate::{Error, MANAGED_BY_LABEL, Metrics, OPERATOR, OperatorConfig, Result, tenant};
use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use k8s_openapi::api::{
    core::v1::{ConfigMap, Namespace, ServiceAccount},
    rbac::v1::RoleBinding,
};
use kube::{
    api::Api,
    client::Client,
    runtime::{
        WatchStreamExt,
        controller::Controller,
        reflector::{self, Store, reflector},
        watcher::{self, watcher},
    },
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Settings read at startup
    pub config: OperatorConfig,
    /// Cache of the config maps this operator manages
    pub config_maps: Store<ConfigMap>,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub last_namespace: String,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            last_namespace: String::new(),
        }
    }
}

/// Data owned by the Manager
#[derive(Clone, Default)]
pub struct Manager {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry shared with the reconciler
    metrics: Metrics,
}

fn managed_children() -> watcher::Config {
    watcher::Config::default().labels(&format!("{MANAGED_BY_LABEL}={OPERATOR}"))
}

/// Manager that owns a Controller for tenant namespaces
impl Manager {
    /// Lifecycle initialization interface for app
    ///
    /// This returns a `Manager` that drives a `Controller` + the future feeding the
    /// config map cache. It is up to `main` to wait for both.
    pub async fn new(config: OperatorConfig) -> Result<(Self, BoxFuture<'static, ()>, BoxFuture<'static, ()>)> {
        let client = Client::try_default().await.map_err(Error::KubeError)?;
        let manager = Manager::default();

        let config_maps = Api::<ConfigMap>::all(client.clone());
        let (reader, writer) = reflector::store();
        let cache = reflector(writer, watcher(config_maps.clone(), managed_children()))
            .default_backoff()
            .touched_objects()
            .for_each(|_| futures::future::ready(()))
            .boxed();

        let tenants = Api::<Namespace>::all(client.clone());
        let tenant_selector = watcher::Config::default().labels(&config.tenant_label);
        let context = Arc::new(Context {
            client: client.clone(),
            config,
            config_maps: reader,
            diagnostics: manager.diagnostics.clone(),
            metrics: manager.metrics.clone(),
        });

        let controller = Controller::new(tenants, tenant_selector)
            .owns(config_maps, managed_children())
            .owns(Api::<ServiceAccount>::all(client.clone()), managed_children())
            .owns(Api::<RoleBinding>::all(client), managed_children())
            .shutdown_on_signal()
            .run(tenant::reconcile, tenant::error_policy, context)
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        Ok((manager, controller, cache))
    }

    /// Metrics getter
    #[must_use]
    pub fn metrics(&self) -> String {
        self.metrics.encode()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }
}

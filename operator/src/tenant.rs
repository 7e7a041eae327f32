use crate::{Error, MANAGED_BY_LABEL, OPERATOR, Result, manager::Context};
use chrono::Utc;
use k8s_openapi::api::{
    core::v1::{ConfigMap, Namespace, ServiceAccount},
    rbac::v1::{RoleBinding, RoleRef, Subject},
};
use kube::{ResourceExt, runtime::controller::Action};
use reconciling::{
    CachedStore, DiffReporter, KubeStore, ObjectModifier, ObjectStore, Outcome, Reconcilable,
    TracingDiffReporter,
    creator::{controller_owner, labels_wrapper},
    kinds::{
        ConfigMapCreator, NamedConfigMapCreatorFactory, NamedRoleBindingCreatorFactory,
        NamedServiceAccountCreatorFactory, RoleBindingCreator, ServiceAccountCreator, reconcile_config_maps,
        reconcile_role_bindings, reconcile_service_accounts,
    },
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::time::Duration;
use tracing::{info, instrument, warn};

pub const INFO_CONFIG_MAP: &str = "tenant-info";
pub const ADMIN_ACCOUNT: &str = "tenant-admin";
pub const ADMIN_CLUSTER_ROLE: &str = "admin";

// ── Desired state ─────────────────────────────────────────────────────────────

fn tenant_info(tenant: &str, namespace: &str) -> NamedConfigMapCreatorFactory {
    let tenant = tenant.to_string();
    let namespace = namespace.to_string();
    Box::new(move || {
        let tenant = tenant.clone();
        let namespace = namespace.clone();
        let create: ConfigMapCreator = Box::new(move |mut cm: ConfigMap| {
            cm.data = Some(BTreeMap::from([
                ("tenant".to_string(), tenant.clone()),
                ("namespace".to_string(), namespace.clone()),
            ]));
            Ok(cm)
        });
        (INFO_CONFIG_MAP.to_string(), create)
    })
}

fn admin_account() -> NamedServiceAccountCreatorFactory {
    Box::new(|| {
        let create: ServiceAccountCreator = Box::new(|mut sa: ServiceAccount| {
            sa.automount_service_account_token = Some(false);
            Ok(sa)
        });
        (ADMIN_ACCOUNT.to_string(), create)
    })
}

fn admin_binding(namespace: &str) -> NamedRoleBindingCreatorFactory {
    let namespace = namespace.to_string();
    Box::new(move || {
        let namespace = namespace.clone();
        let create: RoleBindingCreator = Box::new(move |mut rb: RoleBinding| {
            rb.role_ref = RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: ADMIN_CLUSTER_ROLE.to_string(),
            };
            rb.subjects = Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: ADMIN_ACCOUNT.to_string(),
                namespace: Some(namespace.clone()),
                ..Subject::default()
            }]);
            Ok(rb)
        });
        (ADMIN_ACCOUNT.to_string(), create)
    })
}

// ── Convergence ───────────────────────────────────────────────────────────────

/// Where each child kind is read and written
pub struct Stores<'a> {
    pub config_maps: &'a dyn ObjectStore<ConfigMap>,
    pub service_accounts: &'a dyn ObjectStore<ServiceAccount>,
    pub role_bindings: &'a dyn ObjectStore<RoleBinding>,
}

fn modifiers<K: Reconcilable>(ns: &Namespace, labels: &BTreeMap<String, String>) -> Result<Vec<ObjectModifier<K>>> {
    let owner = controller_owner(ns).ok_or(Error::MissingObjectKey(".metadata.uid"))?;
    Ok(vec![owner, labels_wrapper(labels.clone())])
}

/// Converge the children of the tenant namespace `ns`, returning the outcomes per kind
pub async fn converge(
    ns: &Namespace,
    tenant_label: &str,
    stores: &Stores<'_>,
    reporter: &dyn DiffReporter,
) -> Result<Vec<(&'static str, Vec<Outcome>)>> {
    let name = ns.metadata.name.clone().ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let tenant = ns.labels().get(tenant_label).cloned().unwrap_or_default();
    let labels = BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), OPERATOR.to_string()),
        (tenant_label.to_string(), tenant.clone()),
    ]);

    let config_maps = reconcile_config_maps(
        &[tenant_info(&tenant, &name)],
        &name,
        stores.config_maps,
        reporter,
        &modifiers(ns, &labels)?,
    )
    .await?;
    let service_accounts = reconcile_service_accounts(
        &[admin_account()],
        &name,
        stores.service_accounts,
        reporter,
        &modifiers(ns, &labels)?,
    )
    .await?;
    let role_bindings = reconcile_role_bindings(
        &[admin_binding(&name)],
        &name,
        stores.role_bindings,
        reporter,
        &modifiers(ns, &labels)?,
    )
    .await?;
    Ok(vec![
        ("ConfigMap", config_maps),
        ("ServiceAccount", service_accounts),
        ("RoleBinding", role_bindings),
    ])
}

// ── Controller entry points ───────────────────────────────────────────────────

#[instrument(skip(ctx, ns), fields(namespace = %ns.name_any()))]
pub async fn reconcile(ns: Arc<Namespace>, ctx: Arc<Context>) -> Result<Action> {
    let _measure = ctx.metrics.tenant.count_and_measure();
    {
        let mut diagnostics = ctx.diagnostics.write().await;
        diagnostics.last_event = Utc::now();
        diagnostics.last_namespace = ns.name_any();
    }
    if ns.metadata.deletion_timestamp.is_some() {
        // children go away with the namespace
        return Ok(Action::await_change());
    }

    let config_maps = CachedStore::new(ctx.config_maps.clone(), KubeStore::<ConfigMap>::new(ctx.client.clone()));
    let service_accounts = KubeStore::<ServiceAccount>::new(ctx.client.clone());
    let role_bindings = KubeStore::<RoleBinding>::new(ctx.client.clone());
    let stores = Stores {
        config_maps: &config_maps,
        service_accounts: &service_accounts,
        role_bindings: &role_bindings,
    };

    let converged = converge(&ns, &ctx.config.tenant_label, &stores, &TracingDiffReporter).await?;
    let mut writes = 0;
    for (kind, outcomes) in &converged {
        ctx.metrics.tenant.converged(kind, outcomes);
        writes += outcomes.iter().filter(|o| o.changed()).count();
    }
    if writes > 0 {
        info!("Converged tenant namespace {} with {writes} writes", ns.name_any());
    }
    Ok(Action::requeue(ctx.config.requeue))
}

#[must_use]
pub fn error_policy(ns: Arc<Namespace>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed for Namespace '{}': {:?}", ns.name_any(), error);
    ctx.metrics.tenant.reconcile_failure(&ns, error);
    if error.is_race() {
        Action::requeue(Duration::from_secs(5))
    } else {
        Action::requeue(Duration::from_secs(5 * 60))
    }
}

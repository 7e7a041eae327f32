//! Typed kinds the engine converges, with their creator aliases and batch functions.
use crate::{
    DiffReporter, NamedCreatorFactory, ObjectCreator, ObjectModifier, ObjectStore, Outcome, Reconcilable,
    Result,
    ensure::reconcile_with_defaults,
    reconcile_named_objects,
    workload::{default_deployment_wrapper, default_pod_spec_wrapper},
};
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, StatefulSet},
        batch::v1::{CronJob, Job},
        core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount},
        networking::v1::NetworkPolicy,
        policy::v1::PodDisruptionBudget,
        rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
};

macro_rules! reconcilable {
    (@kind $kind:ty, $creator:ident, $factory:ident) => {
        impl Reconcilable for $kind {
            fn empty(_: &()) -> Self {
                Self::default()
            }
        }

        pub type $creator = ObjectCreator<$kind>;
        pub type $factory = NamedCreatorFactory<$kind>;
    };
    ($kind:ty, $creator:ident, $factory:ident, $reconcile:ident, $($default:expr),+) => {
        reconcilable!(@kind $kind, $creator, $factory);

        #[doc = concat!("Ensure every ", stringify!($kind), " produced by `factories` in `namespace`, server side defaults applied")]
        pub async fn $reconcile<S: ObjectStore<$kind> + ?Sized>(
            factories: &[$factory],
            namespace: &str,
            store: &S,
            reporter: &dyn DiffReporter,
            modifiers: &[ObjectModifier<$kind>],
        ) -> Result<Vec<Outcome>> {
            let defaults: Vec<ObjectModifier<$kind>> = vec![$($default),+];
            reconcile_with_defaults(factories, namespace, store, reporter, &defaults, modifiers).await
        }
    };
    ($kind:ty, $creator:ident, $factory:ident, $reconcile:ident) => {
        reconcilable!(@kind $kind, $creator, $factory);

        #[doc = concat!("Ensure every ", stringify!($kind), " produced by `factories` in `namespace`")]
        pub async fn $reconcile<S: ObjectStore<$kind> + ?Sized>(
            factories: &[$factory],
            namespace: &str,
            store: &S,
            reporter: &dyn DiffReporter,
            modifiers: &[ObjectModifier<$kind>],
        ) -> Result<Vec<Outcome>> {
            reconcile_named_objects(factories, namespace, store, reporter, modifiers).await
        }
    };
}

reconcilable!(ConfigMap, ConfigMapCreator, NamedConfigMapCreatorFactory, reconcile_config_maps);
reconcilable!(Secret, SecretCreator, NamedSecretCreatorFactory, reconcile_secrets);
reconcilable!(Service, ServiceCreator, NamedServiceCreatorFactory, reconcile_services);
reconcilable!(
    ServiceAccount,
    ServiceAccountCreator,
    NamedServiceAccountCreatorFactory,
    reconcile_service_accounts
);
reconcilable!(Namespace, NamespaceCreator, NamedNamespaceCreatorFactory, reconcile_namespaces);
reconcilable!(Role, RoleCreator, NamedRoleCreatorFactory, reconcile_roles);
reconcilable!(RoleBinding, RoleBindingCreator, NamedRoleBindingCreatorFactory, reconcile_role_bindings);
reconcilable!(ClusterRole, ClusterRoleCreator, NamedClusterRoleCreatorFactory, reconcile_cluster_roles);
reconcilable!(
    ClusterRoleBinding,
    ClusterRoleBindingCreator,
    NamedClusterRoleBindingCreatorFactory,
    reconcile_cluster_role_bindings
);
reconcilable!(
    Deployment,
    DeploymentCreator,
    NamedDeploymentCreatorFactory,
    reconcile_deployments,
    default_deployment_wrapper()
);
reconcilable!(
    StatefulSet,
    StatefulSetCreator,
    NamedStatefulSetCreatorFactory,
    reconcile_stateful_sets,
    default_pod_spec_wrapper()
);
reconcilable!(
    DaemonSet,
    DaemonSetCreator,
    NamedDaemonSetCreatorFactory,
    reconcile_daemon_sets,
    default_pod_spec_wrapper()
);
reconcilable!(Job, JobCreator, NamedJobCreatorFactory, reconcile_jobs, default_pod_spec_wrapper());
reconcilable!(
    CronJob,
    CronJobCreator,
    NamedCronJobCreatorFactory,
    reconcile_cron_jobs,
    default_pod_spec_wrapper()
);
reconcilable!(
    PodDisruptionBudget,
    PodDisruptionBudgetCreator,
    NamedPodDisruptionBudgetCreatorFactory,
    reconcile_pod_disruption_budgets
);
reconcilable!(
    NetworkPolicy,
    NetworkPolicyCreator,
    NamedNetworkPolicyCreatorFactory,
    reconcile_network_policies
);
reconcilable!(
    CustomResourceDefinition,
    CustomResourceDefinitionCreator,
    NamedCustomResourceDefinitionCreatorFactory,
    reconcile_custom_resource_definitions
);

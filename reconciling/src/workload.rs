//! Default-value modifiers for pod templated kinds.
//!
//! The API server fills defaults on everything it stores. A creator that leaves those
//! fields unset would then differ from the stored object on every run, so the same
//! defaults are applied here before comparing.
use crate::{ObjectCreator, ObjectModifier, Reconcilable};
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment, StatefulSet},
        batch::v1::{CronJob, Job, JobSpec},
        core::v1::{Container, LocalObjectReference, PodSpec},
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
use std::collections::BTreeMap;

pub const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";
pub const DEFAULT_TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
pub const DEFAULT_TERMINATION_MESSAGE_POLICY: &str = "File";
/// 0644
pub const DEFAULT_VOLUME_MODE: i32 = 0o644;

/// Kinds embedding a pod template
pub trait PodTemplated {
    fn pod_spec(&self) -> Option<&PodSpec>;
    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec>;
    /// Pod spec, created empty along with any missing parent
    fn pod_spec_entry(&mut self) -> &mut PodSpec;
}

macro_rules! pod_templated {
    ($kind:ty) => {
        impl PodTemplated for $kind {
            fn pod_spec(&self) -> Option<&PodSpec> {
                self.spec.as_ref()?.template.spec.as_ref()
            }

            fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
                self.spec.as_mut()?.template.spec.as_mut()
            }

            fn pod_spec_entry(&mut self) -> &mut PodSpec {
                self.spec
                    .get_or_insert_with(Default::default)
                    .template
                    .spec
                    .get_or_insert_with(PodSpec::default)
            }
        }
    };
}
pod_templated!(Deployment);
pod_templated!(StatefulSet);
pod_templated!(DaemonSet);
pod_templated!(Job);

impl PodTemplated for CronJob {
    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref()?.job_template.spec.as_ref()?.template.spec.as_ref()
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.as_mut()?.job_template.spec.as_mut()?.template.spec.as_mut()
    }

    fn pod_spec_entry(&mut self) -> &mut PodSpec {
        self.spec
            .get_or_insert_with(Default::default)
            .job_template
            .spec
            .get_or_insert_with(JobSpec::default)
            .template
            .spec
            .get_or_insert_with(PodSpec::default)
    }
}

// ── Pod spec ──────────────────────────────────────────────────────────────────

/// Fields only the platform may set, kept by container name across creator runs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Retained {
    containers: BTreeMap<String, Option<String>>,
    init_containers: BTreeMap<String, Option<String>>,
}

fn proc_mounts(containers: &[Container]) -> BTreeMap<String, Option<String>> {
    containers
        .iter()
        .map(|c| {
            let proc_mount = c.security_context.as_ref().and_then(|sc| sc.proc_mount.clone());
            (c.name.clone(), proc_mount)
        })
        .collect()
}

impl Retained {
    /// Snapshot of the retained fields of `spec`
    #[must_use]
    pub fn from_spec(spec: Option<&PodSpec>) -> Self {
        spec.map_or_else(Self::default, |spec| Self {
            containers: proc_mounts(&spec.containers),
            init_containers: proc_mounts(spec.init_containers.as_deref().unwrap_or_default()),
        })
    }
}

fn default_containers(containers: &mut [Container], retained: &BTreeMap<String, Option<String>>) {
    for container in containers {
        if let Some(sc) = container.security_context.as_mut() {
            sc.proc_mount = retained.get(&container.name).cloned().flatten();
        }
        container
            .image_pull_policy
            .get_or_insert_with(|| DEFAULT_IMAGE_PULL_POLICY.to_string());
        container
            .termination_message_path
            .get_or_insert_with(|| DEFAULT_TERMINATION_MESSAGE_PATH.to_string());
        container
            .termination_message_policy
            .get_or_insert_with(|| DEFAULT_TERMINATION_MESSAGE_POLICY.to_string());
    }
}

/// Re-inject `retained` by container name and fill the server side defaults of `spec`
pub fn default_pod_spec(retained: &Retained, spec: &mut PodSpec) {
    default_containers(&mut spec.containers, &retained.containers);
    if let Some(init) = spec.init_containers.as_mut() {
        default_containers(init, &retained.init_containers);
    }
    for volume in spec.volumes.iter_mut().flatten() {
        if let Some(secret) = volume.secret.as_mut() {
            secret.default_mode.get_or_insert(DEFAULT_VOLUME_MODE);
        }
        if let Some(config_map) = volume.config_map.as_mut() {
            config_map.default_mode.get_or_insert(DEFAULT_VOLUME_MODE);
        }
    }
}

fn default_pod_template<K: PodTemplated>(existing: &K, desired: &mut K) {
    let retained = Retained::from_spec(existing.pod_spec());
    if let Some(spec) = desired.pod_spec_mut() {
        default_pod_spec(&retained, spec);
    }
}

/// Default-value modifier for pod templated kinds
pub fn default_pod_spec_wrapper<K: Reconcilable + PodTemplated>() -> ObjectModifier<K> {
    Box::new(|create: ObjectCreator<K>| -> ObjectCreator<K> {
        Box::new(move |existing: K| {
            let snapshot = existing.clone();
            let mut obj = create(existing)?;
            default_pod_template(&snapshot, &mut obj);
            Ok(obj)
        })
    })
}

/// Merge the pull secrets `names` into the pod template, keeping the ones already listed
pub fn image_pull_secrets_wrapper<K: Reconcilable + PodTemplated>(names: &[&str]) -> ObjectModifier<K> {
    let names: Vec<String> = names.iter().map(|n| (*n).to_string()).collect();
    Box::new(move |create: ObjectCreator<K>| -> ObjectCreator<K> {
        let names = names.clone();
        Box::new(move |existing: K| {
            let mut obj = create(existing)?;
            if names.is_empty() {
                return Ok(obj);
            }
            let secrets = obj.pod_spec_entry().image_pull_secrets.get_or_insert_with(Vec::new);
            for name in &names {
                if !secrets.iter().any(|s| &s.name == name) {
                    secrets.push(LocalObjectReference { name: name.clone() });
                }
            }
            Ok(obj)
        })
    })
}

// ── Deployment ────────────────────────────────────────────────────────────────

/// Rolling update unless told otherwise, one extra pod at a time and none missing
pub fn default_deployment_strategy(deployment: &mut Deployment) {
    let spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
    let strategy = spec.strategy.get_or_insert_with(DeploymentStrategy::default);
    let rolling = strategy.type_.get_or_insert_with(|| "RollingUpdate".to_string()) == "RollingUpdate";
    if rolling && strategy.rolling_update.is_none() {
        strategy.rolling_update = Some(RollingUpdateDeployment {
            max_surge: Some(IntOrString::Int(1)),
            max_unavailable: Some(IntOrString::Int(0)),
        });
    }
}

/// Pod spec defaults plus strategy defaults
pub fn default_deployment_wrapper() -> ObjectModifier<Deployment> {
    Box::new(|create: ObjectCreator<Deployment>| -> ObjectCreator<Deployment> {
        Box::new(move |existing: Deployment| {
            let snapshot = existing.clone();
            let mut obj = create(existing)?;
            default_pod_template(&snapshot, &mut obj);
            default_deployment_strategy(&mut obj);
            Ok(obj)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Identity, NoopDiffReporter, Outcome, ensure_named_object, memstore::MemoryStore};
    use k8s_openapi::api::core::v1::{
        ConfigMapVolumeSource, PodTemplateSpec, SecretVolumeSource, SecurityContext, Volume,
    };
    use kube::api::ObjectMeta;

    fn container(name: &str, proc_mount: Option<&str>) -> Container {
        Container {
            name: name.into(),
            image: Some(format!("registry.local/{name}:1")),
            security_context: Some(SecurityContext {
                proc_mount: proc_mount.map(String::from),
                ..SecurityContext::default()
            }),
            ..Container::default()
        }
    }

    fn deployment(containers: Vec<Container>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("web".into()),
                namespace: Some("ns1".into()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers,
                        ..PodSpec::default()
                    }),
                    ..PodTemplateSpec::default()
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        }
    }

    fn proc_mount_of(d: &Deployment, name: &str) -> Option<String> {
        d.pod_spec()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.security_context.as_ref())
            .and_then(|sc| sc.proc_mount.clone())
    }

    #[test]
    fn test_retained_fields_follow_container_names() {
        let existing = deployment(vec![container("a", Some("X")), container("b", Some("Y"))]);
        let base: ObjectCreator<Deployment> = Box::new(|mut d: Deployment| {
            d.pod_spec_mut().unwrap().containers = vec![container("b", None), container("a", None)];
            Ok(d)
        });
        let got = default_pod_spec_wrapper()(base)(existing).unwrap();
        let names: Vec<_> = got.pod_spec().unwrap().containers.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(proc_mount_of(&got, "a").as_deref(), Some("X"));
        assert_eq!(proc_mount_of(&got, "b").as_deref(), Some("Y"));
    }

    #[test]
    fn test_new_container_gets_no_proc_mount() {
        let existing = deployment(vec![container("a", Some("X"))]);
        let base: ObjectCreator<Deployment> = Box::new(|mut d: Deployment| {
            d.pod_spec_mut().unwrap().containers = vec![container("c", Some("Unmasked"))];
            Ok(d)
        });
        let got = default_pod_spec_wrapper()(base)(existing).unwrap();
        assert_eq!(proc_mount_of(&got, "c"), None);
    }

    #[test]
    fn test_init_containers_kept_apart() {
        let mut existing = deployment(vec![container("a", Some("X"))]);
        existing.pod_spec_mut().unwrap().init_containers = Some(vec![container("a", Some("Init"))]);
        let base: ObjectCreator<Deployment> = Box::new(|mut d: Deployment| {
            let spec = d.pod_spec_mut().unwrap();
            spec.containers = vec![container("a", None)];
            spec.init_containers = Some(vec![container("a", None)]);
            Ok(d)
        });
        let got = default_pod_spec_wrapper()(base)(existing).unwrap();
        let spec = got.pod_spec().unwrap();
        let init = &spec.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.security_context.as_ref().unwrap().proc_mount.as_deref(), Some("Init"));
        assert_eq!(spec.containers[0].security_context.as_ref().unwrap().proc_mount.as_deref(), Some("X"));
    }

    #[test]
    fn test_container_defaults() {
        let mut spec = PodSpec {
            containers: vec![
                Container {
                    name: "a".into(),
                    ..Container::default()
                },
                Container {
                    name: "b".into(),
                    image_pull_policy: Some("Always".into()),
                    ..Container::default()
                },
            ],
            ..PodSpec::default()
        };
        default_pod_spec(&Retained::default(), &mut spec);
        let a = &spec.containers[0];
        assert_eq!(a.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(a.termination_message_path.as_deref(), Some("/dev/termination-log"));
        assert_eq!(a.termination_message_policy.as_deref(), Some("File"));
        assert!(a.security_context.is_none());
        assert_eq!(spec.containers[1].image_pull_policy.as_deref(), Some("Always"));
    }

    #[test]
    fn test_volume_modes() {
        let mut spec = PodSpec {
            volumes: Some(vec![
                Volume {
                    name: "certs".into(),
                    secret: Some(SecretVolumeSource {
                        secret_name: Some("certs".into()),
                        ..SecretVolumeSource::default()
                    }),
                    ..Volume::default()
                },
                Volume {
                    name: "config".into(),
                    config_map: Some(ConfigMapVolumeSource {
                        default_mode: Some(0o600),
                        ..ConfigMapVolumeSource::default()
                    }),
                    ..Volume::default()
                },
            ]),
            ..PodSpec::default()
        };
        default_pod_spec(&Retained::default(), &mut spec);
        let volumes = spec.volumes.unwrap();
        assert_eq!(volumes[0].secret.as_ref().unwrap().default_mode, Some(420));
        assert_eq!(volumes[1].config_map.as_ref().unwrap().default_mode, Some(384));
    }

    #[test]
    fn test_deployment_strategy_defaults() {
        let mut d = deployment(vec![]);
        default_deployment_strategy(&mut d);
        let strategy = d.spec.unwrap().strategy.unwrap();
        assert_eq!(strategy.type_.as_deref(), Some("RollingUpdate"));
        let rolling = strategy.rolling_update.unwrap();
        assert_eq!(rolling.max_surge, Some(IntOrString::Int(1)));
        assert_eq!(rolling.max_unavailable, Some(IntOrString::Int(0)));
    }

    #[test]
    fn test_deployment_strategy_kept() {
        let mut recreate = deployment(vec![]);
        recreate.spec.as_mut().unwrap().strategy = Some(DeploymentStrategy {
            type_: Some("Recreate".into()),
            rolling_update: None,
        });
        default_deployment_strategy(&mut recreate);
        let strategy = recreate.spec.unwrap().strategy.unwrap();
        assert_eq!(strategy.type_.as_deref(), Some("Recreate"));
        assert!(strategy.rolling_update.is_none());

        let mut custom = deployment(vec![]);
        let rolling = RollingUpdateDeployment {
            max_surge: Some(IntOrString::String("25%".into())),
            max_unavailable: None,
        };
        custom.spec.as_mut().unwrap().strategy = Some(DeploymentStrategy {
            type_: None,
            rolling_update: Some(rolling.clone()),
        });
        default_deployment_strategy(&mut custom);
        let strategy = custom.spec.unwrap().strategy.unwrap();
        assert_eq!(strategy.type_.as_deref(), Some("RollingUpdate"));
        assert_eq!(strategy.rolling_update, Some(rolling));
    }

    #[test]
    fn test_deployment_strategy_on_empty_deployment() {
        let mut d = Deployment::default();
        default_deployment_strategy(&mut d);
        let strategy = d.spec.unwrap().strategy.unwrap();
        assert_eq!(strategy.type_.as_deref(), Some("RollingUpdate"));
        assert!(strategy.rolling_update.is_some());
    }

    #[test]
    fn test_cron_job_without_template() {
        assert!(CronJob::default().pod_spec().is_none());
    }

    fn pull_secrets<K: PodTemplated>(obj: &K) -> Vec<String> {
        obj.pod_spec()
            .and_then(|spec| spec.image_pull_secrets.as_ref())
            .map(|secrets| secrets.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    fn unchanged<K: Reconcilable>() -> ObjectCreator<K> {
        Box::new(|obj: K| Ok(obj))
    }

    #[test]
    fn test_image_pull_secrets_none() {
        let got = image_pull_secrets_wrapper(&[])(unchanged())(Deployment::default()).unwrap();
        assert_eq!(got, Deployment::default());
    }

    #[test]
    fn test_image_pull_secrets_one() {
        let got = image_pull_secrets_wrapper(&["secret"])(unchanged())(Deployment::default()).unwrap();
        assert_eq!(pull_secrets(&got), vec!["secret"]);
    }

    #[test]
    fn test_image_pull_secrets_many() {
        let got = image_pull_secrets_wrapper(&["secret_1", "secret_2"])(unchanged())(Deployment::default()).unwrap();
        assert_eq!(pull_secrets(&got), vec!["secret_1", "secret_2"]);
    }

    #[test]
    fn test_image_pull_secrets_merge_with_present() {
        let mut existing = deployment(vec![]);
        existing.pod_spec_mut().unwrap().image_pull_secrets = Some(vec![
            LocalObjectReference {
                name: "secret_1".into(),
            },
            LocalObjectReference {
                name: "secret_3".into(),
            },
        ]);
        let got = image_pull_secrets_wrapper(&["secret_1", "secret_2"])(unchanged())(existing).unwrap();
        assert_eq!(pull_secrets(&got), vec!["secret_1", "secret_3", "secret_2"]);
    }

    #[test]
    fn test_image_pull_secrets_on_cron_job() {
        let got = image_pull_secrets_wrapper(&["registry"])(unchanged())(CronJob::default()).unwrap();
        assert_eq!(pull_secrets(&got), vec!["registry"]);
    }

    #[tokio::test]
    async fn test_defaults_keep_deployment_converged() {
        let store = MemoryStore::<Deployment>::default();
        let identity = Identity::new("Deployment", "ns1", "web");
        let create = || -> ObjectCreator<Deployment> {
            default_deployment_wrapper()(Box::new(|mut d: Deployment| {
                let spec = d.spec.get_or_insert_with(DeploymentSpec::default);
                spec.replicas = Some(2);
                spec.template.spec = Some(PodSpec {
                    containers: vec![container("web", None)],
                    ..PodSpec::default()
                });
                Ok(d)
            }))
        };
        let first = ensure_named_object(&identity, create(), &store, &NoopDiffReporter).await.unwrap();
        assert_eq!(first, Outcome::Created);
        let second = ensure_named_object(&identity, create(), &store, &NoopDiffReporter).await.unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(store.writes(), 1);
    }
}

//! # Lifecycle Controller
//!
//! [`Provider`] implements create, delete, status and logs on top of a
//! [`ContainerRuntime`] and an [`IdentityTracker`].
//!
//! ## Per-Pod State Machine
//!
//! ```text
//!   ┌─────────┐   create ok   ┌─────────┐   delete ok   ┌─────────┐
//!   │ Absent  │ ────────────► │ Created │ ────────────► │ Deleted │
//!   └─────────┘               └─────────┘               └─────────┘
//!        │ create fails            │ delete fails
//!        └──► Absent               └──► Created (retry possible)
//! ```
//!
//! ## Create Sequence
//!
//! 1. Validate the descriptor
//! 2. Take the uid lock
//! 3. Materialize ConfigMap volumes
//! 4. Resolve env and mounts for every container to provision
//! 5. Run the containers
//! 6. Register the handles
//!
//! Nothing is registered unless every step succeeds. Containers already
//! started for a failed create are force-removed best effort. Files written
//! in step 3 are not rolled back.
//!
//! ## Provisioning Mode
//!
//! By default only the first container of a pod is provisioned and status
//! reports exactly one container. With `provision_all_containers` every
//! container is started and tracked under its own name.

use crate::constants::{CREATED_RESPONSE, DELETED_RESPONSE, POD_NAMESPACE_LABEL, POD_UID_LABEL};
use crate::error::{Error, Result};
use crate::materializer::{Materializer, mount_specifiers};
use crate::pod::{
    Container, ContainerStatus, EnvSource, LogRequest, PodCreateRequest, PodDescriptor,
    PodReference, PodStatus, PodUid, TrackedContainer, VolumeBundle, find_config_map, find_secret,
};
use crate::runtime::{ContainerRuntime, RunRequest};
use crate::status::translate;
use crate::tracker::{IdentityTracker, UidLocks};
use std::sync::Arc;

/// Pod provider.
pub struct Provider {
    runtime: Arc<dyn ContainerRuntime>,
    tracker: Arc<dyn IdentityTracker>,
    materializer: Materializer,
    locks: UidLocks,
    provision_all_containers: bool,
}

impl Provider {
    /// Creates a provider in first-container mode.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        tracker: Arc<dyn IdentityTracker>,
        materializer: Materializer,
    ) -> Self {
        Self {
            runtime,
            tracker,
            materializer,
            locks: UidLocks::new(),
            provision_all_containers: false,
        }
    }

    /// Provisions every container of a pod instead of only the first.
    #[must_use]
    pub fn with_all_containers(mut self, enabled: bool) -> Self {
        self.provision_all_containers = enabled;
        self
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<dyn IdentityTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Creates the containers of one pod.
    pub async fn create(&self, request: &PodCreateRequest) -> Result<()> {
        let pod = &request.pod;
        pod.validate()?;

        let uid = PodUid::from(pod.uid());
        let _guard = self.locks.lock(&uid).await;

        tracing::info!(
            pod = %pod.metadata.name,
            uid = %uid,
            namespace = %pod.namespace(),
            "creating pod"
        );

        let files = self.materializer.materialize(pod, &request.bundles).await?;
        if !files.is_empty() {
            tracing::debug!(uid = %uid, files = files.len(), "materialized volumes");
        }

        let containers: &[Container] = if self.provision_all_containers {
            &pod.spec.containers
        } else {
            &pod.spec.containers[..1]
        };

        let mut runs = Vec::with_capacity(containers.len());
        for container in containers {
            runs.push((
                container.name.as_str(),
                build_run_request(pod, container, &request.bundles)?,
            ));
        }

        let mut tracked: Vec<TrackedContainer> = Vec::with_capacity(runs.len());
        for (name, run) in runs {
            match self.runtime.run(run).await {
                Ok(handle) => {
                    tracing::info!(uid = %uid, container = %name, handle = %handle, "container started");
                    tracked.push(TrackedContainer::new(name, handle));
                }
                Err(e) => {
                    tracing::error!(uid = %uid, container = %name, error = %e, "container failed to start");
                    self.discard(&uid, &tracked).await;
                    return Err(e.into());
                }
            }
        }

        self.tracker.register(uid, tracked)?;
        Ok(())
    }

    /// Best-effort removal of containers started by a failed create.
    async fn discard(&self, uid: &PodUid, started: &[TrackedContainer]) {
        for container in started {
            if let Err(e) = self.runtime.remove(&container.handle, true).await {
                tracing::warn!(
                    uid = %uid,
                    handle = %container.handle,
                    error = %e,
                    "failed to remove container of failed create"
                );
            }
        }
    }

    /// Removes every container of a pod.
    ///
    /// The tracker entry is dropped only when all removals succeed, so a
    /// failed delete can be retried.
    pub async fn delete(&self, uid: &PodUid) -> Result<()> {
        let _guard = self.locks.lock(uid).await;
        let containers = self.tracker.lookup(uid)?;

        tracing::info!(uid = %uid, containers = containers.len(), "deleting pod");

        let mut failure = None;
        for container in &containers {
            if let Err(e) = self.runtime.remove(&container.handle, true).await {
                tracing::error!(
                    uid = %uid,
                    container = %container.name,
                    handle = %container.handle,
                    error = %e,
                    "failed to remove container"
                );
                failure.get_or_insert(e);
            }
        }

        if let Some(e) = failure {
            return Err(e.into());
        }

        self.tracker.remove(uid)?;
        Ok(())
    }

    /// Reports the normalized status of a pod.
    pub async fn status(&self, reference: &PodReference) -> Result<PodStatus> {
        let uid = PodUid::from(reference.uid.as_str());
        let tracked = self.tracker.lookup(&uid)?;

        let mut containers = Vec::with_capacity(tracked.len());
        for container in tracked {
            let native = self.runtime.inspect(&container.handle).await?;
            if native.is_none() {
                tracing::debug!(uid = %uid, handle = %container.handle, "runtime no longer knows container");
            }
            containers.push(ContainerStatus {
                name: container.name,
                state: translate(native.as_ref()),
            });
        }

        Ok(PodStatus {
            name: reference.name.clone(),
            uid: reference.uid.clone(),
            namespace: reference.namespace.clone(),
            containers,
        })
    }

    /// Returns the log snapshot of one container.
    pub async fn logs(&self, request: &LogRequest) -> Result<Vec<u8>> {
        request.opts.validate()?;

        let uid = PodUid::from(request.pod_uid.as_str());
        let tracked = self.tracker.lookup(&uid)?;

        let container = if request.container_name.is_empty() {
            tracked.first()
        } else {
            tracked.iter().find(|c| c.name == request.container_name)
        }
        .ok_or_else(|| {
            Error::NotFound(format!(
                "container '{}' of pod {uid} is not tracked",
                request.container_name
            ))
        })?;

        let logs = self
            .runtime
            .fetch_logs(&container.handle, &request.opts)
            .await?;
        Ok(logs)
    }

    // =========================================================================
    // Batch Entry Points
    // =========================================================================

    /// Creates the first pod of a batch.
    pub async fn create_pods(&self, requests: Vec<PodCreateRequest>) -> Result<String> {
        let extra = requests.len().saturating_sub(1);
        let Some(request) = requests.into_iter().next() else {
            return Err(Error::Validation("no pods in create request".to_string()));
        };
        if extra > 0 {
            tracing::warn!(ignored = extra, "only the first pod of a create batch is handled");
        }

        self.create(&request).await?;
        Ok(CREATED_RESPONSE.to_string())
    }

    /// Deletes the referenced pod.
    pub async fn delete_pod(&self, reference: PodReference) -> Result<String> {
        self.delete(&PodUid::from(reference.uid)).await?;
        Ok(DELETED_RESPONSE.to_string())
    }

    /// Reports the status of the first referenced pod.
    pub async fn get_statuses(&self, references: Vec<PodReference>) -> Result<Vec<PodStatus>> {
        let Some(reference) = references.first() else {
            return Err(Error::Validation("no pods in status request".to_string()));
        };
        if references.len() > 1 {
            tracing::warn!(
                ignored = references.len() - 1,
                "only the first pod of a status batch is handled"
            );
        }

        Ok(vec![self.status(reference).await?])
    }

    pub async fn get_logs(&self, request: LogRequest) -> Result<Vec<u8>> {
        self.logs(&request).await
    }
}

// =============================================================================
// Run Request Assembly
// =============================================================================

fn build_run_request(
    pod: &PodDescriptor,
    container: &Container,
    bundles: &[VolumeBundle],
) -> Result<RunRequest> {
    Ok(RunRequest {
        name: format!("{}-{}", container.name, pod.uid()),
        image: container.image_reference(),
        command: container.command.join(" "),
        args: container.args.join(" "),
        command_argv: container.command.clone(),
        args_argv: container.args.clone(),
        env: resolve_env(pod.namespace(), container, bundles)?,
        mounts: mount_specifiers(pod, container),
        labels: vec![
            (POD_UID_LABEL.to_string(), pod.uid().to_string()),
            (POD_NAMESPACE_LABEL.to_string(), pod.namespace().to_string()),
        ],
    })
}

/// Resolves env entries against the supplied bundles, in declaration order.
///
/// Optional references that cannot be resolved are left out.
fn resolve_env(
    namespace: &str,
    container: &Container,
    bundles: &[VolumeBundle],
) -> Result<Vec<(String, String)>> {
    let mut env = Vec::with_capacity(container.env.len());

    for var in &container.env {
        let (kind, key_ref, value) = match &var.source {
            EnvSource::Value(value) => {
                env.push((var.name.clone(), value.clone()));
                continue;
            }
            EnvSource::ConfigMapKey(r) => (
                "configMap",
                r,
                find_config_map(bundles, namespace, &r.name).and_then(|cm| cm.get(&r.key)),
            ),
            EnvSource::SecretKey(r) => (
                "secret",
                r,
                find_secret(bundles, namespace, &r.name).and_then(|s| s.get(&r.key)),
            ),
        };

        match value {
            Some(bytes) => {
                env.push((var.name.clone(), String::from_utf8_lossy(bytes).into_owned()));
            }
            None if key_ref.optional => {
                tracing::debug!(
                    container = %container.name,
                    env = %var.name,
                    "optional {kind} key not supplied, leaving unset"
                );
            }
            None => {
                return Err(Error::Validation(format!(
                    "env '{}' of container '{}' references {kind} key {}/{} which was not supplied",
                    var.name, container.name, key_ref.name, key_ref.key
                )));
            }
        }
    }

    Ok(env)
}

//! Pod descriptor types.
//!
//! This module provides the Kubernetes-shaped pod descriptor received with a
//! create request, with validation applied after decoding.
//!
//! # Supported Formats
//!
//! - **JSON**: Primary wire format of the sidecar API
//! - **YAML**: Accepted for manifests on disk (YAML is a superset of JSON)
//!
//! Volume sources and environment variables are tagged unions on the Rust
//! side. The wire form (several optional fields) is checked when decoding, so
//! a descriptor that deserializes successfully never carries an ambiguous
//! volume or env source.

use crate::constants::{
    DEFAULT_GRACE_PERIOD_SECS, DEFAULT_NAMESPACE, MAX_CONTAINERS_PER_POD,
    MAX_ENV_VARS_PER_CONTAINER, MAX_LABEL_NAME_LEN, MAX_MANIFEST_SIZE, MAX_SUBDOMAIN_NAME_LEN,
    MAX_VOLUMES_PER_POD,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Validation Helpers
// =============================================================================

/// Validates an RFC 1123 DNS label (namespaces, containers, volumes).
///
/// These names end up as path components of materialized volumes, so the
/// character set is kept strict.
fn validate_label(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{kind} name cannot be empty")));
    }

    if name.len() > MAX_LABEL_NAME_LEN {
        return Err(Error::Validation(format!(
            "{kind} name '{name}' exceeds maximum length of {MAX_LABEL_NAME_LEN}"
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::Validation(format!(
            "{kind} name '{name}' must contain only lowercase alphanumeric characters or '-'"
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::Validation(format!(
            "{kind} name '{name}' cannot start or end with '-'"
        )));
    }

    Ok(())
}

/// Validates an RFC 1123 DNS subdomain (pods, ConfigMaps, Secrets).
fn validate_subdomain(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{kind} name cannot be empty")));
    }

    if name.len() > MAX_SUBDOMAIN_NAME_LEN {
        return Err(Error::Validation(format!(
            "{kind} name '{name}' exceeds maximum length of {MAX_SUBDOMAIN_NAME_LEN}"
        )));
    }

    for part in name.split('.') {
        if part.is_empty()
            || part.starts_with('-')
            || part.ends_with('-')
            || !part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::Validation(format!(
                "{kind} name '{name}' is not a valid DNS subdomain"
            )));
        }
    }

    Ok(())
}

/// Pod uids become part of runtime container names.
fn validate_uid(uid: &str) -> Result<()> {
    if uid.is_empty() {
        return Err(Error::Validation("pod uid cannot be empty".to_string()));
    }

    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::Validation(format!(
            "pod uid '{uid}' must contain only alphanumeric characters, '-', '_' or '.'"
        )));
    }

    Ok(())
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

// =============================================================================
// Pod Descriptor
// =============================================================================

/// Declarative description of one pod: metadata plus spec.
///
/// This is the input to a create request. It is not retained by the provider
/// once the create call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodDescriptor {
    /// Identity and free-form metadata.
    pub metadata: PodMetadata,
    /// Containers, volumes and policies.
    pub spec: PodSpec,
}

/// Pod metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodMetadata {
    /// Pod name.
    pub name: String,
    /// Namespace (defaults to "default").
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Unique id assigned by the control plane.
    #[serde(alias = "uuid", alias = "UID")]
    pub uid: String,
    /// Labels, preserved verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations, preserved verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Pod spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Main containers (at least one required).
    pub containers: Vec<Container>,
    /// Init containers. Accepted and validated, never provisioned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    /// Volume definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<PodVolume>,
    /// Restart policy.
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Termination grace period in seconds.
    #[serde(
        default,
        rename = "terminationGracePeriodSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub grace_period_secs: Option<i64>,
}

/// Pod restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RestartPolicy {
    #[default]
    Always,
    OnFailure,
    Never,
}

impl PodDescriptor {
    /// Parses and validates a descriptor from JSON bytes.
    ///
    /// # Errors
    ///
    /// - Size exceeds `MAX_MANIFEST_SIZE`
    /// - Decoding fails (including ambiguous volume or env sources)
    /// - Validation errors for names, counts, etc.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        check_manifest_size(json.len())?;
        let pod: Self =
            serde_json::from_slice(json).map_err(|e| Error::Validation(e.to_string()))?;
        pod.validate()?;
        Ok(pod)
    }

    /// Parses and validates a descriptor from YAML bytes.
    pub fn from_yaml(yaml: &[u8]) -> Result<Self> {
        check_manifest_size(yaml.len())?;
        let pod: Self =
            serde_yaml::from_slice(yaml).map_err(|e| Error::Validation(e.to_string()))?;
        pod.validate()?;
        Ok(pod)
    }

    /// Pod uid.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Pod namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Grace period, falling back to the default.
    #[must_use]
    pub fn grace_period_secs(&self) -> i64 {
        self.spec
            .grace_period_secs
            .unwrap_or(DEFAULT_GRACE_PERIOD_SECS)
    }

    /// Looks up a declared volume by name.
    #[must_use]
    pub fn volume(&self, name: &str) -> Option<&PodVolume> {
        self.spec.volumes.iter().find(|v| v.name == name)
    }

    /// Checks every invariant the provider relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        validate_subdomain("pod", &self.metadata.name)?;
        validate_label("namespace", &self.metadata.namespace)?;
        validate_uid(&self.metadata.uid)?;

        let spec = &self.spec;
        if spec.containers.is_empty() {
            return Err(Error::Validation(
                "at least one container required".to_string(),
            ));
        }

        let total = spec.containers.len() + spec.init_containers.len();
        if total > MAX_CONTAINERS_PER_POD {
            return Err(Error::Validation(format!(
                "too many containers: {total} (max {MAX_CONTAINERS_PER_POD})"
            )));
        }

        let mut seen = HashSet::new();
        for container in spec.init_containers.iter().chain(&spec.containers) {
            container.validate()?;
            if !seen.insert(container.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate container name '{}'",
                    container.name
                )));
            }
        }

        if spec.volumes.len() > MAX_VOLUMES_PER_POD {
            return Err(Error::Validation(format!(
                "too many volumes: {} (max {MAX_VOLUMES_PER_POD})",
                spec.volumes.len()
            )));
        }

        let mut volume_names = HashSet::new();
        for volume in &spec.volumes {
            volume.validate()?;
            if !volume_names.insert(volume.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate volume name '{}'",
                    volume.name
                )));
            }
        }

        if let Some(grace) = spec.grace_period_secs
            && grace < 0
        {
            return Err(Error::Validation(format!(
                "terminationGracePeriodSeconds must not be negative (got {grace})"
            )));
        }

        Ok(())
    }
}

fn check_manifest_size(len: usize) -> Result<()> {
    if len > MAX_MANIFEST_SIZE {
        return Err(Error::Validation(format!(
            "manifest size {len} exceeds limit of {MAX_MANIFEST_SIZE}"
        )));
    }
    Ok(())
}

// =============================================================================
// Container
// =============================================================================

/// A single container within a pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name (unique within the pod).
    pub name: String,
    /// Image name, optionally already carrying a tag or digest.
    pub image: String,
    /// Separate image tag, appended to `image` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Arguments to the entrypoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Resource hints, opaque to the provider.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, serde_json::Value>,
    /// Volume mount points.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    /// Environment variables in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl Container {
    /// Full image reference handed to the runtime.
    #[must_use]
    pub fn image_reference(&self) -> String {
        match self.tag.as_deref() {
            Some(tag) if !tag.is_empty() => format!("{}:{}", self.image, tag),
            _ => self.image.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_label("container", &self.name)?;

        if self.image.trim().is_empty() {
            return Err(Error::Validation(format!(
                "container '{}' has no image",
                self.name
            )));
        }

        if self.env.len() > MAX_ENV_VARS_PER_CONTAINER {
            return Err(Error::Validation(format!(
                "too many environment variables in container {}: {} (max {MAX_ENV_VARS_PER_CONTAINER})",
                self.name,
                self.env.len()
            )));
        }

        for var in &self.env {
            if var.name.is_empty() || var.name.contains('=') {
                return Err(Error::Validation(format!(
                    "container '{}' has an invalid env name '{}'",
                    self.name, var.name
                )));
            }
        }

        for mount in &self.volume_mounts {
            mount.validate(&self.name)?;
        }

        Ok(())
    }
}

/// Volume mount specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Name of the pod volume to mount.
    pub name: String,
    /// Path inside the container.
    pub mount_path: String,
    /// Sub-path within the volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    /// If true, mount as read-only.
    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMount {
    fn validate(&self, container: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation(format!(
                "volume mount in container '{container}' has no name"
            )));
        }

        if !self.mount_path.starts_with('/') {
            return Err(Error::Validation(format!(
                "mountPath '{}' in container '{container}' must be absolute",
                self.mount_path
            )));
        }

        if let Some(sub_path) = &self.sub_path
            && (sub_path.starts_with('/') || sub_path.split('/').any(|part| part == ".."))
        {
            return Err(Error::Validation(format!(
                "subPath '{sub_path}' in container '{container}' must be relative without '..'"
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable with exactly one value source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnvVarWire", into = "EnvVarWire")]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Where the value comes from.
    pub source: EnvSource,
}

impl EnvVar {
    /// Literal variable.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: EnvSource::Value(value.into()),
        }
    }
}

/// Source of an environment variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvSource {
    /// Literal value.
    Value(String),
    /// Key of a ConfigMap supplied with the request.
    ConfigMapKey(KeyRef),
    /// Key of a Secret supplied with the request.
    SecretKey(KeyRef),
}

/// Reference to one key of a ConfigMap or Secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRef {
    /// Name of the ConfigMap or Secret.
    pub name: String,
    /// Key within it.
    pub key: String,
    /// If true, a missing key leaves the variable unset instead of failing.
    #[serde(default)]
    pub optional: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvVarWire {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_from: Option<EnvVarSourceWire>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvVarSourceWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_map_key_ref: Option<KeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_key_ref: Option<KeyRef>,
}

impl TryFrom<EnvVarWire> for EnvVar {
    type Error = String;

    fn try_from(wire: EnvVarWire) -> std::result::Result<Self, Self::Error> {
        let source = match (wire.value, wire.value_from) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "env '{}' sets both value and valueFrom",
                    wire.name
                ));
            }
            (Some(value), None) => EnvSource::Value(value),
            (None, None) => EnvSource::Value(String::new()),
            (None, Some(from)) => match (from.config_map_key_ref, from.secret_key_ref) {
                (Some(r), None) => EnvSource::ConfigMapKey(r),
                (None, Some(r)) => EnvSource::SecretKey(r),
                _ => {
                    return Err(format!(
                        "env '{}' valueFrom must set exactly one of configMapKeyRef, secretKeyRef",
                        wire.name
                    ));
                }
            },
        };
        Ok(Self {
            name: wire.name,
            source,
        })
    }
}

impl From<EnvVar> for EnvVarWire {
    fn from(var: EnvVar) -> Self {
        let (value, value_from) = match var.source {
            EnvSource::Value(v) => (Some(v), None),
            EnvSource::ConfigMapKey(r) => (
                None,
                Some(EnvVarSourceWire {
                    config_map_key_ref: Some(r),
                    secret_key_ref: None,
                }),
            ),
            EnvSource::SecretKey(r) => (
                None,
                Some(EnvVarSourceWire {
                    config_map_key_ref: None,
                    secret_key_ref: Some(r),
                }),
            ),
        };
        Self {
            name: var.name,
            value,
            value_from,
        }
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Pod volume definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PodVolumeWire", into = "PodVolumeWire")]
pub struct PodVolume {
    /// Volume name (referenced by volume mounts).
    pub name: String,
    /// The single populated source.
    pub source: VolumeSource,
}

impl PodVolume {
    fn validate(&self) -> Result<()> {
        validate_label("volume", &self.name)?;
        match &self.source {
            VolumeSource::ConfigMap(cm) => {
                validate_subdomain("configMap", &cm.name)?;
                validate_items(&self.name, &cm.items)
            }
            VolumeSource::Secret(secret) => {
                validate_subdomain("secret", &secret.secret_name)?;
                validate_items(&self.name, &secret.items)
            }
            VolumeSource::EmptyDir(_) => Ok(()),
        }
    }
}

fn validate_items(volume: &str, items: &Option<Vec<KeyToPath>>) -> Result<()> {
    for item in items.iter().flatten() {
        if item.key.is_empty() {
            return Err(Error::Validation(format!(
                "volume '{volume}' selects an item with an empty key"
            )));
        }
    }
    Ok(())
}

/// Volume source, exactly one per volume.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSource {
    /// Scratch directory.
    EmptyDir(EmptyDirSource),
    /// Secret reference.
    Secret(SecretVolumeSource),
    /// ConfigMap reference.
    ConfigMap(ConfigMapVolumeSource),
}

/// emptyDir options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyDirSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<String>,
}

/// ConfigMap volume reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapVolumeSource {
    /// Name of the ConfigMap.
    pub name: String,
    /// Keys to project; all keys when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<KeyToPath>>,
    /// File mode for projected keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// Secret volume reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Name of the Secret.
    pub secret_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<KeyToPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// Item selection within a ConfigMap or Secret volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyToPath {
    pub key: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodVolumeWire {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    empty_dir: Option<EmptyDirSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<SecretVolumeSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_map: Option<ConfigMapVolumeSource>,
}

impl TryFrom<PodVolumeWire> for PodVolume {
    type Error = String;

    fn try_from(wire: PodVolumeWire) -> std::result::Result<Self, Self::Error> {
        let source = match (wire.empty_dir, wire.secret, wire.config_map) {
            (Some(ed), None, None) => VolumeSource::EmptyDir(ed),
            (None, Some(secret), None) => VolumeSource::Secret(secret),
            (None, None, Some(cm)) => VolumeSource::ConfigMap(cm),
            _ => {
                return Err(format!(
                    "volume '{}' must set exactly one of emptyDir, secret, configMap",
                    wire.name
                ));
            }
        };
        Ok(Self {
            name: wire.name,
            source,
        })
    }
}

impl From<PodVolume> for PodVolumeWire {
    fn from(volume: PodVolume) -> Self {
        let mut wire = Self {
            name: volume.name,
            empty_dir: None,
            secret: None,
            config_map: None,
        };
        match volume.source {
            VolumeSource::EmptyDir(ed) => wire.empty_dir = Some(ed),
            VolumeSource::Secret(s) => wire.secret = Some(s),
            VolumeSource::ConfigMap(cm) => wire.config_map = Some(cm),
        }
        wire
    }
}

//! Request payloads that travel alongside a pod descriptor.
//!
//! Volume bundles carry the ConfigMap and Secret content a pod references,
//! [`PodReference`] identifies a pod for delete and status calls, and
//! [`LogRequest`] selects a container's log stream.

use crate::error::{Error, Result};
use crate::pod::spec::PodDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Data Bundles
// =============================================================================

/// Name and namespace of a ConfigMap or Secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// Key/value configuration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Text entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    /// Binary entries, base64 on the wire.
    #[serde(default, with = "base64_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl ConfigMap {
    /// Text and binary entries merged in key order.
    ///
    /// A key present in both maps resolves to the text value.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<&str, &[u8]> {
        let mut entries: BTreeMap<&str, &[u8]> = self
            .binary_data
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        for (key, value) in &self.data {
            entries.insert(key.as_str(), value.as_bytes());
        }
        entries
    }

    /// Single entry lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data
            .get(key)
            .map(String::as_bytes)
            .or_else(|| self.binary_data.get(key).map(Vec::as_slice))
    }
}

/// Sensitive key/value data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Decoded entries, base64 on the wire.
    #[serde(default, with = "base64_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Vec<u8>>,
    /// Plain-text entries. These take precedence over `data`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
}

impl Secret {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.string_data
            .get(key)
            .map(String::as_bytes)
            .or_else(|| self.data.get(key).map(Vec::as_slice))
    }
}

/// ConfigMaps, Secrets and emptyDir placeholders supplied with a pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBundle {
    #[serde(default)]
    pub name: String,
    /// Namespace applied to members whose own namespace is empty.
    #[serde(default)]
    pub namespace: String,
    #[serde(default, alias = "configmaps")]
    pub config_maps: Vec<ConfigMap>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default, alias = "emptydirs")]
    pub empty_dirs: Vec<String>,
}

impl VolumeBundle {
    /// Finds a ConfigMap by name within `namespace`.
    #[must_use]
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<&ConfigMap> {
        self.config_maps
            .iter()
            .find(|cm| cm.metadata.name == name && self.in_namespace(&cm.metadata, namespace))
    }

    /// Finds a Secret by name within `namespace`.
    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<&Secret> {
        self.secrets
            .iter()
            .find(|s| s.metadata.name == name && self.in_namespace(&s.metadata, namespace))
    }

    /// Members without any namespace belong to the pod they were sent with.
    fn in_namespace(&self, meta: &ObjectMeta, namespace: &str) -> bool {
        let effective = if meta.namespace.is_empty() {
            &self.namespace
        } else {
            &meta.namespace
        };
        effective.is_empty() || effective == namespace
    }
}

/// Searches several bundles for a ConfigMap.
pub fn find_config_map<'a>(
    bundles: &'a [VolumeBundle],
    namespace: &str,
    name: &str,
) -> Option<&'a ConfigMap> {
    bundles.iter().find_map(|b| b.config_map(namespace, name))
}

/// Searches several bundles for a Secret.
pub fn find_secret<'a>(
    bundles: &'a [VolumeBundle],
    namespace: &str,
    name: &str,
) -> Option<&'a Secret> {
    bundles.iter().find_map(|b| b.secret(namespace, name))
}

mod base64_map {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.trim())
                    .map(|bytes| (k.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("key '{k}' is not valid base64: {e}")))
            })
            .collect()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One element of a create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCreateRequest {
    pub pod: PodDescriptor,
    #[serde(default, rename = "container", alias = "volumes")]
    pub bundles: Vec<VolumeBundle>,
}

/// Identifies a pod for delete and status calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PodReferenceWire")]
pub struct PodReference {
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl PodReference {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: uid.into(),
        }
    }
}

impl From<&PodDescriptor> for PodReference {
    fn from(pod: &PodDescriptor) -> Self {
        Self::new(
            pod.metadata.name.clone(),
            pod.metadata.namespace.clone(),
            pod.metadata.uid.clone(),
        )
    }
}

#[derive(Deserialize)]
struct ReferenceFields {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default, alias = "uuid", alias = "UID")]
    uid: String,
}

/// Either a full pod object or the flat triple.
#[derive(Deserialize)]
#[serde(untagged)]
enum PodReferenceWire {
    Pod { metadata: ReferenceFields },
    Flat(ReferenceFields),
}

impl From<PodReferenceWire> for PodReference {
    fn from(wire: PodReferenceWire) -> Self {
        let (PodReferenceWire::Pod { metadata: f } | PodReferenceWire::Flat(f)) = wire;
        Self {
            name: f.name,
            namespace: f.namespace,
            uid: f.uid,
        }
    }
}

// =============================================================================
// Logs
// =============================================================================

/// Log retrieval request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRequest {
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "PodUID")]
    pub pod_uid: String,
    #[serde(default)]
    pub pod_name: String,
    /// Empty selects the first tracked container.
    #[serde(default)]
    pub container_name: String,
    #[serde(default)]
    pub opts: LogOptions,
}

/// Log selection options. Zero values mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogOptions {
    /// Number of trailing lines.
    #[serde(default)]
    pub tail: u64,
    /// Maximum number of bytes returned.
    #[serde(default, rename = "Bytes")]
    pub limit_bytes: u64,
    #[serde(default)]
    pub timestamps: bool,
    /// Accepted but not streamed: logs are returned as a snapshot.
    #[serde(default)]
    pub follow: bool,
    #[serde(default)]
    pub previous: bool,
    #[serde(default)]
    pub since_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_time: Option<DateTime<Utc>>,
}

impl LogOptions {
    /// Rejects mutually exclusive selections.
    pub fn validate(&self) -> Result<()> {
        if self.tail > 0 && self.limit_bytes > 0 {
            return Err(Error::Validation(
                "Tail and Bytes cannot both be set".to_string(),
            ));
        }
        if self.since_seconds > 0 && self.since_time().is_some() {
            return Err(Error::Validation(
                "SinceSeconds and SinceTime cannot both be set".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn tail_lines(&self) -> Option<u64> {
        (self.tail > 0).then_some(self.tail)
    }

    #[must_use]
    pub fn byte_limit(&self) -> Option<u64> {
        (self.limit_bytes > 0).then_some(self.limit_bytes)
    }

    /// Explicit since-time. The zero time of other encoders counts as unset.
    #[must_use]
    pub fn since_time(&self) -> Option<DateTime<Utc>> {
        self.since_time.filter(|t| t.timestamp() > 0)
    }

    /// Earliest log instant requested, from either since field.
    #[must_use]
    pub fn since(&self) -> Option<DateTime<Utc>> {
        if self.since_seconds > 0 {
            return chrono::TimeDelta::try_seconds(self.since_seconds)
                .and_then(|d| Utc::now().checked_sub_signed(d));
        }
        self.since_time()
    }
}

//! # Pod Model
//!
//! Entity definitions exchanged with the provider:
//!
//! ```text
//! Create request                     Status report
//! ──────────────                     ─────────────
//! PodCreateRequest                   PodStatus
//!   ├── pod: PodDescriptor             ├── name / UID / namespace
//!   │     ├── metadata                 └── containers[]
//!   │     └── spec                           └── ContainerStates
//!   │           ├── containers[]                  Running | Waiting
//!   │           └── volumes[]                     | Terminated | Pending
//!   └── bundles: VolumeBundle[]
//!         ├── configMaps[]
//!         ├── secrets[]
//!         └── emptyDirs[]
//! ```
//!
//! Descriptors and bundles are consumed by a create call and not retained.
//! The only state that outlives a call is the uid to handle mapping kept by
//! the [`crate::tracker`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use magiklink::pod::PodDescriptor;
//!
//! let pod = PodDescriptor::from_yaml(manifest)?;
//! assert_eq!(pod.spec.containers[0].image_reference(), "alpine:3.19");
//! ```

mod data;
mod spec;
mod state;

pub use data::{
    ConfigMap, LogOptions, LogRequest, ObjectMeta, PodCreateRequest, PodReference, Secret,
    VolumeBundle, find_config_map, find_secret,
};
pub use spec::{
    ConfigMapVolumeSource, Container, EmptyDirSource, EnvSource, EnvVar, KeyRef, KeyToPath,
    PodDescriptor, PodMetadata, PodSpec, PodVolume, RestartPolicy, SecretVolumeSource,
    VolumeMount, VolumeSource,
};
pub use state::{
    ContainerStates, ContainerStatus, PodStatus, PodUid, RuntimeHandle, StateRunning,
    StateTerminated, StateWaiting, TrackedContainer,
};

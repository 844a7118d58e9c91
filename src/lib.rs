//! # magiklink
//!
//! **Pod Provider Adapter for Imperative Container Runtimes**
//!
//! This crate sits between declarative pod requests (Kubernetes-shaped
//! descriptors with containers, volumes and metadata) and a container runtime
//! that only knows how to run, remove, inspect and read logs of single
//! containers.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     HTTP sidecar (api, bin)                         │
//! │   /create   /delete   /status   /getLogs                            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                    Provider (lifecycle controller)                  │
//! │  ┌───────────────┐  ┌────────────────┐  ┌──────────────────────┐    │
//! │  │ Materializer  │  │ IdentityTracker│  │  Status translation  │    │
//! │  │ configMaps →  │  │ uid → handles  │  │  native → Running /  │    │
//! │  │ files on disk │  │ + per-uid lock │  │  Terminated          │    │
//! │  └───────────────┘  └────────────────┘  └──────────────────────┘    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                     ContainerRuntime trait                          │
//! │        run(request) │ remove(handle) │ inspect │ fetch_logs         │
//! │  ┌──────────────┐                                                   │
//! │  │DockerRuntime │                                                   │
//! │  │  (bollard)   │                                                   │
//! │  └──────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # State
//!
//! The only state kept between calls is the in-memory mapping from pod uid
//! to runtime handles. Descriptors and data bundles are consumed by create
//! and forgotten; a restarted provider tracks no pods.
//!
//! # Example
//!
//! ```rust,ignore
//! use magiklink::{DockerRuntime, InMemoryTracker, Materializer, Provider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = DockerRuntime::connect(None, "/var/lib/magiklink").await?;
//!     let provider = Provider::new(
//!         Arc::new(runtime),
//!         Arc::new(InMemoryTracker::new()),
//!         Materializer::new("/var/lib/magiklink"),
//!     );
//!     provider.create_pods(requests).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod materializer;
pub mod pod;
pub mod provider;
pub mod runtime;
pub mod status;
pub mod tracker;

pub mod runtimes;

// Re-exports
pub use config::ProviderConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use materializer::Materializer;
pub use provider::Provider;
pub use runtime::{ContainerRuntime, NativeStatus, RunRequest, RuntimeError, RuntimeResult};
pub use runtimes::DockerRuntime;
pub use tracker::{IdentityTracker, InMemoryTracker, UidLocks};

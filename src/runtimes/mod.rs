//! Container runtime implementations.
//!
//! Each runtime implements [`crate::runtime::ContainerRuntime`] for one
//! backend. The provider holds it as `Arc<dyn ContainerRuntime>`, so tests
//! and alternative backends plug in the same way.

pub mod docker;

pub use self::docker::DockerRuntime;

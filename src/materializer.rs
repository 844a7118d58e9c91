//! Volume materialization.
//!
//! ConfigMap-backed volumes are written to disk below a data root so the
//! runtime can bind-mount them:
//!
//! ```text
//! <root>/
//! └── <namespace>-<configMapName>/
//!     ├── <key>
//!     └── <key>
//! ```
//!
//! Bind specifiers reference the same layout by volume name:
//! `<namespace>-<volumeName>[/<subPath>]:<mountPath>`.
//!
//! ## Security
//!
//! Keys become file names. A key that is not a single plain path component
//! is rejected before anything is written, so nothing escapes the root.
//!
//! ## Limitations
//!
//! Files written before a failure are left in place. Secret and emptyDir
//! volumes are not materialized.

use crate::error::{Error, Result};
use crate::pod::{
    ConfigMapVolumeSource, Container, PodDescriptor, VolumeBundle, VolumeMount, VolumeSource,
    find_config_map,
};
use std::path::{Path, PathBuf};

/// Writes ConfigMap volumes below a data root.
#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data root all paths are relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes every ConfigMap volume of `pod`.
    ///
    /// Returns the written files relative to the root, in volume declaration
    /// order then key order.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a key that is not a plain file name
    /// - [`Error::Io`] for any filesystem failure, carrying the path
    pub async fn materialize(
        &self,
        pod: &PodDescriptor,
        bundles: &[VolumeBundle],
    ) -> Result<Vec<PathBuf>> {
        let namespace = pod.namespace();
        let mut written = Vec::new();

        for volume in &pod.spec.volumes {
            match &volume.source {
                VolumeSource::ConfigMap(source) => {
                    self.write_config_map(namespace, source, bundles, &mut written)
                        .await?;
                }
                VolumeSource::Secret(source) => {
                    tracing::debug!(
                        pod = %pod.uid(),
                        volume = %volume.name,
                        secret = %source.secret_name,
                        "secret volumes are not materialized"
                    );
                }
                VolumeSource::EmptyDir(_) => {
                    tracing::debug!(
                        pod = %pod.uid(),
                        volume = %volume.name,
                        "emptyDir volumes are not materialized"
                    );
                }
            }
        }

        Ok(written)
    }

    async fn write_config_map(
        &self,
        namespace: &str,
        source: &ConfigMapVolumeSource,
        bundles: &[VolumeBundle],
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let Some(config_map) = find_config_map(bundles, namespace, &source.name) else {
            tracing::warn!(
                namespace = %namespace,
                config_map = %source.name,
                "referenced configMap was not supplied, skipping"
            );
            return Ok(());
        };

        let entries = config_map.entries();

        // (file name, content, mode)
        let mut files: Vec<(&str, &[u8], Option<u32>)> = Vec::new();
        match &source.items {
            Some(items) => {
                for item in items {
                    let Some(content) = entries.get(item.key.as_str()) else {
                        tracing::warn!(
                            config_map = %source.name,
                            key = %item.key,
                            "selected key missing from configMap, skipping"
                        );
                        continue;
                    };
                    let file = if item.path.is_empty() {
                        item.key.as_str()
                    } else {
                        item.path.as_str()
                    };
                    files.push((file, *content, item.mode.or(source.default_mode)));
                }
            }
            None => {
                for (key, content) in &entries {
                    files.push((*key, *content, source.default_mode));
                }
            }
        }

        for (file, _, _) in &files {
            validate_file_name(file)?;
        }

        let dir_name = format!("{namespace}-{}", source.name);
        let dir = self.root.join(&dir_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        for (file, content, mode) in files {
            let path = dir.join(file);
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| Error::io(&path, e))?;
            if let Some(mode) = mode {
                set_mode(&path, mode).await?;
            }
            tracing::debug!(path = %path.display(), "materialized configMap key");
            written.push(Path::new(&dir_name).join(file));
        }

        Ok(())
    }
}

/// Rejects anything but a single plain path component.
fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(Error::Validation(format!(
            "configMap key '{name}' is not a valid file name"
        )));
    }
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777))
        .await
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

// =============================================================================
// Mount Specifiers
// =============================================================================

/// Bind specifier for one volume mount.
#[must_use]
pub fn mount_specifier(namespace: &str, mount: &VolumeMount) -> String {
    let mut host = format!("{namespace}-{}", mount.name);
    if let Some(sub_path) = mount.sub_path.as_deref()
        && !sub_path.is_empty()
    {
        host.push('/');
        host.push_str(sub_path);
    }
    format!("{host}:{}", mount.mount_path)
}

/// Bind specifiers for every mount of `container`, in mount order.
#[must_use]
pub fn mount_specifiers(pod: &PodDescriptor, container: &Container) -> Vec<String> {
    container
        .volume_mounts
        .iter()
        .map(|mount| mount_specifier(pod.namespace(), mount))
        .collect()
}

//! Docker Engine runtime.
//!
//! Implements [`ContainerRuntime`] on the Docker Engine API via bollard.
//!
//! # Mapping
//!
//! | Operation | Docker calls |
//! |-----------|--------------|
//! | `run` | inspect image (pull if absent) → create → start |
//! | `remove` | remove (force, volumes) |
//! | `inspect` | inspect container |
//! | `fetch_logs` | logs (stdout + stderr) |
//!
//! Container names are chosen by the caller (`<container>-<uid>`), so a pod
//! created twice with the same uid collides in Docker rather than in the
//! provider.

use crate::constants::{NATIVE_STATUS_EXITED, NATIVE_STATUS_RUNNING};
use crate::pod::{LogOptions, RuntimeHandle};
use crate::runtime::{ContainerRuntime, NativeStatus, RunRequest, RuntimeError, RuntimeResult};
use async_trait::async_trait;
use bollard::{
    Docker,
    container::LogOutput,
    models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig},
    query_parameters::{
        CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
        LogsOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
    },
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Client timeout in seconds.
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// Docker-backed container runtime.
pub struct DockerRuntime {
    client: Docker,
    /// Absolute directory relative bind sources are resolved against.
    data_root: PathBuf,
}

impl DockerRuntime {
    /// Connects to the Docker daemon.
    ///
    /// `host` accepts `unix://` or plain socket paths and `tcp://` or
    /// `http://` addresses. Without a host the local defaults apply
    /// (`DOCKER_HOST`, then the platform socket).
    pub async fn connect(host: Option<&str>, data_root: impl AsRef<Path>) -> RuntimeResult<Self> {
        let client = match host {
            None => Docker::connect_with_local_defaults()?,
            Some(h) if h.starts_with("tcp://") || h.starts_with("http://") => {
                let addr = h.replacen("tcp://", "http://", 1);
                Docker::connect_with_http(&addr, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            Some(h) => {
                let path = h.strip_prefix("unix://").unwrap_or(h);
                Docker::connect_with_socket(path, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
        };

        client
            .ping()
            .await
            .map_err(|e| RuntimeError::Unavailable(format!("docker daemon not reachable: {e}")))?;

        let data_root = std::path::absolute(data_root.as_ref()).map_err(|e| {
            RuntimeError::Unavailable(format!(
                "cannot resolve data root {}: {e}",
                data_root.as_ref().display()
            ))
        })?;

        tracing::info!(data_root = %data_root.display(), "connected to docker");
        Ok(Self { client, data_root })
    }

    /// Pulls `image` unless it is already present.
    async fn ensure_image(&self, image: &str) -> RuntimeResult<()> {
        if self.client.inspect_image(image).await.is_ok() {
            tracing::debug!(image = %image, "image already present");
            return Ok(());
        }

        tracing::info!(image = %image, "pulling image");
        let options = CreateImageOptionsBuilder::default()
            .from_image(image)
            .build();

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let info = progress?;
            if let Some(status) = info.status {
                tracing::trace!(image = %image, status = %status, "pull progress");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn run(&self, request: RunRequest) -> RuntimeResult<RuntimeHandle> {
        self.ensure_image(&request.image).await?;

        let options = CreateContainerOptionsBuilder::default()
            .name(&request.name)
            .build();
        let created = self
            .client
            .create_container(Some(options), create_body(&self.data_root, &request))
            .await?;
        let id = created.id;
        tracing::debug!(name = %request.name, handle = %id, "container created");

        if let Err(e) = self
            .client
            .start_container(&id, None::<StartContainerOptions>)
            .await
        {
            let remove = RemoveContainerOptionsBuilder::default().force(true).build();
            if let Err(cleanup) = self.client.remove_container(&id, Some(remove)).await {
                tracing::warn!(handle = %id, error = %cleanup, "failed to remove unstarted container");
            }
            return Err(RuntimeError::failed("start", id, e.to_string()));
        }

        Ok(RuntimeHandle::new(id))
    }

    async fn remove(&self, handle: &RuntimeHandle, force: bool) -> RuntimeResult<()> {
        let options = RemoveContainerOptionsBuilder::default()
            .force(force)
            .v(true)
            .build();

        match self
            .client
            .remove_container(handle.as_str(), Some(options))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                tracing::debug!(handle = %handle, "container already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> RuntimeResult<Option<NativeStatus>> {
        let response = match self
            .client
            .inspect_container(handle.as_str(), None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = response.state.unwrap_or_default();
        let label = state_label(state.status.as_ref());
        let raw_status = match label {
            NATIVE_STATUS_EXITED => match state.exit_code {
                Some(code) => format!("Exited ({code})"),
                None => "Exited".to_string(),
            },
            NATIVE_STATUS_RUNNING => "Up".to_string(),
            other => other.to_string(),
        };
        let created_at = created_time(handle, response.created.as_deref());

        Ok(Some(NativeStatus {
            label: label.to_string(),
            raw_status,
            created_at,
        }))
    }

    async fn fetch_logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> RuntimeResult<Vec<u8>> {
        if opts.previous {
            tracing::debug!(handle = %handle, "previous instance logs are not kept by docker");
        }

        let tail = opts
            .tail_lines()
            .map_or_else(|| "all".to_string(), |n| n.to_string());
        let since = opts
            .since()
            .map_or(0, |t| i32::try_from(t.timestamp()).unwrap_or(i32::MAX));
        let options = LogsOptionsBuilder::default()
            .stdout(true)
            .stderr(true)
            .timestamps(opts.timestamps)
            .since(since)
            .tail(&tail)
            .build();

        let limit = opts
            .byte_limit()
            .and_then(|n| usize::try_from(n).ok());
        let mut output = Vec::new();
        let mut stream = self.client.logs(handle.as_str(), Some(options));

        while let Some(chunk) = stream.next().await {
            let message = match chunk? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => message,
                LogOutput::StdIn { .. } => continue,
            };
            output.extend_from_slice(&message);
            if let Some(limit) = limit
                && output.len() >= limit
            {
                output.truncate(limit);
                break;
            }
        }

        Ok(output)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn state_label(status: Option<&ContainerStateStatusEnum>) -> &'static str {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => "created",
        Some(ContainerStateStatusEnum::RUNNING) => NATIVE_STATUS_RUNNING,
        Some(ContainerStateStatusEnum::PAUSED) => "paused",
        Some(ContainerStateStatusEnum::RESTARTING) => "restarting",
        Some(ContainerStateStatusEnum::REMOVING) => "removing",
        Some(ContainerStateStatusEnum::EXITED) => NATIVE_STATUS_EXITED,
        Some(ContainerStateStatusEnum::DEAD) => "dead",
        None | Some(ContainerStateStatusEnum::EMPTY) => "unknown",
    }
}

fn create_body(data_root: &Path, request: &RunRequest) -> ContainerCreateBody {
    let env: Vec<String> = request
        .env
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    let labels: HashMap<String, String> = request.labels.iter().cloned().collect();
    let binds: Vec<String> = request
        .mounts
        .iter()
        .map(|spec| resolve_bind(data_root, spec))
        .collect();

    ContainerCreateBody {
        image: Some(request.image.clone()),
        entrypoint: argv(&request.command_argv, &request.command),
        cmd: argv(&request.args_argv, &request.args),
        env: Some(env),
        labels: Some(labels),
        host_config: Some(HostConfig {
            binds: (!binds.is_empty()).then_some(binds),
            auto_remove: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Declared argv when present, otherwise the joined line split on whitespace.
/// `None` keeps the image default.
fn argv(declared: &[String], line: &str) -> Option<Vec<String>> {
    if !declared.is_empty() {
        return Some(declared.to_vec());
    }
    split_words(line)
}

fn split_words(line: &str) -> Option<Vec<String>> {
    let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    (!words.is_empty()).then_some(words)
}

/// Parses the engine's creation timestamp, substituting the current time
/// when it is missing or malformed.
fn created_time(handle: &RuntimeHandle, raw: Option<&str>) -> DateTime<Utc> {
    match raw.map(DateTime::parse_from_rfc3339) {
        Some(Ok(t)) => t.with_timezone(&Utc),
        _ => {
            tracing::warn!(
                handle = %handle,
                created = ?raw,
                "unparseable creation time, reporting current time"
            );
            Utc::now()
        }
    }
}

/// Anchors a relative bind source at `root`.
fn resolve_bind(root: &Path, spec: &str) -> String {
    match spec.split_once(':') {
        Some((host, target)) if Path::new(host).is_relative() => {
            format!("{}:{target}", root.join(host).display())
        }
        _ => spec.to_string(),
    }
}

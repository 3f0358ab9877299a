use crate::archive;
use crate::path::Transfer;
use anyhow::{anyhow, Context, Result};
use bollard::container::{
    DownloadFromContainerOptions, InspectContainerOptions, UploadToContainerOptions,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;

/// Where to find the docker daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// DOCKER_HOST, or the platform's default socket
    Local,
    Unix(String),
    Http(String),
}

impl Endpoint {
    pub fn parse(host: Option<&str>) -> Result<Self> {
        let Some(host) = host else {
            return Ok(Endpoint::Local);
        };
        if let Some(path) = host.strip_prefix("unix://") {
            Ok(Endpoint::Unix(path.to_string()))
        } else if host.starts_with('/') {
            Ok(Endpoint::Unix(host.to_string()))
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Ok(Endpoint::Http(host.to_string()))
        } else {
            Err(anyhow!("unsupported docker host: {}", host))
        }
    }
}

pub struct Client {
    docker: Docker,
}

impl Client {
    pub fn connect(endpoint: &Endpoint, timeout_seconds: u64) -> Result<Self> {
        info!("connecting to docker daemon: {:?}", endpoint);
        let docker = match endpoint {
            Endpoint::Local => Docker::connect_with_local_defaults()
                .map(|d| d.with_timeout(Duration::from_secs(timeout_seconds))),
            Endpoint::Unix(path) => {
                Docker::connect_with_unix(path, timeout_seconds, API_DEFAULT_VERSION)
            }
            Endpoint::Http(addr) => {
                Docker::connect_with_http(addr, timeout_seconds, API_DEFAULT_VERSION)
            }
        }
        .with_context(|| format!("connecting to {:?}", endpoint))?;
        Ok(Client { docker })
    }

    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            anyhow!(
                "it's not possible to connect to the Docker host. \
                 Check if the Docker daemon is running. ({})",
                e
            )
        })?;
        Ok(())
    }

    /// Resolves a container name or id to its full id.
    pub async fn container(&self, name: &str) -> Result<String> {
        let inspect = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| inspect_error(name, e))?;
        let id = inspect.id.unwrap_or_else(|| name.to_string());
        debug!("container {} resolved to {}", name, id);
        Ok(id)
    }

    pub async fn copy(&self, transfer: &Transfer, bufsize: usize) -> Result<()> {
        let container = self.container(transfer.container()).await?;
        match transfer {
            Transfer::FromContainer { src, dest, .. } => {
                self.copy_from_container(&container, src, Path::new(dest), bufsize).await
            }
            Transfer::ToContainer { src, dest, .. } => {
                self.copy_to_container(&container, Path::new(src), dest, bufsize).await
            }
        }
    }

    /// Pulls `src` out of the container and extracts it under `dest`.
    pub async fn copy_from_container(
        &self,
        container: &str,
        src: &str,
        dest: &Path,
        bufsize: usize,
    ) -> Result<()> {
        let options = DownloadFromContainerOptions { path: src };
        let stream = self
            .docker
            .download_from_container(container, Some(options))
            .map(|chunk| chunk.with_context(|| format!("getting archive of {}", src)));

        // spool the archive to disk before extracting it
        let archive = archive::spill(stream, bufsize).await?;
        archive::unpack(archive.path(), dest, bufsize)?;
        info!("extracted {} into {:?}", src, dest);
        Ok(())
    }

    /// Tars up local `src` and uploads it into the container's `dest` dir.
    pub async fn copy_to_container(
        &self,
        container: &str,
        src: &Path,
        dest: &str,
        bufsize: usize,
    ) -> Result<()> {
        let packed = archive::pack(src, bufsize)?;
        let data = archive::read_all(&packed, bufsize)?;
        info!("sending {} bytes archive of {:?}", data.len(), src);

        let options = UploadToContainerOptions {
            path: dest,
            ..Default::default()
        };
        self.docker
            .upload_to_container(container, Some(options), data.into())
            .await
            .with_context(|| format!("putting archive into {}:{}", container, dest))?;
        info!("copied {:?} to {}:{}", src, container, dest);
        Ok(())
    }
}

fn inspect_error(name: &str, err: bollard::errors::Error) -> anyhow::Error {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
            anyhow!("container not found: {}", name)
        }
        err => anyhow::Error::new(err).context(format!("inspecting container {}", name)),
    }
}

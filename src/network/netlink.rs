/*!
 * Netlink Interface Attachment
 * Moves host links into a sandbox's network namespace
 */

use super::types::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(target_os = "linux")]
use futures::stream::TryStreamExt;
#[cfg(target_os = "linux")]
use rtnetlink::{new_connection, Handle};
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// rtnetlink-backed attacher; the connection is opened on first use
#[derive(Clone)]
pub struct NetlinkAttacher {
    #[cfg(target_os = "linux")]
    handle: Arc<tokio::sync::OnceCell<Handle>>,
    #[cfg(not(target_os = "linux"))]
    _private: Arc<()>,
}

impl NetlinkAttacher {
    #[cfg(target_os = "linux")]
    pub fn new() -> Self {
        Self {
            handle: Arc::new(tokio::sync::OnceCell::new()),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Self {
        Self {
            _private: Arc::new(()),
        }
    }

    #[cfg(target_os = "linux")]
    async fn handle(&self) -> NetworkResult<&Handle> {
        self.handle
            .get_or_try_init(|| async {
                let (connection, handle, _) = new_connection().map_err(|e| {
                    NetworkError::Netlink(format!("Failed to create netlink connection: {}", e))
                })?;

                // Spawn the connection in the background
                tokio::spawn(connection);
                info!("Netlink connection established");
                Ok::<Handle, NetworkError>(handle)
            })
            .await
    }

    #[cfg(target_os = "linux")]
    async fn resolve_index(handle: &Handle, iface: &InterfaceRef) -> NetworkResult<u32> {
        if let Some(index) = iface.index {
            return Ok(index);
        }

        let mut links = handle
            .link()
            .get()
            .match_name(iface.name.clone())
            .execute();

        match links.try_next().await {
            Ok(Some(link)) => Ok(link.header.index),
            Ok(None) => Err(NetworkError::InterfaceNotFound(iface.name.clone())),
            Err(e) => Err(NetworkError::Netlink(format!(
                "Failed to look up {}: {}",
                iface.name, e
            ))),
        }
    }

    /// Move `iface` into the namespace bound at `netns`
    #[cfg(target_os = "linux")]
    pub async fn attach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        let ns_file = std::fs::File::open(netns).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                NetworkError::NamespaceMissing(netns.display().to_string())
            }
            _ => e.into(),
        })?;

        let handle = self.handle().await?;
        let index = Self::resolve_index(handle, iface).await?;

        handle
            .link()
            .set(index)
            .setns_by_fd(ns_file.as_raw_fd())
            .execute()
            .await
            .map_err(|e| {
                NetworkError::Netlink(format!(
                    "Failed to move {} into {}: {}",
                    iface,
                    netns.display(),
                    e
                ))
            })?;

        info!(iface = %iface, netns = %netns.display(), "Interface moved into namespace");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub async fn attach(&self, _netns: &Path, _iface: &InterfaceRef) -> NetworkResult<()> {
        Err(NetworkError::PlatformNotSupported(
            "Netlink interface attachment requires Linux".to_string(),
        ))
    }

    /// Release an attached interface.
    ///
    /// Physical links return to the initial namespace when the sandbox
    /// namespace is destroyed and veth peers are destroyed with it, so the
    /// host side only records the detach.
    pub async fn detach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        debug!(iface = %iface, netns = %netns.display(), "Interface detached");
        Ok(())
    }
}

impl Default for NetlinkAttacher {
    fn default() -> Self {
        Self::new()
    }
}

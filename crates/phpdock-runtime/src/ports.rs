//! Host port resolution.
//!
//! Given a set of desired host ports, finds actually-available ones by
//! probing with a transient listening socket, scanning upward on conflict.
//! The window between the probe releasing a port and the caller binding it
//! is an accepted race: the runtime's own bind failure surfaces as an
//! ordinary container-creation error and the caller retries resolution.

use crate::error::{Result, RuntimeError};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::debug;

/// Maximum consecutive ports probed per desired port.
const MAX_ATTEMPTS: u16 = 100;

/// Stateful port resolver.
///
/// The resolver remembers every port it has handed out for the lifetime of
/// the process, so sequential resolutions of overlapping desired sets never
/// return the same port twice even though probe sockets are released
/// immediately. Safe to call concurrently for unrelated port sets.
#[derive(Default)]
pub struct PortResolver {
    claimed: Mutex<HashSet<u16>>,
}

impl PortResolver {
    /// Creates a resolver with no claimed ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a single desired port to an available one.
    pub async fn resolve(&self, desired: u16) -> Result<u16> {
        let mut claimed = self.claimed.lock().await;
        self.resolve_locked(desired, &mut claimed).await
    }

    /// Resolves each desired port, returning a desired-to-actual mapping.
    ///
    /// Ports within one call never collide with each other or with ports
    /// handed out by earlier calls.
    pub async fn resolve_all(&self, desired: &[u16]) -> Result<BTreeMap<u16, u16>> {
        let mut claimed = self.claimed.lock().await;
        let mut mapping = BTreeMap::new();
        for &port in desired {
            let actual = self.resolve_locked(port, &mut claimed).await?;
            mapping.insert(port, actual);
        }
        Ok(mapping)
    }

    /// Releases a previously-claimed port (e.g. after the container that
    /// used it was removed).
    pub async fn release(&self, port: u16) {
        self.claimed.lock().await.remove(&port);
    }

    async fn resolve_locked(&self, desired: u16, claimed: &mut HashSet<u16>) -> Result<u16> {
        for attempt in 0..MAX_ATTEMPTS {
            let candidate = match desired.checked_add(attempt) {
                Some(p) => p,
                None => break,
            };
            if claimed.contains(&candidate) {
                continue;
            }
            if Self::probe(candidate).await {
                if candidate != desired {
                    debug!(desired, actual = candidate, "port remapped");
                }
                claimed.insert(candidate);
                return Ok(candidate);
            }
        }

        Err(RuntimeError::PortExhaustion { start_port: desired, attempts: MAX_ATTEMPTS })
    }

    /// Attempts to bind a listener on the port, releasing it immediately.
    async fn probe(port: u16) -> bool {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await.is_ok()
    }
}

//! Typed point-to-point connections.
//!
//! A [`Port`] records the single peer a component side is wired to. Connecting a
//! port that already has a peer replaces it, so the graph never holds two links
//! out of the same side.

use super::error::ConfigError;

/// One side of a directed connection.
#[derive(Clone, Debug)]
pub struct Port<T> {
    name: String,
    peer: Option<T>,
}

impl<T: Copy> Port<T> {
    /// Creates an unconnected port.
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in wiring errors, e.g. `"l1d.mem_side"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peer: None,
        }
    }

    /// Connects the port, returning the peer it replaced.
    pub const fn connect(&mut self, peer: T) -> Option<T> {
        self.peer.replace(peer)
    }

    /// Returns the current peer.
    pub const fn peer(&self) -> Option<T> {
        self.peer
    }

    /// Returns true if a peer is attached.
    pub const fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Returns the peer or an [`ConfigError::InvalidConfiguration`] naming the port.
    ///
    /// # Errors
    ///
    /// Fails when nothing has been connected to this port.
    pub fn require(&self) -> Result<T, ConfigError> {
        self.peer
            .ok_or_else(|| ConfigError::invalid(format!("{} is not connected", self.name)))
    }

    /// Port label.
    pub fn name(&self) -> &str {
        &self.name
    }
}

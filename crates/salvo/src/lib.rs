//! # Salvo
//!
//! Peer-to-peer lockstep networking for two-player games.
//!
//! One process hosts (the server), the other joins (the client). After a
//! short handshake both sides hold a [`NetworkPeer`](salvo_peer::NetworkPeer)
//! that frames messages over TCP and dispatches received ones to registered
//! handlers. Turn order is enforced by a lockstep token that starts with
//! the server. Hosts can advertise themselves on the LAN so clients can
//! find them without typing an address.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use salvo::prelude::*;
//!
//! # fn main() -> Result<(), SalvoError> {
//! let options = LaunchOptions {
//!     mode: LaunchMode::Server,
//!     ..Default::default()
//! };
//! let mut peer = salvo::launch(&options, |_registry| Ok(()))?;
//! while peer.is_ready() {
//!     peer.receive_messages()?;
//!     // ... game frame ...
//! #   break;
//! }
//! peer.disconnect()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod launch;

pub use error::SalvoError;
pub use launch::{LaunchMode, LaunchOptions, Peer, launch, launch_with};

pub use salvo_discovery as discovery;
pub use salvo_peer as peer;
pub use salvo_protocol as protocol;
pub use salvo_transport as transport;

/// Commonly used types, for `use salvo::prelude::*`.
pub mod prelude {
    pub use crate::{LaunchMode, LaunchOptions, Peer, SalvoError, launch, launch_with};
    pub use salvo_discovery::{DiscoveryConfig, ServiceInfo, ServiceSelector};
    pub use salvo_peer::{
        MessageRegistry, NetworkPeer, PeerConfig, PeerContext, PeerError, PeerId, SendOutcome,
    };
    pub use salvo_protocol::{
        NetworkMessage, NetworkReader, NetworkWriter, ProtocolError, SendMode, WireTypeId,
    };
    pub use salvo_transport::{Role, Transport};
}

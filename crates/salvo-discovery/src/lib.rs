//! LAN service discovery for Salvo.
//!
//! A hosting game runs a [`DiscoveryServer`] that broadcasts a
//! [`ServiceInfo`] (ip, port, hostname) over UDP every half second while it
//! waits for a client. A joining game runs a [`DiscoveryClient`] that
//! collects those broadcasts, and a [`ServiceMenu`] to let the player pick
//! one. Best effort only: no acknowledgements, no authentication.
//!
//! Both sides run on their own thread and stop through a [`CancelToken`].

mod cancel;
mod client;
mod config;
mod error;
mod host;
mod menu;
mod server;
mod service;

pub use cancel::CancelToken;
pub use client::DiscoveryClient;
pub use config::{DEFAULT_DISCOVERY_PORT, DiscoveryConfig};
pub use error::DiscoveryError;
pub use host::{local_hostname, local_ipv4};
pub use menu::{FirstService, ServiceMenu, ServiceSelector};
pub use server::DiscoveryServer;
pub use service::{MAX_DATAGRAM, ServiceInfo, ServiceList};

//! Launch options and the startup sequence.
//!
//! [`launch`] turns a [`LaunchOptions`] into a connected peer:
//!
//! ```text
//! server: bind → (advertise) → wait for client → (stop advertising)
//! client: (discover + pick) → connect → receive id
//! ```

use std::fmt;
use std::str::FromStr;

use salvo_discovery::{
    DiscoveryConfig, DiscoveryServer, FirstService, ServiceInfo, ServiceMenu, ServiceSelector,
    local_hostname, local_ipv4,
};
use salvo_peer::{MessageRegistry, NetworkPeer, PeerConfig};
use salvo_protocol::ProtocolError;
use salvo_transport::{TcpClientTransport, TcpServerTransport, Transport};
use serde::{Deserialize, Serialize};

use crate::SalvoError;

/// A peer over whichever TCP transport the launch mode picked.
pub type Peer = NetworkPeer<Box<dyn Transport>>;

// ---------------------------------------------------------------------------
// LaunchMode
// ---------------------------------------------------------------------------

/// Which side of the session this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Hosts the game and waits for one client.
    Server,
    /// Joins a hosted game.
    #[default]
    Client,
}

impl FromStr for LaunchMode {
    type Err = SalvoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            other => Err(SalvoError::Config(format!(
                "invalid mode {other:?}, expected \"server\" or \"client\""
            ))),
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

// ---------------------------------------------------------------------------
// LaunchOptions
// ---------------------------------------------------------------------------

/// Everything needed to start one end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    pub mode: LaunchMode,

    /// Server address the client connects to. Ignored by the server, which
    /// listens on all interfaces.
    pub ip: String,

    /// TCP port: the one the server listens on, or the one the client
    /// connects to.
    pub port: u16,

    /// Client only: find the server by LAN discovery instead of `ip`/`port`.
    pub discover: bool,

    /// Server only: broadcast the game while waiting for a client.
    pub advertise: bool,

    pub peer: PeerConfig,

    pub discovery: DiscoveryConfig,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            mode: LaunchMode::Client,
            ip: "127.0.0.1".to_string(),
            port: 666,
            discover: false,
            advertise: true,
            peer: PeerConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl LaunchOptions {
    /// Rejects option combinations that can't work.
    pub fn validate(&self) -> Result<(), SalvoError> {
        if self.mode == LaunchMode::Client && !self.discover {
            if self.ip.trim().is_empty() {
                return Err(SalvoError::Config("client needs a server ip".into()));
            }
            if self.port == 0 {
                return Err(SalvoError::Config("client needs a server port".into()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// launch
// ---------------------------------------------------------------------------

/// Builds a peer from `options`, lets `register` add the application's
/// messages, and blocks until the session is established.
///
/// A discovering client takes the first game it finds; use
/// [`launch_with`] to let the player choose.
pub fn launch<F>(options: &LaunchOptions, register: F) -> Result<Peer, SalvoError>
where
    F: FnOnce(&mut MessageRegistry) -> Result<(), ProtocolError>,
{
    launch_with(options, &mut FirstService, register)
}

/// Like [`launch`], with `selector` picking among discovered games.
pub fn launch_with<F>(
    options: &LaunchOptions,
    selector: &mut dyn ServiceSelector,
    register: F,
) -> Result<Peer, SalvoError>
where
    F: FnOnce(&mut MessageRegistry) -> Result<(), ProtocolError>,
{
    options.validate()?;
    tracing::info!(mode = %options.mode, port = options.port, "launching");

    match options.mode {
        LaunchMode::Server => launch_server(options, register),
        LaunchMode::Client => launch_client(options, selector, register),
    }
}

fn launch_server<F>(options: &LaunchOptions, register: F) -> Result<Peer, SalvoError>
where
    F: FnOnce(&mut MessageRegistry) -> Result<(), ProtocolError>,
{
    let bind_addr = format!("0.0.0.0:{}", options.port);
    let transport = TcpServerTransport::bind(&bind_addr, options.peer.transport_config())?;
    let port = transport.local_addr().port();

    let transport: Box<dyn Transport> = Box::new(transport);
    let mut peer = NetworkPeer::new(transport, options.peer.clone());
    register(peer.registry_mut())?;

    let mut broadcast = if options.advertise {
        let info = ServiceInfo::new(local_ipv4().to_string(), port, local_hostname());
        Some(DiscoveryServer::start(info, options.discovery.clone())?)
    } else {
        None
    };

    let ready = peer.wait_until_ready();
    if let Some(broadcast) = broadcast.as_mut() {
        broadcast.stop();
    }
    ready?;
    Ok(peer)
}

fn launch_client<F>(
    options: &LaunchOptions,
    selector: &mut dyn ServiceSelector,
    register: F,
) -> Result<Peer, SalvoError>
where
    F: FnOnce(&mut MessageRegistry) -> Result<(), ProtocolError>,
{
    let (ip, port) = if options.discover {
        ServiceMenu::new(options.discovery.clone()).show(selector)?
    } else {
        (options.ip.clone(), options.port)
    };

    let transport = TcpClientTransport::resolve(&ip, port, options.peer.transport_config())?;
    let transport: Box<dyn Transport> = Box::new(transport);
    let mut peer = NetworkPeer::new(transport, options.peer.clone());
    register(peer.registry_mut())?;
    peer.wait_until_ready()?;
    Ok(peer)
}

//! A full session over loopback TCP: handshake, one exchange of turns,
//! disconnect.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use salvo_peer::{NetworkPeer, PeerConfig, PeerError, PeerId, SendOutcome};
use salvo_protocol::{
    NetworkMessage, NetworkReader, NetworkWriter, ProtocolError, SendMode, WireTypeId,
};
use salvo_transport::{
    TcpClientTransport, TcpServerTransport, Transport, TransportConfig, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Shot {
    x: i32,
    y: i32,
}

impl NetworkMessage for Shot {
    const TYPE_ID: WireTypeId = WireTypeId(1);
    const NAME: &'static str = "Shot";

    fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        w.write(self.x)?;
        w.write(self.y)
    }

    fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: r.read()?,
            y: r.read()?,
        })
    }
}

fn config() -> PeerConfig {
    PeerConfig {
        buffer_capacity: 64 * 1024,
        handshake_timeout: Duration::from_secs(5),
    }
}

/// Polls until `done` holds, or fails the test after two seconds.
fn poll_until<T: Transport>(peer: &mut NetworkPeer<T>, done: impl Fn(&NetworkPeer<T>) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done(peer) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        peer.receive_messages().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_tcp_session_handshake_turns_and_disconnect() {
    let config = config();
    let server_t = TcpServerTransport::bind("127.0.0.1:0", config.transport_config()).unwrap();
    let addr = server_t.local_addr();

    let shots = Arc::new(Mutex::new(Vec::new()));
    let sink = shots.clone();

    let client_thread = thread::spawn(move || {
        let transport = TcpClientTransport::new(addr, self::config().transport_config());
        let mut client = NetworkPeer::new(transport, self::config());
        client
            .registry_mut()
            .register::<Shot, _>(move |shot, _| sink.lock().unwrap().push(shot))
            .unwrap();
        client.wait_until_ready().unwrap();

        // Id assignment, then the server's shot and the turn.
        poll_until(&mut client, |c| c.peer_id() == PeerId(1));
        poll_until(&mut client, |c| c.is_current_owner());

        let outcome = client.send(&Shot { x: 9, y: 9 }, SendMode::Lockstep).unwrap();
        assert_eq!(outcome, SendOutcome::SentAndPassed);

        // Stay up until the server says goodbye.
        poll_until(&mut client, |c| !c.is_ready());
        client.disconnect().unwrap();
    });

    let mut server = NetworkPeer::new(server_t, config);
    let received = Arc::new(Mutex::new(Vec::new()));
    let server_sink = received.clone();
    server
        .registry_mut()
        .register::<Shot, _>(move |shot, _| server_sink.lock().unwrap().push(shot))
        .unwrap();
    server.wait_until_ready().unwrap();
    assert!(server.is_current_owner());

    let outcome = server.send(&Shot { x: 1, y: 2 }, SendMode::Lockstep).unwrap();
    assert_eq!(outcome, SendOutcome::SentAndPassed);
    assert!(!server.is_current_owner());

    poll_until(&mut server, |s| s.is_current_owner());
    assert_eq!(*received.lock().unwrap(), vec![Shot { x: 9, y: 9 }]);

    server.disconnect().unwrap();
    client_thread.join().expect("client thread panicked");
    assert_eq!(*shots.lock().unwrap(), vec![Shot { x: 1, y: 2 }]);
}

#[test]
fn test_handshake_timeout_bounds_a_longer_transport_timeout() {
    let transport_config = TransportConfig::with_timeout(Duration::from_secs(3));
    let server_t = TcpServerTransport::bind("127.0.0.1:0", transport_config).unwrap();
    let mut server = NetworkPeer::new(
        server_t,
        PeerConfig {
            handshake_timeout: Duration::from_millis(100),
            ..config()
        },
    );

    let started = Instant::now();
    assert!(matches!(
        server.wait_until_ready(),
        Err(PeerError::Transport(TransportError::Timeout("accept")))
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!server.is_ready());
}

//! The advertised service record and the client's deduplicated list.

use std::fmt;

use salvo_protocol::{NetworkReader, NetworkWriter, ProtocolError};

/// Largest datagram either side handles. The server refuses to encode a
/// record that doesn't fit and the client's receive buffer is this size.
pub const MAX_DATAGRAM: usize = 1024;

/// One game waiting for a client.
///
/// On the wire: `ip: string | port: i32 | hostname: string`, little-endian,
/// strings as an `i32` length plus UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Address clients should connect to, as text (usually dotted IPv4).
    pub ip: String,
    /// TCP port the game server is listening on.
    pub port: u16,
    /// Advertising host's name. Services are deduplicated by it.
    pub hostname: String,
}

impl ServiceInfo {
    /// A record advertising `ip:port` under `hostname`.
    pub fn new(ip: impl Into<String>, port: u16, hostname: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            hostname: hostname.into(),
        }
    }

    /// Writes the record at the writer's position.
    pub fn encode(&self, writer: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
        writer.write_string(&self.ip)?;
        writer.write(i32::from(self.port))?;
        writer.write_string(&self.hostname)
    }

    /// Reads one record. Ports outside `u16` are rejected.
    pub fn decode(reader: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
        let ip = reader.read_string()?;
        let port = reader.read::<i32>()?;
        let port = u16::try_from(port)
            .map_err(|_| ProtocolError::InvalidMessage(format!("port {port} out of range")))?;
        let hostname = reader.read_string()?;
        Ok(Self { ip, port, hostname })
    }

    /// Encodes into a fresh datagram of at most [`MAX_DATAGRAM`] bytes.
    ///
    /// # Errors
    /// [`ProtocolError::BufferOverflow`] if the record is larger.
    pub fn to_datagram(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut writer = NetworkWriter::new(&mut buf);
        self.encode(&mut writer)?;
        let len = writer.written();
        buf.truncate(len);
        Ok(buf)
    }

    /// Decodes a received datagram. Trailing bytes are ignored.
    pub fn from_datagram(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode(&mut NetworkReader::new(bytes))
    }

    /// `(ip, port)` as a connect target.
    pub fn endpoint(&self) -> (String, u16) {
        (self.ip.clone(), self.port)
    }
}

impl fmt::Display for ServiceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'s game ({}:{})", self.hostname, self.ip, self.port)
    }
}

/// Services seen so far, in discovery order, at most one per hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceList {
    entries: Vec<ServiceInfo>,
}

impl ServiceList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `info` unless a service with the same hostname is already
    /// listed. Returns `true` if it was added.
    pub fn insert(&mut self, info: ServiceInfo) -> bool {
        if self.entries.iter().any(|e| e.hostname == info.hostname) {
            return false;
        }
        self.entries.push(info);
        true
    }

    /// The service at `index`, in discovery order.
    pub fn get(&self, index: usize) -> Option<&ServiceInfo> {
        self.entries.get(index)
    }

    /// Every listed service, in discovery order.
    pub fn as_slice(&self) -> &[ServiceInfo] {
        &self.entries
    }

    /// Number of distinct hosts listed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been discovered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_layout() {
        let info = ServiceInfo::new("10.0.0.2", 666, "deck");
        let bytes = info.to_datagram().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&8i32.to_le_bytes());
        expected.extend_from_slice(b"10.0.0.2");
        expected.extend_from_slice(&666i32.to_le_bytes());
        expected.extend_from_slice(&4i32.to_le_bytes());
        expected.extend_from_slice(b"deck");
        assert_eq!(bytes, expected);

        assert_eq!(ServiceInfo::from_datagram(&bytes).unwrap(), info);
    }

    #[test]
    fn test_truncated_datagram_is_rejected() {
        let bytes = ServiceInfo::new("10.0.0.2", 666, "deck").to_datagram().unwrap();
        assert!(matches!(
            ServiceInfo::from_datagram(&bytes[..bytes.len() - 2]),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_oversized_record_is_refused() {
        let info = ServiceInfo::new("10.0.0.2", 666, "h".repeat(MAX_DATAGRAM));
        assert!(matches!(
            info.to_datagram(),
            Err(ProtocolError::BufferOverflow { .. })
        ));

        // The largest hostname that still fits: two length prefixes, the ip
        // and the port take the rest.
        let room = MAX_DATAGRAM - 4 - "10.0.0.2".len() - 4 - 4;
        let info = ServiceInfo::new("10.0.0.2", 666, "h".repeat(room));
        let bytes = info.to_datagram().unwrap();
        assert_eq!(bytes.len(), MAX_DATAGRAM);
        assert_eq!(ServiceInfo::from_datagram(&bytes).unwrap(), info);
    }

    #[test]
    fn test_out_of_range_port_is_rejected() {
        let mut buf = [0u8; 64];
        let mut w = NetworkWriter::new(&mut buf);
        w.write_string("1.2.3.4").unwrap();
        w.write(70_000i32).unwrap();
        w.write_string("h").unwrap();
        let len = w.written();

        assert!(matches!(
            ServiceInfo::from_datagram(&buf[..len]),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_list_dedupes_by_hostname() {
        let mut list = ServiceList::new();
        assert!(list.insert(ServiceInfo::new("10.0.0.2", 666, "deck")));
        // Same host re-advertising, even from a new address, is not new.
        assert!(!list.insert(ServiceInfo::new("10.0.0.9", 667, "deck")));
        assert!(list.insert(ServiceInfo::new("10.0.0.3", 666, "bridge")));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().ip, "10.0.0.2");
        assert_eq!(list.get(1).unwrap().hostname, "bridge");
    }

    #[test]
    fn test_display() {
        let info = ServiceInfo::new("10.0.0.2", 666, "deck");
        assert_eq!(info.to_string(), "deck's game (10.0.0.2:666)");
    }
}

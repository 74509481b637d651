//! TCP push sink.
//!
//! Binds `tcp://host:port`, accepts any number of downstream consumers and
//! hands each frame to exactly one of them, round-robin. With no consumer
//! connected, `send` blocks until one arrives. A consumer whose socket fails
//! is dropped and the frame goes to the next one.

use chainwatch_core::{ConfigError, MessageSink, TransportError, WatcherError};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use url::{Host, Url};

struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
}

pub struct TcpPushSink {
    endpoint: String,
    listener: TcpListener,
    peers: Vec<Peer>,
    cursor: usize,
}

impl TcpPushSink {
    /// Bind the listening socket for `endpoint` (`tcp://host:port`, `*` for all interfaces).
    pub fn bind(endpoint: &str) -> Result<Self, WatcherError> {
        let addr = parse_endpoint(endpoint)?;
        let bind_err = |source: io::Error| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr.as_str()).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        tracing::info!(endpoint, local_addr = ?listener.local_addr().ok(), "Push socket bound");
        Ok(Self {
            endpoint: endpoint.to_string(),
            listener,
            peers: Vec::new(),
            cursor: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of connected consumers as of the last send.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn accept_err(&self, source: io::Error) -> TransportError {
        TransportError::Bind {
            endpoint: self.endpoint.clone(),
            source,
        }
    }

    fn add_peer(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<(), TransportError> {
        stream.set_nonblocking(false).map_err(|e| self.accept_err(e))?;
        // frames are small and latency matters more than packet count
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %addr, error = %e, "Could not disable Nagle");
        }
        tracing::info!(endpoint = %self.endpoint, peer = %addr, "Consumer connected");
        self.peers.push(Peer { stream, addr });
        Ok(())
    }

    /// Take every connection already waiting in the backlog.
    fn accept_waiting(&mut self) -> Result<(), TransportError> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.add_peer(stream, addr)?,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.accept_err(e)),
            }
        }
    }

    /// Block until one consumer connects.
    fn accept_one(&mut self) -> Result<(), TransportError> {
        tracing::warn!(endpoint = %self.endpoint, "No consumer connected; waiting");
        self.listener.set_nonblocking(false).map_err(|e| self.accept_err(e))?;
        let accepted = loop {
            match self.listener.accept() {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        self.listener.set_nonblocking(true).map_err(|e| self.accept_err(e))?;
        let (stream, addr) = accepted.map_err(|e| self.accept_err(e))?;
        self.add_peer(stream, addr)
    }
}

impl MessageSink for TcpPushSink {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.accept_waiting()?;

        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame);
        line.push(b'\n');

        loop {
            if self.peers.is_empty() {
                self.accept_one()?;
            }
            let idx = self.cursor % self.peers.len();
            let peer = &mut self.peers[idx];
            match peer.stream.write_all(&line) {
                Ok(()) => {
                    self.cursor = idx + 1;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        peer = %peer.addr,
                        error = %e,
                        "Dropping consumer after failed send"
                    );
                    self.peers.remove(idx);
                    self.cursor = idx;
                }
            }
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Turn `tcp://host:port` into a socket address string for `TcpListener::bind`.
pub fn parse_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBind {
        address: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "tcp" {
        return Err(invalid(format!("unsupported scheme '{}', expected tcp", url.scheme())));
    }
    let port = url.port().ok_or_else(|| invalid("missing port".into()))?;
    let host = match url.host() {
        Some(Host::Domain("*")) => "0.0.0.0".to_string(),
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(a)) => a.to_string(),
        Some(Host::Ipv6(a)) => format!("[{a}]"),
        None => return Err(invalid("missing host".into())),
    };
    Ok(format!("{host}:{port}"))
}

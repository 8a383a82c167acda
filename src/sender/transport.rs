//! Transport primitives for the forward connection.

use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use log::debug;

/// Host prefix selecting a Unix domain socket endpoint.
pub const UNIX_PREFIX: &str = "unix://";

/// Remote endpoint targeted by the sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP connection to `host:port`.
    Tcp {
        /// Hostname or IP address to connect to.
        host: String,
        /// TCP port number.
        port: u16,
    },
    /// Unix domain stream socket.
    Unix {
        /// Path to the socket file.
        path: PathBuf,
    },
}

impl Endpoint {
    /// Derive the endpoint from a configured host/port pair.
    ///
    /// A host beginning with `unix://` denotes a Unix domain stream socket
    /// at the given filesystem path; any other value denotes a TCP
    /// connection to `host:port`.
    pub fn from_host_port(host: &str, port: u16) -> Self {
        match host.strip_prefix(UNIX_PREFIX) {
            Some(path) => Endpoint::Unix {
                path: PathBuf::from(path),
            },
            None => Endpoint::Tcp {
                host: host.to_owned(),
                port,
            },
        }
    }
}

/// Active socket connection state.
enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Apply read and write timeouts to the underlying socket.
    fn set_timeouts(&self, timeout: Duration) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))
            }
            #[cfg(unix)]
            Connection::Unix(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))
            }
        }
    }

    /// Write a full buffer to the socket.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.write_all(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.write_all(buf),
        }
    }

    /// Flush the underlying writer.
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.flush(),
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no addresses resolved for {host}:{port}"),
        )
    }))
}

/// Owner of the single live connection.
///
/// At most one handle exists at a time; `None` represents "disconnected".
/// A handle is never reused after an error: the sender calls [`close`]
/// before the next attempt.
///
/// [`close`]: Transport::close
pub(crate) struct Transport {
    endpoint: Endpoint,
    timeout: Duration,
    connection: Option<Connection>,
}

impl Transport {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Establish the connection if none is live. Idempotent.
    pub fn ensure_connected(&mut self) -> io::Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = self.connect()?;
        connection.set_timeouts(self.timeout)?;
        debug!("connected to {:?}", self.endpoint);
        self.connection = Some(connection);
        Ok(())
    }

    fn connect(&self) -> io::Result<Connection> {
        match &self.endpoint {
            Endpoint::Tcp { host, port } => {
                connect_tcp(host, *port, self.timeout).map(Connection::Tcp)
            }
            Endpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    UnixStream::connect(path).map(Connection::Unix)
                }
                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "unix domain sockets are not supported on this platform",
                    ))
                }
            }
        }
    }

    /// Blocking full write to the live handle.
    ///
    /// Any error, including a partial write, is total failure of this
    /// attempt; the caller is expected to close the handle.
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no active connection"))?;
        connection.write_all(bytes)?;
        connection.flush()
    }

    /// Close and discard the handle if present; safe to call when already
    /// closed.
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("closed connection to {:?}", self.endpoint);
        }
    }
}

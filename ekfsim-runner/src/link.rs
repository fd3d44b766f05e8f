//! TCP link to the simulated vehicle
//!
//! The simulator listens on a TCP port once it has started. We retry the
//! connection for a while, then switch the stream to non-blocking and split
//! the byte stream into frames with the protocol's own framing.

use ekfsim_core::codec::{self, Scan};
use ekfsim_core::VehicleLink;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:5760";
pub const RETRY_INTERVAL: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 4096;

pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    buf: Vec<u8>,
}

impl TcpLink {
    /// Connect to `addr`, retrying every [`RETRY_INTERVAL`] until `retry_window`
    /// has elapsed.
    pub fn connect(addr: SocketAddr, retry_window: Duration) -> io::Result<Self> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match TcpStream::connect_timeout(&addr, RETRY_INTERVAL) {
                Ok(stream) => {
                    info!("connected to vehicle at {} after {} attempt(s)", addr, attempts);
                    return Self::from_stream(stream);
                }
                Err(e) if started.elapsed() < retry_window => {
                    debug!("connect to {} failed: {}, retrying", addr, e);
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            buf: Vec::with_capacity(READ_CHUNK),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Pop the next complete frame out of the receive buffer. A candidate
    /// that fails its checksum gives up only its magic byte.
    fn take_buffered(&mut self) -> Option<Vec<u8>> {
        match codec::find_frame(&self.buf) {
            Scan::Frame { skip, len } => {
                let frame = self.buf[skip..skip + len].to_vec();
                self.buf.drain(..skip + len);
                Some(frame)
            }
            Scan::Incomplete { skip } => {
                self.buf.drain(..skip);
                None
            }
            Scan::Garbage => {
                self.buf.clear();
                None
            }
        }
    }
}

impl VehicleLink for TcpLink {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < frame.len() {
            match self.stream.write(&frame[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                // The socket is non-blocking; a full send buffer drains quickly.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn try_recv_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.take_buffered() {
                return Ok(Some(frame));
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("vehicle at {} closed the connection", self.peer),
                    ))
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

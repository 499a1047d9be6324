//! Blocking connection to the window manager's control socket.
//!
//! One [`Connection`] carries both directions of traffic: requests we send,
//! and the replies plus subscribed events the window manager sends back.
//! [`Connection::request`] filters the interleaved events out while waiting
//! for its reply; the supervisor reads them via [`Connection::receive`] the
//! rest of the time.
//!
//! The connection is generic over the byte stream so the codec can be
//! exercised against in-memory streams in tests; production code uses
//! [`UnixStream`].

use super::{Event, Frame, IpcError, Message, EVENT_BIT, MAGIC};
use crate::traits::WmIpc;
use crate::tree::{Node, Workspace};
use log::{debug, warn};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// A duplex connection speaking the i3 IPC framing.
///
/// Invalid after any error other than [`IpcError::CommandFailed`]; the
/// supervisor discards it and reconnects.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
}

impl Connection<UnixStream> {
    /// Open the window manager's socket at `path`.
    pub fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            stream: UnixStream::connect(path)?,
        })
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an already-open byte stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Serialize `msg` with `payload` and write the frame in one piece.
    pub fn send(&mut self, msg: Message, payload: &str) -> Result<(), IpcError> {
        let payload = payload.as_bytes();
        let mut frame = Vec::with_capacity(14 + payload.len());
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&msg.code().to_le_bytes());
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame).map_err(classify_write_error)
    }

    /// Read one frame, blocking until it is complete.
    ///
    /// The leading magic is not separately validated; the length and type
    /// code sit at fixed offsets behind it.
    pub fn receive(&mut self) -> Result<Frame, IpcError> {
        let mut header = [0u8; 14];
        self.read_full(&mut header)?;
        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let code = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);

        let mut payload = vec![0u8; len];
        self.read_full(&mut payload)?;
        let value = if payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&payload)?
        };

        if code & EVENT_BIT != 0 {
            let event = Event::from_code(code & !EVENT_BIT).ok_or(IpcError::UnknownType(code))?;
            Ok(Frame::Event(event, value))
        } else {
            let msg = Message::from_code(code).ok_or(IpcError::UnknownType(code))?;
            Ok(Frame::Reply(msg, value))
        }
    }

    /// Send `msg` and block until its reply arrives.
    ///
    /// Events interleaved before the reply are discarded — the subscription
    /// is live on the same connection, so they are expected.  A
    /// `run_command` reply is a list with one entry per submitted command;
    /// we only ever submit one, so the first entry is taken.  Any object
    /// reply with `"success": false` becomes [`IpcError::CommandFailed`].
    pub fn request(&mut self, msg: Message, payload: &str) -> Result<Value, IpcError> {
        self.send(msg, payload)?;
        loop {
            match self.receive()? {
                Frame::Event(event, _) => {
                    debug!("discarding {} event while waiting for {} reply", event, msg);
                }
                Frame::Reply(got, value) if got == msg => {
                    let value = match (msg, value) {
                        (Message::RunCommand, Value::Array(mut results)) if !results.is_empty() => {
                            results.remove(0)
                        }
                        (_, value) => value,
                    };
                    if let Some(object) = value.as_object() {
                        if object.get("success").and_then(Value::as_bool) == Some(false) {
                            let message = object
                                .get("error")
                                .and_then(Value::as_str)
                                .unwrap_or("unspecified error")
                                .to_string();
                            return Err(IpcError::CommandFailed(message));
                        }
                    }
                    return Ok(value);
                }
                Frame::Reply(got, _) => {
                    warn!("discarding unexpected {} reply while waiting for {}", got, msg);
                }
            }
        }
    }

    /// Subscribe this connection to `events`.
    pub fn subscribe(&mut self, events: &[Event]) -> Result<(), IpcError> {
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        let payload = serde_json::to_string(&names)?;
        self.request(Message::Subscribe, &payload)?;
        Ok(())
    }

    /// Read exactly `buf.len()` bytes, looping over short reads.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<(), IpcError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(IpcError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    return Err(IpcError::Interrupted)
                }
                Err(e) => return Err(IpcError::Io(e)),
            }
        }
        Ok(())
    }
}

/// Writes to a peer that has gone away report the closed connection, same
/// as an EOF read.
fn classify_write_error(e: io::Error) -> IpcError {
    match e.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => IpcError::ConnectionClosed,
        io::ErrorKind::Interrupted => IpcError::Interrupted,
        _ => IpcError::Io(e),
    }
}

impl<S: Read + Write> WmIpc for Connection<S> {
    fn tree(&mut self) -> Result<Node, IpcError> {
        let value = self.request(Message::GetTree, "")?;
        Ok(serde_json::from_value(value)?)
    }

    fn workspaces(&mut self) -> Result<Vec<Workspace>, IpcError> {
        let value = self.request(Message::GetWorkspaces, "")?;
        Ok(serde_json::from_value(value)?)
    }

    fn run(&mut self, command: &str) -> Result<(), IpcError> {
        self.request(Message::RunCommand, command)?;
        Ok(())
    }
}

//  Tests

//! i3 IPC protocol transport.
//!
//! Implements the binary framing spoken by i3-compatible window managers on
//! their control socket: a fixed `i3-ipc` magic, a little-endian payload
//! length, a little-endian type code, and a UTF-8 JSON payload.  Replies and
//! subscribed events arrive interleaved on the same connection; the type
//! code's top bit tells them apart.
//!
//! The command and event tables below are a wire compatibility contract with
//! the window manager — their order defines the codes and must not change.

pub mod connection;

pub use connection::Connection;

use std::fmt;

/// Magic literal opening every frame.
pub const MAGIC: [u8; 6] = *b"i3-ipc";

/// Set in the type code of event frames; the remaining 31 bits index the
/// event table.
pub(crate) const EVENT_BIT: u32 = 0x8000_0000;

/// A command message, in wire-code order (codes 0–9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    RunCommand,
    GetWorkspaces,
    Subscribe,
    GetOutputs,
    GetTree,
    GetMarks,
    GetBarConfig,
    GetVersion,
    GetBindingModes,
    SendTick,
}

impl Message {
    /// Every command, in wire-code order.
    pub const ALL: [Message; 10] = [
        Message::RunCommand,
        Message::GetWorkspaces,
        Message::Subscribe,
        Message::GetOutputs,
        Message::GetTree,
        Message::GetMarks,
        Message::GetBarConfig,
        Message::GetVersion,
        Message::GetBindingModes,
        Message::SendTick,
    ];

    /// Wire code of this command.
    pub fn code(self) -> u32 {
        match self {
            Message::RunCommand => 0,
            Message::GetWorkspaces => 1,
            Message::Subscribe => 2,
            Message::GetOutputs => 3,
            Message::GetTree => 4,
            Message::GetMarks => 5,
            Message::GetBarConfig => 6,
            Message::GetVersion => 7,
            Message::GetBindingModes => 8,
            Message::SendTick => 9,
        }
    }

    /// Resolve a reply-frame type code, or `None` if it is not in the table.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Message::RunCommand),
            1 => Some(Message::GetWorkspaces),
            2 => Some(Message::Subscribe),
            3 => Some(Message::GetOutputs),
            4 => Some(Message::GetTree),
            5 => Some(Message::GetMarks),
            6 => Some(Message::GetBarConfig),
            7 => Some(Message::GetVersion),
            8 => Some(Message::GetBindingModes),
            9 => Some(Message::SendTick),
            _ => None,
        }
    }

    /// Protocol name of this command.
    pub fn name(self) -> &'static str {
        match self {
            Message::RunCommand => "run_command",
            Message::GetWorkspaces => "get_workspaces",
            Message::Subscribe => "subscribe",
            Message::GetOutputs => "get_outputs",
            Message::GetTree => "get_tree",
            Message::GetMarks => "get_marks",
            Message::GetBarConfig => "get_bar_config",
            Message::GetVersion => "get_version",
            Message::GetBindingModes => "get_binding_modes",
            Message::SendTick => "send_tick",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An asynchronous event, in wire-code order (codes 0–7, top bit set on the
/// wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Workspace,
    Output,
    Mode,
    Window,
    BarconfigUpdate,
    Binding,
    Shutdown,
    Tick,
}

impl Event {
    /// Every event, in wire-code order.
    pub const ALL: [Event; 8] = [
        Event::Workspace,
        Event::Output,
        Event::Mode,
        Event::Window,
        Event::BarconfigUpdate,
        Event::Binding,
        Event::Shutdown,
        Event::Tick,
    ];

    /// Wire code of this event (without the event bit).
    pub fn code(self) -> u32 {
        match self {
            Event::Workspace => 0,
            Event::Output => 1,
            Event::Mode => 2,
            Event::Window => 3,
            Event::BarconfigUpdate => 4,
            Event::Binding => 5,
            Event::Shutdown => 6,
            Event::Tick => 7,
        }
    }

    /// Resolve an event-frame type code (event bit already stripped), or
    /// `None` if it is not in the table.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Event::Workspace),
            1 => Some(Event::Output),
            2 => Some(Event::Mode),
            3 => Some(Event::Window),
            4 => Some(Event::BarconfigUpdate),
            5 => Some(Event::Binding),
            6 => Some(Event::Shutdown),
            7 => Some(Event::Tick),
            _ => None,
        }
    }

    /// Protocol name of this event, as used in the subscribe payload.
    pub fn name(self) -> &'static str {
        match self {
            Event::Workspace => "workspace",
            Event::Output => "output",
            Event::Mode => "mode",
            Event::Window => "window",
            Event::BarconfigUpdate => "barconfig_update",
            Event::Binding => "binding",
            Event::Shutdown => "shutdown",
            Event::Tick => "tick",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A reply to a command we sent.
    Reply(Message, serde_json::Value),
    /// An event pushed by the window manager.
    Event(Event, serde_json::Value),
}

/// Errors from the IPC transport.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The window manager closed the connection (or it broke mid-frame).
    #[error("connection closed by window manager")]
    ConnectionClosed,
    /// A blocking read was cut short by a signal.
    #[error("interrupted by signal")]
    Interrupted,
    /// A frame carried a type code outside both tables.
    #[error("unknown frame type code {0:#010x}")]
    UnknownType(u32),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// The window manager reported a command failure.
    #[error("command failed: {0}")]
    CommandFailed(String),
}

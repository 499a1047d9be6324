//! **automark** — automatic spatial window marks for i3 and sway.
//!
//! automark keeps a single-character mark on every visible window so that
//! keybindings like `[con_mark=Q] focus` always reach the window at a
//! predictable screen position.  It connects to the window manager's IPC
//! socket, subscribes to layout events, and re-derives the full mark
//! assignment whenever the layout changes: windows are ordered workspace by
//! workspace (top-to-bottom, left-to-right across monitors), depth-first
//! within each workspace, and zipped against the mark alphabet.
//!
//! # Architecture
//!
//! * [`ipc`] — the binary i3-ipc framing and a blocking
//!   [`Connection`](ipc::Connection) that demultiplexes replies and
//!   subscribed events on one socket.
//! * [`tree`] — snapshot types for `get_tree` / `get_workspaces` and the
//!   traversal that orders markable windows.
//! * [`marker`] — one reconciliation pass from snapshots to
//!   `mark --replace` commands.
//! * [`supervisor`] — socket discovery, reconnect, and the event loop.
//! * [`traits::WmIpc`] — the seam that lets the reconciler run against a
//!   mock window manager in tests.

pub mod ipc;
pub mod marker;
pub mod supervisor;
pub mod traits;
pub mod tree;

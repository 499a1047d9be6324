//! The seam between the reconciler and the IPC transport.
//!
//! The [`Marker`](crate::marker::Marker) only depends on this abstraction,
//! so reconciliation logic can run against a recording mock in tests while
//! production wires in a live [`Connection`](crate::ipc::Connection).

use crate::ipc::IpcError;
use crate::tree::{Node, Workspace};

/// The window-manager queries and commands one reconciliation pass needs.
///
/// Methods return the concrete [`IpcError`] rather than an associated error
/// type: the reconciler has to inspect command-failure text to tell a benign
/// lost-window race from a fatal protocol error, which an opaque error could
/// not express.
pub trait WmIpc {
    /// Fetch a fresh snapshot of the full layout tree.
    fn tree(&mut self) -> Result<Node, IpcError>;

    /// Fetch a fresh snapshot of the workspace list.
    fn workspaces(&mut self) -> Result<Vec<Workspace>, IpcError>;

    /// Execute a single window-manager command string.
    fn run(&mut self, command: &str) -> Result<(), IpcError>;
}

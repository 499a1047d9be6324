//! One reconciliation pass: snapshot the layout, order the markable
//! windows, and issue the mark commands.
//!
//! Marks are recomputed from scratch every pass — there is no incremental
//! diffing.  The `mark --replace` command atomically strips a mark from
//! wherever it sits before attaching it, so each mark names at most one
//! window at any instant.

use crate::ipc::IpcError;
use crate::traits::WmIpc;
use crate::tree::{select, visible_in_spatial_order};
use log::debug;

/// Error text the window manager reports when a command's criteria match no
/// window.  Compared verbatim: the protocol carries no structured error
/// code, so a wording change in the window manager turns this race fatal.
pub const NO_MATCHING_WINDOW: &str = "No matching node.";

/// Which workspaces a pass considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the focused workspace.
    Focused,
    /// Every visible workspace, top-to-bottom then left-to-right.
    Visible,
}

/// Assigns the mark alphabet to windows in spatial order.
#[derive(Debug, Clone)]
pub struct Marker {
    marks: String,
    scope: Scope,
}

impl Marker {
    /// Create a marker over the given alphabet.
    ///
    /// Marks are single characters, assigned to windows positionally: the
    /// first selected window gets the first character, and so on.  Windows
    /// beyond the alphabet receive no mark; leftover marks go unused.
    pub fn new(marks: impl Into<String>, scope: Scope) -> Self {
        Self {
            marks: marks.into(),
            scope,
        }
    }

    /// Run one full pass against `ipc`.
    ///
    /// A command that fails because its window vanished between the tree
    /// snapshot and the command is an expected race under concurrent window
    /// closure and is swallowed; any other failure aborts the pass.
    pub fn refresh(&self, ipc: &mut impl WmIpc) -> Result<(), IpcError> {
        let tree = ipc.tree()?;
        let workspaces = ipc.workspaces()?;

        let targets = match self.scope {
            Scope::Focused => match workspaces.iter().find(|w| w.focused) {
                Some(workspace) => vec![workspace.name.clone()],
                None => {
                    // Transiently possible between focus changes; the next
                    // event triggers another pass.
                    debug!("no focused workspace, skipping pass");
                    return Ok(());
                }
            },
            Scope::Visible => visible_in_spatial_order(&workspaces),
        };

        for (id, mark) in select(&tree, &targets).zip(self.marks.chars()) {
            let command = format!("[con_id=\"{}\"] mark --replace {}", id, mark);
            match ipc.run(&command) {
                Err(IpcError::CommandFailed(ref message)) if message == NO_MATCHING_WINDOW => {
                    debug!("window {} vanished before marking", id);
                }
                other => other?,
            }
        }
        Ok(())
    }
}

//  Tests

//! Layout snapshots and the traversal that orders markable windows.
//!
//! [`Node`] and [`Workspace`] mirror just the fields of the `get_tree` and
//! `get_workspaces` replies that mark assignment needs.  Both are transient:
//! every reconciliation pass fetches fresh snapshots and never caches them.
//!
//! [`select`] walks a tree snapshot and yields window ids in mark-priority
//! order: target workspaces first-to-last, then depth-first pre-order within
//! each workspace, ordinary children before floating ones.

use serde::Deserialize;

/// On-screen geometry as reported by the window manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One entry of a `get_workspaces` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub focused: bool,
}

/// Container kind (`"type"` in the JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Output,
    Con,
    FloatingCon,
    Workspace,
    Dockarea,
    /// Any kind a newer window manager version may introduce.
    #[serde(other)]
    Other,
}

/// One node of a `get_tree` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub window_rect: Rect,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub floating_nodes: Vec<Node>,
}

impl Node {
    /// A node with real on-screen geometry is a leaf window — tiled,
    /// floating, or popup.
    fn is_window(&self) -> bool {
        self.window_rect.width > 0 && self.window_rect.height > 0
    }
}

/// Names of the visible workspaces, top-to-bottom then left-to-right.
///
/// This ordering gives the mark alphabet its global priority across
/// monitors.
pub fn visible_in_spatial_order(workspaces: &[Workspace]) -> Vec<String> {
    let mut visible: Vec<&Workspace> = workspaces.iter().filter(|w| w.visible).collect();
    visible.sort_by_key(|w| (w.rect.y, w.rect.x));
    visible.into_iter().map(|w| w.name.clone()).collect()
}

/// Yield the ids of markable windows under `root`, scoped to `targets`.
///
/// `targets` is the ordered list of workspace names in scope; pass a single
/// name for focused-only operation.  The returned iterator is lazy and
/// finite; recompute it from a fresh snapshot each pass.
pub fn select<'a>(root: &'a Node, targets: &'a [String]) -> Windows<'a> {
    Windows {
        root,
        targets: targets.iter(),
        current: None,
        stack: Vec::new(),
    }
}

/// Iterator behind [`select`].
///
/// An explicit stack of pending nodes replaces the recursive walk: the top
/// of the stack is the next node to visit, and children are pushed in
/// reverse so ordinary children pop before floating ones, each list in its
/// own order.
pub struct Windows<'a> {
    root: &'a Node,
    targets: std::slice::Iter<'a, String>,
    current: Option<&'a str>,
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Windows<'a> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            let node = match self.stack.pop() {
                Some(node) => node,
                None => {
                    // Current target exhausted; start over from the root for
                    // the next one.
                    let target = self.targets.next()?;
                    self.current = Some(target.as_str());
                    self.stack.push(self.root);
                    continue;
                }
            };

            if node.is_window() {
                return Some(node.id);
            }
            match node.kind {
                NodeKind::Dockarea => continue,
                NodeKind::Workspace if node.name.as_deref() != self.current => continue,
                _ => {}
            }
            for child in node.floating_nodes.iter().rev() {
                self.stack.push(child);
            }
            for child in node.nodes.iter().rev() {
                self.stack.push(child);
            }
        }
    }
}

//  Tests

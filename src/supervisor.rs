//! Outer lifecycle: discover the control socket, connect, subscribe, and
//! keep mark assignments converged as layout events arrive.
//!
//! The supervisor owns the single connection for its whole lifetime and
//! cycles through discovery → connect → subscribe → listen.  A closed
//! transport at any point loops back to discovery; a missing window-manager
//! binary is retried on a short budget; everything else is fatal and is
//! never retried.

use crate::ipc::{Connection, Event, Frame, IpcError};
use crate::marker::Marker;
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Consecutive discovery misses tolerated before giving up.
const MAX_LAUNCHER_MISSES: u32 = 10;

/// Delay between discovery retries.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Window-change reasons that can alter which windows exist or where they
/// sit in the traversal order.
const RELEVANT_WINDOW_CHANGES: [&str; 4] = ["new", "close", "move", "floating"];

//  Interrupt handling

/// Set by the SIGINT handler; observed between supervisor iterations.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler.
///
/// Registered without `SA_RESTART` so a read blocked on the socket unwinds
/// with `EINTR` instead of resuming, letting the supervisor observe the
/// interrupt at its next loop entry.
pub fn install_interrupt_handler() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_interrupt as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

//  Flavor

/// Which window-manager flavor to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    I3,
    Sway,
}

impl Flavor {
    /// Name of the window-manager binary asked for the socket path.
    pub fn binary(self) -> &'static str {
        match self {
            Flavor::I3 => "i3",
            Flavor::Sway => "sway",
        }
    }

    /// Events subscribed to on connect.  Sway lacks output events.
    pub fn events(self) -> &'static [Event] {
        match self {
            Flavor::I3 => &[Event::Workspace, Event::Output, Event::Window],
            Flavor::Sway => &[Event::Workspace, Event::Window],
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

//  Errors

/// Errors that terminate the process.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// The window-manager binary stayed missing through the retry budget.
    #[error("{0} executable not found after repeated attempts")]
    LauncherMissing(&'static str),
    /// The binary ran but produced no usable socket path.
    #[error("socket discovery failed: {0}")]
    Discovery(String),
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

/// How a single discovery attempt failed.
#[derive(Debug)]
enum DiscoverError {
    /// The binary is not installed or not on PATH.
    Missing,
    /// The binary ran but misbehaved; not transient.
    Failed(String),
}

/// Ask the window manager for its socket path by running
/// `<binary> --get-socketpath` and reading its stdout.
fn discover_socket_path(binary: &str) -> Result<PathBuf, DiscoverError> {
    let output = Command::new(binary)
        .arg("--get-socketpath")
        .output()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DiscoverError::Missing
            } else {
                DiscoverError::Failed(e.to_string())
            }
        })?;
    if !output.status.success() {
        return Err(DiscoverError::Failed(format!(
            "{} exited with {}",
            binary, output.status
        )));
    }
    let path = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if path.is_empty() {
        return Err(DiscoverError::Failed(format!(
            "{} printed no socket path",
            binary
        )));
    }
    Ok(PathBuf::from(path))
}

//  Supervisor

/// Owns the connection lifecycle and drives the [`Marker`].
pub struct Supervisor {
    flavor: Flavor,
    marker: Marker,
    /// Consecutive discovery attempts that found no binary; reset on any
    /// successful discovery.
    launcher_misses: u32,
}

impl Supervisor {
    pub fn new(flavor: Flavor, marker: Marker) -> Self {
        Self {
            flavor,
            marker,
            launcher_misses: 0,
        }
    }

    /// Run until interrupted (`Ok`) or a fatal error occurs.
    ///
    /// A closed transport — whether the socket failed to open or broke
    /// later — loops back to discovery.  Everything else propagates.
    pub fn run(&mut self) -> Result<(), FatalError> {
        loop {
            if interrupted() {
                info!("interrupted, shutting down");
                return Ok(());
            }

            let path = match discover_socket_path(self.flavor.binary()) {
                Ok(path) => {
                    self.launcher_misses = 0;
                    path
                }
                Err(DiscoverError::Missing) => {
                    self.note_launcher_miss()?;
                    continue;
                }
                Err(DiscoverError::Failed(reason)) => {
                    if interrupted() {
                        return Ok(());
                    }
                    return Err(FatalError::Discovery(reason));
                }
            };

            let mut conn = match Connection::connect(&path) {
                Ok(conn) => conn,
                Err(e) => {
                    // The manager may be restarting; rediscover and retry.
                    debug!("connect to {} failed: {}", path.display(), e);
                    continue;
                }
            };
            info!("connected to {} at {}", self.flavor, path.display());

            match self.session(&mut conn) {
                Err(IpcError::ConnectionClosed) => {
                    info!("connection closed, reconnecting");
                }
                Err(IpcError::Interrupted) => {
                    info!("interrupted, shutting down");
                    return Ok(());
                }
                Err(e) => {
                    if interrupted() {
                        return Ok(());
                    }
                    return Err(e.into());
                }
                Ok(()) => unreachable!("session only returns through an error"),
            }
        }
    }

    /// One connected session: subscribe, converge once, then react to
    /// events until the transport errors out.
    fn session<S: Read + Write>(&mut self, conn: &mut Connection<S>) -> Result<(), IpcError> {
        conn.subscribe(self.flavor.events())?;
        self.marker.refresh(conn)?;
        loop {
            match conn.receive()? {
                Frame::Event(event, payload) => {
                    if relevant(event, &payload) {
                        debug!("{} event, refreshing marks", event);
                        self.marker.refresh(conn)?;
                    } else {
                        debug!("ignoring {} event", event);
                    }
                }
                Frame::Reply(msg, _) => {
                    warn!("unsolicited {} reply, ignoring", msg);
                }
            }
        }
    }

    /// Record a discovery attempt that found no window-manager binary,
    /// giving up once the budget is spent.
    fn note_launcher_miss(&mut self) -> Result<(), FatalError> {
        self.launcher_misses += 1;
        if self.launcher_misses > MAX_LAUNCHER_MISSES {
            return Err(FatalError::LauncherMissing(self.flavor.binary()));
        }
        debug!(
            "{} not found (attempt {}), retrying",
            self.flavor.binary(),
            self.launcher_misses
        );
        thread::sleep(RETRY_DELAY);
        Ok(())
    }
}

/// Whether an event can change the set or order of markable windows.
fn relevant(event: Event, payload: &Value) -> bool {
    match event {
        Event::Workspace | Event::Output => true,
        Event::Window => payload
            .get("change")
            .and_then(Value::as_str)
            .is_some_and(|change| RELEVANT_WINDOW_CHANGES.contains(&change)),
        _ => false,
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{Message, EVENT_BIT, MAGIC};
    use crate::marker::Scope;
    use serde_json::json;
    use std::os::unix::net::UnixStream;

    #[test]
    fn flavors_pick_binary_and_event_set() {
        assert_eq!(Flavor::I3.binary(), "i3");
        assert_eq!(Flavor::Sway.binary(), "sway");
        assert_eq!(
            Flavor::I3.events(),
            &[Event::Workspace, Event::Output, Event::Window]
        );
        // Sway gets no output subscription.
        assert_eq!(Flavor::Sway.events(), &[Event::Workspace, Event::Window]);
    }

    #[test]
    fn workspace_and_output_events_are_always_relevant() {
        assert!(relevant(Event::Workspace, &json!({ "change": "focus" })));
        assert!(relevant(Event::Output, &json!({})));
    }

    #[test]
    fn window_events_are_filtered_by_change_reason() {
        for change in RELEVANT_WINDOW_CHANGES {
            assert!(relevant(Event::Window, &json!({ "change": change })), "{}", change);
        }
        assert!(!relevant(Event::Window, &json!({ "change": "focus" })));
        assert!(!relevant(Event::Window, &json!({ "change": "title" })));
        assert!(!relevant(Event::Window, &json!({})));
    }

    #[test]
    fn other_events_are_ignored() {
        assert!(!relevant(Event::Mode, &json!({})));
        assert!(!relevant(Event::Binding, &json!({})));
        assert!(!relevant(Event::Tick, &json!({})));
    }

    #[test]
    fn missing_binary_is_distinguished_from_other_failures() {
        match discover_socket_path("automark-test-no-such-binary") {
            Err(DiscoverError::Missing) => {}
            other => panic!("expected Missing, got {:?}", other),
        }
        // `false` exists but exits nonzero: a non-transient failure.
        match discover_socket_path("false") {
            Err(DiscoverError::Failed(_)) => {}
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn discovery_trims_the_reported_path() {
        // echo prints its argument plus a trailing newline.
        let path = discover_socket_path("echo").unwrap();
        assert_eq!(path, PathBuf::from("--get-socketpath"));
    }

    #[test]
    fn launcher_miss_budget_escalates_after_ten() {
        let marker = Marker::new("Q", Scope::Visible);
        let mut supervisor = Supervisor::new(Flavor::I3, marker);
        for _ in 0..MAX_LAUNCHER_MISSES {
            supervisor.note_launcher_miss().unwrap();
        }
        match supervisor.note_launcher_miss() {
            Err(FatalError::LauncherMissing("i3")) => {}
            other => panic!("expected LauncherMissing, got {:?}", other),
        }
    }

    //  Socket-level session test

    fn frame(code: u32, payload: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    fn reply(msg: Message, payload: &str) -> Vec<u8> {
        frame(msg.code(), payload)
    }

    fn event(event: Event, payload: &str) -> Vec<u8> {
        frame(EVENT_BIT | event.code(), payload)
    }

    fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    /// Full session over a real socket pair: subscribe, initial pass, one
    /// relevant and one irrelevant event, then EOF.
    #[test]
    fn session_refreshes_on_relevant_events_until_eof() {
        let tree = json!({
            "id": 1, "type": "root",
            "nodes": [
                { "id": 2, "type": "workspace", "name": "1",
                  "nodes": [ { "id": 7, "type": "con",
                               "window_rect": { "width": 800, "height": 600 } } ] }
            ]
        })
        .to_string();
        let workspaces =
            json!([{ "name": "1", "rect": { "x": 0, "y": 0 }, "visible": true, "focused": true }])
                .to_string();
        let ok = r#"[{"success":true}]"#;

        let mut script = Vec::new();
        script.extend(reply(Message::Subscribe, r#"{"success":true}"#));
        // Initial pass.
        script.extend(reply(Message::GetTree, &tree));
        script.extend(reply(Message::GetWorkspaces, &workspaces));
        script.extend(reply(Message::RunCommand, ok));
        // Relevant event; a workspace event slips in mid-refresh and is
        // discarded by the pending request.
        script.extend(event(Event::Window, r#"{"change":"new"}"#));
        script.extend(reply(Message::GetTree, &tree));
        script.extend(event(Event::Workspace, r#"{"change":"focus"}"#));
        script.extend(reply(Message::GetWorkspaces, &workspaces));
        script.extend(reply(Message::RunCommand, ok));
        // Irrelevant event, then the manager goes away.
        script.extend(event(Event::Window, r#"{"change":"title"}"#));

        let (client, mut server) = UnixStream::pair().unwrap();
        let server_thread = std::thread::spawn(move || {
            server.write_all(&script).unwrap();
            server.shutdown(std::net::Shutdown::Write).unwrap();
            let mut sent_by_client = Vec::new();
            server.read_to_end(&mut sent_by_client).unwrap();
            sent_by_client
        });

        let marker = Marker::new("QW", Scope::Visible);
        let mut supervisor = Supervisor::new(Flavor::Sway, marker);
        let mut conn = Connection::new(client);
        let result = supervisor.session(&mut conn);
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
        drop(conn);

        let sent = server_thread.join().unwrap();
        // One subscription, and exactly two passes' worth of commands: the
        // title event must not have triggered a third.
        assert_eq!(count_occurrences(&sent, br#"["workspace","window"]"#), 1);
        assert_eq!(
            count_occurrences(&sent, br#"[con_id="7"] mark --replace Q"#),
            2
        );
        let get_tree_request = frame(Message::GetTree.code(), "");
        assert_eq!(count_occurrences(&sent, &get_tree_request), 2);
    }

    /// A workspace event mid-session triggers a refresh too.
    #[test]
    fn workspace_events_trigger_refresh() {
        let tree = json!({
            "id": 1, "type": "root",
            "nodes": [
                { "id": 2, "type": "workspace", "name": "1",
                  "nodes": [ { "id": 9, "type": "con",
                               "window_rect": { "width": 640, "height": 480 } } ] }
            ]
        })
        .to_string();
        let workspaces =
            json!([{ "name": "1", "rect": { "x": 0, "y": 0 }, "visible": true, "focused": true }])
                .to_string();
        let ok = r#"[{"success":true}]"#;

        let mut script = Vec::new();
        script.extend(reply(Message::Subscribe, r#"{"success":true}"#));
        script.extend(reply(Message::GetTree, &tree));
        script.extend(reply(Message::GetWorkspaces, &workspaces));
        script.extend(reply(Message::RunCommand, ok));
        script.extend(event(Event::Workspace, r#"{"change":"init"}"#));
        script.extend(reply(Message::GetTree, &tree));
        script.extend(reply(Message::GetWorkspaces, &workspaces));
        script.extend(reply(Message::RunCommand, ok));

        let (client, mut server) = UnixStream::pair().unwrap();
        let server_thread = std::thread::spawn(move || {
            server.write_all(&script).unwrap();
            server.shutdown(std::net::Shutdown::Write).unwrap();
            let mut sent_by_client = Vec::new();
            server.read_to_end(&mut sent_by_client).unwrap();
            sent_by_client
        });

        let marker = Marker::new("Q", Scope::Visible);
        let mut supervisor = Supervisor::new(Flavor::I3, marker);
        let mut conn = Connection::new(client);
        assert!(matches!(
            supervisor.session(&mut conn),
            Err(IpcError::ConnectionClosed)
        ));
        drop(conn);

        let sent = server_thread.join().unwrap();
        assert_eq!(
            count_occurrences(&sent, br#"[con_id="9"] mark --replace Q"#),
            2
        );
    }
}

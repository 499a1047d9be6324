//! Entry point for the **automark** daemon.
//!
//! Parses the command line, wires a [`Marker`] into a [`Supervisor`], and
//! maps the outcome to the process exit status: success after an interrupt,
//! failure after a fatal error.

use automark::marker::{Marker, Scope};
use automark::supervisor::{install_interrupt_handler, Flavor, Supervisor};
use clap::Parser;
use log::error;

#[derive(Parser, Debug)]
#[command(name = "automark")]
#[command(about = "Assign spatially ordered single-character marks to visible windows")]
struct Args {
    /// Mark characters, assigned to windows in order.
    #[arg(default_value = "QWERTYUIOP")]
    marks: String,

    /// Only mark windows on the focused workspace.
    #[arg(short, long)]
    focused: bool,

    /// Talk to sway instead of i3.
    #[arg(long)]
    sway: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = install_interrupt_handler() {
        error!("failed to install signal handler: {}", e);
        std::process::exit(1);
    }

    let scope = if args.focused {
        Scope::Focused
    } else {
        Scope::Visible
    };
    let flavor = if args.sway { Flavor::Sway } else { Flavor::I3 };

    let mut supervisor = Supervisor::new(flavor, Marker::new(args.marks, scope));
    if let Err(e) = supervisor.run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

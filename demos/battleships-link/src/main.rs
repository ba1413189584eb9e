//! Two-player battleships over a salvo lockstep link.
//!
//! ```text
//! battleships-link --mode server --auto
//! battleships-link --mode client --discover
//! ```

mod console;
mod fleet;
mod game;
mod messages;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use parking_lot::Mutex;
use salvo::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::console::{Console, ConsoleAim, ConsoleSelector};
use crate::fleet::Fleet;
use crate::game::{Aim, AutoAim, Match, Outcome};

const FRAME: Duration = Duration::from_micros(1_000_000 / 60);

#[derive(Parser, Debug)]
#[command(name = "battleships-link", about = "Battleships between two machines")]
struct Args {
    /// JSON file with launch options. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// "server" hosts the game, "client" joins one.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<LaunchMode>,

    /// Server address to join.
    #[arg(long)]
    ip: Option<String>,

    /// TCP port to listen on or connect to.
    #[arg(long)]
    port: Option<u16>,

    /// Find a server on the LAN instead of using --ip/--port.
    #[arg(long)]
    discover: bool,

    /// Don't advertise a hosted game on the LAN.
    #[arg(long)]
    no_advertise: bool,

    /// Fleet placement, 0-3.
    #[arg(long, default_value_t = 0)]
    layout: u8,

    /// Pick targets automatically.
    #[arg(long)]
    auto: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_mode(s: &str) -> Result<LaunchMode, String> {
    s.parse().map_err(|e: SalvoError| e.to_string())
}

impl Args {
    fn launch_options(&self) -> Result<LaunchOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => LaunchOptions::default(),
        };
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if let Some(ip) = &self.ip {
            options.ip = ip.clone();
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        options.discover |= self.discover;
        options.advertise &= !self.no_advertise;
        Ok(options)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = args.launch_options()?;
    let console = Console::spawn()?;
    let fleet = Arc::new(Mutex::new(Fleet::with_layout(args.layout)));
    let (events_tx, events) = mpsc::channel();

    {
        let fleet = fleet.lock();
        println!("Your fleet ({} ships):\n{}", fleet.ships().len(), fleet.render());
    }

    let mut selector = ConsoleSelector::new(&console);
    let handler_fleet = fleet.clone();
    let mut peer = salvo::launch_with(&options, &mut selector, move |registry| {
        game::register(registry, handler_fleet, events_tx)
    })?;
    tracing::info!(role = %peer.role(), "connected");

    let mut aim: Box<dyn Aim + '_> = if args.auto {
        Box::new(AutoAim)
    } else {
        Box::new(ConsoleAim::new(&console))
    };
    let mut battle = Match::new(fleet);

    while peer.is_ready() && !battle.is_finished() {
        let started = Instant::now();

        peer.receive_messages()?;
        for event in events.try_iter() {
            battle.apply(&mut peer, event)?;
        }
        battle.tick(&mut peer, aim.as_mut())?;

        if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    match battle.outcome() {
        Some(Outcome::Won) => println!("You won!"),
        Some(Outcome::Lost) => println!("Your fleet is gone. You lost."),
        None => println!("The opponent left."),
    }
    peer.disconnect()?;
    Ok(())
}

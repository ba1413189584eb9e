//! Line input from stdin without blocking the frame loop.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use salvo::prelude::*;

use crate::fleet::Targets;
use crate::game::Aim;

/// Reads stdin on a background thread; the frame loop polls for lines.
pub struct Console {
    lines: Receiver<String>,
}

impl Console {
    pub fn spawn() -> io::Result<Self> {
        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { lines })
    }

    pub fn try_line(&self) -> Option<String> {
        self.lines.try_recv().ok()
    }
}

/// `"1"`..`"9"` to a list index.
fn parse_choice(line: &str) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(n @ 1..=9) => Some(n - 1),
        _ => None,
    }
}

/// `"x y"` or `"x,y"`.
fn parse_target(line: &str) -> Option<(i32, i32)> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((x, y))
}

/// Lists discovered games and waits for the player to press 1-9.
pub struct ConsoleSelector<'a> {
    console: &'a Console,
    shown: Option<usize>,
}

impl<'a> ConsoleSelector<'a> {
    pub fn new(console: &'a Console) -> Self {
        Self { console, shown: None }
    }
}

impl ServiceSelector for ConsoleSelector<'_> {
    fn select(&mut self, services: &[ServiceInfo]) -> Option<usize> {
        if self.shown != Some(services.len()) {
            self.shown = Some(services.len());
            if services.is_empty() {
                println!("Looking for games on the local network...");
            } else {
                println!("Games found:");
                for (i, service) in services.iter().take(9).enumerate() {
                    println!("  [{}] {service}", i + 1);
                }
                println!("Press 1-9 and Enter to join.");
            }
        }

        let line = self.console.try_line()?;
        match parse_choice(&line) {
            Some(index) if index < services.len() => Some(index),
            _ => {
                println!("No game {:?}.", line.trim());
                None
            }
        }
    }
}

/// Reads targets typed by the player.
pub struct ConsoleAim<'a> {
    console: &'a Console,
    prompted: bool,
}

impl<'a> ConsoleAim<'a> {
    pub fn new(console: &'a Console) -> Self {
        Self { console, prompted: false }
    }
}

impl Aim for ConsoleAim<'_> {
    fn next_target(&mut self, targets: &Targets) -> Option<(i32, i32)> {
        if !self.prompted {
            println!("{}", targets.render());
            println!("Your turn. Enter target as \"x y\":");
            self.prompted = true;
        }

        let line = self.console.try_line()?;
        match parse_target(&line) {
            Some((x, y)) => {
                self.prompted = false;
                Some((x, y))
            }
            None => {
                println!("Couldn't read {:?}, try \"3 4\".", line.trim());
                None
            }
        }
    }
}

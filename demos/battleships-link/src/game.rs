//! Match flow on top of the lockstep peer.
//!
//! ```text
//! both:     place fleet → FinishedBuilding (extra)
//! server:   both built  → GameStarting, SetBomber(0) (extra)
//! bomber:   BombField (lockstep, passes the turn)
//! defender: BombingResult (lockstep)
//!             miss → keeps the turn and becomes the bomber
//!             hit  → passes the turn back
//!           last ship sunk → FieldCleared (passes the turn)
//! winner:   GameOver (extra)
//! ```
//!
//! Handlers run inside `receive_messages`. Only the `BombField` handler
//! answers directly through the context, everything else is forwarded to
//! [`Match::apply`] on the frame loop.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use parking_lot::Mutex;
use salvo::prelude::*;

use crate::fleet::{Fleet, Shot, Targets};
use crate::messages::{
    BombField, BombingResult, FieldCleared, FinishedBuilding, GameOver, GameStarting, SetBomber,
    ShipSunk,
};

/// Something the network told us, delivered to the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FinishedBuilding(PeerId),
    GameStarting,
    SetBomber(PeerId),
    /// The opponent bombed our field and the answer is queued.
    Bombed { x: i32, y: i32, shot: Shot },
    Result(BombingResult),
    Sunk(ShipSunk),
    FieldCleared(PeerId),
    GameOver(PeerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

fn forward(events: &Sender<Event>, event: Event) {
    if events.send(event).is_err() {
        tracing::debug!("frame loop is gone, dropping event");
    }
}

/// Registers every game message on `registry`.
pub fn register(
    registry: &mut MessageRegistry,
    fleet: Arc<Mutex<Fleet>>,
    events: Sender<Event>,
) -> Result<(), ProtocolError> {
    let tx = events.clone();
    registry.register::<BombField, _>(move |bomb, ctx| {
        let shot = fleet.lock().bomb(bomb.x, bomb.y);
        answer(ctx, bomb, &shot);
        forward(&tx, Event::Bombed { x: bomb.x, y: bomb.y, shot });
    })?;

    let tx = events.clone();
    registry.register::<BombingResult, _>(move |result, _| forward(&tx, Event::Result(result)))?;
    let tx = events.clone();
    registry.register::<ShipSunk, _>(move |sunk, _| forward(&tx, Event::Sunk(sunk)))?;
    let tx = events.clone();
    registry.register::<SetBomber, _>(move |m, _| forward(&tx, Event::SetBomber(PeerId(m.id))))?;
    let tx = events.clone();
    registry.register::<GameStarting, _>(move |_, _| forward(&tx, Event::GameStarting))?;
    let tx = events.clone();
    registry.register::<FinishedBuilding, _>(move |m, _| {
        forward(&tx, Event::FinishedBuilding(PeerId(m.id)))
    })?;
    let tx = events.clone();
    registry.register::<FieldCleared, _>(move |m, _| {
        forward(&tx, Event::FieldCleared(PeerId(m.id)))
    })?;
    registry.register::<GameOver, _>(move |m, _| {
        forward(&events, Event::GameOver(PeerId(m.winner)))
    })
}

/// Queues the defender's reply to a bomb.
///
/// The bomb arrives just before the turn does, so these wait in the outbox
/// until the `LockstepPassing` behind it has been handled.
fn answer(ctx: &mut PeerContext<'_>, bomb: BombField, shot: &Shot) {
    let result = |hit| BombingResult { hit, x: bomb.x, y: bomb.y };
    match shot {
        Shot::OutOfBounds | Shot::Miss | Shot::Repeat => {
            ctx.send_with(result(false), SendMode::Lockstep, false);
        }
        Shot::Hit => ctx.send(result(true), SendMode::Lockstep),
        Shot::Sunk(ship) => {
            ctx.send_with(*ship, SendMode::Lockstep, false);
            ctx.send(result(true), SendMode::Lockstep);
        }
        Shot::Cleared(ship) => {
            ctx.send_with(*ship, SendMode::Lockstep, false);
            ctx.send_with(result(true), SendMode::Lockstep, false);
            let id = ctx.peer_id().0;
            ctx.send(FieldCleared { id }, SendMode::Lockstep);
        }
    }
}

/// Where the next bomb goes.
pub trait Aim {
    fn next_target(&mut self, targets: &Targets) -> Option<(i32, i32)>;
}

/// Bombs whatever [`Targets::suggest`] picks.
pub struct AutoAim;

impl Aim for AutoAim {
    fn next_target(&mut self, targets: &Targets) -> Option<(i32, i32)> {
        targets.suggest()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Bombing,
    /// Our field is cleared; waiting for the winner's `GameOver`.
    Sinking,
    Over,
}

/// One side of a match.
pub struct Match {
    fleet: Arc<Mutex<Fleet>>,
    targets: Targets,
    phase: Phase,
    announced: bool,
    opponent_built: bool,
    bomber: Option<PeerId>,
    awaiting_result: bool,
    outcome: Option<Outcome>,
}

impl Match {
    pub fn new(fleet: Arc<Mutex<Fleet>>) -> Self {
        Self {
            fleet,
            targets: Targets::default(),
            phase: Phase::Building,
            announced: false,
            opponent_built: false,
            bomber: None,
            awaiting_result: false,
            outcome: None,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// `true` once the loser has heard the result and may leave.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Over && self.outcome == Some(Outcome::Lost)
    }

    pub fn is_bombing(&self, me: PeerId) -> bool {
        self.phase == Phase::Bombing && self.bomber == Some(me) && !self.awaiting_result
    }

    fn opponent(me: PeerId) -> PeerId {
        if me == PeerId::SERVER { PeerId(1) } else { PeerId::SERVER }
    }

    /// Reacts to one forwarded network event.
    pub fn apply<T: Transport>(
        &mut self,
        peer: &mut NetworkPeer<T>,
        event: Event,
    ) -> Result<(), PeerError> {
        let me = peer.peer_id();
        match event {
            Event::FinishedBuilding(id) => {
                tracing::info!(%id, "opponent finished building");
                self.opponent_built = true;
            }
            Event::GameStarting => {
                println!("Both fleets are in position. Battle stations!");
                self.phase = Phase::Bombing;
            }
            Event::SetBomber(id) => self.bomber = Some(id),
            Event::Bombed { x, y, shot } => {
                println!("Incoming at ({x}, {y}): {}", describe(&shot));
                if !shot.is_hit() {
                    self.bomber = Some(me);
                } else if matches!(shot, Shot::Cleared(_)) {
                    self.phase = Phase::Sinking;
                }
                println!("{}", self.fleet.lock().render());
            }
            Event::Result(result) => {
                self.awaiting_result = false;
                self.targets.record(result.x, result.y, result.hit);
                if result.hit {
                    println!("Hit at ({}, {})!", result.x, result.y);
                } else {
                    println!("Splash at ({}, {}).", result.x, result.y);
                    self.bomber = Some(Self::opponent(me));
                }
            }
            Event::Sunk(sunk) => {
                println!("You sank a ship of length {}!", sunk.length);
                self.targets.record_sunk(&sunk);
            }
            Event::FieldCleared(id) if id != me => {
                self.outcome = Some(Outcome::Won);
                self.phase = Phase::Over;
                peer.send(&GameOver { winner: me.0 }, SendMode::Extra)?;
            }
            Event::FieldCleared(_) => {}
            Event::GameOver(winner) => {
                self.outcome = Some(if winner == me { Outcome::Won } else { Outcome::Lost });
                self.phase = Phase::Over;
            }
        }
        Ok(())
    }

    /// Per-frame work: announce the fleet, start the match, fire.
    pub fn tick<T: Transport>(
        &mut self,
        peer: &mut NetworkPeer<T>,
        aim: &mut dyn Aim,
    ) -> Result<(), PeerError> {
        let me = peer.peer_id();
        match self.phase {
            Phase::Building => {
                // The client learns its id from the server's first packet.
                let id_known = peer.role() == Role::Server || me != PeerId::SERVER;
                if !self.announced && id_known {
                    peer.send(&FinishedBuilding { id: me.0 }, SendMode::Extra)?;
                    self.announced = true;
                    println!("Fleet placed, waiting for the opponent.");
                }
                if peer.role() == Role::Server && self.announced && self.opponent_built {
                    peer.send(&GameStarting, SendMode::Extra)?;
                    peer.send(&SetBomber { id: me.0 }, SendMode::Extra)?;
                    self.bomber = Some(me);
                    self.phase = Phase::Bombing;
                    println!("Both fleets are in position. You fire first.");
                }
            }
            Phase::Bombing if self.is_bombing(me) && peer.is_current_owner() => {
                if let Some((x, y)) = aim.next_target(&self.targets) {
                    println!("Firing at ({x}, {y}).");
                    peer.send(&BombField { x, y }, SendMode::Lockstep)?;
                    self.awaiting_result = true;
                }
            }
            Phase::Bombing | Phase::Sinking | Phase::Over => {}
        }
        Ok(())
    }
}

fn describe(shot: &Shot) -> &'static str {
    match shot {
        Shot::OutOfBounds => "off the map",
        Shot::Miss => "miss",
        Shot::Repeat => "already hit",
        Shot::Hit => "hit",
        Shot::Sunk(_) => "ship sunk",
        Shot::Cleared(_) => "last ship sunk",
    }
}

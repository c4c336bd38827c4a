//! The single writer.
//!
//! [`StateActor`] owns the [`MissionDeck`] and is the only task that mutates
//! it. Everything else (the tailer, the gateway client, observers, external
//! samplers) sends [`StateCommand`]s through a [`StateHandle`]. After every
//! mutation the actor publishes a fresh [`DeckSnapshot`] on a `watch`
//! channel, which never blocks the writer no matter how slow observers are.

use std::sync::Arc;

use chrono::Utc;
use mission_deck_core::models::{ApprovalRequest, DeckSnapshot, DomainEvent, Usage, Vitals};
use mission_deck_core::pipeline::RevertSchedule;
use mission_deck_core::MissionDeck;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum StateCommand {
    /// A raw line from the tailer.
    Line(String),
    Event(DomainEvent),
    /// An approval request that arrived with structured fields.
    Approval(ApprovalRequest),
    SubmitMission {
        agent: Option<String>,
        command: String,
    },
    StageExpired(RevertSchedule),
    GatewayConnected(bool),
    Vitals(Vitals),
    Usage(Usage),
}

/// Cheap, cloneable access to the state actor.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::UnboundedSender<StateCommand>,
    snapshots: watch::Receiver<Arc<DeckSnapshot>>,
}

impl StateHandle {
    /// Queue a command. Returns false once the actor has stopped.
    pub fn send(&self, command: StateCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn ingest_line(&self, line: String) -> bool {
        self.send(StateCommand::Line(line))
    }

    pub fn apply(&self, event: DomainEvent) -> bool {
        self.send(StateCommand::Event(event))
    }

    pub fn request_approval(&self, request: ApprovalRequest) -> bool {
        self.send(StateCommand::Approval(request))
    }

    pub fn submit_mission(&self, agent: Option<String>, command: String) -> bool {
        self.send(StateCommand::SubmitMission { agent, command })
    }

    pub fn set_gateway_connected(&self, connected: bool) -> bool {
        self.send(StateCommand::GatewayConnected(connected))
    }

    /// Entry point for the host-resource sampler.
    pub fn set_vitals(&self, vitals: Vitals) -> bool {
        self.send(StateCommand::Vitals(vitals))
    }

    /// Entry point for the usage collector.
    pub fn set_usage(&self, usage: Usage) -> bool {
        self.send(StateCommand::Usage(usage))
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<DeckSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DeckSnapshot>> {
        self.snapshots.clone()
    }
}

/// A stage revert waiting to fire.
struct ArmedRevert {
    schedule: RevertSchedule,
    handle: JoinHandle<()>,
}

pub struct StateActor {
    deck: MissionDeck,
    rx: mpsc::UnboundedReceiver<StateCommand>,
    timer_tx: mpsc::WeakUnboundedSender<StateCommand>,
    snapshots: watch::Sender<Arc<DeckSnapshot>>,
    armed: Option<ArmedRevert>,
}

/// Start the actor. It stops once every [`StateHandle`] is dropped.
pub fn spawn(deck: MissionDeck) -> (StateHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (snapshots, snapshot_rx) = watch::channel(Arc::new(deck.snapshot(Utc::now())));
    let actor = StateActor {
        deck,
        rx,
        timer_tx: tx.downgrade(),
        snapshots,
        armed: None,
    };
    let handle = StateHandle {
        tx,
        snapshots: snapshot_rx,
    };
    (handle, tokio::spawn(actor.run()))
}

impl StateActor {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            if self.handle(command) {
                self.publish();
            }
        }
        if let Some(armed) = self.armed.take() {
            armed.handle.abort();
        }
        tracing::debug!("state actor stopped");
    }

    /// Apply one command. Returns whether observers need a new snapshot.
    fn handle(&mut self, command: StateCommand) -> bool {
        let now = Utc::now();
        match command {
            StateCommand::Line(line) => {
                let outcome = self.deck.ingest_line(&line, now);
                match outcome.event {
                    Some(event) => {
                        tracing::debug!(kind = event.kind(), "log event");
                        self.arm(outcome.revert);
                        true
                    }
                    None => false,
                }
            }
            StateCommand::Event(event) => {
                tracing::debug!(kind = event.kind(), "gateway event");
                let revert = self.deck.apply(&event, now);
                self.arm(revert);
                true
            }
            StateCommand::Approval(request) => {
                tracing::info!(id = %request.id, "approval requested");
                let revert = self.deck.request_approval(request, now);
                self.arm(revert);
                true
            }
            StateCommand::SubmitMission { agent, command } => {
                let agent = self.deck.submit_mission(agent.as_deref(), &command, now);
                tracing::info!(agent = %agent, "mission submitted");
                self.arm(None);
                true
            }
            StateCommand::StageExpired(schedule) => {
                let expired = self.deck.expire(schedule);
                if expired {
                    self.armed = None;
                }
                expired
            }
            StateCommand::GatewayConnected(connected) => self.deck.set_gateway_connected(connected),
            StateCommand::Vitals(vitals) => {
                self.deck.set_vitals(vitals);
                true
            }
            StateCommand::Usage(usage) => {
                self.deck.set_usage(usage);
                true
            }
        }
    }

    /// Arm a new revert, or cancel the current one if the stage moved on
    /// without scheduling another.
    fn arm(&mut self, revert: Option<RevertSchedule>) {
        let generation = self.deck.pipeline().generation();
        if let Some(armed) = self.armed.take() {
            if armed.schedule.generation == generation && revert.is_none() {
                self.armed = Some(armed);
            } else {
                armed.handle.abort();
            }
        }

        let Some(schedule) = revert else {
            return;
        };
        let tx = self.timer_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(schedule.after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(StateCommand::StageExpired(schedule));
            }
        });
        self.armed = Some(ArmedRevert { schedule, handle });
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(Arc::new(self.deck.snapshot(Utc::now())));
    }
}

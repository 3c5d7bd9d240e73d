#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Out-of-process-style agent execution on worker threads.
//!
//! Agent decision code is untrusted from the engine's point of view: it may
//! be slow, it may panic, and it must never stall a tick. Each agent runs on
//! its own worker thread behind a pair of channels. The engine side holds an
//! [`AgentProxy`] that implements the core [`Agent`] trait with strictly
//! non-blocking calls; the worker side owns the [`Policy`] and is the only
//! thread that ever touches it.
//!
//! Snapshots flow worker-ward on the command channel, move tokens flow back
//! on the reply channel. A worker that falls behind collapses its backlog
//! and decides only on the newest snapshot. A worker whose policy panics
//! goes inert until a [`Supervisor::request_reload`] rebuilds the policy
//! from its factory.

pub mod policies;

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use blastgrid_core::{Agent, GameState, PlayerAction, PlayerState};

/// How long [`Supervisor::spawn_agent`] waits for a worker's readiness
/// report before giving up on it.
const SPAWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long [`Supervisor::stop`] waits for a worker's exit report before
/// abandoning the thread.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Readiness reports a proxy tolerates on the reply channel before giving
/// up on finding a move. Reloads re-emit readiness mid-match, so a couple
/// of stale reports ahead of a move token are normal.
const READY_ECHO_LIMIT: u32 = 3;

/// Decision logic executed on a worker thread.
///
/// Implementations receive the same immutable views an in-process agent
/// would. Returning `None` skips the tick.
pub trait Policy {
    /// Decides the next action from the latest snapshot.
    fn choose_move(&mut self, state: &GameState, view: &PlayerState) -> Option<PlayerAction>;

    /// Terminal notification with the final snapshot. The default does
    /// nothing.
    fn on_game_over(&mut self, _state: &GameState, _view: &PlayerState) {}
}

/// Builds (and on reload, rebuilds) a worker's policy.
///
/// The factory lives on the worker thread; the policy it produces never
/// crosses threads and therefore does not need to be `Send`.
pub trait PolicyFactory: Send + 'static {
    /// Constructs a fresh policy instance.
    fn build(&self) -> Result<Box<dyn Policy>, PolicyError>;
}

impl<F> PolicyFactory for F
where
    F: Fn() -> Result<Box<dyn Policy>, PolicyError> + Send + 'static,
{
    fn build(&self) -> Result<Box<dyn Policy>, PolicyError> {
        self()
    }
}

/// Failure to construct a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The requested policy name is not registered.
    #[error("unknown policy '{0}'")]
    Unknown(String),
    /// The policy's own initialization failed.
    #[error("policy initialization failed: {0}")]
    Init(String),
}

/// Failure to bring up or talk to a worker.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn agent worker: {0}")]
    Spawn(#[from] std::io::Error),
    /// The worker never reported ready.
    #[error("agent worker '{name}' did not report ready within {timeout:?}")]
    SpawnTimeout {
        /// Name the worker was spawned under.
        name: String,
        /// Handshake deadline that elapsed.
        timeout: Duration,
    },
}

/// Engine-to-worker messages.
enum WorkerCommand {
    /// Fresh snapshot to decide on. Superseded by any newer snapshot still
    /// sitting in the channel.
    State(Box<(GameState, PlayerState)>),
    /// Final snapshot; the policy gets its terminal notification.
    GameOver(Box<(GameState, PlayerState)>),
    /// Rebuild the policy from the factory.
    Reload,
    /// Poison pill: leave the loop and report exit.
    Shutdown,
}

/// Worker-to-engine messages.
enum WorkerReply {
    /// Policy constructed, worker loop entered.
    Ready,
    /// Action token for the newest decided snapshot.
    Move(String),
    /// Worker loop left, thread about to finish.
    Exited,
}

/// Engine-side handle to one worker. Implements [`Agent`] so the engine
/// registers it like any in-process agent.
pub struct AgentProxy {
    commands: Sender<WorkerCommand>,
    replies: Receiver<WorkerReply>,
}

impl Agent for AgentProxy {
    fn update(&mut self, state: &GameState, view: &PlayerState) {
        // A disconnected worker just means the match outlived the agent.
        let _ = self
            .commands
            .send(WorkerCommand::State(Box::new((state.clone(), *view))));
    }

    fn next_move(&mut self) -> Option<PlayerAction> {
        let mut echoes = 0;
        loop {
            match self.replies.try_recv() {
                Ok(WorkerReply::Move(code)) => match PlayerAction::from_code(&code) {
                    Some(action) => return Some(action),
                    None => {
                        warn!(%code, "ignoring unknown action token from agent");
                        return None;
                    }
                },
                Ok(WorkerReply::Ready) => {
                    echoes += 1;
                    if echoes > READY_ECHO_LIMIT {
                        return None;
                    }
                }
                Ok(WorkerReply::Exited) | Err(_) => return None,
            }
        }
    }

    fn on_game_over(&mut self, state: &GameState, view: &PlayerState) {
        let _ = self
            .commands
            .send(WorkerCommand::GameOver(Box::new((state.clone(), *view))));
    }
}

struct WorkerHandle {
    name: String,
    commands: Sender<WorkerCommand>,
    replies: Receiver<WorkerReply>,
    thread: Option<JoinHandle<()>>,
}

/// Owns the worker threads for one match and tears them down in order.
#[derive(Default)]
pub struct Supervisor {
    workers: Vec<WorkerHandle>,
}

impl Supervisor {
    /// Creates an empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a worker running the factory's policy and returns the proxy
    /// to register with the engine. Blocks until the worker reports ready
    /// or the handshake deadline passes.
    pub fn spawn_agent(
        &mut self,
        name: &str,
        factory: impl PolicyFactory,
    ) -> Result<AgentProxy, DriverError> {
        let (command_tx, command_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        let thread_name = format!("agent-{name}");
        let thread = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_worker(factory, command_rx, reply_tx))?;

        match reply_rx.recv_timeout(SPAWN_TIMEOUT) {
            Ok(WorkerReply::Ready) => {}
            _ => {
                return Err(DriverError::SpawnTimeout {
                    name: name.to_owned(),
                    timeout: SPAWN_TIMEOUT,
                });
            }
        }
        info!(agent = name, "agent worker ready");

        self.workers.push(WorkerHandle {
            name: name.to_owned(),
            commands: command_tx.clone(),
            replies: reply_rx.clone(),
            thread: Some(thread),
        });
        Ok(AgentProxy {
            commands: command_tx,
            replies: reply_rx,
        })
    }

    /// Asks every worker to rebuild its policy from its factory. Used for
    /// hot code reload during development matches.
    pub fn request_reload(&self) {
        for worker in &self.workers {
            let _ = worker.commands.send(WorkerCommand::Reload);
        }
    }

    /// Sends every worker its poison pill and waits for the exit reports.
    /// A worker stuck past the deadline is abandoned with a warning rather
    /// than blocking teardown.
    pub fn stop(&mut self) {
        for mut worker in std::mem::take(&mut self.workers) {
            let _ = worker.commands.send(WorkerCommand::Shutdown);
            let deadline = Instant::now() + JOIN_TIMEOUT;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match worker.replies.recv_timeout(remaining) {
                    Ok(WorkerReply::Exited) => {
                        if let Some(thread) = worker.thread.take() {
                            let _ = thread.join();
                        }
                        break;
                    }
                    // Late moves and readiness echoes drain here.
                    Ok(_) => {}
                    Err(_) => {
                        warn!(agent = %worker.name, "agent worker ignored shutdown, abandoning");
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    factory: impl PolicyFactory,
    commands: Receiver<WorkerCommand>,
    replies: Sender<WorkerReply>,
) {
    let mut policy = build_policy(&factory);
    if replies.send(WorkerReply::Ready).is_err() {
        return;
    }

    let mut deferred: VecDeque<WorkerCommand> = VecDeque::new();
    loop {
        let command = match deferred.pop_front() {
            Some(command) => command,
            None => match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        let command = if matches!(command, WorkerCommand::State(_)) {
            collapse_backlog(command, &commands, &mut deferred)
        } else {
            command
        };

        match command {
            WorkerCommand::State(pair) => {
                let Some(active) = policy.as_mut() else {
                    continue;
                };
                let decision = catch_unwind(AssertUnwindSafe(|| {
                    active.choose_move(&pair.0, &pair.1)
                }));
                match decision {
                    Ok(Some(action)) => {
                        if replies
                            .send(WorkerReply::Move(action.code().to_owned()))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(_) => {
                        warn!("policy panicked, going inert until reload");
                        policy = None;
                    }
                }
            }
            WorkerCommand::GameOver(pair) => {
                if let Some(active) = policy.as_mut() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        active.on_game_over(&pair.0, &pair.1);
                    }));
                    if outcome.is_err() {
                        warn!("policy panicked in game-over notification");
                        policy = None;
                    }
                }
            }
            WorkerCommand::Reload => {
                info!("reloading policy");
                policy = build_policy(&factory);
                if replies.send(WorkerReply::Ready).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    let _ = replies.send(WorkerReply::Exited);
}

fn build_policy(factory: &impl PolicyFactory) -> Option<Box<dyn Policy>> {
    let built = catch_unwind(AssertUnwindSafe(|| factory.build()));
    match built {
        Ok(Ok(policy)) => Some(policy),
        Ok(Err(error)) => {
            warn!(%error, "policy construction failed, worker inert");
            None
        }
        Err(_) => {
            warn!("policy factory panicked, worker inert");
            None
        }
    }
}

/// Drains queued snapshots and keeps only the newest; the first queued
/// non-snapshot command is deferred so ordering with reloads and shutdowns
/// is preserved.
fn collapse_backlog(
    latest: WorkerCommand,
    commands: &Receiver<WorkerCommand>,
    deferred: &mut VecDeque<WorkerCommand>,
) -> WorkerCommand {
    let mut latest = latest;
    let mut skipped = 0_u32;
    while let Ok(next) = commands.try_recv() {
        match next {
            WorkerCommand::State(_) => {
                skipped += 1;
                latest = next;
            }
            other => {
                deferred.push_back(other);
                break;
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, "collapsed stale snapshots");
    }
    latest
}

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use common::{EngineCommand, EngineState};

/// Cloneable handle passed to the scheduler and the API.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Whether trading requests should be served right now.
    pub async fn is_trading(&self) -> bool {
        self.state().await == EngineState::Running
    }
}

/// Owns the trading session state and applies session commands to it.
/// The state is an explicit flag read per request; nothing else mutates it.
pub struct Engine {
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    pub fn new() -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
        };

        (Engine { state, command_rx }, handle)
    }

    /// Run the engine until every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Engine initialized in Stopped state. Waiting for session commands.");

        while let Some(cmd) = self.command_rx.recv().await {
            let mut state = self.state.write().await;
            let next = transition(*state, cmd);
            if next == *state {
                info!(state = %next, command = ?cmd, "Session command ignored, state unchanged");
                continue;
            }
            match next {
                EngineState::Waiting => info!("Waiting for the stock market to open..."),
                EngineState::Running => info!("Trading session started."),
                EngineState::Stopped => info!("Trading session ended."),
            }
            *state = next;
        }

        warn!("Engine command channel closed, shutting down");
    }
}

/// Session state machine. `PreOpen` only moves a stopped engine to waiting;
/// `Start` and `Stop` apply from any state.
pub fn transition(current: EngineState, cmd: EngineCommand) -> EngineState {
    match (current, cmd) {
        (EngineState::Stopped, EngineCommand::PreOpen) => EngineState::Waiting,
        (other, EngineCommand::PreOpen) => other,
        (_, EngineCommand::Start) => EngineState::Running,
        (_, EngineCommand::Stop) => EngineState::Stopped,
    }
}

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::engine::protocol::{EngineCommand, EngineResponse};
use crate::engine::router::Router;
use crate::error::GameError;
use crate::model::message::Reply;

/// Worker loop owning one session. Commands are handled strictly in order,
/// so turns never overlap.
pub struct Engine {
    rx: Receiver<EngineCommand>,
    tx: Sender<EngineResponse>,
    router: Router,
}

impl Engine {
    pub fn new(
        rx: Receiver<EngineCommand>,
        tx: Sender<EngineResponse>,
        router: Router,
    ) -> Self {
        Self { rx, tx, router }
    }

    pub fn run(&mut self) {
        while let Ok(cmd) = self.rx.recv() {
            let fragments = self.tx.clone();
            let mut forward = |fragment: &str| {
                let _ = fragments.send(EngineResponse::Fragment(fragment.to_string()));
            };

            let reply = match cmd {
                EngineCommand::UserInput(text) => self.router.handle(&text, &mut forward),
                EngineCommand::LoadScenario(id) => self.router.load_scenario(&id, &mut forward),
                EngineCommand::Shutdown => break,
            };

            if self.tx.send(EngineResponse::Reply(reply)).is_err() {
                break;
            }
        }
        debug!("engine loop finished");
    }
}

/// Caller side of a spawned engine.
pub struct EngineHandle {
    tx: Sender<EngineCommand>,
    rx: Receiver<EngineResponse>,
    worker: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn spawn(router: Router) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            Engine::new(cmd_rx, resp_tx, router).run();
        });

        Self {
            tx: cmd_tx,
            rx: resp_rx,
            worker: Some(worker),
        }
    }

    /// Sends one command and blocks until its reply, forwarding streamed
    /// fragments on the way. `None` means the engine has stopped.
    pub fn request(
        &self,
        cmd: EngineCommand,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Option<Result<Reply, GameError>> {
        self.tx.send(cmd).ok()?;

        for response in self.rx.iter() {
            match response {
                EngineResponse::Fragment(text) => on_fragment(&text),
                EngineResponse::Reply(reply) => return Some(reply),
            }
        }
        None
    }

    pub fn shutdown(mut self) {
        let _ = self.tx.send(EngineCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

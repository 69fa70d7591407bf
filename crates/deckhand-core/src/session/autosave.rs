//! Background auto-saver.
//!
//! An [`AutoSaver`] moves a [`DeckSession`] into a tokio task and drives it
//! through a command channel. The task commits once the debounce deadline
//! passes, runs at most one commit at a time, and queues manual saves and
//! flushes that arrive while a commit is in flight.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{CommitKind, DeckSession, PendingCommit};
use crate::error::{Error, Result};
use crate::models::{CommitId, DeckSnapshot};
use crate::store::VersionStore;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Outcome of a commit made by the auto-saver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Committed {
        commit: CommitId,
        kind: CommitKind,
        message: String,
    },
    Failed {
        kind: CommitKind,
        retryable: bool,
        message: String,
    },
}

type CommitFuture = Pin<Box<dyn Future<Output = (PendingCommit, Result<CommitId>)> + Send>>;

enum Command<S> {
    Edit(DeckSnapshot, oneshot::Sender<Result<()>>),
    SaveNow(String, oneshot::Sender<Result<CommitId>>),
    Flush(oneshot::Sender<Result<Option<CommitId>>>),
    IsDirty(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<DeckSession<S>>),
}

/// Request waiting for the in-flight commit to finish
enum Queued {
    SaveNow(String, oneshot::Sender<Result<CommitId>>),
    Flush(oneshot::Sender<Result<Option<CommitId>>>),
}

enum Reply {
    Silent,
    SaveNow(oneshot::Sender<Result<CommitId>>),
    Flush(oneshot::Sender<Result<Option<CommitId>>>),
}

struct InFlight {
    future: CommitFuture,
    reply: Reply,
}

/// Handle to a session running in the background
pub struct AutoSaver<S> {
    commands: mpsc::Sender<Command<S>>,
    events: broadcast::Sender<SaveEvent>,
    task: JoinHandle<()>,
}

impl<S: VersionStore + 'static> AutoSaver<S> {
    /// Move `session` into a background task
    pub fn spawn(session: DeckSession<S>) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let worker = Worker {
            session,
            commands: receiver,
            events: events.clone(),
            in_flight: None,
            queue: VecDeque::new(),
            shutdown: None,
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands,
            events,
            task,
        }
    }

    /// Receive an event for every commit attempt
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.events.subscribe()
    }

    /// Replace the current snapshot, restarting the quiet period
    pub async fn edit(&self, snapshot: DeckSnapshot) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Edit(snapshot, reply)).await?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    /// Commit now with a user message.
    ///
    /// Cancels a pending auto-save. If a commit is already in flight, this
    /// one runs right after it.
    pub async fn save_now(&self, message: impl Into<String>) -> Result<CommitId> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SaveNow(message.into(), reply)).await?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    /// Commit pending edits immediately with a generated message
    pub async fn flush(&self) -> Result<Option<CommitId>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Flush(reply)).await?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    pub async fn is_dirty(&self) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::IsDirty(reply)).await?;
        response.await.map_err(|_| Error::SessionClosed)
    }

    /// Stop the task and take the session back.
    ///
    /// Waits for an in-flight commit and any queued saves. Unsaved edits are
    /// not committed; call [`AutoSaver::flush`] first to keep them.
    pub async fn shutdown(self) -> Result<DeckSession<S>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown(reply)).await?;
        let session = response.await.map_err(|_| Error::SessionClosed)?;
        self.task.await.map_err(|_| Error::SessionClosed)?;
        Ok(session)
    }

    async fn send(&self, command: Command<S>) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }
}

struct Worker<S> {
    session: DeckSession<S>,
    commands: mpsc::Receiver<Command<S>>,
    events: broadcast::Sender<SaveEvent>,
    in_flight: Option<InFlight>,
    queue: VecDeque<Queued>,
    shutdown: Option<oneshot::Sender<DeckSession<S>>>,
}

impl<S: VersionStore + 'static> Worker<S> {
    async fn run(mut self) {
        let mut closed = false;

        loop {
            if self.in_flight.is_none() && (closed || self.shutdown.is_some()) {
                break;
            }

            let deadline = self.session.debouncer().deadline();
            tokio::select! {
                command = self.commands.recv(), if !closed && self.shutdown.is_none() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => closed = true,
                    }
                }
                (pending, result) = next_outcome(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.finish(&pending, result);
                    self.start_queued();
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() && self.in_flight.is_none() =>
                {
                    self.start_auto(Reply::Silent);
                }
            }
        }

        if let Some(reply) = self.shutdown.take() {
            let _ = reply.send(self.session);
        }
        tracing::debug!("Auto-saver stopped");
    }

    fn handle(&mut self, command: Command<S>) {
        match command {
            Command::Edit(snapshot, reply) => {
                let _ = reply.send(self.session.edit(snapshot));
            }
            Command::SaveNow(message, reply) => {
                if self.in_flight.is_some() {
                    self.queue.push_back(Queued::SaveNow(message, reply));
                } else {
                    self.start_manual(&message, reply);
                }
            }
            Command::Flush(reply) => {
                if self.in_flight.is_some() {
                    self.queue.push_back(Queued::Flush(reply));
                } else {
                    self.start_auto(Reply::Flush(reply));
                }
            }
            Command::IsDirty(reply) => {
                let _ = reply.send(self.session.is_dirty());
            }
            Command::Shutdown(reply) => {
                self.shutdown = Some(reply);
            }
        }
    }

    fn start_auto(&mut self, reply: Reply) {
        match self.session.prepare_auto() {
            Ok(Some(pending)) => self.launch(pending, reply),
            Ok(None) => {
                if let Reply::Flush(reply) = reply {
                    let _ = reply.send(Ok(None));
                }
            }
            Err(error) => {
                tracing::warn!("Could not prepare auto-save: {}", error);
                if let Reply::Flush(reply) = reply {
                    let _ = reply.send(Err(error));
                }
            }
        }
    }

    fn start_manual(&mut self, message: &str, reply: oneshot::Sender<Result<CommitId>>) {
        match self.session.prepare_manual(message) {
            Ok(pending) => self.launch(pending, Reply::SaveNow(reply)),
            Err(error) => {
                let _ = reply.send(Err(error));
            }
        }
    }

    fn start_queued(&mut self) {
        while self.in_flight.is_none() {
            match self.queue.pop_front() {
                Some(Queued::SaveNow(message, reply)) => self.start_manual(&message, reply),
                Some(Queued::Flush(reply)) => self.start_auto(Reply::Flush(reply)),
                None => break,
            }
        }
    }

    fn launch(&mut self, pending: PendingCommit, reply: Reply) {
        let store = std::sync::Arc::clone(self.session.store());
        let policy = self.session.retry_policy();
        let future: CommitFuture = Box::pin(async move {
            let result = pending.execute(store.as_ref(), policy).await;
            (pending, result)
        });
        self.in_flight = Some(InFlight { future, reply });
    }

    fn finish(&mut self, pending: &PendingCommit, result: Result<CommitId>) {
        let reply = self
            .in_flight
            .take()
            .map_or(Reply::Silent, |in_flight| in_flight.reply);
        let result = self.session.finish_commit(pending, result);

        let event = match &result {
            Ok(commit) => SaveEvent::Committed {
                commit: commit.clone(),
                kind: pending.kind(),
                message: pending.message().to_string(),
            },
            Err(error) => SaveEvent::Failed {
                kind: pending.kind(),
                retryable: error.is_retryable(),
                message: error.to_string(),
            },
        };
        // Nobody listening is fine.
        let _ = self.events.send(event);

        match reply {
            Reply::Silent => {}
            Reply::SaveNow(reply) => {
                let _ = reply.send(result);
            }
            Reply::Flush(reply) => {
                let _ = reply.send(result.map(Some));
            }
        }
    }
}

async fn next_outcome(in_flight: &mut Option<InFlight>) -> (PendingCommit, Result<CommitId>) {
    match in_flight {
        Some(in_flight) => in_flight.future.as_mut().await,
        None => std::future::pending().await,
    }
}

/*!
 * Two-Party Exchange
 *
 * A coordinator and one forked worker talk over two pipes, C2W and W2C,
 * alternating strictly: the coordinator sends one line, the worker answers
 * with an interim record and then a reply. Ordering between the two comes
 * only from blocking reads and flush-after-send.
 */

pub mod state;
pub mod transform;

pub use state::{PartyState, StateMachine};
pub use transform::{Concat, Transform};

use crate::core::limits::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::core::types::{Role, StdStream};
use crate::ipc::message::{read_line, Message, MessageReader, MessageWriter};
use crate::ipc::pipe::{EndpointArena, PipeError};
use crate::process::{
    BoundEndpoints, ChildTask, CompletionReaper, OverallOutcome, OwnershipTable, ProcessError,
    ProcessSpawner,
};
use miette::Diagnostic;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::slice;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

/// Exchange operation result
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Exchange errors
#[derive(Debug, Error, Diagnostic)]
pub enum ExchangeError {
    #[error("Invalid exchange transition for {role}: {from} -> {to}")]
    #[diagnostic(code(exchange::invalid_transition))]
    InvalidStateTransition {
        role: Role,
        from: PartyState,
        to: PartyState,
    },

    #[error("Peer closed the channel without replying")]
    #[diagnostic(
        code(exchange::peer_closed),
        help("The worker exited before sending a reply; see its exit status.")
    )]
    PeerClosed,

    #[error("No endpoint kept for {0}")]
    #[diagnostic(code(exchange::missing_endpoint))]
    MissingEndpoint(StdStream),

    #[error("Pipe error: {0}")]
    #[diagnostic(transparent)]
    Pipe(#[from] PipeError),

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),
}

impl ExchangeError {
    pub fn is_oversize(&self) -> bool {
        match self {
            ExchangeError::Pipe(e) => e.is_oversize(),
            ExchangeError::Process(ProcessError::Pipe(e)) => e.is_oversize(),
            _ => false,
        }
    }
}

/// What the coordinator saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ExchangeReport {
    /// First record from the worker, if it sent more than one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim: Option<String>,
    /// Last record from the worker
    pub reply: String,
    /// Reply after the coordinator's own transform
    pub final_output: String,
    /// Reaped status of the worker
    pub worker: OverallOutcome,
}

/// Coordinator/worker request-response over two pipes
///
/// `W` runs in the worker on the request; `C` runs in the coordinator on
/// the reply. Between them the worker appends one line of its own input.
#[derive(Debug, Clone)]
pub struct TwoPartyExchange<W, C> {
    worker_transform: W,
    coordinator_transform: C,
    console: bool,
    spawner: ProcessSpawner,
}

impl<W: Transform, C: Transform> TwoPartyExchange<W, C> {
    pub fn new(worker_transform: W, coordinator_transform: C) -> Self {
        Self {
            worker_transform,
            coordinator_transform,
            console: false,
            spawner: ProcessSpawner::new(),
        }
    }

    /// Print prompts and intermediate results on stdout
    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    fn say(&self, line: std::fmt::Arguments<'_>) {
        if self.console {
            println!("{}", line);
        }
    }

    fn prompt(&self) {
        if self.console {
            let mut out = std::io::stdout();
            let _ = write!(out, "Input : ");
            let _ = out.flush();
        }
    }

    /// Run one exchange
    ///
    /// `coordinator_input` is read here; `worker_input` is read only by the
    /// forked worker. The worker is always reaped before this returns, and
    /// its status is in the report.
    pub fn run<I, J>(
        &self,
        coordinator_input: &mut I,
        worker_input: &mut J,
    ) -> ExchangeResult<ExchangeReport>
    where
        I: BufRead,
        J: BufRead,
    {
        let span = info_span!("exchange");
        let _entered = span.enter();

        let mut arena = EndpointArena::new();
        let c2w = arena.create_channel()?;
        let w2c = arena.create_channel()?;

        let table = OwnershipTable::new()
            .keep(StdStream::Stdin, c2w.read)
            .keep(StdStream::Stdout, w2c.write)
            .close_in_child(c2w.write)
            .close_in_child(w2c.read)
            .hand_over_kept();

        let task = ChildTask::Run(Box::new(|bound: BoundEndpoints| {
            self.worker_main(bound, worker_input)
        }));
        let mut worker = self
            .spawner
            .spawn(&mut arena, Role::Worker, &table, task)?;

        let requests = MessageWriter::new(File::from(arena.take(c2w.write)?));
        let replies = MessageReader::new(BufReader::new(File::from(arena.take(w2c.read)?)));

        let exchanged = self.coordinate(coordinator_input, requests, replies);
        let outcome = CompletionReaper::reap_all(slice::from_mut(&mut worker));

        let (interim, reply) = exchanged.map_err(|e| {
            error!(error = %e, worker = %outcome, "exchange failed");
            e
        })?;

        let final_output = Message::new(self.coordinator_transform.apply(&reply))?.into_string();
        self.say(format_args!("Output : {}", final_output));
        info!(worker = %outcome, "exchange complete");

        Ok(ExchangeReport {
            interim,
            reply,
            final_output,
            worker: outcome,
        })
    }

    /// Coordinator side; consumes both endpoints so they are closed before
    /// the caller blocks on the worker
    fn coordinate<I: BufRead>(
        &self,
        local: &mut I,
        mut requests: MessageWriter<File>,
        mut replies: MessageReader<BufReader<File>>,
    ) -> ExchangeResult<(Option<String>, String)> {
        let mut machine = StateMachine::coordinator();

        self.prompt();
        let line = read_line(local)?;

        machine.advance(PartyState::Send)?;
        match line {
            Some(line) => {
                let request = Message::new(line)?;
                requests.send(&request)?;
                debug!(len = request.len(), "request sent");
            }
            None => debug!("local input exhausted; closing request channel"),
        }
        drop(requests);

        machine.advance(PartyState::AwaitPeerReply)?;
        let mut received = replies.recv_all()?;
        machine.advance(PartyState::Done)?;

        let reply = received.pop().ok_or(ExchangeError::PeerClosed)?;
        let interim = if received.is_empty() {
            None
        } else {
            Some(received.swap_remove(0).into_string())
        };
        Ok((interim, reply.into_string()))
    }

    fn worker_main<J: BufRead>(&self, bound: BoundEndpoints, local: &mut J) -> i32 {
        match self.serve(bound, local) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                error!(role = %Role::Worker, error = %e, "worker failed");
                eprintln!("pipework: worker: {}", e);
                EXIT_FAILURE
            }
        }
    }

    /// Worker side, run in the forked child
    fn serve<J: BufRead>(&self, mut bound: BoundEndpoints, local: &mut J) -> ExchangeResult<()> {
        let mut requests = MessageReader::new(
            bound
                .reader()
                .ok_or(ExchangeError::MissingEndpoint(StdStream::Stdin))?,
        );
        let mut replies = MessageWriter::new(
            bound
                .writer()
                .ok_or(ExchangeError::MissingEndpoint(StdStream::Stdout))?,
        );
        let mut machine = StateMachine::worker();

        let request = match requests.recv()? {
            Some(message) => message.into_string(),
            None => {
                warn!("coordinator closed before sending; treating request as empty");
                String::new()
            }
        };
        drop(requests);

        machine.advance(PartyState::Send)?;
        let interim = Message::new(self.worker_transform.apply(&request))?;
        if let Some(label) = self.worker_transform.label() {
            self.say(format_args!("Other string is: {}", label));
        }
        self.say(format_args!("Output : {}", interim));
        replies.send(&interim)?;

        machine.advance(PartyState::AwaitLocalInput)?;
        self.prompt();
        let extra = read_line(local)?.unwrap_or_default();

        machine.advance(PartyState::Send)?;
        let reply = Message::new(format!("{}{}", interim, extra))?;
        replies.send(&reply)?;

        machine.advance(PartyState::Done)?;
        Ok(())
    }
}

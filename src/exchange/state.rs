/*!
 * Exchange State Machine
 *
 * Each party walks a fixed script of states. The only suspension points
 * are `AwaitLocalInput` and `AwaitPeerReply`; any step outside the script is
 * rejected.
 */

use super::ExchangeError;
use crate::core::types::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyState {
    AwaitLocalInput,
    Send,
    AwaitPeerReply,
    Done,
}

impl fmt::Display for PartyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartyState::AwaitLocalInput => "await_local_input",
            PartyState::Send => "send",
            PartyState::AwaitPeerReply => "await_peer_reply",
            PartyState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Read a line, send it, collect the replies
const COORDINATOR_SCRIPT: &[PartyState] = &[
    PartyState::AwaitLocalInput,
    PartyState::Send,
    PartyState::AwaitPeerReply,
    PartyState::Done,
];

/// Read the request, send the interim result, read a line, send the reply
const WORKER_SCRIPT: &[PartyState] = &[
    PartyState::AwaitPeerReply,
    PartyState::Send,
    PartyState::AwaitLocalInput,
    PartyState::Send,
    PartyState::Done,
];

#[derive(Debug, Clone)]
pub struct StateMachine {
    role: Role,
    script: &'static [PartyState],
    position: usize,
}

impl StateMachine {
    pub fn coordinator() -> Self {
        Self {
            role: Role::Coordinator,
            script: COORDINATOR_SCRIPT,
            position: 0,
        }
    }

    pub fn worker() -> Self {
        Self {
            role: Role::Worker,
            script: WORKER_SCRIPT,
            position: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> PartyState {
        self.script[self.position]
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state() == PartyState::Done
    }

    /// Move to `to` if it is the next step of this party's script
    pub fn advance(&mut self, to: PartyState) -> Result<(), ExchangeError> {
        let from = self.state();
        match self.script.get(self.position + 1) {
            Some(next) if *next == to => {
                trace!(role = %self.role, %from, %to, "exchange transition");
                self.position += 1;
                Ok(())
            }
            _ => Err(ExchangeError::InvalidStateTransition {
                role: self.role,
                from,
                to,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_script() {
        let mut machine = StateMachine::coordinator();
        assert_eq!(machine.state(), PartyState::AwaitLocalInput);
        machine.advance(PartyState::Send).unwrap();
        machine.advance(PartyState::AwaitPeerReply).unwrap();
        machine.advance(PartyState::Done).unwrap();
        assert!(machine.is_done());
    }

    #[test]
    fn test_worker_script() {
        let mut machine = StateMachine::worker();
        assert_eq!(machine.state(), PartyState::AwaitPeerReply);
        for next in [
            PartyState::Send,
            PartyState::AwaitLocalInput,
            PartyState::Send,
            PartyState::Done,
        ] {
            machine.advance(next).unwrap();
        }
        assert!(machine.is_done());
    }

    #[test]
    fn test_out_of_order_step_rejected() {
        let mut machine = StateMachine::coordinator();
        let err = machine.advance(PartyState::AwaitPeerReply).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidStateTransition {
                role: Role::Coordinator,
                from: PartyState::AwaitLocalInput,
                to: PartyState::AwaitPeerReply,
            }
        ));
        // A rejected step leaves the state untouched
        assert_eq!(machine.state(), PartyState::AwaitLocalInput);
    }

    #[test]
    fn test_nothing_after_done() {
        let mut machine = StateMachine::coordinator();
        machine.advance(PartyState::Send).unwrap();
        machine.advance(PartyState::AwaitPeerReply).unwrap();
        machine.advance(PartyState::Done).unwrap();
        assert!(machine.advance(PartyState::Send).is_err());
    }
}

//! # ScriptedLink: canned-message link for tests and dry runs.
//!
//! Plays back a script of messages and misses. Each `receive` takes the
//! first script entry whose kind matches the filter, so independent roles
//! sharing one link each see their own stream. A scripted miss, or an empty
//! script, waits the full receive timeout and yields `None`.
//!
//! Sent commands and heartbeats are recorded; sends can be made to fail.
//! The vehicle protocol itself is not modelled.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{FlightLink, Message, MessageKind, VehicleCommand};
use crate::error::LinkError;

#[derive(Debug, Clone, Copy)]
enum Entry {
    Message(Message),
    Miss(MessageKind),
}

impl Entry {
    fn kind(&self) -> MessageKind {
        match self {
            Entry::Message(m) => m.kind(),
            Entry::Miss(k) => *k,
        }
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<Entry>,
    commands: Vec<VehicleCommand>,
    heartbeats: usize,
    fail_sends: bool,
    disconnected: bool,
}

/// Scripted [`FlightLink`].
#[derive(Default)]
pub struct ScriptedLink {
    state: Mutex<State>,
}

impl ScriptedLink {
    /// Creates a link with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the script.
    pub fn push(&self, msg: Message) -> &Self {
        self.state.lock().script.push_back(Entry::Message(msg));
        self
    }

    /// Appends a miss: the next receive of `kind` times out.
    pub fn push_miss(&self, kind: MessageKind) -> &Self {
        self.state.lock().script.push_back(Entry::Miss(kind));
        self
    }

    /// Makes every following send fail (or succeed again).
    pub fn set_send_failure(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Makes every following call report [`LinkError::Disconnected`].
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// Commands sent so far.
    pub fn commands(&self) -> Vec<VehicleCommand> {
        self.state.lock().commands.clone()
    }

    /// Heartbeats sent so far.
    pub fn heartbeats_sent(&self) -> usize {
        self.state.lock().heartbeats
    }

    /// Script entries not consumed yet.
    pub fn remaining(&self) -> usize {
        self.state.lock().script.len()
    }

    fn take(&self, kinds: &[MessageKind]) -> Result<Option<Entry>, LinkError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(LinkError::Disconnected);
        }
        let pos = state.script.iter().position(|e| kinds.contains(&e.kind()));
        Ok(pos.and_then(|i| state.script.remove(i)))
    }

    fn check_send(&self) -> Result<parking_lot::MutexGuard<'_, State>, LinkError> {
        let state = self.state.lock();
        if state.disconnected {
            return Err(LinkError::Disconnected);
        }
        if state.fail_sends {
            return Err(LinkError::Send {
                reason: "scripted send failure".into(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl FlightLink for ScriptedLink {
    async fn receive(
        &self,
        kinds: &[MessageKind],
        timeout: Duration,
    ) -> Result<Option<Message>, LinkError> {
        match self.take(kinds)? {
            Some(Entry::Message(msg)) => Ok(Some(msg)),
            Some(Entry::Miss(_)) | None => {
                if !timeout.is_zero() {
                    tokio::time::sleep(timeout).await;
                }
                Ok(None)
            }
        }
    }

    fn send_command(&self, cmd: &VehicleCommand) -> Result<(), LinkError> {
        self.check_send()?.commands.push(*cmd);
        Ok(())
    }

    fn send_heartbeat(&self) -> Result<(), LinkError> {
        self.check_send()?.heartbeats += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Attitude;

    #[tokio::test(start_paused = true)]
    async fn test_receive_filters_by_kind() {
        let link = ScriptedLink::new();
        link.push(Message::Attitude(Attitude::default()))
            .push(Message::Heartbeat);

        let hb = link
            .receive(&[MessageKind::Heartbeat], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(hb, Some(Message::Heartbeat));
        assert_eq!(link.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_waits_for_timeout() {
        let link = ScriptedLink::new();
        link.push_miss(MessageKind::Heartbeat);

        let started = tokio::time::Instant::now();
        let got = link
            .receive(&[MessageKind::Heartbeat], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got, None);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_sends_are_recorded_and_can_fail() {
        let link = ScriptedLink::new();
        link.send_heartbeat().unwrap();
        link.send_command(&VehicleCommand::change_altitude(5.0))
            .unwrap();
        assert_eq!(link.heartbeats_sent(), 1);
        assert_eq!(link.commands().len(), 1);

        link.set_send_failure(true);
        assert!(matches!(link.send_heartbeat(), Err(LinkError::Send { .. })));
        link.disconnect();
        assert_eq!(link.send_heartbeat(), Err(LinkError::Disconnected));
    }
}

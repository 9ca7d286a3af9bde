// Claim-order handshake between sequencer workers
//
// Batch `k` may only touch the running number after batch `k - 1` is done
// with it. Each ticket publishes on its own slot of a ring sized to the pool,
// and the successor blocks on that slot.

use super::types::ProcessingState;
use crate::error::{PipelineError, PipelineResult};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// How often a blocked worker looks at the abort flag.
const ABORT_POLL: Duration = Duration::from_millis(50);

pub struct OrderingRing {
    slots: Vec<(Sender<usize>, Receiver<usize>)>,
}

impl OrderingRing {
    /// At most `pool_size` tickets are in flight, so a slot is never reused
    /// before its message has been consumed.
    pub fn new(pool_size: usize) -> Self {
        Self {
            slots: (0..pool_size.max(1)).map(|_| channel::unbounded()).collect(),
        }
    }

    fn slot(&self, ticket: usize) -> &(Sender<usize>, Receiver<usize>) {
        &self.slots[ticket % self.slots.len()]
    }

    /// Blocks until `ticket - 1` has published. Ticket 0 never waits.
    pub fn wait_for_predecessor(
        &self,
        ticket: usize,
        state: &ProcessingState,
    ) -> PipelineResult<()> {
        let Some(predecessor) = ticket.checked_sub(1) else {
            return Ok(());
        };
        let (_, rx) = self.slot(predecessor);
        loop {
            if state.is_aborted() {
                return Err(PipelineError::Aborted);
            }
            match rx.recv_timeout(ABORT_POLL) {
                Ok(done) if done == predecessor => return Ok(()),
                Ok(done) => {
                    return Err(PipelineError::ordering(format!(
                        "batch {} expected batch {} to finish, got batch {}",
                        ticket, predecessor, done
                    )))
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PipelineError::ordering("handshake channel closed"))
                }
            }
        }
    }

    /// Marks `ticket` as done with the running number.
    pub fn publish(&self, ticket: usize) -> PipelineResult<()> {
        let (tx, _) = self.slot(ticket);
        tx.send(ticket)
            .map_err(|_| PipelineError::ordering("handshake channel closed"))
    }
}

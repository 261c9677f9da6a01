use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use vigil_core::{InputEvent, ResponseKind};
use vigil_timing::{Clock, precise_sleep};

use crate::state::TrialStateMachine;

/// Longest uninterrupted sleep while waiting on a timer deadline. Keeps
/// input latency bounded without spinning.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Pump a run to completion against a live clock and an input channel.
///
/// Raw inputs carry only the recognized control; the runner stamps each
/// one with the run clock on receipt, which fixes the capture-vs-expiry
/// order to delivery order, as the gate expects. A disconnected input
/// channel aborts the run.
///
/// Returns the machine so the caller can read outcomes and the summary.
pub fn run_to_completion<C: Clock, R: Rng>(
    mut machine: TrialStateMachine<C, R>,
    inputs: Receiver<ResponseKind>,
) -> TrialStateMachine<C, R> {
    machine.start();

    while !machine.is_finished() {
        machine.tick();

        loop {
            match inputs.try_recv() {
                Ok(kind) => {
                    let event = InputEvent { kind, at_ns: machine.now_ns() };
                    machine.handle_input(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("input channel closed; aborting run");
                    machine.abort();
                    break;
                }
            }
        }

        if machine.is_finished() {
            break;
        }

        let sleep_for = match machine.next_deadline_ns() {
            Some(deadline) => {
                Duration::from_nanos(deadline.saturating_sub(machine.now_ns())).min(MAX_IDLE_SLEEP)
            }
            None => MAX_IDLE_SLEEP,
        };
        precise_sleep(sleep_for);
    }

    machine
}

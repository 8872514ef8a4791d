//! services/bot/src/bot/dispatcher.rs
//!
//! Pulls messages off the transport and fans them out to per-user lanes.
//!
//! A lane is a task fed by an unbounded channel. It handles one user's messages
//! strictly in arrival order, while lanes of different users run in parallel.
//! Lanes retire after a quiet period and are re-created on the next message; a
//! replacement lane waits for its predecessor to drain before it starts.

use crate::bot::replies;
use crate::bot::router;
use crate::bot::state::AppState;
use feedback_desk_core::domain::{Envelope, InboundMessage, OutboundMessage, Purpose};
use feedback_desk_core::ports::ChatTransport;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a lane may sit without messages before it retires.
pub const LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

struct Lane {
    sender: mpsc::UnboundedSender<InboundMessage>,
    /// Resolves (with an error) once the lane task has returned.
    finished: oneshot::Receiver<()>,
}

//=========================================================================================
// Dispatch Loop
//=========================================================================================

/// Runs until `shutdown` is cancelled or the inbound stream ends, then waits for every
/// lane to finish the messages it already holds.
pub async fn run(
    state: Arc<AppState>,
    transport: Arc<dyn ChatTransport>,
    shutdown: CancellationToken,
) {
    run_with_lane_timeout(state, transport, shutdown, LANE_IDLE_TIMEOUT).await
}

pub async fn run_with_lane_timeout(
    state: Arc<AppState>,
    transport: Arc<dyn ChatTransport>,
    shutdown: CancellationToken,
    lane_timeout: Duration,
) {
    let mut inbound = transport.inbound();
    let mut lanes: HashMap<i64, Lane> = HashMap::new();
    let mut tasks: JoinSet<i64> = JoinSet::new();
    info!("Dispatcher started.");

    loop {
        reap_finished(&mut tasks, &mut lanes);

        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested. Dispatcher stops taking messages.");
                break;
            }
            next = inbound.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!("Failed to receive messages: {:?}", e);
                continue;
            }
            None => {
                info!("Inbound stream ended.");
                break;
            }
        };

        let user_id = message.sender.id;
        let message = match lanes.get(&user_id) {
            Some(lane) => match lane.sender.send(message) {
                Ok(()) => continue,
                // The lane retired between messages; hand the message to its successor.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let predecessor = lanes.remove(&user_id).map(|lane| lane.finished);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (done, finished) = oneshot::channel();
        // A fresh channel always has its receiver, so this cannot fail.
        let _ = sender.send(message);
        tasks.spawn(run_lane(
            user_id,
            receiver,
            predecessor,
            done,
            state.clone(),
            transport.clone(),
            lane_timeout,
        ));
        lanes.insert(user_id, Lane { sender, finished });
    }

    // Dropping the senders lets each lane drain its queue and return.
    lanes.clear();
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("Lane task failed during shutdown: {:?}", e);
        }
    }

    let open = state.conversations.open_dialogues().await;
    info!("Dispatcher stopped. {} feedback dialogue(s) were still open.", open);
}

/// Forgets lanes whose task has returned. A retired lane that is still draining stays
/// in the map so its successor can wait for it.
fn reap_finished(tasks: &mut JoinSet<i64>, lanes: &mut HashMap<i64, Lane>) {
    while let Some(result) = tasks.try_join_next() {
        match result {
            Ok(user_id) => debug!("Reaped lane for user {}", user_id),
            Err(e) => error!("Lane task failed: {:?}", e),
        }
    }
    lanes.retain(|_, lane| !(lane.sender.is_closed() && is_resolved(&mut lane.finished)));
}

fn is_resolved(finished: &mut oneshot::Receiver<()>) -> bool {
    !matches!(finished.try_recv(), Err(oneshot::error::TryRecvError::Empty))
}

//=========================================================================================
// Lanes
//=========================================================================================

async fn run_lane(
    user_id: i64,
    mut receiver: mpsc::UnboundedReceiver<InboundMessage>,
    predecessor: Option<oneshot::Receiver<()>>,
    _done: oneshot::Sender<()>,
    state: Arc<AppState>,
    transport: Arc<dyn ChatTransport>,
    idle_timeout: Duration,
) -> i64 {
    if let Some(predecessor) = predecessor {
        let _ = predecessor.await;
    }
    debug!("Lane opened for user {}", user_id);

    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(message)) => process(&state, transport.as_ref(), message).await,
            Ok(None) => break,
            Err(_) => {
                receiver.close();
                while let Some(message) = receiver.recv().await {
                    process(&state, transport.as_ref(), message).await;
                }
                break;
            }
        }
    }

    debug!("Lane closed for user {}", user_id);
    user_id
}

/// Handles one message and delivers the result. A panicking handler is answered with
/// the generic error so the lane keeps going.
async fn process(state: &AppState, transport: &dyn ChatTransport, message: InboundMessage) {
    let chat_id = message.chat_id;
    let user_id = message.sender.id;

    let envelopes = match AssertUnwindSafe(router::dispatch(state, message))
        .catch_unwind()
        .await
    {
        Ok(envelopes) => envelopes,
        Err(_) => {
            error!("Handler panicked while processing a message from user {}", user_id);
            vec![Envelope::reply(
                chat_id,
                OutboundMessage::text(replies::GENERIC_ERROR),
            )]
        }
    };

    deliver(transport, envelopes).await;
}

/// Sends envelopes in order. Failures are logged and never stop the remaining sends.
async fn deliver(transport: &dyn ChatTransport, envelopes: Vec<Envelope>) {
    for Envelope {
        chat_id,
        message,
        purpose,
    } in envelopes
    {
        if let Err(e) = transport.send(chat_id, message).await {
            match purpose {
                Purpose::Reply => warn!("Failed to deliver reply to chat {}: {:?}", chat_id, e),
                Purpose::AdminNotice => {
                    error!("Failed to notify admin in chat {}: {:?}", chat_id, e)
                }
            }
        }
    }
}

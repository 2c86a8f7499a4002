//! Single-owner event loop around a [`LegacyExtension`].
//!
//! The timer tick and received frames reach the extension through one task,
//! so the two stimuli never interleave. Frames are handled in arrival order.

use crate::constants::TICK_PERIOD_MS;
use crate::error::LegacyError;
use crate::extension::LegacyExtension;
use crate::fragment::FragmentCommand;
use crate::frame::Frame;
use crate::platform::{Indicator, ResetLine, Transport};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

const TICK_PERIOD: Duration = Duration::from_millis(TICK_PERIOD_MS as u64);
const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
enum Event {
    Frame(Frame),
    SendFragmented {
        command: FragmentCommand,
        payload: Bytes,
        reply: oneshot::Sender<Result<usize, LegacyError>>,
    },
    Shutdown,
}

/// Cloneable sender side of a running extension.
#[derive(Debug, Clone)]
pub struct ExtensionHandle {
    events: mpsc::Sender<Event>,
}

/// The task owning the extension. Awaiting it yields the extension back.
pub struct ExtensionTask<T, I, R> {
    join: JoinHandle<LegacyExtension<T, I, R>>,
}

/// Spawns the event loop on the current tokio runtime.
pub fn spawn<T, I, R>(extension: LegacyExtension<T, I, R>) -> (ExtensionHandle, ExtensionTask<T, I, R>)
where
    T: Transport + Send + 'static,
    I: Indicator + Send + 'static,
    R: ResetLine + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let join = tokio::spawn(run(extension, rx));
    (ExtensionHandle { events: tx }, ExtensionTask { join })
}

async fn run<T, I, R>(
    mut extension: LegacyExtension<T, I, R>,
    mut events: mpsc::Receiver<Event>,
) -> LegacyExtension<T, I, R>
where
    T: Transport,
    I: Indicator,
    R: ResetLine,
{
    let mut ticker = interval(TICK_PERIOD);
    // every missed tick still counts down the heartbeat
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    while !extension.is_halted() {
        tokio::select! {
            biased;
            _ = ticker.tick() => extension.timer_10ms(),
            event = events.recv() => match event {
                Some(Event::Frame(frame)) => extension.receive(&frame),
                Some(Event::SendFragmented { command, payload, reply }) => {
                    let result = extension.send_fragmented_data(command, &payload);
                    if let Err(e) = &result {
                        debug!(%command, error = %e, "fragmented send refused");
                    }
                    // the requester may have stopped waiting
                    let _ = reply.send(result);
                }
                Some(Event::Shutdown) | None => break,
            },
        }
    }
    info!(serial = extension.serial(), halted = extension.is_halted(), "event loop stopped");
    extension
}

impl ExtensionHandle {
    /// Queues a received frame.
    pub async fn receive(&self, frame: Frame) -> Result<(), LegacyError> {
        self.events
            .send(Event::Frame(frame))
            .await
            .map_err(|_| LegacyError::ChannelClosed)
    }

    /// Queues a fragmented transfer and waits until it has been handed to the
    /// transport.
    pub async fn send_fragmented(&self, command: FragmentCommand, payload: Bytes) -> Result<usize, LegacyError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Event::SendFragmented {
                command,
                payload,
                reply,
            })
            .await
            .map_err(|_| LegacyError::ChannelClosed)?;
        response.await.map_err(|_| LegacyError::ChannelClosed)?
    }

    /// Asks the loop to stop after the events queued before this call.
    pub async fn shutdown(&self) -> Result<(), LegacyError> {
        self.events
            .send(Event::Shutdown)
            .await
            .map_err(|_| LegacyError::ChannelClosed)
    }
}

impl<T, I, R> ExtensionTask<T, I, R> {
    /// Waits for the loop to stop and returns the extension.
    pub async fn join(self) -> Result<LegacyExtension<T, I, R>, tokio::task::JoinError> {
        self.join.await
    }
}

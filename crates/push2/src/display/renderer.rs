//! Double-buffered frame pipeline.
//!
//! Two [`DeviceFrame`] slots alternate between the renderer and the transfer
//! thread. A slot is either parked in the shared state (free to render
//! into) or owned by the transfer thread (in flight). Rendering into a slot
//! whose transfer has not returned waits, up to the transfer timeout; the
//! peer slot is unaffected. Waits are async so the renderer's runtime keeps
//! running while a transfer is slow.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use super::frame_buffer::{Canvas, DeviceFrame, FRAME_HEADER};
use crate::error::TransportError;

/// Destination for finished frames.
pub trait FrameSink: Send + Sync {
    /// Blocking write of one frame. Implementations bound the wait.
    fn write_frame(&self, header: &[u8], payload: &[u8]) -> Result<(), TransportError>;
}

/// Host-supplied display content.
pub trait DisplaySource: Send {
    fn draw(&mut self, canvas: &mut Canvas);
}

/// Result of one frame transfer, reported back to the worker.
#[derive(Debug)]
pub enum TransferOutcome {
    Completed { slot: usize },
    Failed { slot: usize, error: TransportError },
}

struct Slots {
    frames: [Option<DeviceFrame>; 2],
    sink: Option<Arc<dyn FrameSink>>,
}

struct Shared {
    slots: Mutex<Slots>,
    returned: Notify,
}

struct Transfer {
    slot: usize,
    frame: DeviceFrame,
}

/// Renderer side of the frame pipeline.
pub struct DisplayPipeline {
    shared: Arc<Shared>,
    next: usize,
    timeout: Duration,
    transfers: Option<std_mpsc::Sender<Transfer>>,
    thread: Option<JoinHandle<()>>,
}

impl DisplayPipeline {
    /// Create the pipeline and start its transfer thread.
    pub fn new(timeout: Duration, outcomes: mpsc::UnboundedSender<TransferOutcome>) -> Self {
        let shared = Arc::new(Shared {
            slots: Mutex::new(Slots {
                frames: [Some(DeviceFrame::new()), Some(DeviceFrame::new())],
                sink: None,
            }),
            returned: Notify::new(),
        });
        let (tx, rx) = std_mpsc::channel();

        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("push2-display".to_string())
            .spawn(move || transfer_loop(thread_shared, rx, outcomes))
            .ok();
        if thread.is_none() {
            tracing::error!("Failed to spawn display transfer thread");
        }

        Self {
            shared,
            next: 0,
            timeout,
            transfers: thread.as_ref().map(|_| tx),
            thread,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Install the device handle frames are written to.
    pub fn attach(&self, sink: Arc<dyn FrameSink>) {
        self.shared.slots.lock().sink = Some(sink);
    }

    /// Drop the device handle. Transfers already in flight keep their clone.
    pub fn detach(&self) {
        self.shared.slots.lock().sink = None;
    }

    pub fn is_attached(&self) -> bool {
        self.shared.slots.lock().sink.is_some()
    }

    /// Encode the canvas into the back buffer and queue it for transfer.
    pub async fn render(&mut self, canvas: &Canvas) -> Result<(), TransportError> {
        let slot = self.next;
        let mut frame = self.acquire(slot).await?;
        frame.encode(canvas);

        let Some(transfers) = &self.transfers else {
            self.park(slot, frame);
            return Err(TransportError::NotOpen);
        };
        if let Err(std_mpsc::SendError(transfer)) = transfers.send(Transfer { slot, frame }) {
            self.park(transfer.slot, transfer.frame);
            return Err(TransportError::NotOpen);
        }

        self.next = 1 - slot;
        Ok(())
    }

    /// Wait until no transfer is in flight.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let returned = self.shared.returned.notified();
            tokio::pin!(returned);
            returned.as_mut().enable();

            if self.in_flight() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, returned).await.is_err() {
                return self.in_flight() == 0;
            }
        }
    }

    /// Number of frames currently owned by the transfer thread.
    pub fn in_flight(&self) -> usize {
        self.shared
            .slots
            .lock()
            .frames
            .iter()
            .filter(|f| f.is_none())
            .count()
    }

    async fn acquire(&self, slot: usize) -> Result<DeviceFrame, TransportError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            // Register before checking so a return in between is not missed
            let returned = self.shared.returned.notified();
            tokio::pin!(returned);
            returned.as_mut().enable();

            if let Some(frame) = self.take(slot) {
                return Ok(frame);
            }
            if tokio::time::timeout_at(deadline, returned).await.is_err() {
                return self.take(slot).ok_or(TransportError::Timeout);
            }
        }
    }

    fn take(&self, slot: usize) -> Option<DeviceFrame> {
        self.shared.slots.lock().frames[slot].take()
    }

    fn park(&self, slot: usize, frame: DeviceFrame) {
        self.shared.slots.lock().frames[slot] = Some(frame);
        self.shared.returned.notify_waiters();
    }
}

impl Drop for DisplayPipeline {
    fn drop(&mut self) {
        self.transfers = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn transfer_loop(
    shared: Arc<Shared>,
    transfers: std_mpsc::Receiver<Transfer>,
    outcomes: mpsc::UnboundedSender<TransferOutcome>,
) {
    while let Ok(Transfer { slot, frame }) = transfers.recv() {
        let sink = shared.slots.lock().sink.clone();

        let result = match sink {
            Some(sink) => sink.write_frame(&FRAME_HEADER, frame.as_bytes()),
            None => Err(TransportError::NotOpen),
        };

        shared.slots.lock().frames[slot] = Some(frame);
        shared.returned.notify_waiters();

        let outcome = match result {
            Ok(()) => TransferOutcome::Completed { slot },
            Err(error) => TransferOutcome::Failed { slot, error },
        };
        let _ = outcomes.send(outcome);
    }
    tracing::debug!("Display transfer thread exiting");
}

//! Push2Module - the surface worker task.
//!
//! One task owns the device, the control registry and the render timer.
//! Host requests, inbound MIDI and transfer outcomes all arrive on channels
//! and are handled here one at a time, in arrival order per channel.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::Preferences;
use crate::display::{Canvas, DisplayPipeline, DisplaySource, TransferOutcome};
use crate::error::{SurfaceError, TransportError};
use crate::feedback::HostState;
use crate::midi::wire::IDENTITY_REQUEST;
use crate::midi::{self, ButtonId, LedState, Registry, SurfaceEvent};
use crate::transport::{Device, InboundSender, Port};

/// Consecutive failed transfers after which the device counts as lost.
const LOST_AFTER_FAILURES: u32 = 2;

/// Work queued from the [`crate::Surface`] handle.
pub(crate) enum Request {
    SetActive {
        yes: bool,
        reply: oneshot::Sender<Result<(), SurfaceError>>,
    },
    RenderNow,
    SetLedState {
        id: ButtonId,
        state: LedState,
    },
    SetLedColor {
        id: ButtonId,
        color: u8,
    },
    SetPad {
        x: u8,
        y: u8,
        state: LedState,
        color: u8,
    },
    HostState(HostState),
    SetPreferences(Preferences),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
    /// Stopped after repeated transfer failures, until the host restarts
    DeviceLost,
}

/// Receiving ends the worker selects over.
pub(crate) struct Channels {
    pub requests: mpsc::UnboundedReceiver<Request>,
    pub inbound: mpsc::UnboundedReceiver<(Port, Vec<u8>)>,
    pub outcomes: mpsc::UnboundedReceiver<TransferOutcome>,
}

pub(crate) struct Push2Module {
    device: Box<dyn Device>,
    registry: Registry,
    pipeline: DisplayPipeline,
    canvas: Canvas,
    source: Option<Box<dyn DisplaySource>>,
    /// Host canvas needs a redraw before the next frame
    dirty: bool,
    preferences: Preferences,
    state: RunState,
    failures: u32,
    events: mpsc::UnboundedSender<SurfaceEvent>,
    inbound: InboundSender,
}

impl Push2Module {
    /// Create the worker and the channels feeding it.
    pub(crate) fn new(
        device: Box<dyn Device>,
        registry: Registry,
        source: Option<Box<dyn DisplaySource>>,
        preferences: Preferences,
        requests: mpsc::UnboundedReceiver<Request>,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> (Self, Channels) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let module = Self {
            device,
            registry,
            pipeline: DisplayPipeline::new(preferences.transfer_timeout(), outcome_tx),
            canvas: Canvas::new(),
            source,
            dirty: true,
            preferences,
            state: RunState::Stopped,
            failures: 0,
            events,
            inbound: inbound_tx,
        };
        let channels = Channels {
            requests,
            inbound: inbound_rx,
            outcomes: outcome_rx,
        };
        (module, channels)
    }

    pub(crate) async fn run(mut self, mut channels: Channels) {
        tracing::debug!("Push 2 surface worker running");
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                // Host requests before frames
                biased;

                request = channels.requests.recv() => {
                    match request {
                        Some(Request::Shutdown) | None => break,
                        Some(request) => self.handle_request(request).await,
                    }
                }

                Some((port, bytes)) = channels.inbound.recv() => {
                    self.handle_inbound(port, &bytes);
                }

                Some(outcome) = channels.outcomes.recv() => {
                    self.handle_outcome(outcome);
                }

                _ = next_tick(&mut ticker) => {
                    self.render_frame().await;
                }
            }

            self.sync_ticker(&mut ticker);
        }

        self.stop().await;
        tracing::info!("Push 2 surface worker stopped");
    }

    /// Start, stop or retime the render interval to match the run state.
    fn sync_ticker(&self, ticker: &mut Option<Interval>) {
        if self.state != RunState::Running {
            *ticker = None;
            return;
        }
        let period = self.preferences.frame_interval();
        if ticker.as_ref().map(Interval::period) != Some(period) {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            *ticker = Some(interval);
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::SetActive { yes, reply } => {
                let result = if yes {
                    self.start()
                } else {
                    self.stop().await;
                    Ok(())
                };
                let _ = reply.send(result);
            }

            Request::RenderNow => {
                self.dirty = true;
                self.render_frame().await;
            }

            Request::SetLedState { id, state } => {
                if let Some(message) = self.registry.set_led_state(id, state) {
                    self.send_led(message);
                }
            }

            Request::SetLedColor { id, color } => {
                let result = self.registry.set_led_color(id, color);
                self.send_led_result(result);
            }

            Request::SetPad { x, y, state, color } => {
                let result = self.registry.set_pad(x, y, state, color);
                self.send_led_result(result);
            }

            Request::HostState(host_state) => {
                let (id, spec) = self.preferences.feedback.resolve(host_state);
                tracing::debug!(?host_state, ?id, "Host state feedback");
                let result = self.registry.set_led(id, spec.state, spec.color);
                self.send_led_result(result);
            }

            Request::SetPreferences(preferences) => {
                self.pipeline.set_timeout(preferences.transfer_timeout());
                self.preferences = preferences;
                tracing::info!(fps = self.preferences.fps, "Push 2 preferences updated");
            }

            // Handled by the run loop
            Request::Shutdown => {}
        }
    }

    fn handle_inbound(&mut self, port: Port, bytes: &[u8]) {
        if self.state != RunState::Running {
            return;
        }
        let events = &self.events;
        midi::dispatch(&mut self.registry, port, bytes, |event| {
            let _ = events.send(event);
        });
    }

    fn handle_outcome(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Completed { .. } => self.failures = 0,
            TransferOutcome::Failed { slot, error } => self.transfer_failed(Some(slot), error),
        }
    }

    fn transfer_failed(&mut self, slot: Option<usize>, error: TransportError) {
        // Stale outcomes from frames queued before a stop
        if self.state != RunState::Running {
            return;
        }
        self.failures += 1;
        tracing::warn!(
            ?slot,
            failures = self.failures,
            "Push 2 frame transfer failed: {}",
            error
        );
        if self.failures >= LOST_AFTER_FAILURES {
            self.device_lost();
        }
    }

    fn device_lost(&mut self) {
        tracing::error!("Push 2 display lost after {} failed transfers", self.failures);
        self.state = RunState::DeviceLost;
        self.pipeline.detach();
        self.device.close();
        let _ = self.events.send(SurfaceEvent::DeviceLost);
    }

    fn start(&mut self) -> Result<(), SurfaceError> {
        if self.state == RunState::Running {
            return Ok(());
        }

        self.device.open(self.inbound.clone())?;
        if let Some(sink) = self.device.frame_sink() {
            self.pipeline.attach(sink);
        }
        self.state = RunState::Running;
        self.failures = 0;
        self.dirty = true;

        for message in self.registry.all_led_messages() {
            self.send_led(message);
        }
        if let Err(e) = self.device.write(Port::Live, &IDENTITY_REQUEST) {
            tracing::debug!("Identity request not sent: {}", e);
        }

        tracing::info!("Push 2 surface started");
        let _ = self.events.send(SurfaceEvent::Started);
        Ok(())
    }

    async fn stop(&mut self) {
        match self.state {
            RunState::Running => {}
            RunState::DeviceLost => {
                self.state = RunState::Stopped;
                return;
            }
            RunState::Stopped => return,
        }

        if !self
            .pipeline
            .wait_idle(self.preferences.transfer_timeout())
            .await
        {
            tracing::warn!("Push 2 frame transfer still in flight at stop");
        }
        for message in self.registry.blackout() {
            self.send_led(message);
        }

        self.state = RunState::Stopped;
        self.pipeline.detach();
        self.device.close();

        tracing::info!("Push 2 surface stopped");
        let _ = self.events.send(SurfaceEvent::Stopped);
    }

    async fn render_frame(&mut self) {
        if self.state != RunState::Running {
            return;
        }
        if self.dirty {
            if let Some(source) = self.source.as_mut() {
                source.draw(&mut self.canvas);
            }
            self.dirty = false;
        }
        if let Err(e) = self.pipeline.render(&self.canvas).await {
            self.transfer_failed(None, e);
        }
    }

    fn send_led(&mut self, message: [u8; 3]) {
        if self.state != RunState::Running {
            return;
        }
        if let Err(e) = self.device.write(self.preferences.led_port, &message) {
            tracing::warn!("LED update failed: {}", e);
        }
    }

    fn send_led_result<E: std::fmt::Display>(&mut self, result: Result<Option<[u8; 3]>, E>) {
        match result {
            Ok(Some(message)) => self.send_led(message),
            Ok(None) => {}
            Err(e) => tracing::warn!("LED update rejected: {}", e),
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

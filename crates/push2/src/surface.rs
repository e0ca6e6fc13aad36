//! Host handle to a running surface.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::Preferences;
use crate::display::DisplaySource;
use crate::error::SurfaceError;
use crate::feedback::HostState;
use crate::midi::{
    check_color, ButtonId, Handlers, Layout, LedState, Registry, SurfaceEvent, GRID_SIZE,
};
use crate::module::{Push2Module, Request};
use crate::transport::Device;

/// Slack on top of the transfer waits a lifecycle request may include.
const REPLY_MARGIN: Duration = Duration::from_secs(1);

/// Ableton Push 2 control surface.
///
/// Every call queues a request to the surface's worker task, so calls from
/// any thread are applied in order and never touch the device concurrently.
/// Must be created inside a tokio runtime.
pub struct Surface {
    requests: mpsc::UnboundedSender<Request>,
    events: Mutex<Option<mpsc::UnboundedReceiver<SurfaceEvent>>>,
    preferences: Mutex<Preferences>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Surface {
    /// Build the control registry and start the worker. The device stays
    /// closed until [`Surface::set_active`].
    pub fn spawn(
        preferences: Preferences,
        device: Box<dyn Device>,
        source: Option<Box<dyn DisplaySource>>,
        handlers: Handlers,
    ) -> Result<Self, SurfaceError> {
        preferences
            .validate()
            .map_err(SurfaceError::InvalidPreferences)?;
        let registry = Registry::build(&Layout::push2(), handlers)?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (module, channels) = Push2Module::new(
            device,
            registry,
            source,
            preferences.clone(),
            request_rx,
            event_tx,
        );
        let worker = tokio::spawn(module.run(channels));

        Ok(Self {
            requests: request_tx,
            events: Mutex::new(Some(event_rx)),
            preferences: Mutex::new(preferences),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Open or close the device. Opening pushes the full LED state and
    /// starts the frame timer; closing turns the LEDs off first.
    pub async fn set_active(&self, yes: bool) -> Result<(), SurfaceError> {
        let (reply, response) = oneshot::channel();
        self.send(Request::SetActive { yes, reply })?;
        match tokio::time::timeout(self.reply_timeout(), response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SurfaceError::WorkerGone),
            Err(_) => Err(SurfaceError::ReplyTimeout),
        }
    }

    /// Redraw the display source and send a frame now.
    pub fn render_now(&self) -> Result<(), SurfaceError> {
        self.send(Request::RenderNow)
    }

    pub fn set_led_state(&self, id: ButtonId, state: LedState) -> Result<(), SurfaceError> {
        self.send(Request::SetLedState { id, state })
    }

    pub fn set_led_color(&self, id: ButtonId, color: u8) -> Result<(), SurfaceError> {
        let color = check_color(color)?;
        self.send(Request::SetLedColor { id, color })
    }

    /// Set state and color of the pad at `(x, y)`, `(0, 0)` being bottom left.
    pub fn set_pad(&self, x: u8, y: u8, state: LedState, color: u8) -> Result<(), SurfaceError> {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return Err(SurfaceError::NoSuchPad { x, y });
        }
        let color = check_color(color)?;
        self.send(Request::SetPad { x, y, state, color })
    }

    /// Reflect a host state change on the buttons.
    pub fn push_host_state(&self, state: HostState) -> Result<(), SurfaceError> {
        self.send(Request::HostState(state))
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.lock().clone()
    }

    pub fn set_preferences(&self, preferences: Preferences) -> Result<(), SurfaceError> {
        preferences
            .validate()
            .map_err(SurfaceError::InvalidPreferences)?;
        *self.preferences.lock() = preferences.clone();
        self.send(Request::SetPreferences(preferences))
    }

    /// Preferences as a versioned JSON document.
    pub fn get_state(&self) -> Result<String, SurfaceError> {
        self.preferences.lock().to_document()
    }

    /// Restore preferences saved by [`Surface::get_state`].
    pub fn set_state(&self, document: &str, version: u32) -> Result<(), SurfaceError> {
        let preferences = Preferences::from_document(document, version)?;
        *self.preferences.lock() = preferences.clone();
        self.send(Request::SetPreferences(preferences))
    }

    /// Event stream for the host. Can be taken once.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<SurfaceEvent>> {
        self.events.lock().take()
    }

    /// Stop the surface and wait for the worker to finish.
    pub async fn shutdown(&self) -> Result<(), SurfaceError> {
        // The worker may already be gone; closing is idempotent
        let _ = self.requests.send(Request::Shutdown);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            match tokio::time::timeout(self.reply_timeout(), worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Push 2 surface worker failed: {}", e);
                    return Err(SurfaceError::WorkerGone);
                }
                Err(_) => return Err(SurfaceError::ReplyTimeout),
            }
        }
        Ok(())
    }

    /// A stop may wait for one frame slot and then for the transfers in
    /// flight, each bounded by the transfer timeout.
    fn reply_timeout(&self) -> Duration {
        self.preferences.lock().transfer_timeout() * 2 + REPLY_MARGIN
    }

    fn send(&self, request: Request) -> Result<(), SurfaceError> {
        self.requests
            .send(request)
            .map_err(|_| SurfaceError::WorkerGone)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::display::{Canvas, FrameSink, Rgb};
    use crate::error::TransportError;
    use crate::feedback::RecordState;
    use crate::midi::wire::IDENTITY_REQUEST;
    use crate::transport::{InboundSender, Port};

    #[derive(Default)]
    struct DeviceLog {
        opens: usize,
        closes: usize,
        writes: Vec<(Port, Vec<u8>)>,
        inbound: Option<InboundSender>,
    }

    #[derive(Default)]
    struct CountingSink {
        attempts: AtomicUsize,
        fail: bool,
        /// Fail only this many leading attempts
        fail_first: usize,
        delay: Duration,
    }

    impl FrameSink for CountingSink {
        fn write_frame(&self, header: &[u8], payload: &[u8]) -> Result<(), TransportError> {
            assert_eq!(header.len(), 16);
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            std::thread::sleep(self.delay);
            if self.fail || attempt <= self.fail_first {
                Err(TransportError::ShortWrite {
                    written: 0,
                    expected: payload.len(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct FakeDevice {
        log: Arc<Mutex<DeviceLog>>,
        sink: Arc<CountingSink>,
        fail_open: bool,
        open: bool,
    }

    impl Device for FakeDevice {
        fn open(&mut self, inbound: InboundSender) -> Result<(), TransportError> {
            let mut log = self.log.lock();
            log.opens += 1;
            if self.fail_open {
                return Err(TransportError::DeviceNotFound);
            }
            log.inbound = Some(inbound);
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                self.log.lock().closes += 1;
            }
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn write(&mut self, port: Port, bytes: &[u8]) -> Result<(), TransportError> {
            if !self.open {
                return Err(TransportError::NotOpen);
            }
            self.log.lock().writes.push((port, bytes.to_vec()));
            Ok(())
        }

        fn frame_sink(&self) -> Option<Arc<dyn FrameSink>> {
            if self.open {
                Some(self.sink.clone())
            } else {
                None
            }
        }
    }

    struct Harness {
        surface: Surface,
        events: mpsc::UnboundedReceiver<SurfaceEvent>,
        log: Arc<Mutex<DeviceLog>>,
        sink: Arc<CountingSink>,
    }

    fn harness_with(
        preferences: Preferences,
        handlers: Handlers,
        sink: CountingSink,
        fail_open: bool,
    ) -> Harness {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let sink = Arc::new(sink);
        let device = FakeDevice {
            log: log.clone(),
            sink: sink.clone(),
            fail_open,
            open: false,
        };
        let surface = Surface::spawn(preferences, Box::new(device), None, handlers).unwrap();
        let events = surface.events().unwrap();
        Harness {
            surface,
            events,
            log,
            sink,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Preferences::default(),
            Handlers::new(),
            CountingSink::default(),
            false,
        )
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<SurfaceEvent>) -> SurfaceEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for surface event")
            .expect("event channel closed")
    }

    /// Round trip through the worker so earlier requests have been applied.
    async fn barrier(surface: &Surface) {
        surface.set_active(true).await.unwrap();
    }

    fn inject(log: &Arc<Mutex<DeviceLog>>, bytes: &[u8]) {
        let inbound = log.lock().inbound.clone().unwrap();
        inbound.send((Port::Live, bytes.to_vec())).unwrap();
    }

    #[tokio::test]
    async fn test_failed_open_leaves_surface_stopped() {
        let mut h = harness_with(
            Preferences::default(),
            Handlers::new(),
            CountingSink::default(),
            true,
        );

        let result = h.surface.set_active(true).await;
        assert!(matches!(
            result,
            Err(SurfaceError::Transport(TransportError::DeviceNotFound))
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.sink.attempts.load(Ordering::SeqCst), 0);
        assert!(h.log.lock().writes.is_empty());
        assert!(h.events.try_recv().is_err());

        // Still stopped: closing needs no device call
        assert_ok!(h.surface.set_active(false).await);
        assert_eq!(h.log.lock().closes, 0);
    }

    #[tokio::test]
    async fn test_start_pushes_full_led_state() {
        let mut h = harness();
        assert_ok!(h.surface.set_active(true).await);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);

        let log = h.log.lock();
        assert_eq!(log.opens, 1);
        // 64 pads and 65 buttons, then the identity request
        assert_eq!(log.writes.len(), 64 + 65 + 1);
        assert_eq!(
            log.writes.last(),
            Some(&(Port::Live, IDENTITY_REQUEST.to_vec()))
        );
    }

    #[tokio::test]
    async fn test_close_twice_closes_device_once() {
        let mut h = harness();
        assert_ok!(h.surface.set_active(true).await);
        assert_ok!(h.surface.set_active(false).await);
        assert_ok!(h.surface.set_active(false).await);

        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Stopped);
        assert!(h.events.try_recv().is_err());

        let log = h.log.lock();
        assert_eq!(log.closes, 1);
        // Stop turns every LED off before closing
        let blackout = &log.writes[log.writes.len() - (64 + 65)..];
        assert!(blackout.iter().all(|(_, m)| m[0] & 0x0F == 0 && m[2] == 0));
    }

    #[tokio::test]
    async fn test_play_button_runs_handlers() {
        let presses = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let handlers = {
            let presses = presses.clone();
            let releases = releases.clone();
            Handlers::new()
                .on_press(ButtonId::Play, move |_| {
                    presses.fetch_add(1, Ordering::SeqCst);
                })
                .on_release(ButtonId::Play, move |_| {
                    releases.fetch_add(1, Ordering::SeqCst);
                })
        };
        let mut h = harness_with(
            Preferences::default(),
            handlers,
            CountingSink::default(),
            false,
        );
        assert_ok!(h.surface.set_active(true).await);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);

        inject(&h.log, &[0xB0, 0x55, 0x7F]);
        assert_eq!(
            next_event(&mut h.events).await,
            SurfaceEvent::ButtonPress(ButtonId::Play)
        );
        inject(&h.log, &[0xB0, 0x55, 0x00]);
        assert_eq!(
            next_event(&mut h.events).await,
            SurfaceEvent::ButtonRelease(ButtonId::Play)
        );
        assert_eq!(presses.load(Ordering::SeqCst), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Unmapped controller: no handler, no event
        inject(&h.log, &[0xB0, 0x79, 0x7F]);
        inject(&h.log, &[0x90, 36, 100]);
        assert_eq!(
            next_event(&mut h.events).await,
            SurfaceEvent::PadTouch {
                down: true,
                x: 0,
                y: 0,
                velocity: 100
            }
        );
        assert_eq!(presses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_device_lost_after_two_failures() {
        let sink = CountingSink {
            fail: true,
            ..CountingSink::default()
        };
        let mut h = harness_with(Preferences::default(), Handlers::new(), sink, false);
        assert_ok!(h.surface.set_active(true).await);

        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::DeviceLost);
        assert_eq!(h.log.lock().closes, 1);

        // Renders are no-ops once lost
        tokio::time::sleep(Duration::from_millis(100)).await;
        let attempts = h.sink.attempts.load(Ordering::SeqCst);
        assert_ok!(h.surface.render_now());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.sink.attempts.load(Ordering::SeqCst), attempts);
        assert!(h.events.try_recv().is_err());

        // Stopping a lost surface does not close the device again
        assert_ok!(h.surface.set_active(false).await);
        assert_eq!(h.log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_single_failed_frame_is_transient() {
        let sink = CountingSink {
            fail_first: 1,
            ..CountingSink::default()
        };
        let mut h = harness_with(Preferences::default(), Handlers::new(), sink, false);
        assert_ok!(h.surface.set_active(true).await);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let attempts = h.sink.attempts.load(Ordering::SeqCst);
        assert!(attempts > 2, "only {} frames sent", attempts);
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.log.lock().closes, 0);

        // Still streaming after the failure
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.sink.attempts.load(Ordering::SeqCst) > attempts);
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_answers_while_transfers_are_slow() {
        let preferences = Preferences {
            transfer_timeout_ms: 300,
            ..Preferences::default()
        };
        let sink = CountingSink {
            delay: Duration::from_millis(280),
            ..CountingSink::default()
        };
        let mut h = harness_with(preferences, Handlers::new(), sink, false);
        assert_ok!(h.surface.set_active(true).await);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Worst case is one slot wait plus one idle wait
        let bound = Duration::from_millis(2 * 300 + 1000);
        let result = tokio::time::timeout(bound, h.surface.set_active(false)).await;
        assert!(matches!(result, Ok(Ok(()))), "stop did not answer: {:?}", result);

        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Stopped);
        assert_eq!(h.log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_frames_stream_while_running() {
        let mut h = harness();
        assert_ok!(h.surface.set_active(true).await);
        assert_eq!(next_event(&mut h.events).await, SurfaceEvent::Started);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(h.sink.attempts.load(Ordering::SeqCst) > 0);

        assert_ok!(h.surface.set_active(false).await);
        let attempts = h.sink.attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.sink.attempts.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test]
    async fn test_led_requests_reach_device() {
        let h = harness();
        barrier(&h.surface).await;
        h.log.lock().writes.clear();

        // Color alone is silent while the LED is off
        assert_ok!(h.surface.set_led_color(ButtonId::Play, 126));
        assert_ok!(h.surface.set_led_state(ButtonId::Play, LedState::OneShot24th));
        assert_ok!(h.surface.set_pad(7, 7, LedState::Pulsing8th, 5));
        barrier(&h.surface).await;

        let writes = h.log.lock().writes.clone();
        assert_eq!(
            writes,
            vec![
                (Port::Live, vec![0xB1, 85, 126]),
                (Port::Live, vec![0x98, 99, 5]),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_led_requests_are_rejected() {
        let h = harness();
        assert!(matches!(
            h.surface.set_led_color(ButtonId::Play, 200),
            Err(SurfaceError::Color(_))
        ));
        assert!(matches!(
            h.surface.set_pad(8, 0, LedState::OneShot24th, 5),
            Err(SurfaceError::NoSuchPad { x: 8, y: 0 })
        ));
    }

    #[tokio::test]
    async fn test_host_state_uses_feedback_map_and_led_port() {
        let preferences = Preferences {
            led_port: Port::User,
            ..Preferences::default()
        };
        let h = harness_with(preferences, Handlers::new(), CountingSink::default(), false);
        barrier(&h.surface).await;
        h.log.lock().writes.clear();

        assert_ok!(h.surface.push_host_state(HostState::Transport { rolling: true }));
        assert_ok!(h
            .surface
            .push_host_state(HostState::Record(RecordState::Enabled)));
        barrier(&h.surface).await;

        let writes = h.log.lock().writes.clone();
        assert_eq!(
            writes,
            vec![
                (Port::User, vec![0xB1, 85, 126]),
                (Port::User, vec![0xB0 | LedState::Blinking4th.ordinal(), 86, 127]),
            ]
        );
    }

    #[tokio::test]
    async fn test_state_document_round_trip() {
        let h = harness();
        let mut preferences = h.surface.preferences();
        preferences.fps = 30;
        let document = preferences.to_document().unwrap();

        assert_ok!(h.surface.set_state(&document, 1));
        assert_eq!(h.surface.preferences().fps, 30);
        assert!(h.surface.get_state().unwrap().contains("\"fps\": 30"));

        assert_err!(h.surface.set_state(&document, 2));
        assert_eq!(h.surface.preferences().fps, 30);
    }

    #[tokio::test]
    async fn test_display_source_is_drawn() {
        struct Solid(Arc<AtomicUsize>);
        impl DisplaySource for Solid {
            fn draw(&mut self, canvas: &mut Canvas) {
                self.0.fetch_add(1, Ordering::SeqCst);
                canvas.fill(Rgb::BLUE);
            }
        }

        let draws = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let device = FakeDevice {
            log: log.clone(),
            sink: Arc::new(CountingSink::default()),
            fail_open: false,
            open: false,
        };
        let surface = Surface::spawn(
            Preferences::default(),
            Box::new(device),
            Some(Box::new(Solid(draws.clone()))),
            Handlers::new(),
        )
        .unwrap();

        assert_ok!(surface.set_active(true).await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Redrawn once on start, not on every frame
        assert_eq!(draws.load(Ordering::SeqCst), 1);

        assert_ok!(surface.render_now());
        barrier(&surface).await;
        assert_eq!(draws.load(Ordering::SeqCst), 2);

        assert_ok!(surface.shutdown().await);
        assert_eq!(log.lock().closes, 1);
        assert!(matches!(
            surface.render_now(),
            Err(SurfaceError::WorkerGone)
        ));
    }
}

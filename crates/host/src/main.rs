use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use push2_surface::midi::colors;
use push2_surface::{
    ButtonId, Handlers, HostState, LedState, Push2Device, RecordState, Surface, SurfaceEvent,
};

mod config;
mod screen;

use config::ConfigManager;
use screen::{SessionView, StatusScreen};

/// Drive an Ableton Push 2 as a standalone control surface.
#[derive(Parser, Debug)]
#[command(name = "push2-host")]
#[command(about = "Ableton Push 2 surface host")]
struct Args {
    /// Preferences file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the display refresh rate
    #[arg(long)]
    fps: Option<u32>,

    /// Seconds between reconnect attempts after the device is lost
    #[arg(long, default_value = "2")]
    reconnect_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config);
    let mut preferences = config.load()?;
    if let Some(fps) = args.fps {
        preferences.fps = fps;
        config.update_preferences(preferences.clone())?;
    }
    log::info!(
        "Loaded preferences from {} ({} fps)",
        config.config_path().display(),
        preferences.fps
    );

    let view = Arc::new(Mutex::new(SessionView::default()));

    // Shift is tracked from the handlers; everything else from the event stream
    let shift = Arc::new(AtomicBool::new(false));
    let handlers = {
        let pressed = shift.clone();
        let released = shift.clone();
        Handlers::new()
            .on_press(ButtonId::Shift, move |_| pressed.store(true, Ordering::Relaxed))
            .on_release(ButtonId::Shift, move |_| released.store(false, Ordering::Relaxed))
    };

    let device = Push2Device::new(preferences.transfer_timeout());
    let surface = Surface::spawn(
        preferences,
        Box::new(device),
        Some(Box::new(StatusScreen::new(view.clone()))),
        handlers,
    )?;
    let mut events = surface
        .events()
        .ok_or_else(|| anyhow::anyhow!("surface event stream already taken"))?;

    surface.set_active(true).await?;
    println!("Push 2 surface running. Press Ctrl+C to exit.");

    let mut session = Session::new(view, shift);
    let reconnect = Duration::from_secs(args.reconnect_secs);
    let mut lost = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }

            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SurfaceEvent::DeviceLost => {
                        log::warn!("Push 2 lost, retrying every {:?}", reconnect);
                        lost = true;
                    }
                    SurfaceEvent::Started => lost = false,
                    event => session.handle(&surface, event)?,
                }
            }

            _ = tokio::time::sleep(reconnect), if lost => {
                if let Err(e) = surface.set_active(true).await {
                    log::debug!("Reconnect failed: {}", e);
                }
            }
        }
    }

    surface.set_active(false).await?;
    config.update_preferences(surface.preferences())?;
    surface.shutdown().await?;
    Ok(())
}

/// Demo session: Play toggles the transport, Record cycles the record
/// state, Repeat toggles looping and pads light while held.
struct Session {
    view: Arc<Mutex<SessionView>>,
    shift: Arc<AtomicBool>,
    rolling: bool,
    record: RecordState,
    looping: bool,
}

impl Session {
    fn new(view: Arc<Mutex<SessionView>>, shift: Arc<AtomicBool>) -> Self {
        Self {
            view,
            shift,
            rolling: false,
            record: RecordState::Disabled,
            looping: false,
        }
    }

    fn handle(&mut self, surface: &Surface, event: SurfaceEvent) -> Result<(), anyhow::Error> {
        match event {
            SurfaceEvent::ButtonPress(ButtonId::Play) => {
                self.rolling = !self.rolling;
                surface.push_host_state(HostState::Transport {
                    rolling: self.rolling,
                })?;
            }
            SurfaceEvent::ButtonPress(ButtonId::RecordEnable) => {
                self.record = match self.record {
                    RecordState::Disabled => RecordState::Enabled,
                    RecordState::Enabled if self.rolling => RecordState::Recording,
                    _ => RecordState::Disabled,
                };
                surface.push_host_state(HostState::Record(self.record))?;
            }
            SurfaceEvent::ButtonPress(ButtonId::Repeat) => {
                self.looping = !self.looping;
                surface.push_host_state(HostState::Loop(self.looping))?;
            }
            SurfaceEvent::ButtonPress(id) | SurfaceEvent::ButtonRelease(id) => {
                log::debug!("Button {:?}", id);
            }
            SurfaceEvent::PadTouch { down, x, y, velocity } => {
                let (state, color) = if !down {
                    (LedState::Off, colors::BLACK)
                } else if self.shift.load(Ordering::Relaxed) {
                    (LedState::Pulsing8th, colors::PURPLE)
                } else {
                    (LedState::OneShot24th, velocity.max(1))
                };
                surface.set_pad(x, y, state, color)?;
                self.view.lock().held[usize::from(y)][usize::from(x)] = down;
            }
            SurfaceEvent::TouchStrip(value) => {
                self.view.lock().strip = value;
            }
            SurfaceEvent::DeviceInfo(identity) => {
                log::info!(
                    "Connected to Push 2, firmware {}.{}, serial {}",
                    identity.firmware_major,
                    identity.firmware_minor,
                    identity.serial
                );
                return Ok(());
            }
            SurfaceEvent::Stopped => {
                log::info!("Push 2 surface stopped");
                return Ok(());
            }
            SurfaceEvent::SysEx(_) | SurfaceEvent::Started | SurfaceEvent::DeviceLost => {
                return Ok(());
            }
        }

        {
            let mut view = self.view.lock();
            view.rolling = self.rolling;
            view.record = self.record;
            view.looping = self.looping;
            view.shift = self.shift.load(Ordering::Relaxed);
        }
        surface.render_now()?;
        Ok(())
    }
}

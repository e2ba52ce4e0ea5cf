//! Thread-per-surface runtime shared by the HUD and the attention markers.
//!
//! A [`SurfaceFactory`] builds the native window on the surface's own thread;
//! the resulting [`NativeSurface`] never leaves that thread. Everything else
//! talks to it through [`SurfaceHandle::post`].

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;

use crate::overlay::messages::{SurfaceCommand, SurfaceEvent, SurfaceSnapshot};
use crate::overlay::signal::Signal;
use crate::overlay::state::{can_transition, SurfaceLifecycle};
use crate::overlay::zoom::{TextZoom, ZoomDirection};

/// How long a surface loop blocks on its command queue between native pumps.
pub const DISPATCH_INTERVAL: Duration = Duration::from_millis(16);
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const PALETTE: [(&str, Tint); 8] = [
    ("red", Tint::rgb(0xFF, 0x00, 0x00)),
    ("green", Tint::rgb(0x00, 0xFF, 0x00)),
    ("blue", Tint::rgb(0x00, 0x00, 0xFF)),
    ("yellow", Tint::rgb(0xFF, 0xFF, 0x00)),
    ("cyan", Tint::rgb(0x00, 0xFF, 0xFF)),
    ("magenta", Tint::rgb(0xFF, 0x00, 0xFF)),
    ("orange", Tint::rgb(0xFF, 0x99, 0x00)),
    ("pink", Tint::rgb(0xFF, 0xC0, 0xCB)),
];

impl Tint {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Palette lookup, case-insensitive. Unknown names are blue.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        PALETTE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, tint)| *tint)
            .unwrap_or(Tint::rgb(0x00, 0x00, 0xFF))
    }

    /// Packed `0x00BBGGRR`, the layout GDI expects.
    pub fn to_colorref(self) -> u32 {
        u32::from(self.r) | (u32::from(self.g) << 8) | (u32::from(self.b) << 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Hud,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleSpec {
    pub id: u16,
    pub label: String,
}

/// Everything a factory needs to build one overlay window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub kind: SurfaceKind,
    pub title: String,
    pub bounds: Rect,
    pub tint: Tint,
    /// Window opacity in percent.
    pub opacity: u8,
    pub text: String,
    pub readonly: bool,
    pub toggle: Option<ToggleSpec>,
    pub zoom: TextZoom,
}

/// A native overlay window. Only ever touched by the thread that created it.
pub trait NativeSurface {
    fn set_text(&mut self, text: &str);
    fn text(&self) -> String;
    fn set_readonly(&mut self, readonly: bool);
    fn set_toggle_label(&mut self, label: &str);
    fn zoom(&self) -> TextZoom;
    fn set_zoom(&mut self, zoom: TextZoom);
    fn client_size(&self) -> (i32, i32);
    /// Position the text region and, if present, the toggle control in
    /// client coordinates.
    fn place_children(&mut self, text: Rect, toggle: Option<Rect>);
    /// Dispatch pending native messages and return what they produced.
    fn pump_events(&mut self) -> Vec<SurfaceEvent>;
    fn destroy(&mut self);
}

pub trait SurfaceFactory: Send + Sync {
    fn create(&self, spec: &SurfaceSpec) -> anyhow::Result<Box<dyn NativeSurface>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Per-surface behaviour over the closed event set. State the handler needs
/// lives in the handler itself, which is owned by the surface thread.
pub trait SurfaceHandler: Send + 'static {
    fn on_created(&mut self, _surface: &mut dyn NativeSurface) {}

    fn on_close(&mut self, _surface: &mut dyn NativeSurface) -> Flow {
        Flow::Stop
    }

    fn on_resize(&mut self, _surface: &mut dyn NativeSurface, _width: i32, _height: i32) -> Flow {
        Flow::Continue
    }

    /// Modifier plus wheel zooms the text.
    fn on_wheel(&mut self, surface: &mut dyn NativeSurface, delta: i32, modifier: bool) -> Flow {
        if modifier {
            if let Some(direction) = ZoomDirection::from_wheel(delta) {
                let zoom = surface.zoom().step(direction);
                surface.set_zoom(zoom);
            }
        }
        Flow::Continue
    }

    fn on_command(&mut self, _surface: &mut dyn NativeSurface, _id: u16) -> Flow {
        Flow::Continue
    }

    fn on_toggle_pause(&mut self, _surface: &mut dyn NativeSurface) {}

    fn on_stopping(&mut self) {}
}

/// Handler for surfaces that only display text.
pub struct PassiveHandler;

impl SurfaceHandler for PassiveHandler {}

fn dispatch_event(
    handler: &mut dyn SurfaceHandler,
    surface: &mut dyn NativeSurface,
    event: SurfaceEvent,
) -> Flow {
    match event {
        SurfaceEvent::Close => handler.on_close(surface),
        SurfaceEvent::Resize { width, height } => handler.on_resize(surface, width, height),
        SurfaceEvent::Wheel { delta, modifier } => handler.on_wheel(surface, delta, modifier),
        SurfaceEvent::Command(id) => handler.on_command(surface, id),
    }
}

fn apply_command(
    handler: &mut dyn SurfaceHandler,
    surface: &mut dyn NativeSurface,
    command: SurfaceCommand,
) -> Flow {
    match command {
        SurfaceCommand::SetText(text) => surface.set_text(&text),
        SurfaceCommand::Zoom(direction) => {
            let zoom = surface.zoom().step(direction);
            surface.set_zoom(zoom);
        }
        SurfaceCommand::TogglePause => handler.on_toggle_pause(surface),
        SurfaceCommand::Snapshot(reply) => {
            let _ = reply.send(SurfaceSnapshot {
                text: surface.text(),
                zoom: surface.zoom(),
            });
        }
        SurfaceCommand::Close => return Flow::Stop,
    }
    Flow::Continue
}

#[derive(Clone)]
struct LifecycleCell(Arc<Mutex<SurfaceLifecycle>>);

impl LifecycleCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(SurfaceLifecycle::Uninitialized)))
    }

    fn get(&self) -> SurfaceLifecycle {
        self.0
            .lock()
            .map(|g| *g)
            .unwrap_or(SurfaceLifecycle::Destroyed)
    }

    fn advance(&self, to: SurfaceLifecycle, name: &str) {
        if let Ok(mut guard) = self.0.lock() {
            if can_transition(*guard, to) {
                *guard = to;
            } else {
                tracing::warn!(surface = name, from = ?*guard, ?to, "ignored lifecycle transition");
            }
        }
    }
}

/// Owner-side handle of one surface thread. Dropping it stops the thread and
/// joins with [`JOIN_TIMEOUT`].
pub struct SurfaceHandle {
    name: String,
    commands: Sender<SurfaceCommand>,
    ready: Signal,
    stop: Signal,
    lifecycle: LifecycleCell,
    thread: Option<JoinHandle<()>>,
}

impl SurfaceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a command for the surface thread. Returns false once the thread
    /// has gone away.
    pub fn post(&self, command: SurfaceCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.wait_timeout(timeout)
    }

    pub fn state(&self) -> SurfaceLifecycle {
        self.lifecycle.get()
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    pub fn stop_signal(&self) -> Signal {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.set();
    }

    /// Stop the thread and wait up to `timeout` for it to finish. A slow
    /// thread is logged and left detached.
    pub fn shutdown(&mut self, timeout: Duration) {
        self.stop.set();
        let _ = self.commands.send(SurfaceCommand::Close);
        join_with_timeout(self.thread.take(), timeout, &self.name);
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        self.shutdown(JOIN_TIMEOUT);
    }
}

fn join_with_timeout(handle: Option<JoinHandle<()>>, timeout: Duration, name: &str) {
    let Some(handle) = handle else {
        return;
    };

    let (done_tx, done_rx) = channel();
    thread::spawn(move || {
        let join_result = handle.join();
        let _ = done_tx.send(join_result);
    });

    match done_rx.recv_timeout(timeout) {
        Ok(Ok(())) => {}
        Ok(Err(_)) => {
            tracing::error!(surface = name, "overlay thread panicked before join");
        }
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(surface = name, ?timeout, "overlay thread join timed out");
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::error!(surface = name, "overlay thread join channel disconnected");
        }
    }
}

/// Start a surface thread. The returned handle's ready signal fires once the
/// window exists, or once creation has failed.
pub fn spawn_surface<H: SurfaceHandler>(
    factory: Arc<dyn SurfaceFactory>,
    spec: SurfaceSpec,
    handler: H,
) -> anyhow::Result<SurfaceHandle> {
    let (tx, rx) = channel::<SurfaceCommand>();
    let ready = Signal::new();
    let stop = Signal::new();
    let lifecycle = LifecycleCell::new();
    let name = format!("overlay-{}", spec.title.to_lowercase().replace(' ', "-"));

    let thread = {
        let ready = ready.clone();
        let stop = stop.clone();
        let lifecycle = lifecycle.clone();
        let thread_name = name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                run_surface(
                    factory.as_ref(),
                    &spec,
                    handler,
                    rx,
                    SurfaceSignals {
                        ready,
                        stop,
                        lifecycle,
                    },
                    &thread_name,
                )
            })
            .map_err(|err| anyhow!("failed to spawn overlay thread {name}: {err}"))?
    };

    Ok(SurfaceHandle {
        name,
        commands: tx,
        ready,
        stop,
        lifecycle,
        thread: Some(thread),
    })
}

struct SurfaceSignals {
    ready: Signal,
    stop: Signal,
    lifecycle: LifecycleCell,
}

fn run_surface<H: SurfaceHandler>(
    factory: &dyn SurfaceFactory,
    spec: &SurfaceSpec,
    mut handler: H,
    commands: Receiver<SurfaceCommand>,
    signals: SurfaceSignals,
    name: &str,
) {
    let SurfaceSignals {
        ready,
        stop,
        lifecycle,
    } = signals;

    lifecycle.advance(SurfaceLifecycle::Starting, name);
    let mut surface = match factory.create(spec) {
        Ok(surface) => surface,
        Err(err) => {
            tracing::error!(surface = name, error = %err, "SurfaceCreationFailure");
            lifecycle.advance(SurfaceLifecycle::Destroyed, name);
            stop.set();
            ready.set();
            return;
        }
    };

    handler.on_created(surface.as_mut());
    lifecycle.advance(SurfaceLifecycle::Ready, name);
    ready.set();
    lifecycle.advance(SurfaceLifecycle::Active, name);

    'outer: while !stop.is_set() {
        for event in surface.pump_events() {
            if dispatch_event(&mut handler, surface.as_mut(), event) == Flow::Stop {
                break 'outer;
            }
        }

        match commands.recv_timeout(DISPATCH_INTERVAL) {
            Ok(command) => {
                let updates_text = matches!(command, SurfaceCommand::SetText(_));
                if apply_command(&mut handler, surface.as_mut(), command) == Flow::Stop {
                    break;
                }
                if updates_text {
                    lifecycle.advance(SurfaceLifecycle::TextUpdated, name);
                    lifecycle.advance(SurfaceLifecycle::Active, name);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    stop.set();
    lifecycle.advance(SurfaceLifecycle::Stopping, name);
    handler.on_stopping();
    surface.destroy();
    lifecycle.advance(SurfaceLifecycle::Destroyed, name);
    tracing::debug!(surface = name, "overlay thread finished");
}

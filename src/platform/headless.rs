//! In-memory backend: a synthetic screen, an input recorder and surfaces that
//! live in a shared registry. Used by `--headless` runs and by the tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;

use crate::coords::ScreenSize;
use crate::error::AgentError;
use crate::input::{InputEvent, InputSink};
use crate::overlay::{NativeSurface, Rect, SurfaceEvent, SurfaceFactory, SurfaceKind, SurfaceSpec};
use crate::overlay::TextZoom;
use crate::platform::Platform;
use crate::screen::capture::synthetic_frame;
use crate::screen::{FrameBuffer, ScreenSource};

pub const DEFAULT_SIZE: ScreenSize = ScreenSize::new(1920, 1080);

pub struct HeadlessScreen {
    size: ScreenSize,
    captures: AtomicUsize,
    failures: AtomicUsize,
}

impl HeadlessScreen {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            size,
            captures: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` captures fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl ScreenSource for HeadlessScreen {
    fn screen_size(&self) -> ScreenSize {
        self.size
    }

    fn capture(&self) -> Result<FrameBuffer, AgentError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AgentError::Capture("headless screen refused capture".into()));
        }
        Ok(synthetic_frame(self.size, n as u64))
    }
}

/// Records every batch. Optionally accepts only a prefix of each batch so
/// injection failures can be simulated.
#[derive(Default)]
pub struct RecordingInputSink {
    batches: Mutex<Vec<Vec<InputEvent>>>,
    accept_limit: Mutex<Option<usize>>,
}

impl RecordingInputSink {
    pub fn batches(&self) -> Vec<Vec<InputEvent>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn accept_at_most(&self, limit: Option<usize>) {
        if let Ok(mut guard) = self.accept_limit.lock() {
            *guard = limit;
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.batches.lock() {
            guard.clear();
        }
    }
}

impl InputSink for RecordingInputSink {
    fn send(&self, batch: &[InputEvent]) -> usize {
        if let Ok(mut guard) = self.batches.lock() {
            guard.push(batch.to_vec());
        }
        let limit = self.accept_limit.lock().ok().and_then(|g| *g);
        limit.map_or(batch.len(), |l| l.min(batch.len()))
    }
}

/// What a headless surface currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceView {
    pub id: usize,
    pub kind: SurfaceKind,
    pub title: String,
    pub bounds: Rect,
    pub text: String,
    pub readonly: bool,
    pub toggle_label: Option<String>,
    pub zoom: TextZoom,
    pub text_rect: Option<Rect>,
    pub toggle_rect: Option<Rect>,
    pub alive: bool,
}

struct SurfaceRecord {
    view: Mutex<SurfaceView>,
    events: Mutex<VecDeque<SurfaceEvent>>,
}

#[derive(Default)]
pub struct HeadlessSurfaceFactory {
    records: Mutex<Vec<Arc<SurfaceRecord>>>,
    failures: AtomicUsize,
}

impl HeadlessSurfaceFactory {
    /// Make the next `count` creations fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn surfaces(&self) -> Vec<SurfaceView> {
        self.records
            .lock()
            .map(|records| {
                records
                    .iter()
                    .filter_map(|r| r.view.lock().ok().map(|v| v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn live(&self, kind: SurfaceKind) -> Vec<SurfaceView> {
        self.surfaces()
            .into_iter()
            .filter(|v| v.alive && v.kind == kind)
            .collect()
    }

    pub fn live_count(&self, kind: SurfaceKind) -> usize {
        self.live(kind).len()
    }

    /// Most recently created live surface of `kind`.
    pub fn latest(&self, kind: SurfaceKind) -> Option<SurfaceView> {
        self.live(kind).pop()
    }

    /// Queue a native event for surface `id`; it is seen on the next pump.
    pub fn emit(&self, id: usize, event: SurfaceEvent) -> bool {
        let Ok(records) = self.records.lock() else {
            return false;
        };
        let Some(record) = records.get(id) else {
            return false;
        };
        let queued = match record.events.lock() {
            Ok(mut queue) => {
                queue.push_back(event);
                true
            }
            Err(_) => false,
        };
        queued
    }
}

impl SurfaceFactory for HeadlessSurfaceFactory {
    fn create(&self, spec: &SurfaceSpec) -> anyhow::Result<Box<dyn NativeSurface>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
            .is_ok();
        if failing {
            bail!("headless surface creation refused for {}", spec.title);
        }

        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("surface registry poisoned"))?;
        let record = Arc::new(SurfaceRecord {
            view: Mutex::new(SurfaceView {
                id: records.len(),
                kind: spec.kind,
                title: spec.title.clone(),
                bounds: spec.bounds,
                text: spec.text.clone(),
                readonly: spec.readonly,
                toggle_label: spec.toggle.as_ref().map(|t| t.label.clone()),
                zoom: spec.zoom,
                text_rect: None,
                toggle_rect: None,
                alive: true,
            }),
            events: Mutex::new(VecDeque::new()),
        });
        records.push(record.clone());
        Ok(Box::new(HeadlessSurface {
            record,
            size: (spec.bounds.width, spec.bounds.height),
        }))
    }
}

struct HeadlessSurface {
    record: Arc<SurfaceRecord>,
    size: (i32, i32),
}

impl HeadlessSurface {
    fn with_view<R>(&self, f: impl FnOnce(&mut SurfaceView) -> R) -> Option<R> {
        self.record.view.lock().ok().map(|mut v| f(&mut v))
    }
}

impl NativeSurface for HeadlessSurface {
    fn set_text(&mut self, text: &str) {
        self.with_view(|v| v.text = text.to_string());
    }

    fn text(&self) -> String {
        self.with_view(|v| v.text.clone()).unwrap_or_default()
    }

    fn set_readonly(&mut self, readonly: bool) {
        self.with_view(|v| v.readonly = readonly);
    }

    fn set_toggle_label(&mut self, label: &str) {
        self.with_view(|v| v.toggle_label = Some(label.to_string()));
    }

    fn zoom(&self) -> TextZoom {
        self.with_view(|v| v.zoom).unwrap_or_default()
    }

    fn set_zoom(&mut self, zoom: TextZoom) {
        self.with_view(|v| v.zoom = zoom);
    }

    fn client_size(&self) -> (i32, i32) {
        self.size
    }

    fn place_children(&mut self, text: Rect, toggle: Option<Rect>) {
        self.with_view(|v| {
            v.text_rect = Some(text);
            v.toggle_rect = toggle;
        });
    }

    fn pump_events(&mut self) -> Vec<SurfaceEvent> {
        let events: Vec<SurfaceEvent> = self
            .record
            .events
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default();
        for event in &events {
            if let SurfaceEvent::Resize { width, height } = event {
                self.size = (*width, *height);
            }
        }
        events
    }

    fn destroy(&mut self) {
        self.with_view(|v| v.alive = false);
    }
}

/// Concrete headless parts, kept typed so tests can inspect them.
#[derive(Clone)]
pub struct HeadlessPlatform {
    pub screen: Arc<HeadlessScreen>,
    pub input: Arc<RecordingInputSink>,
    pub surfaces: Arc<HeadlessSurfaceFactory>,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl HeadlessPlatform {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            screen: Arc::new(HeadlessScreen::new(size)),
            input: Arc::new(RecordingInputSink::default()),
            surfaces: Arc::new(HeadlessSurfaceFactory::default()),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            name: "headless",
            screen: self.screen.clone(),
            input: self.input.clone(),
            surfaces: self.surfaces.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_failures_are_counted_down() {
        let screen = HeadlessScreen::new(ScreenSize::new(8, 8));
        screen.fail_next(1);
        assert_eq!(screen.capture().unwrap_err().kind(), "CaptureFailure");
        assert!(screen.capture().unwrap().is_complete());
        assert_eq!(screen.capture_count(), 2);
    }

    #[test]
    fn recording_sink_can_short_deliver() {
        let sink = RecordingInputSink::default();
        let batch = [InputEvent::Wheel { delta: 120 }, InputEvent::Wheel { delta: 120 }];
        assert_eq!(sink.send(&batch), 2);
        sink.accept_at_most(Some(0));
        assert_eq!(sink.send(&batch), 0);
        assert_eq!(sink.events().len(), 4);
    }
}

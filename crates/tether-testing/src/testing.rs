use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use tether_core::{
    BoxError, Callback, Component, ConstructionError, Container, ContainerRef, EventMap,
    HandlerTable, LayerGroup, NodeIdentity, Peer, PeerHandle, Props, Runtime, RuntimeHandle,
    RuntimeScheduler,
};

/// Scheduler that only counts how often the runtime asked for a turn.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    requests: AtomicUsize,
}

impl ManualScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for ManualScheduler {
    fn schedule_frame(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless host for driving elements in tests.
///
/// Renders happen directly on elements; the host only owns the runtime and
/// decides when the "after commit" turn runs.
pub struct TestHost {
    scheduler: Arc<ManualScheduler>,
    runtime: Runtime,
}

impl TestHost {
    pub fn new() -> Self {
        let scheduler = Arc::new(ManualScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Run one scheduler turn.
    pub fn flush(&self) -> usize {
        self.runtime.flush()
    }

    /// Run turns until no task is pending.
    pub fn pump_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.runtime.has_pending_tasks() {
            ran += self.runtime.flush();
        }
        ran
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.runtime.has_pending_tasks()
    }

    pub fn frame_requests(&self) -> usize {
        self.scheduler.requests()
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, shared record of calls made against spies.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Entries recorded since the last call, clearing the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.borrow().iter().position(|e| e == entry)
    }
}

impl fmt::Debug for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

/// Container that records attach and detach calls.
#[derive(Debug)]
pub struct RecordingContainer {
    name: &'static str,
    log: CallLog,
    attached: RefCell<IndexSet<NodeIdentity>>,
}

impl RecordingContainer {
    pub fn new(name: &'static str, log: CallLog) -> Rc<Self> {
        Rc::new(Self {
            name,
            log,
            attached: RefCell::new(IndexSet::new()),
        })
    }

    pub fn container_ref<P: Peer>(self: &Rc<Self>) -> ContainerRef<P> {
        self.clone()
    }

    pub fn attached(&self) -> Vec<NodeIdentity> {
        self.attached.borrow().iter().copied().collect()
    }

    pub fn contains(&self, identity: NodeIdentity) -> bool {
        self.attached.borrow().contains(&identity)
    }
}

impl<P: Peer> Container<P> for RecordingContainer {
    fn attach(&self, peer: &PeerHandle<P>) {
        if self.attached.borrow_mut().insert(peer.identity()) {
            self.log.push(format!("{}.attach", self.name));
        }
    }

    fn detach(&self, peer: &PeerHandle<P>) {
        if self.attached.borrow_mut().shift_remove(&peer.identity()) {
            self.log.push(format!("{}.detach", self.name));
        }
    }
}

/// Peer that records every call into a [`CallLog`].
pub struct SpyPeer {
    log: CallLog,
    subscriptions: Vec<(&'static str, Callback<String>)>,
    layers: Vec<u32>,
}

impl SpyPeer {
    pub fn new(log: CallLog, layers: Vec<u32>) -> Self {
        Self {
            log,
            subscriptions: Vec::new(),
            layers,
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn subscription_count(&self, event: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|(name, _)| *name == event)
            .count()
    }

    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Invoke every callback subscribed to `event`.
    pub fn fire(&self, event: &str, payload: &str) -> usize {
        let payload = payload.to_string();
        let targets: Vec<Callback<String>> = self
            .subscriptions
            .iter()
            .filter(|(name, _)| *name == event)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in &targets {
            callback.call(&payload);
        }
        targets.len()
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.log.push("clear");
    }

    pub fn add_rows(&mut self, rows: &[u32]) {
        self.layers.extend_from_slice(rows);
        self.log.push(format!("add:{rows:?}"));
    }

    pub fn layers(&self) -> &[u32] {
        &self.layers
    }
}

impl Peer for SpyPeer {
    type Event = &'static str;
    type Payload = String;

    fn on(&mut self, event: &'static str, callback: &Callback<String>) {
        self.log.push(format!("on:{event}"));
        self.subscriptions.push((event, callback.clone()));
    }

    fn off(&mut self, event: &'static str, callback: &Callback<String>) {
        self.log.push(format!("off:{event}"));
        self.subscriptions
            .retain(|(name, existing)| !(*name == event && existing.ptr_eq(callback)));
    }
}

impl LayerGroup for SpyPeer {
    type Layer = u32;

    fn each_layer(&self, visitor: &mut dyn FnMut(&u32)) {
        for layer in &self.layers {
            visitor(layer);
        }
    }
}

impl fmt::Debug for SpyPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyPeer")
            .field("subscriptions", &self.subscriptions.len())
            .field("layers", &self.layers)
            .finish()
    }
}

/// Props driving a [`SpyComponent`].
#[derive(Clone, Debug, Props)]
pub struct SpyProps {
    #[props(skip)]
    pub log: CallLog,
    /// Construction fails when empty.
    pub label: String,
    pub color: String,
    /// Values above 100 make the handler fail.
    pub opacity: u32,
    #[props(ptr_eq)]
    pub rows: Rc<Vec<u32>>,
    /// Changing the tag requires a new peer.
    pub tag: String,
    pub zoom: u32,
}

impl SpyProps {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            label: "spy".into(),
            color: "red".into(),
            opacity: 50,
            rows: Rc::new(vec![1, 2]),
            tag: "a".into(),
            zoom: 1,
        }
    }

    pub fn color(mut self, color: &str) -> Self {
        self.color = color.into();
        self
    }

    pub fn rows(mut self, rows: Vec<u32>) -> Self {
        self.rows = Rc::new(rows);
        self
    }
}

/// Component over [`SpyPeer`] exercising every handler kind.
#[derive(Debug)]
pub struct SpyComponent;

impl Component for SpyComponent {
    type Peer = SpyPeer;
    type Props = SpyProps;

    fn construct(props: &SpyProps) -> Result<SpyPeer, ConstructionError> {
        if props.label.is_empty() {
            return Err(ConstructionError::invalid("label must not be empty"));
        }
        props.log.push(format!("construct:{}", props.label));
        Ok(SpyPeer::new(props.log.clone(), props.rows.as_ref().clone()))
    }

    fn handlers() -> HandlerTable<SpyPeer, SpyProps> {
        HandlerTable::new()
            .on_field(
                SpyPropsField::Color,
                |p: &SpyProps| &p.color,
                |_, next, peer: &mut SpyPeer| {
                    peer.log().push(format!("style:{next}"));
                    Ok(())
                },
            )
            .on_field(
                SpyPropsField::Opacity,
                |p: &SpyProps| &p.opacity,
                |_, next, peer: &mut SpyPeer| -> Result<(), BoxError> {
                    if *next > 100 {
                        return Err(format!("opacity {next} out of range").into());
                    }
                    peer.log().push(format!("opacity:{next}"));
                    Ok(())
                },
            )
            .on_structural(
                SpyPropsField::Rows,
                |p: &SpyProps| &p.rows,
                SpyPeer::clear_layers,
                |peer: &mut SpyPeer, rows: Rc<Vec<u32>>| peer.add_rows(&rows),
            )
            .catch_all(|changes, peer: &mut SpyPeer| {
                peer.log().push(format!("options:{}", changes.names().join(",")));
                Ok(())
            })
    }

    fn requires_rebuild(prev: &SpyProps, next: &SpyProps) -> bool {
        prev.tag != next.tag
    }
}

/// Build an event map from `(name, callback)` pairs.
pub fn events(entries: &[(&'static str, &Callback<String>)]) -> EventMap<&'static str, String> {
    entries
        .iter()
        .map(|(name, callback)| (*name, (*callback).clone()))
        .collect()
}

//! Field-level prop diffing and dispatch to per-field update handlers.
//!
//! A props type describes its fields as a closed enum (usually generated with
//! `#[derive(Props)]`). A [`HandlerTable`] maps some of those fields to typed
//! reconciliation functions. On every render the dispatcher diffs the previous
//! and next snapshot, runs the dedicated handler of each changed field, and
//! then runs the catch-all handler once with the remaining changes.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{BoxError, HandlerError};
use crate::peer::{PeerHandle, WeakPeer};
use crate::runtime::{RuntimeHandle, TaskId};

/// Tag naming one field of a props type.
pub trait Field: Copy + Eq + Hash + fmt::Debug + 'static {
    fn name(self) -> &'static str;
}

/// Immutable configuration snapshot with a closed, enumerable field set.
pub trait Props: Clone + 'static {
    type Field: Field;

    /// Every field, in declaration order.
    const FIELDS: &'static [Self::Field];

    /// Shallow inequality of one field between `self` and `next`.
    fn field_changed(&self, next: &Self, field: Self::Field) -> bool;
}

/// Changed fields between two snapshots, in declaration order.
pub fn diff_props<Pr: Props>(prev: &Pr, next: &Pr) -> Vec<Pr::Field> {
    Pr::FIELDS
        .iter()
        .copied()
        .filter(|field| prev.field_changed(next, *field))
        .collect()
}

/// The fields handed to a catch-all handler, with both snapshots.
pub struct ChangeSet<'a, Pr: Props> {
    fields: Vec<Pr::Field>,
    prev: &'a Pr,
    next: &'a Pr,
}

impl<'a, Pr: Props> ChangeSet<'a, Pr> {
    pub fn fields(&self) -> &[Pr::Field] {
        &self.fields
    }

    pub fn contains(&self, field: Pr::Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn prev(&self) -> &'a Pr {
        self.prev
    }

    pub fn next(&self) -> &'a Pr {
        self.next
    }
}

impl<Pr: Props> fmt::Debug for ChangeSet<'_, Pr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("fields", &self.fields)
            .finish()
    }
}

/// Which changed fields reach the catch-all handler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CatchAllGranularity {
    /// Only changed fields without a dedicated handler.
    #[default]
    UnhandledOnly,
    /// Every changed field, handled or not.
    EveryChange,
}

/// What a failing handler does to the rest of the commit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and keep reconciling other fields.
    #[default]
    Isolate,
    /// Stop dispatching at the first failure.
    Abort,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub catch_all: CatchAllGranularity,
    pub handler_failures: FailurePolicy,
}

/// What a handler gets to work with besides the field values.
pub struct UpdateContext<'a, P> {
    peer: &'a PeerHandle<P>,
    runtime: &'a RuntimeHandle,
}

impl<'a, P> UpdateContext<'a, P> {
    pub fn new(peer: &'a PeerHandle<P>, runtime: &'a RuntimeHandle) -> Self {
        Self { peer, runtime }
    }

    pub fn peer(&self) -> &'a PeerHandle<P> {
        self.peer
    }

    pub fn runtime(&self) -> &'a RuntimeHandle {
        self.runtime
    }
}

type FieldHandler<P, Pr> =
    Box<dyn Fn(&Pr, &Pr, &UpdateContext<'_, P>) -> Result<(), HandlerError> + 'static>;
type CatchAllHandler<P, Pr> =
    Box<dyn Fn(&ChangeSet<'_, Pr>, &mut P) -> Result<(), BoxError> + 'static>;

/// Outcome of one dispatch pass.
#[derive(Debug)]
pub struct DispatchReport<F> {
    pub changed: Vec<F>,
    pub handled: Vec<F>,
    pub catch_all: Vec<F>,
    pub failures: Vec<HandlerError>,
}

impl<F> DispatchReport<F> {
    fn empty() -> Self {
        Self {
            changed: Vec::new(),
            handled: Vec::new(),
            catch_all: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Field name to reconciliation function, plus an optional catch-all.
pub struct HandlerTable<P, Pr: Props> {
    handlers: IndexMap<Pr::Field, FieldHandler<P, Pr>>,
    catch_all: Option<CatchAllHandler<P, Pr>>,
}

impl<P: 'static, Pr: Props> HandlerTable<P, Pr> {
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
            catch_all: None,
        }
    }

    pub fn has_handler(&self, field: Pr::Field) -> bool {
        self.handlers.contains_key(&field)
    }

    fn insert(&mut self, field: Pr::Field, handler: FieldHandler<P, Pr>) {
        if self.handlers.insert(field, handler).is_some() {
            log::debug!("replaced handler for `{}`", field.name());
        }
    }

    /// Register a synchronous setter for `field`.
    pub fn on_field<V, G, H>(mut self, field: Pr::Field, get: G, handler: H) -> Self
    where
        V: ?Sized + 'static,
        G: Fn(&Pr) -> &V + 'static,
        H: Fn(&V, &V, &mut P) -> Result<(), BoxError> + 'static,
    {
        let name = field.name();
        self.insert(
            field,
            Box::new(move |prev: &Pr, next: &Pr, ctx: &UpdateContext<'_, P>| {
                log::trace!("updating `{name}` on node {}", ctx.peer().identity());
                ctx.peer()
                    .try_update(|peer| handler(get(prev), get(next), peer))
                    .map_err(|source| HandlerError::PeerUnavailable { field: name, source })?
                    .map_err(|source| HandlerError::Failed { field: name, source })
            }),
        );
        self
    }

    /// Register a structural field whose replacement is split in two.
    ///
    /// `clear` runs synchronously in the triggering commit. `apply` runs on
    /// the next scheduler turn against the most recent value, and only if the
    /// peer is still live by then.
    pub fn on_structural<V, G, C, A>(mut self, field: Pr::Field, get: G, clear: C, apply: A) -> Self
    where
        V: Clone + 'static,
        G: Fn(&Pr) -> &V + 'static,
        C: Fn(&mut P) + 'static,
        A: Fn(&mut P, V) + 'static,
    {
        let name = field.name();
        let slot = DeferredSlot::new(name);
        let apply: Rc<dyn Fn(&mut P, V)> = Rc::new(apply);
        self.insert(
            field,
            Box::new(move |_prev: &Pr, next: &Pr, ctx: &UpdateContext<'_, P>| {
                ctx.peer()
                    .try_update(|peer| clear(peer))
                    .map_err(|source| HandlerError::PeerUnavailable { field: name, source })?;
                slot.schedule(
                    ctx.runtime(),
                    ctx.peer().downgrade(),
                    get(next).clone(),
                    Rc::clone(&apply),
                );
                Ok(())
            }),
        );
        self
    }

    /// Register the fallback for fields without a dedicated handler.
    pub fn catch_all<H>(mut self, handler: H) -> Self
    where
        H: Fn(&ChangeSet<'_, Pr>, &mut P) -> Result<(), BoxError> + 'static,
    {
        self.catch_all = Some(Box::new(handler));
        self
    }

    /// Diff `prev` against `next` and run the matching handlers.
    pub fn dispatch(
        &self,
        prev: &Pr,
        next: &Pr,
        ctx: &UpdateContext<'_, P>,
        options: ReconcileOptions,
    ) -> DispatchReport<Pr::Field> {
        let mut report = DispatchReport::empty();
        report.changed = diff_props(prev, next);
        if report.changed.is_empty() {
            return report;
        }

        for field in &report.changed {
            let Some(handler) = self.handlers.get(field) else {
                continue;
            };
            match handler(prev, next, ctx) {
                Ok(()) => report.handled.push(*field),
                Err(err) => {
                    log::warn!("node {}: {err}", ctx.peer().identity());
                    report.failures.push(err);
                    if options.handler_failures == FailurePolicy::Abort {
                        return report;
                    }
                }
            }
        }

        let Some(catch_all) = &self.catch_all else {
            return report;
        };
        let fields: Vec<Pr::Field> = match options.catch_all {
            CatchAllGranularity::UnhandledOnly => report
                .changed
                .iter()
                .copied()
                .filter(|field| !self.handlers.contains_key(field))
                .collect(),
            CatchAllGranularity::EveryChange => report.changed.clone(),
        };
        if fields.is_empty() {
            return report;
        }
        let changes = ChangeSet { fields, prev, next };
        log::trace!(
            "catch-all for {:?} on node {}",
            changes.names(),
            ctx.peer().identity()
        );
        let outcome = ctx
            .peer()
            .try_update(|peer| catch_all(&changes, peer))
            .map_err(|source| HandlerError::PeerUnavailable {
                field: "*",
                source,
            })
            .and_then(|result| {
                result.map_err(|source| HandlerError::Failed { field: "*", source })
            });
        match outcome {
            Ok(()) => report.catch_all = changes.fields,
            Err(err) => {
                log::warn!("node {}: {err}", ctx.peer().identity());
                report.failures.push(err);
            }
        }
        report
    }
}

impl<P: 'static, Pr: Props> Default for HandlerTable<P, Pr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, Pr: Props> fmt::Debug for HandlerTable<P, Pr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("fields", &self.handlers.keys().collect::<Vec<_>>())
            .field("catch_all", &self.catch_all.is_some())
            .finish()
    }
}

struct DeferredState<V> {
    latest: Option<V>,
    pending: Option<TaskId>,
}

/// Single-shot, apply-latest task slot for one structural field of one node.
///
/// At most one task is pending per slot. Scheduling again before it fires only
/// replaces the value it will apply.
pub struct DeferredSlot<V> {
    field: &'static str,
    state: Rc<RefCell<DeferredState<V>>>,
}

impl<V: 'static> DeferredSlot<V> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            state: Rc::new(RefCell::new(DeferredState {
                latest: None,
                pending: None,
            })),
        }
    }

    pub fn pending_task(&self) -> Option<TaskId> {
        self.state.borrow().pending
    }

    pub fn schedule<P: 'static>(
        &self,
        runtime: &RuntimeHandle,
        peer: WeakPeer<P>,
        value: V,
        apply: Rc<dyn Fn(&mut P, V)>,
    ) -> Option<TaskId> {
        let mut state = self.state.borrow_mut();
        state.latest = Some(value);
        if let Some(id) = state.pending {
            if runtime.is_pending(id) {
                log::trace!("superseding pending `{}` task {id}", self.field);
                return Some(id);
            }
        }

        let field = self.field;
        let shared = Rc::clone(&self.state);
        let id = runtime.spawn_task(Box::new(move || {
            let value = {
                let mut state = shared.borrow_mut();
                state.pending = None;
                state.latest.take()
            };
            let Some(value) = value else {
                return;
            };
            let Some(peer) = peer.upgrade() else {
                log::trace!("skipping deferred `{field}`: peer released");
                return;
            };
            if let Err(err) = peer.try_update(|target| apply(target, value)) {
                log::trace!("skipping deferred `{field}`: {err}");
            }
        }));
        if id.is_none() {
            state.latest = None;
        }
        state.pending = id;
        id
    }
}

impl<V> fmt::Debug for DeferredSlot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("DeferredSlot")
            .field("field", &self.field)
            .field("pending", &state.pending)
            .field("has_value", &state.latest.is_some())
            .finish()
    }
}

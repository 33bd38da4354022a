//! One rendered occurrence of a component, bound to one peer object.
//!
//! Per render an [`Element`] runs, in order: factory, lifecycle, event binder,
//! update dispatcher, handle exposer. Teardown runs the reverse: detach from
//! the container, unsubscribe every callback, release the peer.

use std::fmt;

use crate::error::{ConstructionError, RenderError};
use crate::events::{EventBinder, EventDiff, PeerEvents};
use crate::factory::ElementFactory;
use crate::handle::HandleSlot;
use crate::layers::{LayerGroup, VisitMemo};
use crate::lifecycle::{ContainerRef, LifeCycle, LifeCycleState, MountStatus};
use crate::peer::{Callback, Peer, PeerHandle};
use crate::runtime::RuntimeHandle;
use crate::update::{DispatchReport, HandlerTable, Props, ReconcileOptions, UpdateContext};
use crate::NodeIdentity;

/// Binds a props type to the peer it drives.
pub trait Component: 'static {
    type Peer: Peer;
    type Props: Props;

    /// Build the peer from the first snapshot of a node identity.
    fn construct(props: &Self::Props) -> Result<Self::Peer, ConstructionError>;

    /// Handler table for one node. Called once per node identity.
    fn handlers() -> HandlerTable<Self::Peer, Self::Props>;

    /// Whether `next` changes a construction-only option.
    fn requires_rebuild(_prev: &Self::Props, _next: &Self::Props) -> bool {
        false
    }
}

/// Inputs of one render.
pub struct RenderInput<'a, C: Component> {
    pub container: &'a ContainerRef<C::Peer>,
    pub props: &'a C::Props,
    pub events: &'a PeerEvents<C::Peer>,
}

impl<C: Component> Clone for RenderInput<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Component> Copy for RenderInput<'_, C> {}

/// What one render did.
pub struct RenderReport<C: Component> {
    pub identity: NodeIdentity,
    pub constructed: bool,
    pub rebuilt: bool,
    pub mount: MountStatus,
    pub events: EventDiff<<C::Peer as Peer>::Event>,
    pub dispatch: Option<DispatchReport<<C::Props as Props>::Field>>,
}

impl<C: Component> fmt::Debug for RenderReport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderReport")
            .field("identity", &self.identity)
            .field("constructed", &self.constructed)
            .field("rebuilt", &self.rebuilt)
            .field("mount", &self.mount)
            .field("events", &self.events)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

struct Occurrence<C: Component> {
    identity: NodeIdentity,
    factory: ElementFactory<C::Peer>,
    lifecycle: LifeCycle<C::Peer>,
    events: EventBinder<C::Peer>,
    handlers: HandlerTable<C::Peer, C::Props>,
    snapshot: Option<C::Props>,
    visits: VisitMemo,
}

impl<C: Component> Occurrence<C> {
    fn new() -> Self {
        let identity = NodeIdentity::next();
        Self {
            identity,
            factory: ElementFactory::new(identity),
            lifecycle: LifeCycle::new(),
            events: EventBinder::new(),
            handlers: C::handlers(),
            snapshot: None,
            visits: VisitMemo::new(),
        }
    }

    fn teardown(&mut self) {
        if self.lifecycle.state() == LifeCycleState::Unmounted && self.factory.get().is_none() {
            return;
        }
        self.lifecycle.unmount();
        if let Some(peer) = self.factory.get() {
            let detached = self.events.detach_all(peer);
            log::trace!("node {}: detached {detached} subscriptions", self.identity);
        }
        self.factory.release();
        self.snapshot = None;
        self.visits.reset();
    }
}

/// Reconciles a component's declared state against its peer object.
pub struct Element<C: Component> {
    runtime: RuntimeHandle,
    options: ReconcileOptions,
    handle: Option<HandleSlot<C::Peer>>,
    current: Occurrence<C>,
}

impl<C: Component> Element<C> {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self {
            runtime,
            options: ReconcileOptions::default(),
            handle: None,
            current: Occurrence::new(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Publish the live peer into `slot` on every render.
    pub fn with_handle(mut self, slot: HandleSlot<C::Peer>) -> Self {
        self.handle = Some(slot);
        self
    }

    /// Point the element at another slot, or none. The old slot is emptied and
    /// the new one is filled by the next render.
    pub fn set_handle(&mut self, slot: Option<HandleSlot<C::Peer>>) {
        let unchanged = match (&self.handle, &slot) {
            (Some(current), Some(next)) => current.ptr_eq(next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        if let Some(previous) = self.handle.take() {
            previous.clear();
        }
        self.handle = slot;
    }

    pub fn identity(&self) -> NodeIdentity {
        self.current.identity
    }

    pub fn state(&self) -> LifeCycleState {
        self.current.lifecycle.state()
    }

    pub fn peer(&self) -> Option<&PeerHandle<C::Peer>> {
        self.current.factory.get()
    }

    pub fn subscriptions(&self) -> &PeerEvents<C::Peer> {
        self.current.events.subscriptions()
    }

    pub fn snapshot(&self) -> Option<&C::Props> {
        self.current.snapshot.as_ref()
    }

    pub fn render(&mut self, input: RenderInput<'_, C>) -> Result<RenderReport<C>, RenderError> {
        let mut rebuilt = false;
        if let Some(prev) = &self.current.snapshot {
            if C::requires_rebuild(prev, input.props) {
                log::debug!(
                    "node {}: construction option changed, rebuilding",
                    self.current.identity
                );
                self.rebuild();
                rebuilt = true;
            }
        }
        let container_changed = self.current.factory.get().is_some_and(|peer| {
            self.current.lifecycle.status(input.container, peer) == MountStatus::ContainerChanged
        });
        if container_changed {
            log::debug!("node {}: container changed, rebuilding", self.current.identity);
            self.rebuild();
            rebuilt = true;
        }
        if self.current.lifecycle.state() == LifeCycleState::Unmounted {
            return Err(RenderError::Unmounted {
                identity: self.current.identity,
            });
        }

        let identity = self.current.identity;
        let before = self.current.factory.constructions();
        let peer = match self.current.factory.ensure(|| C::construct(input.props)) {
            Ok(peer) => peer.clone(),
            Err(source) => {
                log::debug!("node {identity}: construction failed: {source}");
                return Err(RenderError::Construction { identity, source });
            }
        };
        let constructed = self.current.factory.constructions() > before;

        let mount = self.current.lifecycle.ensure_mounted(input.container, &peer);
        let events = self.current.events.reconcile(&peer, input.events);

        let dispatch = match self.current.snapshot.replace(input.props.clone()) {
            Some(prev) => {
                let ctx = UpdateContext::new(&peer, &self.runtime);
                Some(
                    self.current
                        .handlers
                        .dispatch(&prev, input.props, &ctx, self.options),
                )
            }
            None => None,
        };

        if let Some(slot) = &self.handle {
            slot.publish(&peer);
        }

        Ok(RenderReport {
            identity,
            constructed,
            rebuilt,
            mount,
            events,
            dispatch,
        })
    }

    /// End this occurrence. Further renders fail with [`RenderError::Unmounted`].
    pub fn teardown(&mut self) {
        self.current.teardown();
        if let Some(slot) = &self.handle {
            slot.clear();
        }
    }

    fn rebuild(&mut self) {
        self.teardown();
        self.current = Occurrence::new();
    }
}

impl<C: Component> Element<C>
where
    C::Peer: LayerGroup,
{
    /// Run `visitor` over every child layer when the peer or visitor changed.
    pub fn visit_layers(
        &mut self,
        visitor: Option<&Callback<<C::Peer as LayerGroup>::Layer>>,
    ) -> usize {
        let peer = self.current.factory.get();
        self.current.visits.visit(peer, visitor)
    }
}

impl<C: Component> Drop for Element<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<C: Component> fmt::Debug for Element<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("identity", &self.current.identity)
            .field("state", &self.current.lifecycle.state())
            .field("peer", &self.current.factory.get())
            .field("options", &self.options)
            .finish()
    }
}

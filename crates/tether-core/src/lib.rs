#![doc = r"Core runtime for Tether: keeps imperative peer objects in sync with declared props."]

extern crate self as tether_core;

pub mod collections;
pub mod element;
pub mod element_list;
pub mod error;
pub mod events;
pub mod factory;
pub mod handle;
pub mod layers;
pub mod lifecycle;
pub mod peer;
pub mod platform;
pub mod runtime;
pub mod update;

pub use element::{Component, Element, RenderInput, RenderReport};
pub use element_list::{ElementList, ListCommit};
pub use error::{
    BoxError, ConstructionError, HandlerError, RenderError, StaleMutationError, SubscriptionError,
};
pub use events::{diff_events, EventBinder, EventDiff, EventMap, PeerEvents};
pub use factory::ElementFactory;
pub use handle::HandleSlot;
pub use layers::{LayerGroup, VisitMemo};
pub use lifecycle::{Container, ContainerRef, LifeCycle, LifeCycleState, MountStatus};
pub use peer::{Callback, Peer, PeerHandle, WeakPeer};
pub use platform::RuntimeScheduler;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle, TaskId};
pub use update::{
    diff_props, CatchAllGranularity, ChangeSet, DeferredSlot, DispatchReport, FailurePolicy, Field,
    HandlerTable, Props, ReconcileOptions, UpdateContext,
};

pub use tether_macros::Props;

#[cfg(test)]
pub use runtime::{TestRuntime, TestScheduler};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Stable token for one rendered occurrence of a component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdentity(u64);

impl NodeIdentity {
    pub fn next() -> Self {
        Self(NEXT_NODE_IDENTITY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

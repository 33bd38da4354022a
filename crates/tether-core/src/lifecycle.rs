use std::fmt;
use std::rc::Rc;

use crate::peer::{Peer, PeerHandle};

/// Parent that peers are attached to. Both operations must be idempotent.
pub trait Container<P: Peer> {
    fn attach(&self, peer: &PeerHandle<P>);
    fn detach(&self, peer: &PeerHandle<P>);
}

pub type ContainerRef<P> = Rc<dyn Container<P>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifeCycleState {
    Uninitialized,
    Mounted,
    /// Terminal. A new node identity is needed to mount again.
    Unmounted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MountStatus {
    /// The peer was attached during this call.
    Attached,
    /// Already attached to the same container.
    Unchanged,
    /// Mounted under a different container; the occurrence must be rebuilt.
    ContainerChanged,
    /// The lifecycle already ended.
    Terminated,
}

/// Attach/detach state machine for one node identity.
pub struct LifeCycle<P: Peer> {
    state: LifeCycleState,
    container: Option<ContainerRef<P>>,
    attached: Option<PeerHandle<P>>,
}

impl<P: Peer> LifeCycle<P> {
    pub fn new() -> Self {
        Self {
            state: LifeCycleState::Uninitialized,
            container: None,
            attached: None,
        }
    }

    pub fn state(&self) -> LifeCycleState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.state == LifeCycleState::Mounted
    }

    /// What [`ensure_mounted`](Self::ensure_mounted) would do, without doing it.
    pub fn status(&self, container: &ContainerRef<P>, peer: &PeerHandle<P>) -> MountStatus {
        match self.state {
            LifeCycleState::Unmounted => MountStatus::Terminated,
            LifeCycleState::Uninitialized => MountStatus::Attached,
            LifeCycleState::Mounted => {
                let same_container = self
                    .container
                    .as_ref()
                    .is_some_and(|current| Rc::ptr_eq(current, container));
                let same_peer = self
                    .attached
                    .as_ref()
                    .is_some_and(|current| current.ptr_eq(peer));
                if same_container && same_peer {
                    MountStatus::Unchanged
                } else {
                    MountStatus::ContainerChanged
                }
            }
        }
    }

    pub fn ensure_mounted(&mut self, container: &ContainerRef<P>, peer: &PeerHandle<P>) -> MountStatus {
        let status = self.status(container, peer);
        if status == MountStatus::Attached {
            container.attach(peer);
            log::debug!("mounted node {}", peer.identity());
            self.container = Some(Rc::clone(container));
            self.attached = Some(peer.clone());
            self.state = LifeCycleState::Mounted;
        }
        status
    }

    /// Leave the lifecycle, detaching whatever was actually attached.
    ///
    /// Returns whether a detach happened. Safe to call on any state.
    pub fn unmount(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.state, LifeCycleState::Unmounted);
        let container = self.container.take();
        let attached = self.attached.take();
        match (previous, container, attached) {
            (LifeCycleState::Mounted, Some(container), Some(peer)) => {
                container.detach(&peer);
                log::debug!("unmounted node {}", peer.identity());
                true
            }
            _ => false,
        }
    }
}

impl<P: Peer> Default for LifeCycle<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Peer> Drop for LifeCycle<P> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<P: Peer> fmt::Debug for LifeCycle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeCycle")
            .field("state", &self.state)
            .field("attached", &self.attached)
            .finish()
    }
}

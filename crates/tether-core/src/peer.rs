//! Peer objects and the shared handles the engine hands out for them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::error::StaleMutationError;
use crate::NodeIdentity;

/// Surface every peer object exposes to the engine.
///
/// Domain setters (style, data, options) are reached through handler tables;
/// the engine itself only needs named event subscriptions.
pub trait Peer: 'static {
    /// Closed set of event names the peer understands.
    type Event: Copy + Eq + Hash + fmt::Debug + 'static;
    /// Argument passed to subscribed callbacks.
    type Payload: 'static;

    fn on(&mut self, event: Self::Event, callback: &Callback<Self::Payload>);
    fn off(&mut self, event: Self::Event, callback: &Callback<Self::Payload>);
}

/// Reference-counted callback compared by identity, not by behavior.
pub struct Callback<A: ?Sized> {
    inner: Rc<dyn Fn(&A)>,
}

impl<A: ?Sized> Callback<A> {
    pub fn new(f: impl Fn(&A) + 'static) -> Self {
        Self { inner: Rc::new(f) }
    }

    pub fn call(&self, arg: &A) {
        (self.inner)(arg);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.token() == other.token()
    }

    /// Stable identity token, valid for as long as any clone is alive.
    pub fn token(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<A: ?Sized> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: ?Sized> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<A: ?Sized> Eq for Callback<A> {}

impl<A: ?Sized> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:#x})", self.token())
    }
}

struct PeerCell<P> {
    identity: NodeIdentity,
    live: Cell<bool>,
    value: RefCell<P>,
}

/// Shared, single-threaded handle to a live peer object.
///
/// The factory holds the owning handle; clones are published to consumers.
/// Once the owning element releases the peer every handle reports
/// [`is_live`](Self::is_live) as `false` and refuses fallible mutation.
pub struct PeerHandle<P> {
    inner: Rc<PeerCell<P>>, // FUTURE(no_std): replace Rc with arena-managed peer slots.
}

impl<P> Clone for PeerHandle<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> PeerHandle<P> {
    pub(crate) fn new(identity: NodeIdentity, peer: P) -> Self {
        Self {
            inner: Rc::new(PeerCell {
                identity,
                live: Cell::new(true),
                value: RefCell::new(peer),
            }),
        }
    }

    pub fn identity(&self) -> NodeIdentity {
        self.inner.identity
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.get()
    }

    /// Run `f` with an immutable reference to the peer.
    pub fn with<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        let borrow = self.inner.value.borrow();
        f(&*borrow)
    }

    /// Run `f` with a mutable reference to the peer.
    pub fn update<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut borrow = self.inner.value.borrow_mut();
        f(&mut *borrow)
    }

    /// Mutate the peer only if it is still live and not already borrowed.
    pub fn try_update<R>(&self, f: impl FnOnce(&mut P) -> R) -> Result<R, StaleMutationError> {
        let identity = self.inner.identity;
        if !self.inner.live.get() {
            return Err(StaleMutationError::Released { identity });
        }
        let mut borrow = self
            .inner
            .value
            .try_borrow_mut()
            .map_err(|_| StaleMutationError::Busy { identity })?;
        Ok(f(&mut *borrow))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakPeer<P> {
        WeakPeer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn release(&self) {
        self.inner.live.set(false);
    }
}

impl<P> PartialEq for PeerHandle<P> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<P> fmt::Debug for PeerHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("identity", &self.inner.identity)
            .field("live", &self.inner.live.get())
            .finish()
    }
}

/// Non-owning reference captured by deferred tasks.
pub struct WeakPeer<P> {
    inner: Weak<PeerCell<P>>,
}

impl<P> Clone for WeakPeer<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<P> WeakPeer<P> {
    /// Whether this reference was downgraded from `handle` or one of its clones.
    pub fn points_to(&self, handle: &PeerHandle<P>) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&handle.inner))
    }

    /// Upgrade only while the peer is still live.
    pub fn upgrade(&self) -> Option<PeerHandle<P>> {
        let inner = self.inner.upgrade()?;
        inner.live.get().then(|| PeerHandle { inner })
    }
}

impl<P> fmt::Debug for WeakPeer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPeer")
            .field("live", &self.upgrade().is_some())
            .finish()
    }
}

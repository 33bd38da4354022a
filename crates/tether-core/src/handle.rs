use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::peer::PeerHandle;

/// Output cell through which an element exposes its live peer.
///
/// The consumer keeps a clone and reads it; the element only ever writes. The
/// slot holds either the live peer or nothing, never a released one.
pub struct HandleSlot<P> {
    cell: Rc<RefCell<Option<PeerHandle<P>>>>,
    publishes: Rc<Cell<usize>>,
}

impl<P> Clone for HandleSlot<P> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            publishes: Rc::clone(&self.publishes),
        }
    }
}

impl<P> HandleSlot<P> {
    pub fn new() -> Self {
        Self {
            cell: Rc::new(RefCell::new(None)),
            publishes: Rc::new(Cell::new(0)),
        }
    }

    pub fn get(&self) -> Option<PeerHandle<P>> {
        self.cell.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.cell.borrow().is_none()
    }

    /// How many times a new reference was written, for change detection.
    pub fn publishes(&self) -> usize {
        self.publishes.get()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn publish(&self, peer: &PeerHandle<P>) {
        let mut cell = self.cell.borrow_mut();
        if cell.as_ref().is_some_and(|current| current.ptr_eq(peer)) {
            return;
        }
        *cell = Some(peer.clone());
        self.publishes.set(self.publishes.get() + 1);
    }

    pub(crate) fn clear(&self) {
        if self.cell.borrow_mut().take().is_some() {
            self.publishes.set(self.publishes.get() + 1);
        }
    }
}

impl<P> Default for HandleSlot<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for HandleSlot<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("peer", &*self.cell.borrow())
            .field("publishes", &self.publishes.get())
            .finish()
    }
}

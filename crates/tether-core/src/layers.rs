//! Memoized "visit every child layer" dispatch.

use std::any::Any;

use crate::peer::{Callback, Peer, PeerHandle, WeakPeer};

/// Peers that own an enumerable set of child layers.
pub trait LayerGroup: Peer {
    type Layer: 'static;

    /// Visit every registered child layer in the peer's own order.
    fn each_layer(&self, visitor: &mut dyn FnMut(&Self::Layer));

    fn layer_count(&self) -> usize {
        let mut count = 0;
        self.each_layer(&mut |_| count += 1);
        count
    }
}

/// The pair a visit last ran for. Holding clones keeps both allocations alive,
/// so a later peer or callback can never reuse their addresses.
struct Visited<P: LayerGroup> {
    peer: Option<WeakPeer<P>>,
    visitor: Option<Callback<P::Layer>>,
}

impl<P: LayerGroup> Visited<P> {
    fn matches(&self, peer: Option<&PeerHandle<P>>, visitor: Option<&Callback<P::Layer>>) -> bool {
        let same_peer = match (&self.peer, peer) {
            (None, None) => true,
            (Some(last), Some(peer)) => last.points_to(peer),
            _ => false,
        };
        let same_visitor = match (&self.visitor, visitor) {
            (None, None) => true,
            (Some(last), Some(visitor)) => last.ptr_eq(visitor),
            _ => false,
        };
        same_peer && same_visitor
    }
}

/// Re-runs a layer visitor only when the peer or the visitor changes identity.
#[derive(Default)]
pub struct VisitMemo {
    last: Option<Box<dyn Any>>,
}

impl VisitMemo {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Visit layers if the `(peer, visitor)` identity pair changed.
    ///
    /// Returns the number of layers visited, zero when skipped.
    pub fn visit<P: LayerGroup>(
        &mut self,
        peer: Option<&PeerHandle<P>>,
        visitor: Option<&Callback<P::Layer>>,
    ) -> usize {
        let unchanged = self
            .last
            .as_ref()
            .and_then(|last| last.downcast_ref::<Visited<P>>())
            .is_some_and(|last| last.matches(peer, visitor));
        if unchanged {
            return 0;
        }
        self.last = Some(Box::new(Visited {
            peer: peer.map(PeerHandle::downgrade),
            visitor: visitor.cloned(),
        }));
        let (Some(peer), Some(visitor)) = (peer, visitor) else {
            return 0;
        };
        let mut visited = 0;
        peer.with(|group| {
            group.each_layer(&mut |layer| {
                visitor.call(layer);
                visited += 1;
            });
        });
        log::trace!("visited {visited} layers on node {}", peer.identity());
        visited
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl std::fmt::Debug for VisitMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitMemo")
            .field("armed", &self.last.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeIdentity;

    struct Rows(Vec<u32>);

    impl Peer for Rows {
        type Event = ();
        type Payload = ();

        fn on(&mut self, _: (), _: &Callback<()>) {}
        fn off(&mut self, _: (), _: &Callback<()>) {}
    }

    impl LayerGroup for Rows {
        type Layer = u32;

        fn each_layer(&self, visitor: &mut dyn FnMut(&u32)) {
            self.0.iter().for_each(visitor);
        }
    }

    #[test]
    fn same_peer_and_visitor_visit_once() {
        let peer = PeerHandle::new(NodeIdentity::next(), Rows(vec![1, 2]));
        let visitor = Callback::new(|_: &u32| {});
        let mut memo = VisitMemo::new();

        assert_eq!(memo.visit(Some(&peer), Some(&visitor)), 2);
        assert_eq!(memo.visit(Some(&peer), Some(&visitor.clone())), 0);
        memo.reset();
        assert_eq!(memo.visit(Some(&peer), Some(&visitor)), 2);
    }

    #[test]
    fn a_fresh_callback_each_time_always_visits() {
        let peer = PeerHandle::new(NodeIdentity::next(), Rows(vec![1, 2]));
        let mut memo = VisitMemo::new();

        let visited: Vec<usize> = (0..3)
            .map(|_| memo.visit(Some(&peer), Some(&Callback::new(|_: &u32| {}))))
            .collect();

        assert_eq!(visited, vec![2, 2, 2]);
    }

    #[test]
    fn removing_and_restoring_the_visitor_visits_again() {
        let peer = PeerHandle::new(NodeIdentity::next(), Rows(vec![7]));
        let visitor = Callback::new(|_: &u32| {});
        let mut memo = VisitMemo::new();

        assert_eq!(memo.visit(Some(&peer), Some(&visitor)), 1);
        assert_eq!(memo.visit(Some(&peer), None), 0);
        assert_eq!(memo.visit(Some(&peer), Some(&visitor)), 1);
    }
}

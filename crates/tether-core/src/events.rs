//! Keeps a peer's live event subscriptions equal to the declared ones.

use std::fmt;

use indexmap::IndexMap;

use crate::error::SubscriptionError;
use crate::peer::{Callback, Peer, PeerHandle};

/// Declared event callbacks for one render, keyed by event name.
pub type EventMap<K, A> = IndexMap<K, Callback<A>>;

/// Event map for a given peer type.
pub type PeerEvents<P> = EventMap<<P as Peer>::Event, <P as Peer>::Payload>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDiff<K> {
    pub attach: Vec<K>,
    pub detach: Vec<K>,
    pub unchanged: Vec<K>,
}

impl<K> EventDiff<K> {
    pub fn is_noop(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }
}

/// Split `current` and `next` into detach, attach and unchanged names.
///
/// A name whose callback changed identity appears in both `detach` and
/// `attach`.
pub fn diff_events<K, A>(current: &EventMap<K, A>, next: &EventMap<K, A>) -> EventDiff<K>
where
    K: Copy + Eq + std::hash::Hash,
    A: ?Sized,
{
    let mut diff = EventDiff {
        attach: Vec::new(),
        detach: Vec::new(),
        unchanged: Vec::new(),
    };
    for (name, callback) in current {
        match next.get(name) {
            Some(next_callback) if next_callback.ptr_eq(callback) => diff.unchanged.push(*name),
            _ => diff.detach.push(*name),
        }
    }
    for (name, callback) in next {
        match current.get(name) {
            Some(current_callback) if current_callback.ptr_eq(callback) => {}
            _ => diff.attach.push(*name),
        }
    }
    diff
}

/// Owner of the subscription set for one peer.
pub struct EventBinder<P: Peer> {
    subscriptions: PeerEvents<P>,
}

impl<P: Peer> EventBinder<P> {
    pub fn new() -> Self {
        Self {
            subscriptions: IndexMap::new(),
        }
    }

    pub fn subscriptions(&self) -> &PeerEvents<P> {
        &self.subscriptions
    }

    /// Detach stale callbacks, then attach new ones.
    ///
    /// The recorded set only changes for calls the peer accepted. A released or
    /// busy peer leaves it as it was, so the next reconcile retries.
    pub fn reconcile(&mut self, peer: &PeerHandle<P>, next: &PeerEvents<P>) -> EventDiff<P::Event> {
        let diff = diff_events(&self.subscriptions, next);
        for name in &diff.detach {
            let Some(callback) = self.subscriptions.get(name) else {
                continue;
            };
            match unsubscribe(peer, *name, callback) {
                Ok(()) => {
                    self.subscriptions.shift_remove(name);
                }
                Err(err) => log::trace!("ignoring detach: {err}"),
            }
        }
        for name in &diff.attach {
            let Some(callback) = next.get(name) else {
                continue;
            };
            // Still bound to the old callback.
            if self.subscriptions.contains_key(name) {
                continue;
            }
            match subscribe(peer, *name, callback) {
                Ok(()) => {
                    self.subscriptions.insert(*name, callback.clone());
                }
                Err(err) => log::trace!("ignoring attach: {err}"),
            }
        }
        diff
    }

    /// Detach every subscription; used on teardown.
    ///
    /// The set is emptied even when the peer refuses, since the node is gone.
    pub fn detach_all(&mut self, peer: &PeerHandle<P>) -> usize {
        let drained: Vec<_> = self.subscriptions.drain(..).collect();
        let count = drained.len();
        for (name, callback) in drained {
            if let Err(err) = unsubscribe(peer, name, &callback) {
                log::trace!("ignoring detach during teardown: {err}");
            }
        }
        count
    }
}

impl<P: Peer> Default for EventBinder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Peer> fmt::Debug for EventBinder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinder")
            .field("subscriptions", &self.subscriptions.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn subscribe<P: Peer>(
    peer: &PeerHandle<P>,
    event: P::Event,
    callback: &Callback<P::Payload>,
) -> Result<(), SubscriptionError> {
    log::trace!("on {event:?} for node {}", peer.identity());
    peer.try_update(|target| target.on(event, callback))
        .map_err(|cause| SubscriptionError {
            action: "attach",
            event: format!("{event:?}"),
            identity: peer.identity(),
            cause,
        })
}

fn unsubscribe<P: Peer>(
    peer: &PeerHandle<P>,
    event: P::Event,
    callback: &Callback<P::Payload>,
) -> Result<(), SubscriptionError> {
    log::trace!("off {event:?} for node {}", peer.identity());
    peer.try_update(|target| target.off(event, callback))
        .map_err(|cause| SubscriptionError {
            action: "detach",
            event: format!("{event:?}"),
            identity: peer.identity(),
            cause,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&'static str, &Callback<u8>)]) -> EventMap<&'static str, u8> {
        entries
            .iter()
            .map(|(name, callback)| (*name, (*callback).clone()))
            .collect()
    }

    #[test]
    fn diff_classifies_added_removed_changed_and_kept() {
        let click = Callback::new(|_: &u8| {});
        let hover = Callback::new(|_: &u8| {});
        let hover_next = Callback::new(|_: &u8| {});
        let add = Callback::new(|_: &u8| {});

        let current = map(&[("click", &click), ("hover", &hover), ("remove", &add)]);
        let next = map(&[("click", &click), ("hover", &hover_next), ("add", &add)]);
        let diff = diff_events(&current, &next);

        assert_eq!(diff.unchanged, vec!["click"]);
        assert_eq!(diff.detach, vec!["hover", "remove"]);
        assert_eq!(diff.attach, vec!["hover", "add"]);
        assert!(!diff.is_noop());
    }

    #[test]
    fn identical_maps_are_noop() {
        let click = Callback::new(|_: &u8| {});
        let current = map(&[("click", &click)]);
        assert!(diff_events(&current, &current.clone()).is_noop());
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Peer for Recorder {
        type Event = &'static str;
        type Payload = u8;

        fn on(&mut self, event: &'static str, _: &Callback<u8>) {
            self.calls.push(format!("on:{event}"));
        }

        fn off(&mut self, event: &'static str, _: &Callback<u8>) {
            self.calls.push(format!("off:{event}"));
        }
    }

    fn recorder() -> PeerHandle<Recorder> {
        PeerHandle::new(crate::NodeIdentity::next(), Recorder::default())
    }

    fn calls(peer: &PeerHandle<Recorder>) -> Vec<String> {
        peer.with(|recorder| recorder.calls.clone())
    }

    #[test]
    fn released_peer_receives_nothing_and_records_nothing() {
        let peer = recorder();
        peer.release();
        let click = Callback::new(|_: &u8| {});
        let mut binder = EventBinder::new();

        let diff = binder.reconcile(&peer, &map(&[("click", &click)]));

        assert_eq!(diff.attach, vec!["click"]);
        assert!(binder.subscriptions().is_empty());
        assert!(calls(&peer).is_empty());
    }

    #[test]
    fn busy_peer_keeps_the_old_binding_until_the_next_reconcile() {
        let peer = recorder();
        let old = Callback::new(|_: &u8| {});
        let new = Callback::new(|_: &u8| {});
        let mut binder = EventBinder::new();
        binder.reconcile(&peer, &map(&[("click", &old)]));

        let next = map(&[("click", &new), ("hover", &new)]);
        let inner = peer.clone();
        peer.update(|_| binder.reconcile(&inner, &next));

        assert_eq!(calls(&peer), vec!["on:click"]);
        assert_eq!(binder.subscriptions().len(), 1);
        assert!(binder.subscriptions()["click"].ptr_eq(&old));

        binder.reconcile(&peer, &next);

        assert_eq!(calls(&peer), vec!["on:click", "off:click", "on:click", "on:hover"]);
        assert_eq!(binder.subscriptions(), &next);
    }

    #[test]
    fn teardown_on_released_peer_empties_the_set_quietly() {
        let peer = recorder();
        let click = Callback::new(|_: &u8| {});
        let mut binder = EventBinder::new();
        binder.reconcile(&peer, &map(&[("click", &click)]));
        peer.release();

        assert_eq!(binder.detach_all(&peer), 1);
        assert!(binder.subscriptions().is_empty());
        assert_eq!(calls(&peer), vec!["on:click"]);
    }
}

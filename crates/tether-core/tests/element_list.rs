use pretty_assertions::assert_eq;
use tether_core::{ElementList, HandleSlot, PeerEvents, RenderInput};
use tether_testing::{CallLog, RecordingContainer, SpyComponent, SpyPeer, SpyProps, TestHost};

#[test]
fn keys_missing_from_a_commit_are_torn_down() {
    let host = TestHost::new();
    let log = CallLog::new();
    let map = RecordingContainer::new("map", log.clone());
    let container = map.container_ref::<SpyPeer>();
    let events = PeerEvents::<SpyPeer>::default();
    let props = SpyProps::new(&log);
    let mut list = ElementList::<SpyComponent, &'static str>::new(host.handle());

    let mut commit = list.commit();
    for key in ["a", "b"] {
        commit
            .render(
                key,
                RenderInput {
                    container: &container,
                    props: &props,
                    events: &events,
                },
            )
            .expect("render");
    }
    assert!(commit.finish().is_empty());
    let b_identity = list.get(&"b").map(|element| element.identity());
    assert_eq!(list.len(), 2);

    let mut commit = list.commit();
    for key in ["a", "c"] {
        commit
            .render(
                key,
                RenderInput {
                    container: &container,
                    props: &props,
                    events: &events,
                },
            )
            .expect("render");
    }
    assert_eq!(commit.finish(), vec!["b"]);

    assert_eq!(list.keys().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    assert_eq!(log.count("construct:"), 3);
    assert_eq!(log.count("map.detach"), 1);
    assert_eq!(map.attached().len(), 2);
    assert!(b_identity.is_some_and(|identity| !map.contains(identity)));
}

#[test]
fn dropping_a_commit_sweeps_unrendered_keys() {
    let host = TestHost::new();
    let log = CallLog::new();
    let map = RecordingContainer::new("map", log.clone());
    let container = map.container_ref::<SpyPeer>();
    let events = PeerEvents::<SpyPeer>::default();
    let props = SpyProps::new(&log);
    let slot = HandleSlot::<SpyPeer>::new();
    let mut list = ElementList::<SpyComponent, u32>::new(host.handle());

    {
        let mut commit = list.commit();
        commit
            .render_with_handle(
                7,
                RenderInput {
                    container: &container,
                    props: &props,
                    events: &events,
                },
                Some(&slot),
            )
            .expect("render");
    }
    assert!(slot.get().is_some());

    drop(list.commit());
    assert!(list.is_empty());
    assert!(slot.is_empty());
    assert!(map.attached().is_empty());
}

#[test]
fn returning_key_gets_a_fresh_identity() {
    let host = TestHost::new();
    let log = CallLog::new();
    let map = RecordingContainer::new("map", log.clone());
    let container = map.container_ref::<SpyPeer>();
    let events = PeerEvents::<SpyPeer>::default();
    let props = SpyProps::new(&log);
    let mut list = ElementList::<SpyComponent, u32>::new(host.handle());
    let input = RenderInput {
        container: &container,
        props: &props,
        events: &events,
    };

    let mut commit = list.commit();
    let first = commit.render(1, input).expect("render").identity;
    commit.finish();
    list.commit().finish();
    let mut commit = list.commit();
    let second = commit.render(1, input).expect("render").identity;
    commit.finish();

    assert_ne!(first, second);
    assert_eq!(log.count("construct:"), 2);
}

#[test]
fn a_kept_key_follows_the_latest_handle_slot() {
    let host = TestHost::new();
    let log = CallLog::new();
    let map = RecordingContainer::new("map", log.clone());
    let container = map.container_ref::<SpyPeer>();
    let events = PeerEvents::<SpyPeer>::default();
    let props = SpyProps::new(&log);
    let first = HandleSlot::<SpyPeer>::new();
    let second = HandleSlot::<SpyPeer>::new();
    let mut list = ElementList::<SpyComponent, u32>::new(host.handle());

    for slot in [&first, &second] {
        let mut commit = list.commit();
        commit
            .render_with_handle(
                1,
                RenderInput {
                    container: &container,
                    props: &props,
                    events: &events,
                },
                Some(slot),
            )
            .expect("render");
        commit.finish();
    }

    assert!(first.is_empty());
    let peer = second.get().expect("published");
    assert!(list
        .get(&1)
        .and_then(|element| element.peer())
        .is_some_and(|live| live.ptr_eq(&peer)));
    assert_eq!(log.count("construct:"), 1);

    let mut commit = list.commit();
    commit
        .render(
            1,
            RenderInput {
                container: &container,
                props: &props,
                events: &events,
            },
        )
        .expect("render");
    commit.finish();
    assert!(second.is_empty());
}

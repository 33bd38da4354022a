use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_core::{Callback, Element, ElementList, PeerEvents, RenderInput};
use tether_testing::{CallLog, RecordingContainer, SpyComponent, SpyPeer, SpyProps, TestHost};

const LIST_SIZES: &[usize] = &[8, 64, 256];

fn bench_field_dispatch(c: &mut Criterion) {
    let host = TestHost::new();
    let log = CallLog::new();
    let container = RecordingContainer::new("map", log.clone()).container_ref::<SpyPeer>();
    let click = Callback::new(|_: &String| {});
    let events = tether_testing::events(&[("click", &click)]);
    let red = SpyProps::new(&log);
    let blue = red.clone().color("blue");
    let mut element = Element::<SpyComponent>::new(host.handle());

    c.bench_function("render_style_toggle", |b| {
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let props = if flip { &blue } else { &red };
            let report = element.render(RenderInput {
                container: &container,
                props,
                events: &events,
            });
            log.clear();
            black_box(report.is_ok())
        })
    });

    c.bench_function("render_structural_replace", |b| {
        let mut generation = 0u32;
        b.iter(|| {
            generation += 1;
            let props = red.clone().rows(vec![generation]);
            let report = element.render(RenderInput {
                container: &container,
                props: &props,
                events: &events,
            });
            host.flush();
            log.clear();
            black_box(report.is_ok())
        })
    });
}

fn bench_keyed_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list_commit");
    for &size in LIST_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let host = TestHost::new();
            let log = CallLog::new();
            let container = RecordingContainer::new("map", log.clone()).container_ref::<SpyPeer>();
            let events = PeerEvents::<SpyPeer>::default();
            let props = SpyProps::new(&log);
            let mut list = ElementList::<SpyComponent, usize>::new(host.handle());
            let mut offset = 0usize;
            b.iter(|| {
                offset += 1;
                let mut commit = list.commit();
                for key in offset..offset + size {
                    let _ = commit.render(
                        key,
                        RenderInput {
                            container: &container,
                            props: &props,
                            events: &events,
                        },
                    );
                }
                let removed = commit.finish();
                log.clear();
                black_box(removed.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_field_dispatch, bench_keyed_list);
criterion_main!(benches);

//! Subscription lookup benchmark.
//!
//! Measures the per-event cost of computing the priority-ordered channel
//! list, which sits on the hot path of every registered event.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use bidi_bridge::{Channel, ContextId, ContextTree, EventKind, EventRequest, SubscriptionManager};

fn bench_channels_subscribed_to_event(c: &mut Criterion) {
    let manager = SubscriptionManager::new(Arc::new(ContextTree::new()));

    // 100 channels, half global, half context-specific.
    for index in 0..100u32 {
        let channel = Channel::new(format!("channel-{index}"));
        let context = (index % 2 == 0).then(|| ContextId::new(format!("context-{index}")));
        manager.subscribe(
            EventRequest::Event(EventKind::Load),
            context.as_ref(),
            Some(&channel),
        );
    }

    let context = ContextId::new("context-42");
    c.bench_function("channels_subscribed_to_event", |b| {
        b.iter(|| {
            std::hint::black_box(
                manager.channels_subscribed_to_event(EventKind::Load, Some(&context)),
            )
        })
    });
}

criterion_group!(benches, bench_channels_subscribed_to_event);
criterion_main!(benches);

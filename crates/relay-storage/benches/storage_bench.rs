use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relay_storage::{InMemoryBackend, MessageStore};
use relay_types::{Envelope, EnvelopeKind, MessageFilter, StoredMessage};

fn sample_message(i: i64) -> StoredMessage {
    let env = Envelope::new("Lead", "Dev", EnvelopeKind::Message, "status report")
        .unwrap()
        .with_ts(i);
    StoredMessage::new(env, None)
}

fn bench_store(c: &mut Criterion) {
    let store = MessageStore::new(Arc::new(InMemoryBackend::new()), 7 * 24 * 60 * 60 * 1000);
    for i in 0..1000 {
        store.save_message(&sample_message(i)).unwrap();
    }

    c.bench_function("save_message", |b| {
        let mut i = 1000;
        b.iter(|| {
            store.save_message(black_box(&sample_message(i))).unwrap();
            i += 1;
        })
    });

    c.bench_function("get_messages_filtered_limit_50", |b| {
        let mut filter = MessageFilter::new();
        filter.limit = 50;
        b.iter(|| store.get_messages(black_box(&filter)).unwrap())
    });
}

criterion_group!(benches, bench_store);
criterion_main!(benches);

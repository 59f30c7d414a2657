use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relay_patterns::{default_patterns, is_instructional_text, is_valid_agent_name, strip_ansi};

const LINE_120: &str =
    "->relay:Dev Please review the latest diff and confirm the schema migration is idempotent ok";

fn bench_classifiers(c: &mut Criterion) {
    let set = default_patterns();

    c.bench_function("inline_match_120col", |b| {
        b.iter(|| set.inline.is_match(black_box(LINE_120)))
    });

    c.bench_function("is_valid_agent_name", |b| {
        b.iter(|| is_valid_agent_name(black_box("Dev")))
    });

    c.bench_function("is_instructional_text_120col", |b| {
        b.iter(|| is_instructional_text(black_box(LINE_120)))
    });

    c.bench_function("strip_ansi_120col", |b| {
        b.iter(|| strip_ansi(black_box(LINE_120)))
    });
}

criterion_group!(benches, bench_classifiers);
criterion_main!(benches);

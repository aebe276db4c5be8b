use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loupe_style::{parse, serialize};

fn parse_values(c: &mut Criterion) {
    let values = [
        ("padding", "8px 16px"),
        ("color", "#3366ff"),
        ("background", "rgb(51 102 255 / 0.5)"),
        ("margin", "var(--spacing, 16px)"),
        ("box-shadow", "0 2px 4px rgba(0, 0, 0, 0.1), 0 1px 1px #000"),
    ];

    c.bench_function("parse_style_values", |b| {
        b.iter(|| {
            for (property, raw) in values {
                black_box(parse(black_box(property), black_box(raw)));
            }
        })
    });
}

fn round_trip_values(c: &mut Criterion) {
    let parsed: Vec<_> = ["1px solid #000", "oklch(0.7 0.1 240)", "var(--a, var(--b, 2rem))"]
        .iter()
        .map(|raw| parse("border", raw))
        .collect();

    c.bench_function("serialize_style_values", |b| {
        b.iter(|| {
            for value in &parsed {
                black_box(serialize(black_box(value)));
            }
        })
    });
}

criterion_group!(benches, parse_values, round_trip_values);
criterion_main!(benches);

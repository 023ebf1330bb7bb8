use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_map::mercator;
use tessera_map::mvt::geometry::tessellate_polygon;
use tessera_map::mvt::pbf::PbfReader;

/// A roughly circular 64-point ring in tile-local `[0,1]` space, the kind of
/// polygon `tessellate_polygon` sees once `decode_command_stream` has run.
fn sample_ring() -> Vec<(f64, f64)> {
    (0..64)
        .map(|i| {
            let theta = (i as f64 / 64.0) * std::f64::consts::TAU;
            (0.5 + 0.4 * theta.cos(), 0.5 + 0.4 * theta.sin())
        })
        .collect()
}

fn bench_tessellate_polygon(c: &mut Criterion) {
    // Surfaces the `tracing::warn!` calls on the degenerate-ring path (see
    // `mvt::geometry::tessellate_polygon`) if this bench's inputs ever
    // trigger one; `env_logger` is `tracing`'s sink via the `log` shim.
    let _ = env_logger::try_init();
    let rings = vec![sample_ring()];
    c.bench_function("tessellate_polygon_64gon", |b| {
        b.iter(|| black_box(tessellate_polygon(black_box(&rings))))
    });
}

fn bench_mercator_round_trip(c: &mut Criterion) {
    c.bench_function("mercator_from_to_lnglat", |b| {
        b.iter(|| {
            let (mx, my) = mercator::from_lnglat(black_box(-122.4194), black_box(37.7749));
            black_box(mercator::to_lnglat(mx, my))
        })
    });
}

fn bench_pbf_varint_decode(c: &mut Criterion) {
    // 16 repeated multi-byte varints (300 = 0b100101100 -> [0xAC, 0x02]).
    let bytes: Vec<u8> = std::iter::repeat([0xAC, 0x02]).take(16).flatten().collect();
    c.bench_function("pbf_read_varint_x16", |b| {
        b.iter(|| {
            let mut reader = PbfReader::new(black_box(&bytes));
            while !reader.is_eof() {
                black_box(reader.read_varint().unwrap());
            }
        })
    });
}

criterion_group!(
    rendering,
    bench_tessellate_polygon,
    bench_mercator_round_trip,
    bench_pbf_varint_decode
);
criterion_main!(rendering);

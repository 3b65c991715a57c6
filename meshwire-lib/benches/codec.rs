use criterion::{black_box, criterion_group, criterion_main, Criterion};
use meshwire_lib::packet::Packet;
use meshwire_lib::pipeline::Pipeline;

fn bench_codec(c: &mut Criterion) {
    let packet = Packet::data(42, 1_730_000_000_000, vec![0xAB; 1024], false);
    let encoded = packet.encode();

    c.bench_function("packet_encode_1k", |b| b.iter(|| black_box(&packet).encode()));
    c.bench_function("packet_decode_1k", |b| {
        b.iter(|| Packet::decode(black_box(&encoded)).unwrap())
    });

    let plain = Pipeline::for_datagrams("none", "none", "");
    c.bench_function("pipeline_seal_open_plain_1k", |b| {
        b.iter(|| {
            let wire = plain.seal(black_box(&packet));
            plain.open(&wire).unwrap()
        })
    });

    let shaped = Pipeline::for_datagrams("gaming", "xor", "bench-key");
    c.bench_function("pipeline_seal_open_xor_gaming_1k", |b| {
        b.iter(|| {
            let wire = shaped.seal(black_box(&packet));
            shaped.open(&wire).unwrap()
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);

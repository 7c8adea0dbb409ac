use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fathom_core::wire::{Ack, Packet};

fn bench_packet_roundtrip(c: &mut Criterion) {
    let packet = Packet::new(128, 4096, Bytes::from(vec![0u8; 512]));
    c.bench_function("packet encode", |b| {
        b.iter(|| black_box(packet.encode()));
    });
    let encoded = packet.encode();
    c.bench_function("packet decode", |b| {
        b.iter(|| black_box(Packet::decode(&encoded).unwrap()));
    });
}

fn bench_ack_roundtrip(c: &mut Criterion) {
    let ack = Ack::new(128, 4096);
    c.bench_function("ack encode", |b| {
        b.iter(|| black_box(ack.encode()));
    });
    let encoded = ack.encode();
    c.bench_function("ack decode", |b| {
        b.iter(|| black_box(Ack::decode(&encoded).unwrap()));
    });
}

criterion_group!(benches, bench_packet_roundtrip, bench_ack_roundtrip);
criterion_main!(benches);

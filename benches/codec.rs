use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio_util::codec::{Decoder, Encoder};

use wristd::core::Mode;
use wristd::protocol::crc::checksum;
use wristd::protocol::{Message, WatchCodec};

fn bench_checksum(c: &mut Criterion) {
    let frame = [0x01u8, 0x20, 0x40, 0x12, 0x05, 0x00, 0xff, 0x81, 0x42, 0x24, 0x18, 0x3c, 0x7e, 0x66];
    c.bench_function("checksum", |b| b.iter(|| checksum(black_box(&frame))));
}

fn bench_codec(c: &mut Criterion) {
    let row = [0x5au8; 12];
    let message = Message::write_rows(Mode::Application, 10, &row, 11, &row);

    c.bench_function("encode_write_rows", |b| {
        let mut codec = WatchCodec::new();
        let mut buf = BytesMut::with_capacity(64);
        b.iter(|| {
            buf.clear();
            codec.encode(black_box(message.clone()), &mut buf).unwrap();
        })
    });

    let mut encoded = BytesMut::new();
    WatchCodec::new().encode(message, &mut encoded).unwrap();
    c.bench_function("decode_write_rows", |b| {
        let mut codec = WatchCodec::new();
        b.iter(|| {
            let mut src = encoded.clone();
            black_box(codec.decode(&mut src).unwrap());
        })
    });
}

criterion_group!(benches, bench_checksum, bench_codec);
criterion_main!(benches);

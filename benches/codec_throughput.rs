//! Benchmarks for wire codec and round-trip throughput
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mlpid::binder;
use mlpid::channel::{
    connected_pair, ClassifierChannel, ClassifierLink, ClassifierPeer, Endpoints,
    UniformClassifier,
};
use mlpid::codec::Framing;
use mlpid::types::{
    ClassVocabulary, FeatureBatch, ProbabilityBatch, TrackFeatureRow, TrackId, FEATURE_WIDTH,
};
use std::io::Cursor;

fn make_batch(tracks: usize) -> FeatureBatch {
    let mut batch = FeatureBatch::with_capacity(tracks);
    for i in 0..tracks {
        let mut values = [0.0f32; FEATURE_WIDTH];
        for (j, v) in values.iter_mut().enumerate() {
            *v = (i * FEATURE_WIDTH + j) as f32 * 0.01;
        }
        batch.push(TrackId(i as i32), TrackFeatureRow::from_array(values));
    }
    batch
}

fn bench_encode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");

    for framing in [Framing::Binary, Framing::Text] {
        for tracks in [10, 100, 1000] {
            let batch = make_batch(tracks);
            group.throughput(Throughput::Elements(tracks as u64));
            group.bench_with_input(
                BenchmarkId::new(framing.to_string(), tracks),
                &batch,
                |b, batch| {
                    let mut out = Vec::with_capacity(tracks * FEATURE_WIDTH * 12);
                    b.iter(|| {
                        out.clear();
                        framing.write_batch(&mut out, black_box(batch)).unwrap();
                        black_box(out.len())
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_decode_probabilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_probabilities");
    let classes = 5;

    for framing in [Framing::Binary, Framing::Text] {
        for tracks in [10, 100, 1000] {
            let flat: Vec<f32> = (0..tracks * classes).map(|i| (i % 7) as f32 / 7.0).collect();
            let probabilities = ProbabilityBatch::from_flat(&flat, classes).unwrap();
            let mut encoded = Vec::new();
            framing
                .write_probabilities(&mut encoded, &probabilities)
                .unwrap();

            group.throughput(Throughput::Elements(tracks as u64));
            group.bench_with_input(
                BenchmarkId::new(framing.to_string(), tracks),
                &encoded,
                |b, encoded| {
                    b.iter(|| {
                        let mut reader = Cursor::new(encoded.as_slice());
                        framing
                            .read_probabilities(&mut reader, tracks, classes)
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_bind(c: &mut Criterion) {
    let vocabulary = ClassVocabulary::new(vec![11, 13, 211, 321, 2212]).unwrap();
    let tracks = 1000;
    let ids: Vec<TrackId> = (0..tracks).map(TrackId).collect();
    let flat: Vec<f32> = (0..tracks as usize * vocabulary.len())
        .map(|i| (i % 11) as f32 / 11.0)
        .collect();
    let probabilities = ProbabilityBatch::from_flat(&flat, vocabulary.len()).unwrap();

    c.bench_function("bind_1000_tracks", |b| {
        b.iter(|| binder::bind(&vocabulary, black_box(&ids), black_box(&probabilities)).unwrap())
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");
    group.sample_size(20);

    let (task_side, peer_side) = connected_pair();
    let peer = std::thread::spawn(move || {
        let Endpoints { reader, writer } = peer_side;
        let vocabulary = ClassVocabulary::new(vec![11, 13, 211, 321, 2212]).unwrap();
        ClassifierPeer::new(Framing::Binary, reader, writer, vocabulary, UniformClassifier).serve()
    });

    let mut channel = ClassifierChannel::new(Framing::Binary, task_side.reader, task_side.writer);
    channel.handshake().unwrap();

    for tracks in [1, 50, 500] {
        let batch = make_batch(tracks);
        group.throughput(Throughput::Elements(tracks as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tracks), &batch, |b, batch| {
            b.iter(|| channel.round_trip(batch).unwrap())
        });
    }
    group.finish();

    channel.shutdown().unwrap();
    peer.join().unwrap().unwrap();
}

criterion_group!(
    benches,
    bench_encode_batch,
    bench_decode_probabilities,
    bench_bind,
    bench_round_trip
);

criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use embedbench::{batch_corpus, chunk_text, TextRecord};
use std::hint::black_box;

const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "rust", "embedding",
    "throughput", "naïve", "café", "日本語", "Ωmega",
];

/// Pseudo-random prose of roughly `chars` characters, with some multi-byte words.
fn generate_text(chars: usize, seed: u64) -> String {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut out = String::with_capacity(chars * 2);
    let mut count = 0;
    while count < chars {
        let word = WORDS[rng.usize(..WORDS.len())];
        out.push_str(word);
        out.push(' ');
        count += word.chars().count() + 1;
    }
    out
}

fn corpus(records: usize, chars: usize) -> Vec<TextRecord> {
    (0..records)
        .map(|i| TextRecord::new(generate_text(chars, i as u64)))
        .collect()
}

/// Slicing one long text at different chunk sizes
fn bench_chunk_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_text");
    let text = generate_text(200_000, 7);
    group.throughput(Throughput::Bytes(text.len() as u64));

    for chunk_size in [100, 400, 2000] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &chunk_size, |b, &size| {
            b.iter(|| {
                let chunks = chunk_text(black_box(&text), size).unwrap();
                black_box(chunks.count())
            });
        });
    }

    group.finish();
}

/// Records -> chunks -> batches at the default sizes
fn bench_batch_corpus(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_corpus");

    for records in [100, 1000] {
        let data = corpus(records, 3000);
        let bytes: usize = data.iter().map(|r| r.text.len()).sum();
        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &data, |b, data| {
            b.iter(|| {
                let batches = batch_corpus(black_box(data.clone()), 400, 128).unwrap();
                black_box(batches.count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunk_text, bench_batch_corpus);
criterion_main!(benches);

//! Codec benchmarks for duckrow
//!
//! These benchmarks measure batch conversion between application rows and
//! vectors, which dominates the cost of appending to and scanning a table.
//! Codecs are compiled before measuring; only per-batch work is timed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use duckrow::{
    mapped_enum, mapped_struct, read_all_with, read_records_with, ChunkCollection, ChunkSink,
    CodecCompiler, RowWriter, TypeMapper,
};

mapped_enum! {
    #[derive(Debug)]
    enum Side: u8 { Buy, Sell }
}

mapped_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Trade {
        id: i64,
        symbol: String,
        side: Side,
        price: f64,
        quantity: Option<u32>,
        venues: Vec<String>,
    }
}

fn trades(count: usize) -> Vec<Trade> {
    (0..count)
        .map(|i| Trade {
            id: i as i64,
            symbol: if i % 2 == 0 {
                "ACME".to_string()
            } else {
                "ACME-LONG-SYMBOL-NAME".to_string()
            },
            side: if i % 3 == 0 { Side::Sell } else { Side::Buy },
            price: 100.0 + i as f64 / 100.0,
            quantity: (i % 7 != 0).then_some(i as u32),
            venues: (0..i % 4).map(|v| format!("venue-{}", v)).collect(),
        })
        .collect()
}

fn filled_table(compiler: &CodecCompiler, rows: &[Trade]) -> ChunkCollection {
    let mut writer = RowWriter::<Trade>::with_compiler(compiler).unwrap();
    let mut table = ChunkCollection::for_type(writer.structural_type());
    writer.write_all(rows, &mut table).unwrap();
    table
}

/// Sink that drops every chunk, so only conversion is measured.
struct Discard;

impl ChunkSink for Discard {
    fn append_chunk(&mut self, chunk: &duckrow::DataChunk) -> duckrow::eyre::Result<()> {
        black_box(chunk.size());
        Ok(())
    }
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_rows");
    let compiler = CodecCompiler::new();

    for count in [2048usize, 16_384] {
        let rows = trades(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            let mut writer = RowWriter::<Trade>::with_compiler(&compiler).unwrap();
            b.iter(|| writer.write_all(black_box(rows), &mut Discard).unwrap());
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_rows");
    let compiler = CodecCompiler::new();

    for count in [2048usize, 16_384] {
        let rows = trades(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("typed", count), &rows, |b, rows| {
            b.iter_batched(
                || filled_table(&compiler, rows),
                |mut table| read_all_with::<Trade, _>(&compiler, &mut table).unwrap(),
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("records", count), &rows, |b, rows| {
            b.iter_batched(
                || filled_table(&compiler, rows),
                |mut table| read_records_with(&compiler, &mut table).unwrap(),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    group.bench_function("cold_root_writer", |b| {
        b.iter(|| {
            let compiler = CodecCompiler::new();
            black_box(compiler.root_writer::<Trade>().unwrap())
        });
    });

    group.bench_function("cached_root_writer", |b| {
        let compiler = CodecCompiler::new();
        compiler.root_writer::<Trade>().unwrap();
        b.iter(|| black_box(compiler.root_writer::<Trade>().unwrap()));
    });

    group.bench_function("structural_type", |b| {
        b.iter(|| black_box(TypeMapper::new().structural_type::<Trade>().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_compile);
criterion_main!(benches);

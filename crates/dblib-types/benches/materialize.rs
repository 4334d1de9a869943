//! Benchmarks for column materialization.

#![allow(clippy::unwrap_used, missing_docs)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use dblib_types::{NativeConverter, Policy, TypeId, materialize};
use std::hint::black_box;

/// Typed fast paths that never touch the converter.
fn bench_typed(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize_typed");
    let policy = Policy::new();

    let int4 = 123_456i32.to_le_bytes();
    group.bench_function("int4", |b| {
        b.iter(|| {
            black_box(materialize(
                TypeId::Int4.code(),
                Some(black_box(&int4[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    let varchar = "This is a typical database column value with some content".as_bytes();
    group.throughput(Throughput::Bytes(varchar.len() as u64));
    group.bench_function("varchar", |b| {
        b.iter(|| {
            black_box(materialize(
                TypeId::VarChar.code(),
                Some(black_box(varchar)),
                &policy,
                &NativeConverter,
            ))
        })
    });

    group.finish();
}

/// Paths that go through the converter.
fn bench_converted(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize_converted");

    let mut datetime = 45_304i32.to_le_bytes().to_vec();
    datetime.extend_from_slice(&9_000_000u32.to_le_bytes());

    group.bench_function("datetime_literal", |b| {
        let policy = Policy::new();
        b.iter(|| {
            black_box(materialize(
                TypeId::DateTime.code(),
                Some(black_box(&datetime[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    group.bench_function("datetime_converted", |b| {
        let policy = Policy::new().convert_datetime(true);
        b.iter(|| {
            black_box(materialize(
                TypeId::DateTime.code(),
                Some(black_box(&datetime[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    let decimal = [18u8, 4, 0, 0x00, 0x00, 0x12, 0xD6, 0x87];
    group.bench_function("decimal_double", |b| {
        let policy = Policy::new();
        b.iter(|| {
            black_box(materialize(
                TypeId::Decimal.code(),
                Some(black_box(&decimal[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    group.bench_function("decimal_stringified", |b| {
        let policy = Policy::new().stringify_numerics(true);
        b.iter(|| {
            black_box(materialize(
                TypeId::Decimal.code(),
                Some(black_box(&decimal[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    let guid = [0xA5u8; 16];
    group.bench_function("guid_stringified", |b| {
        let policy = Policy::new().stringify_uniqueidentifier(true);
        b.iter(|| {
            black_box(materialize(
                TypeId::Guid.code(),
                Some(black_box(&guid[..])),
                &policy,
                &NativeConverter,
            ))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_typed, bench_converted);
criterion_main!(benches);

use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use statuslist::{BitList, decode_list, encode_list};

const LIST_SIZE_IN_BYTES: usize = 16 * 1024;

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitlist");
    group.throughput(Throughput::Elements((LIST_SIZE_IN_BYTES * 8) as u64));
    group.bench_function("allocate/exhaust", |b| {
        b.iter(|| {
            let mut list = BitList::new(LIST_SIZE_IN_BYTES);
            while let Ok(index) = list.allocate_next_free_index() {
                black_box(index);
            }
        });
    });
    group.bench_function("revoke/every_other", |b| {
        b.iter(|| {
            let mut list = BitList::new(LIST_SIZE_IN_BYTES);
            for index in (0..LIST_SIZE_IN_BYTES * 8).step_by(2) {
                list.revoke_at_index(index).ok();
            }
            black_box(list);
        });
    });
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut list = BitList::new(LIST_SIZE_IN_BYTES);
    for index in (0..LIST_SIZE_IN_BYTES * 8).step_by(97) {
        list.revoke_at_index(index).ok();
    }
    let encoded = encode_list(list.as_bytes());

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(LIST_SIZE_IN_BYTES as u64));
    group.bench_function("encode", |b| b.iter(|| encode_list(black_box(list.as_bytes()))));
    group.bench_function("decode", |b| b.iter(|| decode_list(black_box(&encoded))));
    group.finish();
}

criterion_group!(benches, bench_allocate, bench_codec);
criterion_main!(benches);

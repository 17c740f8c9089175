use bam_pvrz_core::prelude::*;
use bam_pvrz_core::{PackItem, pack_frames};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};
use std::hint::black_box;

fn generate_frames(count: usize, min_size: u32, max_size: u32) -> Vec<RgbaImage> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min_size..=max_size);
            let h = rng.gen_range(min_size..=max_size);
            RgbaImage::from_pixel(w, h, Rgba([(i % 256) as u8, 64, 128, 255]))
        })
        .collect()
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("shelf_packer");
    let cfg = PackerConfig::default();

    for count in [50, 200, 800] {
        let frames = generate_frames(count, 16, 96);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("layout_only", count), &frames, |b, frames| {
            let items: Vec<PackItem<'_>> = frames
                .iter()
                .map(|f| PackItem::new(f.width(), f.height(), None))
                .collect();
            b.iter(|| black_box(pack_frames(&items, &cfg).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("with_pixels", count), &frames, |b, frames| {
            let items: Vec<PackItem<'_>> = frames
                .iter()
                .map(|f| PackItem::new(f.width(), f.height(), Some(f)))
                .collect();
            b.iter(|| black_box(pack_frames(&items, &cfg).unwrap()));
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_bam");
    group.sample_size(20);
    for count in [20, 100] {
        let mut bam = Bam::new();
        let cycle = bam.add_cycle();
        for img in generate_frames(count, 16, 64) {
            let f = bam.add_frame(Frame::from_image(img, 0, 0).unwrap());
            bam.add_frame_to_cycle(cycle, f).unwrap();
        }
        let opts = WriteOptions::default();
        group.bench_with_input(BenchmarkId::new("ispc_dxt5", count), &bam, |b, bam| {
            b.iter(|| black_box(encode_bam(bam, &opts, &IspcCompressor).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pack, bench_encode);
criterion_main!(benches);

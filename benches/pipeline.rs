use criterion::{criterion_group, criterion_main, Criterion};
use franz::coords::ScreenSize;
use franz::platform::headless::HeadlessScreen;
use franz::screen::capture::synthetic_frame;
use franz::screen::{capture_encoded, downsample, encode_png};

fn bench_pipeline(c: &mut Criterion) {
    let frame = synthetic_frame(ScreenSize::new(1920, 1080), 7);
    c.bench_function("downsample_1080p_to_high", |b| {
        b.iter(|| downsample(frame.clone(), 1536, 864))
    });

    let small = downsample(frame.clone(), 512, 288);
    c.bench_function("encode_png_low", |b| b.iter(|| encode_png(&small)));

    let screen = HeadlessScreen::new(ScreenSize::new(1920, 1080));
    let low = ScreenSize::new(512, 288);
    c.bench_function("capture_to_png_low", |b| {
        b.iter(|| capture_encoded(&screen, low))
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);

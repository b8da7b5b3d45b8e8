use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vt_audio::features::{estimate_pitch, extract_spectral_features};
use vt_audio::spectrum::SpectrumAnalyser;
use vt_core::config::CaptureConfig;

fn voiced(len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.4 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 2700.0 * t).sin()
        })
        .collect()
}

fn bench_pitch(c: &mut Criterion) {
    let samples = voiced(2048, 44100);
    c.bench_function("estimate_pitch_2048", |b| {
        b.iter(|| estimate_pitch(black_box(&samples), 44100));
    });
}

fn bench_spectrum(c: &mut Criterion) {
    let config = CaptureConfig::default();
    let samples = voiced(config.fft_size, 44100);
    let mut analyser = SpectrumAnalyser::new(&config);
    let mut bins = vec![0u8; analyser.bin_count()];
    c.bench_function("spectrum_process_2048", |b| {
        b.iter(|| analyser.process(black_box(&samples), &mut bins));
    });
    c.bench_function("spectral_features_1024", |b| {
        b.iter(|| extract_spectral_features(black_box(&bins), 44100));
    });
}

criterion_group!(benches, bench_pitch, bench_spectrum);
criterion_main!(benches);

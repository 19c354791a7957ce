//! Audio Test Fixture Generator
//!
//! Short sine-tone WAV files; different frequencies give different content.

use std::path::{Path, PathBuf};

/// Write a mono 16-bit WAV tone of `freq_hz` lasting `duration_seconds`
pub fn generate_test_wav(path: &Path, freq_hz: f32, duration_seconds: f32) -> anyhow::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (duration_seconds * spec.sample_rate as f32) as usize;

    for i in 0..total_samples {
        let t = i as f32 / spec.sample_rate as f32;
        let sample = 0.3 * (2.0 * std::f32::consts::PI * freq_hz * t).sin() * i16::MAX as f32;
        writer.write_sample(sample as i16)?;
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Write arbitrary bytes, creating parent directories
pub fn write_bytes(path: &Path, content: &[u8]) -> anyhow::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(path.to_path_buf())
}

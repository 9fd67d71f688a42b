use std::path::{Path, PathBuf};

use crate::assets::media::AudioPcm;
use crate::foundation::core::Fps;
use crate::foundation::error::{ComposeError, ComposeResult, MediaError, MediaResult};

/// Raw interleaved little-endian f32 PCM stored on disk, with its layout.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PcmFile {
    /// Location of the `.f32le` file.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Length in sample frames.
    pub sample_frames: u64,
}

impl PcmFile {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_frames as f64 / f64::from(self.sample_rate)
    }

    /// Read the samples back into memory.
    pub fn read(&self) -> MediaResult<AudioPcm> {
        let pcm = read_f32le_file(&self.path, self.sample_rate, self.channels)?;
        if pcm.sample_frames() != self.sample_frames {
            return Err(MediaError::decode(
                &self.path,
                format!(
                    "expected {} sample frames, found {}",
                    self.sample_frames,
                    pcm.sample_frames()
                ),
            ));
        }
        Ok(pcm)
    }

    /// Write `pcm` to `path` and describe the result.
    pub fn write(pcm: &AudioPcm, path: &Path) -> MediaResult<Self> {
        write_f32le_file(&pcm.interleaved_f32, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
            sample_frames: pcm.sample_frames(),
        })
    }
}

/// Convert a frame count on the `fps` grid to a sample-frame count at `sample_rate`, rounding to
/// the nearest sample.
pub fn frame_to_sample(frame_delta: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame_delta) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}

/// Convert seconds to sample frames, rounding to the nearest sample.
pub fn secs_to_sample_frames(secs: f64, sample_rate: u32) -> u64 {
    (secs * f64::from(sample_rate)).round().max(0.0) as u64
}

/// Zero-amplitude PCM of exactly `sample_frames` frames.
pub fn silent_pcm(sample_rate: u32, channels: u16, sample_frames: u64) -> AudioPcm {
    AudioPcm {
        sample_rate,
        channels,
        interleaved_f32: vec![0.0; sample_frames as usize * usize::from(channels)],
    }
}

/// Pad with trailing silence or cut the tail so `pcm` holds exactly `sample_frames` frames.
///
/// Cuts land on sample-frame boundaries, so no partial interleaved frame survives.
pub fn fit_to_sample_frames(pcm: &mut AudioPcm, sample_frames: u64) {
    let want = sample_frames as usize * usize::from(pcm.channels);
    pcm.interleaved_f32.truncate(want);
    pcm.interleaved_f32.resize(want, 0.0);
}

/// Concatenate PCM tracks back to back. All tracks must share one layout.
pub fn concat_pcm(parts: &[AudioPcm]) -> ComposeResult<AudioPcm> {
    let Some(first) = parts.first() else {
        return Err(ComposeError::EmptySequence);
    };
    let (sample_rate, channels) = (first.sample_rate, first.channels);
    if let Some(odd) = parts
        .iter()
        .find(|p| p.sample_rate != sample_rate || p.channels != channels)
    {
        return Err(ComposeError::validation(format!(
            "cannot concatenate audio with different layouts: {sample_rate} Hz x{channels} vs {} Hz x{}",
            odd.sample_rate, odd.channels
        )));
    }

    let total: usize = parts.iter().map(|p| p.interleaved_f32.len()).sum();
    let mut interleaved_f32 = Vec::with_capacity(total);
    for p in parts {
        interleaved_f32.extend_from_slice(&p.interleaved_f32);
    }
    Ok(AudioPcm {
        sample_rate,
        channels,
        interleaved_f32,
    })
}

/// Write interleaved samples as raw little-endian f32, creating parent directories.
pub fn write_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> MediaResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes)?;
    Ok(())
}

/// Read a raw little-endian f32 file with a known layout.
pub fn read_f32le_file(path: &Path, sample_rate: u32, channels: u16) -> MediaResult<AudioPcm> {
    if !path.exists() {
        return Err(MediaError::Missing(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    let interleaved_f32 = f32le_bytes_to_samples(&bytes)
        .ok_or_else(|| MediaError::decode(path, "byte length is not aligned to f32 samples"))?;
    if channels == 0 || !interleaved_f32.len().is_multiple_of(usize::from(channels)) {
        return Err(MediaError::decode(
            path,
            format!("sample count is not a whole number of {channels}-channel frames"),
        ));
    }
    Ok(AudioPcm {
        sample_rate,
        channels,
        interleaved_f32,
    })
}

/// Decode little-endian f32 bytes. `None` when the length is not a multiple of four.
pub fn f32le_bytes_to_samples(bytes: &[u8]) -> Option<Vec<f32>> {
    if !bytes.len().is_multiple_of(4) {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/audio/pcm.rs"]
mod tests;

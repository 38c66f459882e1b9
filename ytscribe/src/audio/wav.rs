// audio/wav.rs
//
// Reader for the canonical container produced by the transcoder: a fixed
// 44-byte RIFF/WAVE header followed by mono 16-bit little-endian PCM at 16kHz.
// Anything else is rejected before a single sample is decoded.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const WAV_HEADER_LEN: usize = 44;
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;
pub const CANONICAL_CHANNELS: u16 = 1;
pub const CANONICAL_BITS_PER_SAMPLE: u16 = 16;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("failed to read audio file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV header truncated: {len} bytes, expected at least 44")]
    TruncatedHeader { len: usize },

    #[error("missing RIFF/WAVE magic")]
    BadMagic,

    #[error("unexpected audio format: {channels} channels, {sample_rate} Hz, {bits_per_sample} bits")]
    UnsupportedFormat {
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    },

    #[error("invalid audio data length for 16-bit samples: {len} bytes")]
    OddPayload { len: usize },
}

/// Decoded, normalized samples. Only [`decode_wav`] builds one, so holding a
/// `SampleBuffer` means the source declared 16kHz mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / CANONICAL_SAMPLE_RATE as f64)
    }
}

/// Validate the header and convert the payload to `f32` samples in [-1.0, 1.0).
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, WavError> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(WavError::TruncatedHeader { len: bytes.len() });
    }
    let (header, payload) = bytes.split_at(WAV_HEADER_LEN);

    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(WavError::BadMagic);
    }

    let channels = u16::from_le_bytes([header[22], header[23]]);
    let sample_rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
    let bits_per_sample = u16::from_le_bytes([header[34], header[35]]);

    if channels != CANONICAL_CHANNELS
        || sample_rate != CANONICAL_SAMPLE_RATE
        || bits_per_sample != CANONICAL_BITS_PER_SAMPLE
    {
        return Err(WavError::UnsupportedFormat {
            channels,
            sample_rate,
            bits_per_sample,
        });
    }

    if payload.len() % 2 != 0 {
        return Err(WavError::OddPayload { len: payload.len() });
    }

    let samples = payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(SampleBuffer { samples })
}

/// Read a canonical WAV file from disk and decode it.
pub async fn load_wav_file(path: &Path) -> Result<SampleBuffer, WavError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| WavError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let buffer = decode_wav(&bytes)?;
    log::debug!(
        "Decoded {} samples ({:.1}s) from {}",
        buffer.len(),
        buffer.duration().as_secs_f64(),
        path.display()
    );
    Ok(buffer)
}

/// Build the 44-byte canonical header for `payload_len` bytes of PCM data.
pub fn write_canonical_header(payload_len: u32) -> [u8; WAV_HEADER_LEN] {
    let block_align = CANONICAL_CHANNELS * (CANONICAL_BITS_PER_SAMPLE / 8);
    let byte_rate = CANONICAL_SAMPLE_RATE * block_align as u32;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + payload_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&CANONICAL_CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&CANONICAL_SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&CANONICAL_BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&payload_len.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_with_samples(samples: &[i16]) -> Vec<u8> {
        let mut bytes = write_canonical_header((samples.len() * 2) as u32).to_vec();
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decodes_full_sample_range() {
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        let buffer = decode_wav(&wav_with_samples(&samples)).unwrap();

        assert_eq!(buffer.len(), samples.len());
        for (decoded, original) in buffer.as_slice().iter().zip(&samples) {
            assert_eq!(*decoded, *original as f32 / 32768.0);
        }
        assert_eq!(buffer.as_slice()[0], -1.0);
    }

    #[test]
    fn test_rejects_stereo() {
        let mut bytes = wav_with_samples(&[0, 1, 2, 3]);
        bytes[22..24].copy_from_slice(&2u16.to_le_bytes());

        let err = decode_wav(&bytes).unwrap_err();
        assert!(matches!(err, WavError::UnsupportedFormat { channels: 2, .. }));
    }

    #[test]
    fn test_rejects_44100_hz() {
        let mut bytes = wav_with_samples(&[0, 1]);
        bytes[24..28].copy_from_slice(&44_100u32.to_le_bytes());

        let err = decode_wav(&bytes).unwrap_err();
        assert!(matches!(
            err,
            WavError::UnsupportedFormat { sample_rate: 44_100, .. }
        ));
    }

    #[test]
    fn test_rejects_8_bit() {
        let mut bytes = wav_with_samples(&[0, 1]);
        bytes[34..36].copy_from_slice(&8u16.to_le_bytes());

        assert!(matches!(
            decode_wav(&bytes),
            Err(WavError::UnsupportedFormat { bits_per_sample: 8, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = wav_with_samples(&[0]);
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(decode_wav(&bytes), Err(WavError::BadMagic)));

        let mut bytes = wav_with_samples(&[0]);
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(decode_wav(&bytes), Err(WavError::BadMagic)));
    }

    #[test]
    fn test_rejects_odd_payload() {
        let mut bytes = write_canonical_header(3).to_vec();
        bytes.extend_from_slice(&[0x01, 0x02, 0x03]);

        assert!(matches!(
            decode_wav(&bytes),
            Err(WavError::OddPayload { len: 3 })
        ));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let bytes = write_canonical_header(0);
        assert!(matches!(
            decode_wav(&bytes[..20]),
            Err(WavError::TruncatedHeader { len: 20 })
        ));
    }

    #[test]
    fn test_empty_payload_is_valid() {
        let buffer = decode_wav(&write_canonical_header(0)).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_load_wav_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("speech.wav");
        std::fs::write(&path, wav_with_samples(&[16384; 16_000])).unwrap();

        let buffer = load_wav_file(&path).await.unwrap();
        assert_eq!(buffer.len(), 16_000);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert!(buffer.as_slice().iter().all(|s| *s == 0.5));

        let missing = load_wav_file(&temp_dir.path().join("missing.wav")).await;
        assert!(matches!(missing, Err(WavError::Io { .. })));
    }
}

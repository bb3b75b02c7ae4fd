//! RIFF/WAVE encoding and decoding.
//!
//! [`encode_wav`] writes the one binary format the session exports: 16-bit
//! signed little-endian PCM behind a canonical 44-byte header, produced by
//! `hound::WavWriter`.  The waveform renderer consumes these bytes directly,
//! so the layout of mono and stereo files is fixed:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  file length - 8
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16
//!     20     2  1 (PCM)
//!     22     2  channel count
//!     24     4  sample rate
//!     28     4  sample rate * 2 * channels
//!     32     2  channels * 2
//!     34     2  16
//!     36     4  "data"
//!     40     4  frames * channels * 2
//!     44     …  interleaved i16 samples
//! ```
//!
//! Samples are clamped to `[-1, 1]`; negative values scale by `0x8000`,
//! positive ones by `0x7FFF`, and the result is truncated toward zero.
//!
//! [`decode_wav`] goes the other way for any PCM or float WAV `hound` can
//! read, using the same asymmetric scale so a 16-bit round trip stays within
//! one step of the original.

use std::io::Cursor;

use thiserror::Error;

use crate::audio::pcm::PcmBuffer;

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Errors raised while decoding a WAV container.
#[derive(Debug, Error)]
pub enum WavError {
    /// The bytes are not a WAV container `hound` understands, or the sample
    /// data is truncated / corrupt.
    #[error("failed to decode WAV data: {0}")]
    Decode(#[from] hound::Error),

    /// `hound` refused to write the buffer (e.g. it exceeds the 4 GiB limit).
    #[error("failed to encode WAV data: {0}")]
    Encode(hound::Error),

    /// The container declares zero channels or a zero sample rate.
    #[error("WAV header describes an empty stream ({channels} channels @ {sample_rate} Hz)")]
    EmptyFormat { channels: u16, sample_rate: u32 },
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Quantise one float sample the way the export format requires.
#[inline]
fn to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32_768.0 } else { s * 32_767.0 };
    scaled as i16
}

/// Encode `buffer` as a 16-bit PCM WAV file.
///
/// The output is exactly `44 + frames * channels * 2` bytes for mono and
/// stereo buffers.
pub fn encode_wav(buffer: &PcmBuffer) -> Result<Vec<u8>, WavError> {
    let channels = buffer.num_channels();
    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.len() * channels * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(WavError::Encode)?;
    for frame in 0..buffer.len() {
        for ch in 0..channels {
            writer
                .write_sample(to_i16(buffer.channel(ch)[frame]))
                .map_err(WavError::Encode)?;
        }
    }
    writer.finalize().map_err(WavError::Encode)?;

    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a WAV file held in memory into a planar [`PcmBuffer`].
///
/// Integer formats map back onto `[-1, 1]`: negative values divide by
/// `2^(bits-1)`, positive ones by `2^(bits-1) - 1`.  Float formats pass
/// through.
pub fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer, WavError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(WavError::EmptyFormat {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let negative = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            let positive = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| if v < 0 { v as f32 / negative } else { v as f32 / positive }))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }

    Ok(PcmBuffer::from_channels(planar, spec.sample_rate))
}

/// Read only the header of a WAV file and report its duration in seconds.
///
/// Succeeds even when the sample data itself is corrupt, which is what the
/// upload fallback path relies on.
pub fn probe_duration(bytes: &[u8]) -> Result<f64, WavError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(WavError::EmptyFormat {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        });
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn header_layout_is_canonical() {
        let buf = PcmBuffer::mono(vec![0.0; 10], 44_100);
        let bytes = encode_wav(&buf).expect("encode");

        assert_eq!(bytes.len(), 44 + 20);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), (bytes.len() - 8) as u32);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 22), 1);
        assert_eq!(u32_at(&bytes, 24), 44_100);
        assert_eq!(u32_at(&bytes, 28), 88_200);
        assert_eq!(u16_at(&bytes, 32), 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 20);
    }

    #[test]
    fn stereo_is_interleaved() {
        let buf = PcmBuffer::from_channels(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], 8_000);
        let bytes = encode_wav(&buf).expect("encode");
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(u32_at(&bytes, 28), 8_000 * 4);
        assert_eq!(u16_at(&bytes, 32), 4);

        let samples: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32_767, -32_768, 0, 16_383]);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        assert_eq!(to_i16(2.0), 32_767);
        assert_eq!(to_i16(-3.0), -32_768);
        assert_eq!(to_i16(-0.5), -16_384);
        assert_eq!(to_i16(f32::NAN), 0);
    }

    #[test]
    fn round_trip_within_one_lsb() {
        let samples: Vec<f32> = (0..512)
            .map(|i| (i as f32 * 0.05).sin() * 0.8)
            .collect();
        let buf = PcmBuffer::mono(samples.clone(), 22_050);

        let decoded = decode_wav(&encode_wav(&buf).expect("encode")).expect("decode");
        assert_eq!(decoded.sample_rate(), 22_050);
        assert_eq!(decoded.num_channels(), 1);
        assert_eq!(decoded.len(), samples.len());

        // One step of the positive scale, the coarser of the two.
        let lsb = 1.0 / 32_767.0;
        for (a, b) in samples.iter().zip(decoded.samples()) {
            assert!((a - b).abs() <= lsb, "{a} vs {b}");
        }
    }

    #[test]
    fn probe_reads_duration_from_header() {
        let buf = PcmBuffer::silence(16_000, 8_000);
        let secs = probe_duration(&encode_wav(&buf).expect("encode")).expect("header duration");
        assert!((secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_wav(b"definitely not a wav file").unwrap_err();
        assert!(matches!(err, WavError::Decode(_)), "{err}");
    }

    #[test]
    fn empty_buffer_encodes_header_only() {
        let bytes = encode_wav(&PcmBuffer::silence(0, 44_100)).expect("encode");
        assert_eq!(bytes.len(), 44);
        assert_eq!(u32_at(&bytes, 40), 0);
    }
}

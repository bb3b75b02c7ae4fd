//! Gain staging and offline mixdown of the whole session.

use crate::audio::pcm::PcmBuffer;
use crate::audio::resample::{mix_planar, resample};
use crate::timeline::track::{Track, TrackSet};

/// The gain a track actually plays at.
///
/// Muted tracks are silent, and while any track is soloed only soloed
/// tracks are heard.
pub fn effective_gain(track: &Track, any_solo: bool) -> f32 {
    if track.muted || (any_solo && !track.solo) {
        0.0
    } else {
        track.gain
    }
}

/// Render every placed object at its start time into one mono buffer.
///
/// The result spans from zero to the latest object end.  Samples are summed
/// without limiting; clamping happens at WAV encoding.
pub fn mixdown(tracks: &TrackSet, sample_rate: u32) -> PcmBuffer {
    let rate = sample_rate as f64;
    let total = (tracks.end_time() * rate).ceil() as usize;
    let mut out = vec![0.0_f32; total];
    let any_solo = tracks.any_solo();

    for track in tracks.iter() {
        let gain = effective_gain(track, any_solo);
        if gain == 0.0 {
            continue;
        }
        for object in &track.objects {
            let channels: Vec<&[f32]> = (0..object.buffer.num_channels())
                .map(|c| object.buffer.channel(c))
                .collect();
            let mono = mix_planar(&channels);
            let samples = match resample(&mono, object.buffer.sample_rate(), sample_rate) {
                Ok(samples) => samples,
                Err(e) => {
                    log::warn!("mix: skipping object {}: {e}", object.id);
                    continue;
                }
            };

            let offset = (object.start_time.max(0.0) * rate).round() as usize;
            if offset >= out.len() {
                continue;
            }
            for (dst, src) in out[offset..].iter_mut().zip(&samples) {
                *dst += src * gain;
            }
        }
    }

    log::debug!("mix: {:.2}s at {} Hz", total as f64 / rate, sample_rate);
    PcmBuffer::mono(out, sample_rate)
}

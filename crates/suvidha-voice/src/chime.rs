//! Non-speech UI cues, synthesised to WAV in memory.
//!
//! The success chime is an ascending C-major arpeggio (C5, E5, G5, C6) of
//! triangle-wave notes; the click is a short falling sine blip.

use crate::error::VoiceResult;
use crate::voice_output::AudioSink;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

const SAMPLE_RATE: u32 = 22_050;

/// Overall loudness applied after mixing.
const MASTER_GAIN: f32 = 2.5;

/// `(frequency Hz, start s, duration s)`
const SUCCESS_NOTES: [(f32, f32, f32); 4] = [
    (523.25, 0.0, 0.3),
    (659.25, 0.1, 0.3),
    (783.99, 0.2, 0.5),
    (1046.50, 0.3, 0.6),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Login success / completion.
    Success,
    /// Button feedback.
    Click,
}

/// Render a cue as a mono 16-bit WAV file.
pub fn render(cue: Cue) -> VoiceResult<Vec<u8>> {
    let samples = match cue {
        Cue::Success => success_samples(),
        Cue::Click => click_samples(),
    };
    encode_wav(&samples)
}

fn success_samples() -> Vec<f32> {
    let total = SUCCESS_NOTES
        .iter()
        .map(|(_, start, duration)| start + duration)
        .fold(0.0_f32, f32::max);
    let len = (total * SAMPLE_RATE as f32).ceil() as usize;
    let mut out = vec![0.0_f32; len];

    for (freq, start, duration) in SUCCESS_NOTES {
        let first = (start * SAMPLE_RATE as f32) as usize;
        let count = (duration * SAMPLE_RATE as f32) as usize;
        for i in 0..count {
            let t = i as f32 / SAMPLE_RATE as f32;
            // Linear attack to 0.1 over 50ms, then linear release to silence.
            let envelope = if t < 0.05 {
                0.1 * t / 0.05
            } else {
                0.1 * (1.0 - (t - 0.05) / (duration - 0.05)).max(0.0)
            };
            let phase = (t * freq).fract();
            let triangle = 1.0 - 4.0 * (phase - 0.5).abs();
            if let Some(slot) = out.get_mut(first + i) {
                *slot += triangle * envelope;
            }
        }
    }
    out
}

fn click_samples() -> Vec<f32> {
    let duration = 0.1_f32;
    let len = (duration * SAMPLE_RATE as f32) as usize;
    let mut phase = 0.0_f32;
    (0..len)
        .map(|i| {
            let progress = i as f32 / len as f32;
            // Exponential glide 800 -> 400 Hz, gain 0.1 -> 0.01.
            let freq = 800.0 * 0.5_f32.powf(progress);
            let gain = 0.1 * 0.1_f32.powf(progress);
            phase += 2.0 * PI * freq / SAMPLE_RATE as f32;
            phase.sin() * gain
        })
        .collect()
}

fn encode_wav(samples: &[f32]) -> VoiceResult<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let scaled = (sample * MASTER_GAIN).clamp(-1.0, 1.0) * i16::MAX as f32;
            writer.write_sample(scaled as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Plays cues through an [`AudioSink`]. A new cue cuts off the previous one.
pub struct CuePlayer {
    sink: Arc<dyn AudioSink>,
    current: Mutex<Option<AbortHandle>>,
}

impl CuePlayer {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            current: Mutex::new(None),
        }
    }

    /// Fire-and-forget playback.
    pub fn play(&self, cue: Cue) {
        let audio = match render(cue) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(?cue, error = %e, "failed to render cue");
                return;
            }
        };
        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            if let Err(e) = sink.play(audio).await {
                warn!(?cue, error = %e, "cue playback failed");
            }
        });
        debug!(?cue, "🔔 cue");
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(handle.abort_handle()) {
            previous.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_chime_spans_the_arpeggio() {
        let wav = render(Cue::Success).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        // Last note starts at 0.3s and lasts 0.6s.
        let expected = (0.9 * SAMPLE_RATE as f32).ceil() as u32;
        assert!(reader.duration().abs_diff(expected) <= 1);
    }

    #[test]
    fn click_is_short_and_audible() {
        let samples = click_samples();
        assert_eq!(samples.len(), (0.1 * SAMPLE_RATE as f32) as usize);
        assert!(samples.iter().any(|s| s.abs() > 0.05));
    }
}

use std::{fs::File, path::Path};

use hound::WavWriter;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::{
    error::{AtlasError, Result},
    types::{AudioClip, ANALYSIS_SAMPLE_RATE},
};

fn decode_err(path: &Path, e: impl std::fmt::Display) -> AtlasError {
    AtlasError::Decode(format!("{}: {e}", path.display()))
}

/// Decodes the first `max_duration_secs` of `path` into a mono clip at
/// `ANALYSIS_SAMPLE_RATE`.
pub fn load_clip<P: AsRef<Path>>(path: P, max_duration_secs: f32) -> Result<AudioClip> {
    let path: &Path = path.as_ref();

    let file = File::open(path).map_err(|e| decode_err(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_err(path, e))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err(path, "no supported audio track"))?;
    let track_id = track.id;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err(path, e))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut source_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut limit = usize::MAX;

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!(path = %path.display(), msg, "skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(decode_err(path, e)),
        };

        let spec = *decoded.spec();
        source_rate = spec.rate;
        let channels = spec.channels.count().max(1);
        limit = (max_duration_secs.max(0.0) * source_rate as f32).round() as usize;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        mono.extend(
            buffer
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );

        if mono.len() >= limit {
            break;
        }
    }

    mono.truncate(limit);

    if mono.is_empty() || source_rate == 0 {
        return Err(decode_err(path, "no audio samples decoded"));
    }

    debug!(
        path = %path.display(),
        source_rate,
        samples = mono.len(),
        "decoded clip"
    );

    let mut samples = if source_rate != ANALYSIS_SAMPLE_RATE {
        resample(mono, source_rate, ANALYSIS_SAMPLE_RATE).map_err(|e| decode_err(path, e))?
    } else {
        mono
    };
    let target_limit = (max_duration_secs.max(0.0) * ANALYSIS_SAMPLE_RATE as f32).round() as usize;
    samples.truncate(target_limit);

    Ok(AudioClip {
        samples,
        sample_rate: ANALYSIS_SAMPLE_RATE,
    })
}

fn resample(samples: Vec<f32>, from: u32, to: u32) -> anyhow::Result<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(to as f64 / from as f64, 2.0, params, samples.len(), 1)?;

    let waves_out = resampler.process(&[samples], None)?;
    Ok(waves_out.into_iter().next().unwrap_or_default())
}

/// Writes a mono clip as 16-bit PCM WAV.
pub fn write_audio<P: AsRef<Path>>(path: P, clip: &AudioClip) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(anyhow::Error::from)?;
    for sample in &clip.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s).map_err(anyhow::Error::from)?;
    }

    writer.finalize().map_err(anyhow::Error::from)?;
    Ok(())
}

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Piste choisie dans le conteneur.
struct Track {
    id: u32,
    sample_rate: u32,
    channels: usize,
}

/// Décode un enregistrement en échantillons mono f32, au sample rate natif.
///
/// Supports WAV, MP3, FLAC, OGG, AAC via symphonia. No resampling: the pitch
/// search derives its lags from the returned rate.
///
/// # Errors
/// Returns an error if the file cannot be opened, has no audio track, or
/// decodes to nothing.
///
/// # Example
/// ```no_run
/// use vt_audio::decode::decode_file;
/// let (samples, sample_rate) = decode_file("take.wav").unwrap();
/// ```
pub fn decode_file(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let mut format = open_container(path)?;
    let track = pick_track(format.as_ref())?;
    let mut decoder = make_decoder(format.as_ref(), track.id)?;

    let mono = decode_track(format.as_mut(), decoder.as_mut(), &track);
    if mono.is_empty() {
        anyhow::bail!("Aucun échantillon décodé dans {}", path.display());
    }

    log::info!(
        "{} : {} échantillons mono @ {}Hz ({:.1}s, {} canal(aux) source)",
        path.display(),
        mono.len(),
        track.sample_rate,
        mono.len() as f64 / f64::from(track.sample_rate),
        track.channels
    );
    Ok((mono, track.sample_rate))
}

fn open_container(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file =
        File::open(path).with_context(|| format!("Impossible d'ouvrir {}", path.display()))?;
    let stream = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Format audio non reconnu : {}", path.display()))?;
    Ok(probed.format)
}

fn pick_track(format: &dyn FormatReader) -> Result<Track> {
    let track = format
        .default_track()
        .context("Aucune piste audio par défaut")?;
    let params = &track.codec_params;
    Ok(Track {
        id: track.id,
        sample_rate: params
            .sample_rate
            .context("Sample rate inconnu pour la piste audio")?,
        channels: params.channels.map_or(1, Channels::count).max(1),
    })
}

fn make_decoder(format: &dyn FormatReader, track_id: u32) -> Result<Box<dyn Decoder>> {
    let params = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .map(|t| &t.codec_params)
        .context("Piste audio disparue")?;
    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .context("Codec audio non supporté")
}

/// Decode every packet of `track`, downmixed to mono. Corrupt packets are skipped.
fn decode_track(format: &mut dyn FormatReader, decoder: &mut dyn Decoder, track: &Track) -> Vec<f32> {
    let mut mono = Vec::new();
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Lecture de paquet interrompue : {e}");
                break;
            }
        };
        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Paquet corrompu ignoré : {e}");
                continue;
            }
            Err(e) => {
                log::warn!("Décodage interrompu : {e}");
                break;
            }
        };

        let frames = decoded.capacity() as u64;
        let spec = *decoded.spec();
        // Reallocated only when a packet outgrows the previous one.
        if scratch.as_ref().is_none_or(|b| b.capacity() < decoded.capacity() * spec.channels.count()) {
            scratch = Some(SampleBuffer::new(frames, spec));
        }
        if let Some(buf) = scratch.as_mut() {
            buf.copy_interleaved_ref(decoded);
            downmix_into(&mut mono, buf.samples(), spec.channels.count());
        }
    }
    mono
}

/// Append the mono average of each interleaved frame.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
    );
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// Minimal 16-bit PCM WAV.
    fn write_wav(file: &mut impl Write, sample_rate: u32, channels: u16, samples: &[i16]) {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        file.write_all(b"RIFF").unwrap();
        file.write_all(&(36 + data_len).to_le_bytes()).unwrap();
        file.write_all(b"WAVEfmt ").unwrap();
        file.write_all(&16u32.to_le_bytes()).unwrap();
        file.write_all(&1u16.to_le_bytes()).unwrap();
        file.write_all(&channels.to_le_bytes()).unwrap();
        file.write_all(&sample_rate.to_le_bytes()).unwrap();
        file.write_all(&(sample_rate * u32::from(block_align)).to_le_bytes())
            .unwrap();
        file.write_all(&block_align.to_le_bytes()).unwrap();
        file.write_all(&16u16.to_le_bytes()).unwrap();
        file.write_all(b"data").unwrap();
        file.write_all(&data_len.to_le_bytes()).unwrap();
        for s in samples {
            file.write_all(&s.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = decode_file("/nonexistent/take.wav").unwrap_err();
        assert!(err.to_string().contains("take.wav"));
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        // Left 0.5, right -0.5 → silence; then both 0.5.
        let mut frames = Vec::new();
        frames.extend(std::iter::repeat_n([16384i16, -16384], 100).flatten());
        frames.extend(std::iter::repeat_n([16384i16, 16384], 100).flatten());
        write_wav(file.as_file_mut(), 8000, 2, &frames);

        let (mono, sample_rate) = decode_file(file.path()).unwrap();
        assert_eq!(sample_rate, 8000);
        assert_eq!(mono.len(), 200);
        assert!(mono[..100].iter().all(|s| s.abs() < 1e-3));
        assert!(mono[100..].iter().all(|s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn garbage_is_not_audio() {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(b"definitely not a riff header").unwrap();
        assert!(decode_file(file.path()).is_err());
    }

    #[test]
    fn downmix_averages_frames() {
        let mut out = vec![1.0];
        downmix_into(&mut out, &[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(out.len(), 3);
        assert!((out[1] - 0.3).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);

        downmix_into(&mut out, &[0.7], 1);
        assert_eq!(out.last(), Some(&0.7));
    }
}

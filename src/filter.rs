// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{f64::consts::PI, fs, io, path::Path};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::Error;

/// Converts a hound error for the given file into a crate error.
fn wav_error(path: &Path, e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(source) => Error::filesystem(path, source),
        e => Error::filesystem(path, io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
    }
}

/// A single-pole low-pass filter that runs independently over each interleaved channel.
struct LowPass {
    alpha: f64,
    state: Vec<Option<f64>>,
}

impl LowPass {
    fn new(cutoff_hz: f32, sample_rate: u32, channels: u16) -> LowPass {
        let dt = 1.0 / f64::from(sample_rate.max(1));
        let rc = 1.0 / (2.0 * PI * f64::from(cutoff_hz.max(f32::MIN_POSITIVE)));
        LowPass {
            alpha: dt / (rc + dt),
            state: vec![None; usize::from(channels.max(1))],
        }
    }

    /// Filters the sample at the given interleaved index.
    fn process(&mut self, index: usize, sample: f64) -> f64 {
        let channel = index % self.state.len();
        // Seeding with the first sample keeps the output free of a start-up ramp.
        let previous = self.state[channel].unwrap_or(sample);
        let filtered = previous + self.alpha * (sample - previous);
        self.state[channel] = Some(filtered);
        filtered
    }
}

/// Applies a deterministic low-pass filter to the WAV file at the given path, replacing
/// it in place. The file is left untouched if it can't be read.
pub fn low_pass_in_place(path: &Path, cutoff_hz: f32) -> Result<(), Error> {
    let mut reader = WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    let mut filter = LowPass::new(cutoff_hz, spec.sample_rate, spec.channels);

    let filtered: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .enumerate()
            .map(|(i, s)| s.map(|s| filter.process(i, f64::from(s))))
            .collect::<Result<_, _>>(),
        SampleFormat::Int => reader
            .samples::<i32>()
            .enumerate()
            .map(|(i, s)| s.map(|s| filter.process(i, f64::from(s))))
            .collect::<Result<_, _>>(),
    }
    .map_err(|e| wav_error(path, e))?;
    drop(reader);

    let staging = path.with_extension("filtering");
    if let Err(e) = write_samples(&staging, spec, &filtered) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    fs::rename(&staging, path).map_err(|e| Error::filesystem(path, e))?;

    debug!(
        path = %path.display(),
        samples = filtered.len(),
        cutoff_hz,
        "Applied low-pass filter."
    );
    Ok(())
}

fn write_samples(path: &Path, spec: WavSpec, samples: &[f64]) -> Result<(), Error> {
    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    match spec.sample_format {
        SampleFormat::Float => {
            for sample in samples {
                writer
                    .write_sample(*sample as f32)
                    .map_err(|e| wav_error(path, e))?;
            }
        }
        SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample.clamp(8, 32));
            let max = ((1i64 << (bits - 1)) - 1) as f64;
            let min = -(1i64 << (bits - 1)) as f64;
            for sample in samples {
                writer
                    .write_sample(sample.round().clamp(min, max) as i32)
                    .map_err(|e| wav_error(path, e))?;
            }
        }
    }
    writer.finalize().map_err(|e| wav_error(path, e))
}

mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pcm_pipeline_core::processing::wav_format;
use pcm_pipeline_core::{
    format_duration, CaptureHandle, DeviceClock, EngineConfig, PlaybackHandle, RecordingLibrary,
    SignalSource, VirtualBackend, VirtualDevice,
};

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(&args);

    match args.command {
        Command::Record {
            output,
            seconds,
            tone,
            buffer_size,
            realtime,
        } => record(&output, seconds, tone, buffer_size, realtime),
        Command::Play {
            input,
            buffer_size,
            realtime,
        } => play(&input, buffer_size, realtime),
        Command::Inspect { file } => inspect(&file),
        Command::List { dir } => list(&dir),
        Command::Delete { id, dir } => delete(&dir, &id),
    }
}

/// One buffer period at the engine's sample rate.
fn buffer_period(config: &EngineConfig) -> Duration {
    Duration::from_secs_f64(config.buffer_size as f64 / config.format.sample_rate as f64)
}

fn record(output: &Path, seconds: f64, tone: Option<f64>, buffer_size: usize, realtime: bool) -> Result<()> {
    if seconds.is_nan() || seconds <= 0.0 {
        bail!("--seconds must be positive");
    }
    let source = match tone {
        Some(frequency) => SignalSource::Tone {
            frequency,
            amplitude: 0.5,
        },
        None => SignalSource::Silence,
    };
    let config = EngineConfig::default().with_buffer_size(buffer_size);
    let buffers = (seconds * config.format.sample_rate as f64 / buffer_size as f64).ceil() as usize;
    let period = buffer_period(&config);

    let backend = VirtualBackend::with_source(source);
    let device = backend.device();
    let mut capture = CaptureHandle::new(backend, config);

    if !capture.initialize() || !capture.start(output) {
        bail!("failed to start capture");
    }

    if realtime {
        let mut clock = DeviceClock::start(device, period)?;
        thread::sleep(period * buffers as u32);
        if !capture.stop() {
            bail!("failed to stop capture");
        }
        clock.stop();
    } else {
        for _ in 0..buffers {
            if !device.complete_capture_buffer() {
                log::warn!("Virtual input stalled");
                break;
            }
        }
        if !capture.stop() {
            bail!("failed to stop capture");
        }
    }

    let Some(recording) = capture.engine().last_recording().cloned() else {
        bail!("nothing was captured");
    };
    let diagnostics = capture.engine().diagnostics();
    capture.teardown();

    let library = RecordingLibrary::new(output.parent().unwrap_or(Path::new(".")));
    let metadata = library.register(&recording.path)?;

    println!(
        "Recorded {} samples ({:.3}s) to {}",
        recording.sample_count,
        recording.duration_secs,
        recording.path.display()
    );
    println!(
        "  id {}  callbacks {}  enqueue failures {}",
        metadata.id, diagnostics.callback_count, diagnostics.enqueue_failures
    );
    Ok(())
}

fn play(input: &Path, buffer_size: usize, realtime: bool) -> Result<()> {
    let config = EngineConfig::default().with_buffer_size(buffer_size);
    let period = buffer_period(&config);

    let backend = VirtualBackend::new();
    let device = backend.device();
    let mut playback = PlaybackHandle::new(backend, config);

    if !playback.initialize() || !playback.load(input) || !playback.start() {
        bail!("failed to start playback of {}", input.display());
    }

    if realtime {
        let _clock = DeviceClock::start(device.clone(), period)?;
        while playback.is_active() {
            thread::sleep(period / 4);
        }
    } else {
        drain(&device, &playback);
    }

    let diagnostics = playback.engine().diagnostics();
    let submissions = device.submissions();
    println!(
        "Played {} of {} samples ({:.3}s) from {}",
        device.played_samples().len(),
        playback.engine().loaded_samples(),
        playback.engine().duration_secs(),
        input.display()
    );
    println!(
        "  {} chunks submitted, last {} samples, {} callbacks",
        submissions.len(),
        submissions.last().map_or(0, |c| c.len),
        diagnostics.callback_count
    );
    playback.teardown();
    Ok(())
}

fn drain(device: &VirtualDevice, playback: &PlaybackHandle<VirtualBackend>) {
    while playback.is_active() {
        if !device.complete_playback_chunk() {
            log::warn!("Virtual output stalled");
            break;
        }
    }
}

fn inspect(file: &Path) -> Result<()> {
    let handle = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let header = wav_format::read_header(&mut BufReader::new(handle))?;

    println!("{}", file.display());
    println!("  sample rate      {} Hz", header.sample_rate);
    println!("  channels         {}", header.channels);
    println!("  bits per sample  {}", header.bits_per_sample);
    println!("  data bytes       {}", header.data_size);
    println!("  samples          {}", header.sample_count());
    println!(
        "  duration         {} ({:.3}s)",
        format_duration((header.duration_secs() * 1000.0) as u64),
        header.duration_secs()
    );
    Ok(())
}

fn list(dir: &Path) -> Result<()> {
    let recordings = RecordingLibrary::new(dir).list()?;
    if recordings.is_empty() {
        println!("No recordings in {}", dir.display());
        return Ok(());
    }
    for recording in recordings {
        println!(
            "{}  {}  {:>8}  {:>10} bytes  {}",
            recording.id,
            recording.created_at,
            format_duration(recording.duration_ms),
            recording.file_size,
            recording.name
        );
    }
    Ok(())
}

fn delete(dir: &Path, id: &str) -> Result<()> {
    let removed = RecordingLibrary::new(dir).delete(id)?;
    println!("Deleted {} ({})", removed.name, removed.file_path);
    Ok(())
}

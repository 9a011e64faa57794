//! Concurrent audio capture feeding the visualizer layers.
//!
//! One [`AudioDriver`] per capture device runs a dedicated analysis thread.
//! The cpal stream callback forwards mono-mixed sample chunks over a bounded
//! channel; the thread windows 1024-sample blocks, takes the real-FFT
//! magnitude, and publishes the `(spectrum, volume)` pair under a single
//! short-held lock. Renderers copy snapshots out; no lock is ever held
//! across FFT work or rendering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use realfft::RealFftPlanner;

/// Samples per analysis window.
pub const FFT_BLOCK: usize = 1024;
/// Bins in the published magnitude spectrum (real FFT of [`FFT_BLOCK`]).
pub const SPECTRUM_BINS: usize = FFT_BLOCK / 2 + 1;

/// Consecutive capture errors tolerated before a driver deactivates itself.
const MAX_CONSECUTIVE_ERRORS: u32 = 100;
/// Bounded queue between the stream callback and the analysis thread. The
/// callback drops chunks rather than block when analysis falls behind.
const CHUNK_QUEUE_DEPTH: usize = 32;
const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Latest analysis snapshot: magnitude spectrum plus peak sample volume.
/// Always replaced as a pair, so readers never see a torn combination.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub spectrum: Vec<f32>,
    pub volume: f32,
}

impl Default for AudioData {
    fn default() -> Self {
        Self {
            spectrum: vec![0.0; SPECTRUM_BINS],
            volume: 0.0,
        }
    }
}

/// Continuously-recording capture stream for one device.
pub struct AudioDriver {
    device_id: String,
    shared: Arc<Mutex<AudioData>>,
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AudioDriver {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            shared: Arc::new(Mutex::new(AudioData::default())),
            active: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Whether a capture stream is currently running. A driver whose device
    /// could not be opened, or that exhausted its error budget, reads false.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Launches the capture thread. Calling this while the thread is alive
    /// is a no-op, so re-acquiring a device never restarts capture.
    pub fn start(&self) {
        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return;
        }

        self.stop.store(false, Ordering::SeqCst);
        let device_id = self.device_id.clone();
        let shared = self.shared.clone();
        let active = self.active.clone();
        let stop = self.stop.clone();

        *slot = Some(thread::spawn(move || {
            capture_loop(&device_id, shared, &active, &stop);
            active.store(false, Ordering::SeqCst);
        }));
    }

    /// Signals the capture thread to exit and waits a bounded time for it.
    /// A thread stuck inside a blocking device call is left to finish on
    /// its own; stopping is best-effort.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = {
            let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };

        if let Some(handle) = handle {
            let deadline = std::time::Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!(device = %self.device_id, "capture thread did not stop in time; detaching");
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns a consistent snapshot copy of the latest spectrum/volume
    /// pair. Never aliases the live buffers.
    pub fn get_data(&self) -> AudioData {
        self.shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for AudioDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDriver")
            .field("device_id", &self.device_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Resolves the capture device: exact name match first, then the default
/// input, then any available input.
fn resolve_device(host: &cpal::Host, device_id: &str) -> Option<cpal::Device> {
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if device.name().map(|n| n == device_id).unwrap_or(false) {
                return Some(device);
            }
        }
    }
    if let Some(device) = host.default_input_device() {
        return Some(device);
    }
    host.input_devices().ok().and_then(|mut d| d.next())
}

fn capture_loop(
    device_id: &str,
    shared: Arc<Mutex<AudioData>>,
    active: &AtomicBool,
    stop: &AtomicBool,
) {
    let host = cpal::default_host();
    let Some(device) = resolve_device(&host, device_id) else {
        tracing::warn!(device = %device_id, "no capture device available");
        return;
    };

    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(device = %device_id, %err, "no supported input config");
            return;
        }
    };

    let channels = config.channels() as usize;
    if channels == 0 {
        tracing::warn!(device = %device_id, "device reported zero channels");
        return;
    }

    let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(CHUNK_QUEUE_DEPTH);
    let error_count = Arc::new(AtomicU32::new(0));

    let stream = match build_stream(&device, &config, channels, tx, error_count.clone()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(device = %device_id, %err, "failed to build capture stream");
            return;
        }
    };

    if let Err(err) = stream.play() {
        tracing::warn!(device = %device_id, %err, "failed to start capture stream");
        return;
    }

    active.store(true, Ordering::SeqCst);
    tracing::debug!(device = %device_id, channels, "capture started");

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_BLOCK);
    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();
    let window = hann_window(FFT_BLOCK);
    let mut pending: Vec<f32> = Vec::with_capacity(FFT_BLOCK * 2);

    while !stop.load(Ordering::SeqCst) {
        if error_count.load(Ordering::SeqCst) > MAX_CONSECUTIVE_ERRORS {
            tracing::warn!(device = %device_id, "too many capture errors; stopping driver");
            break;
        }

        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(chunk) => pending.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while pending.len() >= FFT_BLOCK {
            let block: Vec<f32> = pending.drain(..FFT_BLOCK).collect();
            let volume = block.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

            for (slot, (sample, w)) in input.iter_mut().zip(block.iter().zip(window.iter())) {
                *slot = sample * w;
            }

            if let Err(err) = fft.process_with_scratch(&mut input, &mut spectrum, &mut scratch) {
                tracing::warn!(device = %device_id, %err, "fft failed");
                error_count.fetch_add(1, Ordering::SeqCst);
                continue;
            }

            let magnitudes: Vec<f32> = spectrum.iter().map(|bin| bin.norm()).collect();
            {
                let mut data = shared.lock().unwrap_or_else(|e| e.into_inner());
                data.spectrum = magnitudes;
                data.volume = volume;
            }
            error_count.store(0, Ordering::SeqCst);
        }
    }

    drop(stream);
    tracing::debug!(device = %device_id, "capture stopped");
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    channels: usize,
    tx: SyncSender<Vec<f32>>,
    error_count: Arc<AtomicU32>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let stream_config: cpal::StreamConfig = config.config();
    let err_fn = move |err| {
        tracing::warn!(%err, "capture stream error");
        error_count.fetch_add(1, Ordering::SeqCst);
    };

    match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward_mono(data, channels, &tx);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|s| *s as f32 / 32768.0).collect();
                forward_mono(&floats, channels, &tx);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> =
                    data.iter().map(|s| (*s as f32 - 32768.0) / 32768.0).collect();
                forward_mono(&floats, channels, &tx);
            },
            err_fn,
            None,
        ),
        other => {
            tracing::warn!(?other, "unsupported sample format");
            Err(cpal::BuildStreamError::StreamConfigNotSupported)
        }
    }
}

/// Mixes interleaved frames down to mono and ships them to the analysis
/// thread. `try_send` keeps the realtime callback from ever blocking; a
/// full queue just drops the chunk.
fn forward_mono(data: &[f32], channels: usize, tx: &SyncSender<Vec<f32>>) {
    if data.is_empty() {
        return;
    }
    let mono: Vec<f32> = if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };
    let _ = tx.try_send(mono);
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * ((2.0 * std::f32::consts::PI * i as f32) / (len as f32 - 1.0)).cos())
        .collect()
}

struct DriverEntry {
    driver: Arc<AudioDriver>,
    ref_count: usize,
}

/// Reference-counted pool of drivers keyed by device identity. A driver is
/// started on first acquire and stopped on last release. The registry is an
/// explicit handle passed into the render context, never a process global.
#[derive(Default)]
pub struct AudioRegistry {
    drivers: Mutex<HashMap<String, DriverEntry>>,
}

impl AudioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the device's driver, creating and starting it on
    /// first reference. Subsequent acquires only bump the count.
    pub fn acquire(&self, device_id: &str) -> Arc<AudioDriver> {
        let mut drivers = self.drivers.lock().unwrap_or_else(|e| e.into_inner());
        let entry = drivers
            .entry(device_id.to_string())
            .or_insert_with(|| DriverEntry {
                driver: Arc::new(AudioDriver::new(device_id)),
                ref_count: 0,
            });
        entry.ref_count += 1;
        entry.driver.start();
        entry.driver.clone()
    }

    /// Drops one reference; at zero the driver is stopped and removed.
    pub fn release(&self, device_id: &str) {
        let removed = {
            let mut drivers = self.drivers.lock().unwrap_or_else(|e| e.into_inner());
            match drivers.get_mut(device_id) {
                Some(entry) => {
                    entry.ref_count = entry.ref_count.saturating_sub(1);
                    if entry.ref_count == 0 {
                        drivers.remove(device_id)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        // Stop outside the map lock so a slow join cannot stall acquires.
        if let Some(entry) = removed {
            entry.driver.stop();
        }
    }

    /// Current reference count for a device, if it is pooled.
    pub fn ref_count(&self, device_id: &str) -> Option<usize> {
        let drivers = self.drivers.lock().unwrap_or_else(|e| e.into_inner());
        drivers.get(device_id).map(|entry| entry.ref_count)
    }

    pub fn len(&self) -> usize {
        let drivers = self.drivers.lock().unwrap_or_else(|e| e.into_inner());
        drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops every pooled driver and clears the map.
    pub fn shutdown(&self) {
        let entries: Vec<DriverEntry> = {
            let mut drivers = self.drivers.lock().unwrap_or_else(|e| e.into_inner());
            drivers.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.driver.stop();
        }
    }
}

impl Drop for AudioRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AudioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRegistry")
            .field("drivers", &self.len())
            .finish()
    }
}

/// Names of every available capture device, for UI pickers and the
/// visualizer layer's device parameter. Enumeration failures yield an
/// empty list rather than an error.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(err) => {
            tracing::debug!(%err, "could not enumerate capture devices");
            Vec::new()
        }
    }
}

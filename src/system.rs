//! Surveillance orchestrator.
//!
//! `SurveillanceSystem` owns the camera registry plus one context per
//! camera (motion detector, 3A controller, recorder, display snapshots)
//! and supervises one monitoring worker thread per camera.
//!
//! Lifecycle: `start` launches a worker for every currently-registered
//! camera; `stop` clears the shared running flag, joins every worker,
//! then force-stops every recorder. The running flag is the single
//! cancellation signal — workers observe it with acquire loads, `stop`
//! publishes with a release store, so a returned `stop` guarantees no
//! worker is still touching camera state.
//!
//! Display paths never query a camera or detector directly: each worker
//! publishes a frame snapshot and the latest motion regions into its
//! context, and readers clone those under short-lived locks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::camera::SharedCamera;
use crate::frame::{Frame, Rect};
use crate::imgproc;
use crate::motion::MotionDetector;
use crate::record::{Codec, VideoRecorder};
use crate::registry::CameraRegistry;
use crate::tuning::ThreeAController;

const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];
const OVERLAY_THICKNESS: u32 = 2;

/// Worker-loop timing.
#[derive(Clone, Copy, Debug)]
pub struct MonitorPacing {
    /// Delay between loop iterations.
    pub frame_interval: Duration,
    /// Back-off after a failed capture before retrying.
    pub capture_retry: Duration,
}

impl Default for MonitorPacing {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            capture_retry: Duration::from_millis(100),
        }
    }
}

/// Per-camera pipeline state, shared between the owning worker and
/// display/control paths.
struct CameraContext {
    detector: Mutex<MotionDetector>,
    tuner: Mutex<ThreeAController>,
    recorder: Mutex<VideoRecorder>,
    last_frame: Mutex<Frame>,
    last_regions: Mutex<Vec<Rect>>,
    motion_enabled: AtomicBool,
}

impl CameraContext {
    fn new() -> Self {
        Self {
            detector: Mutex::new(MotionDetector::default()),
            tuner: Mutex::new(ThreeAController::new()),
            recorder: Mutex::new(VideoRecorder::new()),
            last_frame: Mutex::new(Frame::empty()),
            last_regions: Mutex::new(Vec::new()),
            motion_enabled: AtomicBool::new(false),
        }
    }
}

/// Top-level controller for N independent camera pipelines.
pub struct SurveillanceSystem {
    registry: CameraRegistry,
    contexts: Mutex<HashMap<String, Arc<CameraContext>>>,
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<(String, JoinHandle<()>)>>,
    pacing: MonitorPacing,
}

impl SurveillanceSystem {
    pub fn new() -> Self {
        Self::with_pacing(MonitorPacing::default())
    }

    pub fn with_pacing(pacing: MonitorPacing) -> Self {
        Self {
            registry: CameraRegistry::new(),
            contexts: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            pacing,
        }
    }

    pub fn registry(&self) -> &CameraRegistry {
        &self.registry
    }

    /// Register a camera and create its default-configured pipeline
    /// context. Fails when the id is already registered.
    pub fn add_camera(&self, camera: SharedCamera) -> Result<()> {
        let id = {
            let guard = camera
                .lock()
                .map_err(|_| anyhow!("camera lock poisoned"))?;
            guard.id().to_string()
        };
        self.registry.add(camera)?;
        self.lock_contexts()?
            .insert(id.clone(), Arc::new(CameraContext::new()));
        log::info!("camera '{}' added to surveillance system", id);
        Ok(())
    }

    /// Stop any active recording, discard the pipeline context, then
    /// unregister the camera.
    pub fn remove_camera(&self, id: &str) -> Result<()> {
        if let Some(context) = self.context(id) {
            let Ok(mut recorder) = context.recorder.lock() else {
                return Err(anyhow!("recorder lock poisoned for camera '{}'", id));
            };
            recorder.stop_recording()?;
        }
        self.lock_contexts()?.remove(id);
        self.registry.remove(id)
    }

    /// Turn the motion stage on for a camera with the given threshold.
    pub fn enable_motion_detection(&self, id: &str, threshold: i32) -> Result<()> {
        let context = self
            .context(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        {
            let Ok(mut detector) = context.detector.lock() else {
                return Err(anyhow!("detector lock poisoned for camera '{}'", id));
            };
            detector.set_threshold(threshold);
        }
        context.motion_enabled.store(true, Ordering::Release);
        log::info!("motion detection enabled for camera '{}'", id);
        Ok(())
    }

    /// Set the minimum region area for a camera's motion detector.
    pub fn set_motion_min_area(&self, id: &str, min_area: f64) -> Result<()> {
        let context = self
            .context(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        let Ok(mut detector) = context.detector.lock() else {
            return Err(anyhow!("detector lock poisoned for camera '{}'", id));
        };
        detector.set_min_area(min_area);
        Ok(())
    }

    /// Turn the motion stage off and drop its baseline.
    pub fn disable_motion_detection(&self, id: &str) -> Result<()> {
        let context = self
            .context(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        context.motion_enabled.store(false, Ordering::Release);
        {
            let Ok(mut detector) = context.detector.lock() else {
                return Err(anyhow!("detector lock poisoned for camera '{}'", id));
            };
            detector.reset();
        }
        if let Ok(mut regions) = context.last_regions.lock() {
            regions.clear();
        }
        log::info!("motion detection disabled for camera '{}'", id);
        Ok(())
    }

    /// Start recording a camera at its nominal resolution and frame rate.
    pub fn start_recording(&self, id: &str, path: &Path) -> Result<()> {
        let camera = self
            .registry
            .get(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        let (frame_size, fps) = {
            let guard = camera
                .lock()
                .map_err(|_| anyhow!("camera lock poisoned"))?;
            (guard.resolution(), guard.fps())
        };
        self.start_recording_with(id, path, fps, frame_size, Codec::Mjpeg)
    }

    /// Start recording with explicit parameters.
    pub fn start_recording_with(
        &self,
        id: &str,
        path: &Path,
        fps: u32,
        frame_size: (u32, u32),
        codec: Codec,
    ) -> Result<()> {
        let context = self
            .context(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        let Ok(mut recorder) = context.recorder.lock() else {
            return Err(anyhow!("recorder lock poisoned for camera '{}'", id));
        };
        recorder.start_recording(path, fps, frame_size, codec)
    }

    /// Stop a camera's recording. Success when none was active.
    pub fn stop_recording(&self, id: &str) -> Result<()> {
        let context = self
            .context(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        let Ok(mut recorder) = context.recorder.lock() else {
            return Err(anyhow!("recorder lock poisoned for camera '{}'", id));
        };
        recorder.stop_recording()
    }

    pub fn is_recording(&self, id: &str) -> bool {
        self.context(id)
            .and_then(|c| c.recorder.lock().ok().map(|r| r.is_recording()))
            .unwrap_or(false)
    }

    /// Launch one monitoring worker per registered camera.
    /// Fails without side effects when already running.
    pub fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(anyhow!("surveillance system already running"));
        }

        let ids = self.registry.ids();
        let mut workers = self
            .workers
            .lock()
            .map_err(|_| anyhow!("worker table lock poisoned"))?;
        for id in &ids {
            let Some(camera) = self.registry.get(id) else {
                continue;
            };
            let Some(context) = self.context(id) else {
                continue;
            };
            let running = Arc::clone(&self.running);
            let pacing = self.pacing;
            let worker_id = id.clone();
            let handle = std::thread::Builder::new()
                .name(format!("monitor-{}", id))
                .spawn(move || monitor_camera(worker_id, camera, context, running, pacing))
                .map_err(|e| anyhow!("failed to spawn monitor for '{}': {}", id, e))?;
            workers.push((id.clone(), handle));
        }

        log::info!("surveillance system started with {} cameras", ids.len());
        Ok(())
    }

    /// Clear the running flag, wait for every worker to exit, then
    /// force-stop every recorder. Idempotent.
    pub fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);

        let drained: Vec<(String, JoinHandle<()>)> = {
            let mut workers = self
                .workers
                .lock()
                .map_err(|_| anyhow!("worker table lock poisoned"))?;
            workers.drain(..).collect()
        };
        for (id, handle) in drained {
            if handle.join().is_err() {
                log::warn!("monitor worker for camera '{}' panicked", id);
            }
        }

        let contexts: Vec<Arc<CameraContext>> =
            self.lock_contexts()?.values().cloned().collect();
        for context in contexts {
            if let Ok(mut recorder) = context.recorder.lock() {
                if let Err(e) = recorder.stop_recording() {
                    log::warn!("failed to stop recorder during shutdown: {}", e);
                }
            }
        }

        log::info!("surveillance system stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Snapshot of the most recent frame published by a camera's worker.
    pub fn latest_frame(&self, id: &str) -> Option<Frame> {
        let context = self.context(id)?;
        let frame = context.last_frame.lock().ok()?.clone();
        if frame.is_empty() {
            None
        } else {
            Some(frame)
        }
    }

    /// The motion regions reported by the most recent detector pass.
    pub fn motion_regions(&self, id: &str) -> Vec<Rect> {
        self.context(id)
            .and_then(|c| c.last_regions.lock().ok().map(|r| r.clone()))
            .unwrap_or_default()
    }

    /// Latest frame with the current motion regions drawn on it.
    pub fn annotated_frame(&self, id: &str) -> Option<Frame> {
        let mut frame = self.latest_frame(id)?;
        for region in self.motion_regions(id) {
            imgproc::draw_rect(&mut frame, region, OVERLAY_COLOR, OVERLAY_THICKNESS);
        }
        Some(frame)
    }

    fn context(&self, id: &str) -> Option<Arc<CameraContext>> {
        self.lock_contexts().ok()?.get(id).cloned()
    }

    fn lock_contexts(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<CameraContext>>>> {
        self.contexts
            .lock()
            .map_err(|_| anyhow!("context table lock poisoned"))
    }
}

impl Default for SurveillanceSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SurveillanceSystem {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("surveillance system drop: {}", e);
        }
    }
}

/// Per-camera monitoring loop. Runs until the shared running flag is
/// cleared, then disconnects the camera.
fn monitor_camera(
    id: String,
    camera: SharedCamera,
    context: Arc<CameraContext>,
    running: Arc<AtomicBool>,
    pacing: MonitorPacing,
) {
    {
        let Ok(mut cam) = camera.lock() else {
            log::error!("camera '{}' lock poisoned before connect", id);
            return;
        };
        if let Err(e) = cam.connect() {
            log::error!("camera '{}' failed to connect: {}", id, e);
            return;
        }
    }
    log::info!("monitoring started for camera '{}'", id);

    while running.load(Ordering::Acquire) {
        let frame = {
            let Ok(mut cam) = camera.lock() else { break };
            if !cam.capture_frame() {
                drop(cam);
                log::warn!("camera '{}' failed to capture frame", id);
                std::thread::sleep(pacing.capture_retry);
                continue;
            }
            cam.frame()
        };
        if frame.is_empty() {
            continue;
        }

        let mut working = frame;

        {
            let Ok(mut tuner) = context.tuner.lock() else { break };
            tuner.tune(&working);
            if tuner.awb_settings().enabled {
                tuner.apply_white_balance(&mut working);
            }
        }

        let mut regions = Vec::new();
        if context.motion_enabled.load(Ordering::Acquire) {
            let analysis = {
                let Ok(mut detector) = context.detector.lock() else { break };
                detector.process(&working)
            };
            if analysis.motion_detected {
                log::info!(
                    "motion detected on camera '{}' ({} regions)",
                    id,
                    analysis.regions.len()
                );
                for region in &analysis.regions {
                    imgproc::draw_rect(&mut working, *region, OVERLAY_COLOR, OVERLAY_THICKNESS);
                }
            }
            regions = analysis.regions;
        }

        if let Ok(mut last) = context.last_frame.lock() {
            *last = working.clone();
        }
        if let Ok(mut last) = context.last_regions.lock() {
            *last = regions;
        }

        {
            let Ok(mut recorder) = context.recorder.lock() else { break };
            if recorder.is_recording() {
                if let Err(e) = recorder.write_frame(&working) {
                    log::warn!("camera '{}' failed to record frame: {}", id, e);
                }
            }
        }

        std::thread::sleep(pacing.frame_interval);
    }

    if let Ok(mut cam) = camera.lock() {
        if let Err(e) = cam.disconnect() {
            log::warn!("camera '{}' failed to disconnect: {}", id, e);
        }
    }
    log::info!("monitoring stopped for camera '{}'", id);
}

//! Capture → detect → archive → publish
//!
//! The loop is strictly sequential: one frame is read, possibly analysed,
//! possibly archived, and only then is the next frame read. Two rate limits
//! apply in series. The detection interval bounds how often the model runs
//! and the change filter bounds how often anything is archived.

use crate::detector::Detector;
use crate::error::EyeError;
use crate::filter::{ChangeFilter, Verdict};
use crate::frame::{Frame, FrameSource};
use crate::preview::{NoPreview, Preview, PreviewControl};
use crate::scratch::ScratchFile;
use chrono::Local;
use moodcam_archive::Archive;
use moodcam_core::{ArchivedRecord, Detection, DetectionConfig, LatestSlot, LatestState, RawDetection};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What a single processed frame led to.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Too soon after the previous detector run
    Throttled,
    /// Detector ran; nothing reached the confidence threshold
    NoCandidate,
    /// Detector ran; the candidate matched the last published detection
    Duplicate { label: String, confidence: f64 },
    /// New state published. `inserted` is false when the log insert failed.
    Published { record: ArchivedRecord, inserted: bool },
    /// Novel detection dropped because its frame could not be stored
    ArchiveSkipped { label: String, reason: String },
}

/// Why the loop ended without an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Capture device failed or ran out of frames
    DeviceLost(String),
    /// Quit key in the preview or an explicit stop request
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub detector_runs: u64,
    pub duplicates: u64,
    pub published: u64,
    pub archive_failures: u64,
}

/// Cooperative stop request shared with whoever owns the loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DetectionLoop<S, D> {
    source: S,
    detector: D,
    filter: ChangeFilter,
    archive: Arc<dyn Archive>,
    latest: LatestSlot,
    runtime: Handle,
    interval: Duration,
    scratch_dir: PathBuf,
    preview: Box<dyn Preview>,
    stop: StopSignal,
    last_attempt: Option<Instant>,
    last_detections: Vec<RawDetection>,
    stats: LoopStats,
}

impl<S: FrameSource, D: Detector> DetectionLoop<S, D> {
    /// `runtime` drives the async archive calls; the loop itself must run
    /// outside of that runtime's worker threads.
    pub fn new(
        source: S,
        detector: D,
        archive: Arc<dyn Archive>,
        latest: LatestSlot,
        runtime: Handle,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            source,
            detector,
            filter: ChangeFilter::from_config(config),
            archive,
            latest,
            runtime,
            interval: config.interval(),
            scratch_dir: config.scratch_dir.clone(),
            preview: Box::new(NoPreview),
            stop: StopSignal::new(),
            last_attempt: None,
            last_detections: Vec::new(),
            stats: LoopStats::default(),
        }
    }

    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = preview;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Run until the device fails, a quit is requested, or the model errors.
    pub fn run(&mut self) -> Result<StopReason, EyeError> {
        info!(
            "Detection loop started (interval {:?}, archive {})",
            self.interval,
            self.archive.name()
        );

        let result = self.run_until_stopped();

        self.source.release();
        self.preview.close();

        match &result {
            Ok(reason) => info!("Detection loop stopped: {:?} ({:?})", reason, self.stats),
            Err(e) => error!("Detection loop failed: {} ({:?})", e, self.stats),
        }
        result
    }

    fn run_until_stopped(&mut self) -> Result<StopReason, EyeError> {
        loop {
            if self.stop.is_stopped() {
                return Ok(StopReason::Quit);
            }

            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Capture device unavailable: {}", e);
                    return Ok(StopReason::DeviceLost(e.to_string()));
                }
            };
            self.stats.frames += 1;

            let outcome = self.process_frame(&frame, Instant::now())?;
            debug!(?outcome, "Frame processed");

            if self.preview.show(&frame, &self.last_detections)? == PreviewControl::Quit {
                return Ok(StopReason::Quit);
            }
        }
    }

    /// One pass through the state machine for an already captured frame.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> Result<TickOutcome, EyeError> {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.interval {
                return Ok(TickOutcome::Throttled);
            }
        }
        self.last_attempt = Some(now);

        let detections = self.detector.detect(frame)?;
        self.stats.detector_runs += 1;

        let verdict = self.filter.evaluate(&detections);
        self.last_detections = detections;

        match verdict {
            Verdict::NoCandidate => Ok(TickOutcome::NoCandidate),
            Verdict::Duplicate(d) => {
                self.stats.duplicates += 1;
                Ok(TickOutcome::Duplicate {
                    label: d.label,
                    confidence: d.confidence,
                })
            }
            Verdict::Novel(candidate) => Ok(self.archive_and_publish(frame, candidate)),
        }
    }

    fn archive_and_publish(&mut self, frame: &Frame, candidate: RawDetection) -> TickOutcome {
        let detection = Detection::new(candidate.label.clone(), candidate.confidence, Local::now());

        let image_url = match self.stage_and_upload(frame) {
            Ok(url) => url,
            Err(e) => {
                self.stats.archive_failures += 1;
                warn!(emotion = %detection.label, "Skipping archive for this tick: {}", e);
                return TickOutcome::ArchiveSkipped {
                    label: detection.label,
                    reason: e.to_string(),
                };
            }
        };

        let record = ArchivedRecord::new(&detection, image_url);
        let inserted = match self.runtime.block_on(self.archive.insert_record(&record)) {
            Ok(()) => true,
            Err(e) => {
                self.stats.archive_failures += 1;
                warn!(emotion = %record.emotion, "Log insert failed, publishing anyway: {}", e);
                false
            }
        };

        self.latest.publish(LatestState::from(&record));
        self.filter.accept(&candidate);
        self.stats.published += 1;

        info!(
            emotion = %record.emotion,
            confidence = record.confidence,
            timestamp = %record.timestamp,
            "Emotion: {} ({:.2})",
            record.emotion,
            record.confidence
        );

        TickOutcome::Published { record, inserted }
    }

    /// Encode the frame to a scratch JPEG and upload it. The scratch file is
    /// gone once this returns, whatever the upload did.
    fn stage_and_upload(&self, frame: &Frame) -> Result<String, EyeError> {
        let scratch = ScratchFile::new(&self.scratch_dir);
        frame.write_jpeg(scratch.path())?;
        let url = self.runtime.block_on(self.archive.upload_image(scratch.path()))?;
        Ok(url)
    }
}

/// Whether the detection thread is still alive.
#[derive(Debug, Clone)]
pub struct LoopStatus(watch::Receiver<bool>);

impl LoopStatus {
    pub fn is_running(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the detection thread has finished, however it ended.
    pub async fn stopped(mut self) {
        // a closed channel also means the thread is gone
        let _ = self.0.wait_for(|running| !*running).await;
    }
}

/// Flips the status to stopped when the thread exits, including by panic.
struct RunningGuard(watch::Sender<bool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Owner side of a loop running on its own thread.
pub struct DetectionHandle {
    stop: StopSignal,
    status: LoopStatus,
    thread: JoinHandle<Result<StopReason, EyeError>>,
}

impl DetectionHandle {
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn status(&self) -> LoopStatus {
        self.status.clone()
    }

    /// Wait for the thread; blocks for as long as an in-flight upload takes.
    pub fn join(self) -> Result<StopReason, EyeError> {
        self.thread.join().map_err(|_| EyeError::Panicked)?
    }
}

/// Move the loop onto a dedicated `detection-loop` thread.
pub fn spawn_detection_loop<S, D>(mut detection: DetectionLoop<S, D>) -> Result<DetectionHandle, EyeError>
where
    S: FrameSource + Send + 'static,
    D: Detector + Send + 'static,
{
    let stop = detection.stop_signal();
    let (running, status) = watch::channel(true);
    let guard = RunningGuard(running);

    let thread = std::thread::Builder::new()
        .name("detection-loop".to_string())
        .spawn(move || {
            let _guard = guard;
            detection.run()
        })?;

    Ok(DetectionHandle {
        stop,
        status: LoopStatus(status),
        thread,
    })
}

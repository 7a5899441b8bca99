use crate::capture::{FrameClock, FrameSource, FrameTimestamp, SamplingMode};
use crate::config::DosimeterConfig;
use crate::detection::{
    color_test, Calibration, CalibrationState, Calibrator, Crop, FrameSampler, RegionExtractor,
    SampleLayout,
};
use crate::error::{CalibrationError, FrameFailure, GeometryError, PipelineError};
use crate::output::{CropArchive, FrameRecord, ResultSink};
use anyhow::Result;
use image::RgbImage;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Calibrating,
    Ready,
    /// Number of frames processed so far
    Sampling(u64),
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: SamplingMode,
    /// Overrides the source's own frame rate
    pub fps: Option<u32>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Full,
            fps: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub skipped_by_filter: u64,
    pub sampled: u64,
    pub not_localized: u64,
    pub decode_failures: u64,
    pub baseline: Option<[u8; 3]>,
}

impl RunSummary {
    pub fn failures(&self) -> u64 {
        self.not_localized + self.decode_failures
    }
}

/// Calibrates once, derives the sample layout once, then samples frames.
///
/// Calibration and layout are write-once; sampling only reads them.
pub struct Pipeline<E> {
    config: DosimeterConfig,
    extractor: E,
    calibration: CalibrationState,
    layout: OnceLock<SampleLayout>,
    state: PipelineState,
    summary: RunSummary,
}

impl<E: RegionExtractor> Pipeline<E> {
    pub fn new(config: DosimeterConfig, extractor: E) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            calibration: CalibrationState::new(),
            layout: OnceLock::new(),
            state: PipelineState::Uninitialized,
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &DosimeterConfig {
        &self.config
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.get()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn transition(&mut self, next: PipelineState) {
        if matches!(next, PipelineState::Sampling(_))
            && matches!(self.state, PipelineState::Sampling(_))
        {
            self.state = next;
            return;
        }
        tracing::debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Enter `Failed` and hand the error back for propagation
    pub fn fail(&mut self, err: impl Into<PipelineError>) -> PipelineError {
        let err = err.into();
        tracing::error!("{}", err);
        self.transition(PipelineState::Failed);
        err
    }

    /// Locate the dosimeter on the representative frame.
    ///
    /// Once calibrated, later calls return the stored calibration unchanged.
    pub fn calibrate(&mut self, frame: &RgbImage) -> Result<Calibration, PipelineError> {
        if let Some(existing) = self.calibration.get() {
            return Ok(*existing);
        }

        self.transition(PipelineState::Calibrating);
        let calibrator =
            Calibrator::new(&self.extractor, color_test(&self.config), self.config.size);
        match calibrator.calibrate(frame, &self.calibration) {
            Ok(calibration) => {
                self.transition(PipelineState::Ready);
                Ok(calibration)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Derive testing and baseline points from the calibrated size
    pub fn prepare_layout(&mut self) -> Result<&SampleLayout, PipelineError> {
        if self.layout.get().is_none() {
            let (width, height) = self
                .calibration
                .get()
                .map_or((0, 0), |c| (c.width(), c.height()));

            match SampleLayout::derive(width, height, &self.config.geometry) {
                Ok(layout) => {
                    tracing::info!(
                        "Sample layout for {}x{}: {} testing, {} baseline points, jitter {}",
                        width,
                        height,
                        layout.testing().len(),
                        layout.baseline().len(),
                        layout.tolerance()
                    );
                    tracing::debug!("Testing points {:?}", layout.testing());
                    tracing::debug!("Baseline points {:?}", layout.baseline());
                    let _ = self.layout.set(layout);
                }
                Err(err) => return Err(self.fail(err)),
            }
        }

        self.layout
            .get()
            .ok_or(PipelineError::Geometry(GeometryError::ZeroDimension {
                width: 0,
                height: 0,
            }))
    }

    /// Mean baseline-ring color of the calibrated region in `frame`
    pub fn baseline(&mut self, frame: &RgbImage) -> Option<[u8; 3]> {
        let calibration = self.calibration.get()?;
        let layout = self.layout.get()?;
        let crop = Crop::new(frame, calibration.region)?;

        let (rgb, skipped) = crop.mean_at(layout.baseline());
        if skipped > 0 {
            tracing::warn!("{} baseline points fell outside the calibration crop", skipped);
        }
        self.summary.baseline = rgb;
        rgb
    }

    /// Sample one frame that passed the sampling filter.
    ///
    /// Every failure is recovered here and becomes a sentinel record.
    pub fn process(
        &mut self,
        timestamp: FrameTimestamp,
        decoded: Result<RgbImage>,
        crops: Option<&CropArchive>,
    ) -> FrameRecord {
        let outcome = match decoded {
            Ok(frame) => self.sample(&frame, &timestamp, crops),
            Err(e) => Err(FrameFailure::Decode(format!("{e:#}"))),
        };

        let processed = match self.state {
            PipelineState::Sampling(n) => n + 1,
            _ => 1,
        };
        self.transition(PipelineState::Sampling(processed));

        let rgb = match outcome {
            Ok(rgb) => {
                self.summary.sampled += 1;
                Some(rgb)
            }
            Err(failure) => {
                match failure {
                    FrameFailure::Decode(_) => self.summary.decode_failures += 1,
                    _ => self.summary.not_localized += 1,
                }
                tracing::warn!("Frame {}: {}", timestamp, failure);
                None
            }
        };

        FrameRecord { timestamp, rgb }
    }

    fn sample(
        &self,
        frame: &RgbImage,
        timestamp: &FrameTimestamp,
        crops: Option<&CropArchive>,
    ) -> Result<[u8; 3], FrameFailure> {
        let (Some(calibration), Some(layout)) = (self.calibration.get(), self.layout.get()) else {
            return Err(FrameFailure::NotCalibrated);
        };

        let sampler =
            FrameSampler::new(&self.extractor, calibration, color_test(&self.config), layout);
        let sampled = sampler.sample(frame)?;

        tracing::debug!(
            "Frame {}: dosimeter at ({}, {}) {}x{}, rgb {:?}, {} points outside crop",
            timestamp,
            sampled.crop.rect().left(),
            sampled.crop.rect().top(),
            sampled.crop.width(),
            sampled.crop.height(),
            sampled.rgb,
            sampled.skipped_points
        );

        if let Some(archive) = crops {
            if let Err(e) = archive.save(timestamp, &sampled.crop) {
                tracing::warn!("{:#}", e);
            }
        }

        Ok(sampled.rgb)
    }

    pub fn finish(&mut self) {
        self.transition(PipelineState::Done);
    }
}

/// First frame after the warm-up, or the last decodable frame of a shorter video
fn calibration_frame(source: &mut dyn FrameSource, warm_up_frames: u64) -> Option<RgbImage> {
    let mut last = None;
    let mut index = 0u64;

    while let Some(decoded) = source.next_frame() {
        match decoded {
            Ok(frame) => {
                let reached = index >= warm_up_frames;
                last = Some(frame);
                if reached {
                    tracing::info!("Calibrating on frame {}", index + 1);
                    break;
                }
            }
            Err(e) => tracing::warn!("Skipping undecodable warm-up frame {}: {:#}", index + 1, e),
        }
        index += 1;
    }

    if last.is_some() && index < warm_up_frames {
        tracing::warn!("Video ended during warm-up; calibrating on its last frame");
    }
    last
}

fn clock_for(
    source: &dyn FrameSource,
    config: &DosimeterConfig,
    options: &RunOptions,
) -> FrameClock {
    let rate = options.fps.map(f64::from).or_else(|| source.frame_rate());
    FrameClock::from_rate(rate, config.timing.fallback_fps)
}

/// Run calibration on one pass over the source, then sample a second pass.
///
/// `open_source` is called twice because frame sources are forward-only.
pub fn run_pipeline<E, F, O>(
    pipeline: &mut Pipeline<E>,
    mut open_source: F,
    output: &mut O,
    options: RunOptions,
    crops: Option<&CropArchive>,
) -> Result<RunSummary>
where
    E: RegionExtractor,
    F: FnMut() -> Result<Box<dyn FrameSource>>,
    O: ResultSink,
{
    let config = pipeline.config().clone();

    // Calibration pass
    let calibration_frame = {
        let mut source = open_source()?;
        let clock = clock_for(&*source, &config, &options);
        let warm_up_frames =
            (config.timing.warm_up_seconds * f64::from(clock.fps())).round() as u64;
        tracing::info!(
            "Skipping {} warm-up frames ({:.1}s at {} fps)",
            warm_up_frames,
            config.timing.warm_up_seconds,
            clock.fps()
        );
        calibration_frame(&mut *source, warm_up_frames)
    };

    let Some(calibration_frame) = calibration_frame else {
        return Err(pipeline.fail(CalibrationError::NoFrames).into());
    };
    pipeline.calibrate(&calibration_frame)?;
    pipeline.prepare_layout()?;

    let baseline = pipeline.baseline(&calibration_frame);
    drop(calibration_frame);
    tracing::info!("Baseline color {:?}", baseline);
    output.write_baseline(baseline)?;

    // Sampling pass
    let mut source = open_source()?;
    let mut clock = clock_for(&*source, &config, &options);
    tracing::info!("Sampling at {} fps, mode {:?}", clock.fps(), options.mode);

    let mut summary_seen = 0u64;
    let mut skipped = 0u64;
    let mut total_decode_time = Duration::ZERO;
    let mut total_sample_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    loop {
        let decode_start = Instant::now();
        let Some(decoded) = source.next_frame() else {
            break;
        };
        total_decode_time += decode_start.elapsed();

        let timestamp = clock.tick();
        summary_seen += 1;

        if !options.mode.includes(&timestamp) {
            skipped += 1;
            continue;
        }

        let sample_start = Instant::now();
        let record = pipeline.process(timestamp, decoded, crops);
        total_sample_time += sample_start.elapsed();

        let output_start = Instant::now();
        output.write_frame(&record)?;
        total_output_time += output_start.elapsed();

        let processed = match pipeline.state() {
            PipelineState::Sampling(n) => n,
            _ => 0,
        };
        if processed > 0 && processed % config.timing.stats_interval.max(1) == 0 {
            let n = processed as f64;
            tracing::info!(
                "Frame {} ({}): decode={:.1}ms, sample={:.1}ms, output={:.1}ms, failures={}",
                processed,
                timestamp,
                total_decode_time.as_secs_f64() * 1000.0 / summary_seen as f64,
                total_sample_time.as_secs_f64() * 1000.0 / n,
                total_output_time.as_secs_f64() * 1000.0 / n,
                pipeline.summary().failures()
            );
        }
    }

    output.finish()?;
    pipeline.finish();

    let mut summary = pipeline.summary().clone();
    summary.frames_seen = summary_seen;
    summary.skipped_by_filter = skipped;

    tracing::info!(
        "Done: {} frames, {} sampled, {} not localized, {} undecodable, {} skipped by filter",
        summary.frames_seen,
        summary.sampled,
        summary.not_localized,
        summary.decode_failures,
        summary.skipped_by_filter
    );

    Ok(summary)
}

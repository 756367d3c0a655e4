//! Export configuration and job management.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;
use steadyframe_common::error::{SteadyError, SteadyResult};

use crate::sequence::ImageSequence;
use crate::stabilizer::Stabilizer;

/// A stabilized export ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Directory of numbered source frames.
    pub frames_dir: PathBuf,

    /// Stabilization data produced by analysis.
    pub data_path: PathBuf,

    /// Directory the stabilized frames are written to.
    pub output_dir: PathBuf,

    /// Border-hiding zoom.
    pub zoom: f32,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Complete,
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub frames_rendered: u64,
    /// Source frames with no corrective transform (never rendered).
    pub frames_skipped: u64,
    pub output_dir: PathBuf,
}

/// Render every frame that has stabilization data into `job.output_dir`.
///
/// Frames are rendered in parallel and written as PNG under their source
/// file stem. Source frames without a transform are skipped; the last
/// frame of an analyzed clip is always one of them.
pub fn export_sequence(
    job: &ExportJob,
    progress: Option<ProgressCallback>,
) -> SteadyResult<ExportSummary> {
    tracing::info!(
        frames_dir = %job.frames_dir.display(),
        output = %job.output_dir.display(),
        zoom = job.zoom,
        "Starting export"
    );

    let progress = progress.map(Mutex::new);
    let report = |update: ExportProgress| {
        if let Some(callback) = &progress {
            if let Ok(callback) = callback.lock() {
                callback(update);
            }
        }
    };

    let sequence = ImageSequence::open(&job.frames_dir)?;
    let stabilizer = Stabilizer::load(&job.data_path, job.zoom)?;
    std::fs::create_dir_all(&job.output_dir)?;

    let (covered, skipped): (Vec<usize>, Vec<usize>) =
        (0..sequence.len()).partition(|&i| stabilizer.covers(i as u64));
    if !skipped.is_empty() {
        tracing::info!(
            skipped = skipped.len(),
            first = ?skipped.first(),
            "Frames without stabilization data are not exported"
        );
    }

    let total_frames = covered.len() as u64;
    report(ExportProgress {
        progress: 0.0,
        frames_rendered: 0,
        total_frames,
        eta_secs: 0.0,
        stage: ExportStage::Preparing,
    });

    let started = Instant::now();
    let rendered = AtomicU64::new(0);
    covered.par_iter().try_for_each(|&index| -> SteadyResult<()> {
        let mut frame = sequence.rgba_frame(index)?;
        stabilizer.apply(index as u64, &mut frame)?;

        let source = sequence.path(index)?;
        let stem = source
            .file_stem()
            .ok_or_else(|| SteadyError::render(format!("{} has no file name", source.display())))?;
        let target = job
            .output_dir
            .join(format!("{}.png", stem.to_string_lossy()));
        frame.save(&target).map_err(|e| {
            SteadyError::image(format!("Failed to write {}: {e}", target.display()))
        })?;

        let done = rendered.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed = started.elapsed().as_secs_f64();
        let remaining = total_frames.saturating_sub(done) as f64;
        report(ExportProgress {
            progress: done as f64 / total_frames as f64,
            frames_rendered: done,
            total_frames,
            eta_secs: elapsed / done as f64 * remaining,
            stage: ExportStage::Rendering,
        });
        Ok(())
    })?;

    report(ExportProgress {
        progress: 1.0,
        frames_rendered: total_frames,
        total_frames,
        eta_secs: 0.0,
        stage: ExportStage::Complete,
    });

    tracing::info!(
        frames = total_frames,
        skipped = skipped.len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Export complete"
    );

    Ok(ExportSummary {
        frames_rendered: total_frames,
        frames_skipped: skipped.len() as u64,
        output_dir: job.output_dir.clone(),
    })
}

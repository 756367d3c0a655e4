//! Analyze a clip and save its stabilization data.

use std::path::PathBuf;

use anyhow::Context;
use steadyframe_common::config::AppConfig;
use steadyframe_processing_core::analysis::AnalysisProgress;
use steadyframe_processing_core::StabilizationAnalyzer;
use steadyframe_render_engine::ImageSequence;

pub fn run(
    frames_dir: PathBuf,
    output: PathBuf,
    window: Option<i64>,
    max_corners: Option<usize>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Analyzing frames in: {}", frames_dir.display());

    let mut defaults = config.stabilization.clone();
    if let Some(window) = window {
        defaults.smoothing_window = window;
    }
    if let Some(max_corners) = max_corners {
        defaults.max_corners = max_corners;
    }

    let analyzer =
        StabilizationAnalyzer::new(&defaults).context("Invalid stabilization settings")?;
    let sequence = ImageSequence::open(&frames_dir)
        .with_context(|| format!("Failed to open {}", frames_dir.display()))?;

    println!("  Found {} frames", sequence.len());
    if sequence.len() < 2 {
        println!("  Fewer than two frames: nothing to stabilize.");
    }

    let output_data = analyzer
        .run_with_progress(
            &sequence,
            Some(Box::new(|p: AnalysisProgress| {
                if p.frames_processed % 50 == 0 || p.frames_processed == p.total_frames {
                    println!("  Tracked {}/{} frames", p.frames_processed, p.total_frames);
                }
            })),
        )
        .context("Analysis failed")?;

    if !output_data.fallback_frames.is_empty() {
        println!(
            "  {} frame(s) could not be fitted and reused the previous motion",
            output_data.fallback_frames.len()
        );
    }

    let data = output_data.into_data()?;
    let saved_at = data
        .save(&output)
        .with_context(|| format!("Failed to save {}", output.display()))?;

    println!(
        "  Saved {} transforms to: {} ({})",
        data.len(),
        output.display(),
        saved_at.to_rfc3339()
    );
    println!("\nAnalysis complete.");

    Ok(())
}

//! Render stabilized frames.

use std::path::PathBuf;

use anyhow::Context;
use steadyframe_common::config::AppConfig;
use steadyframe_render_engine::{export_sequence, ExportJob, ExportProgress, ExportStage};

pub fn run(
    frames_dir: PathBuf,
    data_file: PathBuf,
    output: PathBuf,
    zoom: Option<f32>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Rendering frames in: {}", frames_dir.display());
    println!("  Stabilization data: {}", data_file.display());

    let job = ExportJob {
        frames_dir,
        data_path: data_file,
        output_dir: output,
        zoom: zoom.unwrap_or(config.stabilization.zoom),
    };

    let summary = export_sequence(
        &job,
        Some(Box::new(|p: ExportProgress| {
            if p.stage == ExportStage::Rendering
                && (p.frames_rendered % 50 == 0 || p.frames_rendered == p.total_frames)
            {
                println!(
                    "  Rendered {}/{} frames ({:.0}%, ~{:.0}s left)",
                    p.frames_rendered,
                    p.total_frames,
                    p.progress * 100.0,
                    p.eta_secs
                );
            }
        })),
    )
    .context("Render failed")?;

    if summary.frames_skipped > 0 {
        println!(
            "  Skipped {} frame(s) with no stabilization data",
            summary.frames_skipped
        );
    }
    println!(
        "  Wrote {} frames to: {}",
        summary.frames_rendered,
        summary.output_dir.display()
    );
    println!("\nRender complete.");

    Ok(())
}

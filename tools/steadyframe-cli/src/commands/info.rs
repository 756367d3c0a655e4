//! Show stabilization data.

use std::path::PathBuf;

use steadyframe_stabilization_model::StabilizationData;

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let data = StabilizationData::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load stabilization data: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("Stabilization data: {}", path.display());
    match data.last_updated {
        Some(ts) => println!("  Last updated: {ts}"),
        None => println!("  Last updated: unknown"),
    }
    println!("  Frames: {}", data.len());
    if let Some((first, last)) = data.frame_range() {
        println!("  Range: {first}..={last}");
        let gaps = missing_indices(&data);
        if gaps > 0 {
            println!("  Missing indices: {gaps}");
        }
    }
    println!();

    let (mut max_dx, mut max_dy, mut max_da) = (0.0f64, 0.0f64, 0.0f64);
    for (_, t) in data.transforms() {
        max_dx = max_dx.max(t.dx.abs());
        max_dy = max_dy.max(t.dy.abs());
        max_da = max_da.max(t.da.abs());
    }
    println!("Largest correction:");
    println!("  dx: {max_dx:.3} px");
    println!("  dy: {max_dy:.3} px");
    println!("  da: {:.4} rad ({:.2} deg)", max_da, max_da.to_degrees());

    Ok(())
}

/// Indices inside the stored range that have no record.
///
/// Ids span the whole `u64` range, so the span is never widened by one:
/// `last - first` already counts every index but the first.
fn missing_indices(data: &StabilizationData) -> u64 {
    match data.frame_range() {
        Some((first, last)) => (last - first).saturating_sub(data.len() as u64 - 1),
        None => 0,
    }
}

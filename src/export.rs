//! Persisted diagnostic artifacts: decision-record, loss-history and
//! reward-history tables, plus the loss-curve figure.
//!
//! All tables are plain CSV, rewritten in full on every flush; the figure is
//! SVG to avoid system font dependencies.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters_svg::SVGBackend;

use crate::branching::DecisionRecord;
use crate::error::PersistError;
use crate::training::EpochRecord;

/// Artifact output settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
    /// Decision records per bulk flush of the decision table.
    pub decision_flush_interval: usize,
    /// Learning updates per flush of the loss table and figure.
    pub loss_flush_interval: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            out_dir: PathBuf::from("artifacts"),
            decision_flush_interval: 500,
            loss_flush_interval: 500,
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Rewrite the decision-record table.
pub fn write_decision_records(
    path: &Path,
    records: &[DecisionRecord],
) -> Result<(), PersistError> {
    let mut w = create(path)?;
    writeln!(
        w,
        "node_id,branch_down,branch_up,best_objval,objval,incumbent,cutoff,gap"
    )?;
    for r in records {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            r.node_id, r.branch_down, r.branch_up, r.best_objval, r.objval, r.incumbent, r.cutoff,
            r.gap
        )?;
    }
    w.flush()?;
    Ok(())
}

/// Rewrite the loss-history table.
pub fn write_loss_history(path: &Path, losses: &[f32]) -> Result<(), PersistError> {
    let mut w = create(path)?;
    writeln!(w, "update,loss")?;
    for (i, loss) in losses.iter().enumerate() {
        writeln!(w, "{},{}", i, loss)?;
    }
    w.flush()?;
    Ok(())
}

/// Rewrite the per-epoch reward-history table.
pub fn write_reward_history(path: &Path, records: &[EpochRecord]) -> Result<(), PersistError> {
    let mut w = create(path)?;
    writeln!(w, "epoch,mean_reward,std_dev,steps,seconds")?;
    for r in records {
        writeln!(
            w,
            "{},{},{},{},{}",
            r.epoch, r.mean_reward, r.std_dev, r.steps, r.seconds
        )?;
    }
    w.flush()?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(e: E) -> PersistError {
    PersistError::Plot(e.to_string())
}

/// Render the loss curve as an SVG line chart.
pub fn render_loss_curve(path: &Path, losses: &[f32]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    if losses.is_empty() {
        root.draw(&Text::new(
            "No loss data",
            (400, 250),
            ("sans-serif", 20).into_font().color(&BLACK),
        ))
        .map_err(plot_err)?;
        root.present().map_err(plot_err)?;
        return Ok(());
    }

    let max_loss = losses.iter().fold(f64::MIN, |m, &l| m.max(f64::from(l)));
    let y_top = if max_loss > 0.0 { max_loss * 1.05 } else { 1.0 };

    let mut chart = ChartBuilder::on(&root)
        .caption("Training loss", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..losses.len() as f64, 0f64..y_top)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("update")
        .y_desc("mse loss")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            losses
                .iter()
                .enumerate()
                .map(|(i, &l)| (i as f64, f64::from(l))),
            &BLUE,
        ))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

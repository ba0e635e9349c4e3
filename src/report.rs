//! Reporting: summary table, replicate aggregates, histogram and scatter
//! artifacts.
//!
//! Everything here is a passive sink for numeric series computed upstream;
//! nothing is ever read back. NaN policy: aggregates are taken over the
//! finite entries of a series (a series with none aggregates to NaN), and
//! NaN samples are dropped before binning or scattering. A failed replicate
//! therefore thins a dataset's statistic instead of poisoning it.

use crate::config::PipelineConfig;
use crate::evaluate::DatasetEval;
use anyhow::{Context, anyhow};
use flate2::Compression;
use flate2::write::GzEncoder;
use plotters::prelude::*;
use std::error::Error;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

const HIST_BINS: usize = 20;
const IDENTITY_LINE: RGBColor = RGBColor(0xd3, 0xd3, 0xd3);

/// Mean over the finite entries; NaN when there are none.
pub fn mean(xs: &[f64]) -> f64 {
    let finite: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Maximum over the finite entries; NaN when there are none.
pub fn max(xs: &[f64]) -> f64 {
    xs.iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(f64::NAN, f64::max)
}

/// Population standard deviation over the finite entries; NaN when there
/// are none.
pub fn std_dev(xs: &[f64]) -> f64 {
    let finite: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    let m = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / finite.len() as f64;
    var.sqrt()
}

/// One row per dataset, pipe format, 3-decimal floats.
pub fn render_summary_table(evals: &[DatasetEval]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| dataset | gq bin | gq dolgo | gq dolgo catg |");
    let _ = writeln!(out, "|---------|--------|----------|---------------|");
    for e in evals {
        let _ = writeln!(
            out,
            "| {} | {:.3} | {:.3} | {:.3} |",
            e.dataset, e.gq_bin, e.gq_dolgo, e.gq_dolgo_catg
        );
    }
    out
}

/// Write the headline distances as TSV. A `.gz` suffix gets a
/// gzip-compressed file.
pub fn write_summary_tsv(path: &Path, evals: &[DatasetEval]) -> io::Result<()> {
    let is_gz = path.to_string_lossy().ends_with(".gz");
    let mut out: Box<dyn Write> = if is_gz {
        let f = File::create(path)?;
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(File::create(path)?))
    };

    writeln!(&mut out, "dataset\tgq_bin\tgq_dolgo\tgq_dolgo_catg")?;
    for e in evals {
        writeln!(
            &mut out,
            "{}\t{:.6}\t{:.6}\t{:.6}",
            e.dataset, e.gq_bin, e.gq_dolgo, e.gq_dolgo_catg
        )?;
    }
    out.flush()
}

/// Histogram of per-dataset statistics, 20 bins, y = number of datasets.
/// Non-finite samples are dropped; nothing is drawn when none remain.
pub fn plot_distribution(
    out_path: &Path,
    data: &[f64],
    label: &str,
) -> Result<(), Box<dyn Error>> {
    let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        warn!(label, "no finite samples, skipping histogram");
        return Ok(());
    }

    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Degenerate spread still gets a visible bar.
    let (lo, hi) = if hi - lo < 1e-12 {
        (lo - 0.05, hi + 0.05)
    } else {
        (lo, hi)
    };
    let bin_width = (hi - lo) / HIST_BINS as f64;

    let mut counts = [0usize; HIST_BINS];
    for &x in &finite {
        let idx = (((x - lo) / bin_width) as usize).min(HIST_BINS - 1);
        counts[idx] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(1).max(1) as u32;

    let root = BitMapBackend::new(out_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0u32..(y_max + 1))?;

    chart
        .configure_mesh()
        .x_desc(label)
        .y_desc("Number of datasets")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &c)| {
        let x0 = lo + i as f64 * bin_width;
        let x1 = x0 + bin_width;
        Rectangle::new([(x0, 0u32), (x1, c as u32)], BLUE.mix(0.6).filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Scatter plot of per-dataset pairs with a light identity reference line.
/// Pairs with a non-finite coordinate are dropped.
pub fn plot_scatter(
    out_path: &Path,
    xs: &[f64],
    ys: &[f64],
    x_label: &str,
    y_label: &str,
) -> Result<(), Box<dyn Error>> {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| (x, y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        warn!(x_label, y_label, "no finite points, skipping scatter");
        return Ok(());
    }

    let hi = points
        .iter()
        .flat_map(|&(x, y)| [x, y])
        .fold(0.0f64, f64::max)
        .max(1e-3)
        * 1.1;

    let root = BitMapBackend::new(out_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..hi, 0.0..hi)?;

    chart.configure_mesh().x_desc(x_label).y_desc(y_label).draw()?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (hi, hi)],
        IDENTITY_LINE.mix(0.8),
    )))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Produce every reporting artifact: the stdout table, the TSV copy, six
/// histograms of replicate aggregates and four encoding-comparison scatter
/// plots.
pub fn render_reports(cfg: &PipelineConfig, evals: &[DatasetEval]) -> anyhow::Result<()> {
    let plots = cfg.plots_dir();
    fs::create_dir_all(&plots)
        .with_context(|| format!("creating plots dir {}", plots.display()))?;

    print!("{}", render_summary_table(evals));
    write_summary_tsv(&plots.join("summary.tsv"), evals).context("writing summary TSV")?;

    let series = |f: &dyn Fn(&DatasetEval) -> f64| -> Vec<f64> { evals.iter().map(f).collect() };

    let gq_bin = series(&|e| e.gq_bin);
    let gq_dolgo_catg = series(&|e| e.gq_dolgo_catg);
    let avg_gq_bin_samples = series(&|e| mean(&e.gq_bin_samples));
    let avg_gq_dolgo_samples = series(&|e| mean(&e.gq_dolgo_samples));

    let histograms: [(&str, Vec<f64>); 6] = [
        ("mean_rf_bin", series(&|e| mean(&e.rf_bin_samples))),
        ("mean_rf_dolgo", series(&|e| mean(&e.rf_dolgo_samples))),
        ("max_rf_bin", series(&|e| max(&e.rf_bin_samples))),
        ("max_rf_dolgo", series(&|e| max(&e.rf_dolgo_samples))),
        ("std_gqd_bin", series(&|e| std_dev(&e.gq_bin_samples))),
        ("std_gqd_dolgo", series(&|e| std_dev(&e.gq_dolgo_samples))),
    ];
    for (label, data) in &histograms {
        let path = plots.join(format!("hist_{label}.png"));
        plot_distribution(&path, data, label)
            .map_err(|e| anyhow!("histogram {label}: {e}"))?;
    }

    let scatters: [(&str, &[f64], &[f64], &str, &str); 4] = [
        (
            "scatter_samples_bin",
            &gq_bin,
            &avg_gq_bin_samples,
            "gq_full_bin",
            "avg_gq_samples_bin",
        ),
        (
            "scatter_samples_dolgo",
            &gq_dolgo_catg,
            &avg_gq_dolgo_samples,
            "gq_full_dolgo_catg",
            "avg_gq_samples_dolgo",
        ),
        (
            "scatter_bin_dolgo_catg",
            &gq_bin,
            &gq_dolgo_catg,
            "bin",
            "dolgo",
        ),
        (
            "scatter_samples_dolgo_bin",
            &gq_bin,
            &avg_gq_dolgo_samples,
            "gq_full_bin",
            "avg_gq_samples_dolgo",
        ),
    ];
    for (name, xs, ys, xl, yl) in scatters {
        let path = plots.join(format!("{name}.png"));
        plot_scatter(&path, xs, ys, xl, yl).map_err(|e| anyhow!("scatter {name}: {e}"))?;
    }

    info!(plots = %plots.display(), "reports written");
    Ok(())
}

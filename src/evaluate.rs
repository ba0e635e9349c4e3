//! Distance evaluation over the dataset grid.
//!
//! For every discovered dataset this stage compares inferred trees against
//! two baselines:
//!
//! - GQD of each encoding's full-data best tree, and of every replicate
//!   best tree, against the curated reference tree (accuracy);
//! - RF of every replicate best tree against the matching encoding's
//!   full-data best tree (stability of the inference under resampling).
//!
//! A replicate whose best tree never materialized contributes NaN; a series
//! always keeps its configured length. Replicates carry no data dependency
//! on each other, so each series is filled on the rayon pool (the quartet
//! calculator isolates its scratch report per invocation, which is what
//! makes that safe).

use crate::config::{Encoding, PipelineConfig, best_tree_path};
use crate::distances::{QuartetCalc, rf_distance};
use crate::runner::ToolRunner;
use rayon::prelude::*;
use std::fs;
use tracing::{info, warn};

/// Per-dataset distance collections. Replicate series are positionally
/// aligned: index i in any series refers to the i-th resampled alignment.
#[derive(Debug, Clone)]
pub struct DatasetEval {
    pub dataset: String,
    /// GQD(reference, full-data best tree), one per encoding.
    pub gq_bin: f64,
    pub gq_dolgo: f64,
    pub gq_dolgo_catg: f64,
    /// GQD(reference, replicate best tree), fixed length `num_samples`.
    pub gq_bin_samples: Vec<f64>,
    pub gq_dolgo_samples: Vec<f64>,
    /// RF(full-data best tree, replicate best tree), fixed length.
    pub rf_bin_samples: Vec<f64>,
    pub rf_dolgo_samples: Vec<f64>,
}

/// List dataset directories under the msa root, drop the configured
/// exclusions and every dataset without a reference tree.
pub fn discover_datasets(cfg: &PipelineConfig) -> anyhow::Result<Vec<String>> {
    let msa_root = cfg.msa_root();
    let mut datasets = Vec::new();
    for entry in fs::read_dir(&msa_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if cfg.exclude.iter().any(|e| e == &name) {
            info!(dataset = %name, "excluded by configuration");
            continue;
        }
        if !cfg.reference_tree(&name).is_file() {
            warn!(dataset = %name, "no reference tree, excluding dataset");
            continue;
        }
        datasets.push(name);
    }
    datasets.sort();
    Ok(datasets)
}

pub struct Evaluator<'r, R: ToolRunner> {
    quartet: QuartetCalc<'r, R>,
}

impl<'r, R: ToolRunner> Evaluator<'r, R> {
    pub fn new(quartet: QuartetCalc<'r, R>) -> Self {
        Evaluator { quartet }
    }

    pub fn evaluate_all(&self, cfg: &PipelineConfig, datasets: &[String]) -> Vec<DatasetEval> {
        datasets
            .iter()
            .map(|ds| {
                info!(dataset = %ds, "evaluating distances");
                self.evaluate_dataset(cfg, ds)
            })
            .collect()
    }

    pub fn evaluate_dataset(&self, cfg: &PipelineConfig, dataset: &str) -> DatasetEval {
        let reference = cfg.reference_tree(dataset);

        let gq_full = |enc: Encoding| {
            self.quartet
                .gq_distance(&reference, &best_tree_path(&cfg.prefix(dataset, enc)))
        };

        let gq_samples = |enc: Encoding| -> Vec<f64> {
            (0..cfg.num_samples)
                .into_par_iter()
                .map(|i| {
                    let best = best_tree_path(&cfg.sample_prefix(dataset, enc, i));
                    self.quartet.gq_distance(&reference, &best)
                })
                .collect()
        };

        // Replicate RF is measured against the encoding's own full-data best
        // tree: it quantifies how much the inference moves under resampling,
        // not how close it is to the reference.
        let rf_samples = |enc: Encoding| -> Vec<f64> {
            let full_best = best_tree_path(&cfg.prefix(dataset, enc));
            (0..cfg.num_samples)
                .into_par_iter()
                .map(|i| {
                    let best = best_tree_path(&cfg.sample_prefix(dataset, enc, i));
                    rf_distance(&full_best, &best)
                })
                .collect()
        };

        DatasetEval {
            dataset: dataset.to_string(),
            gq_bin: gq_full(Encoding::Bin),
            gq_dolgo: gq_full(Encoding::Dolgo),
            gq_dolgo_catg: gq_full(Encoding::DolgoCatg),
            gq_bin_samples: gq_samples(Encoding::Bin),
            gq_dolgo_samples: gq_samples(Encoding::Dolgo),
            rf_bin_samples: rf_samples(Encoding::Bin),
            rf_dolgo_samples: rf_samples(Encoding::Dolgo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::SpyRunner;
    use std::path::Path;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovery_applies_exclusions_and_reference_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::new(dir.path());
        cfg.exclude = vec!["skipme".to_string()];

        for ds in ["alpha", "beta", "skipme", "noref"] {
            fs::create_dir_all(cfg.msa_root().join(ds)).unwrap();
        }
        touch(&cfg.reference_tree("alpha"), "((a,b),(c,d));");
        touch(&cfg.reference_tree("beta"), "((a,b),(c,d));");
        touch(&cfg.reference_tree("skipme"), "((a,b),(c,d));");

        let datasets = discover_datasets(&cfg).unwrap();
        assert_eq!(datasets, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn series_keep_configured_length_with_nan_for_missing_trees() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::new(dir.path());
        cfg.num_samples = 4;

        touch(&cfg.reference_tree("d1"), "((a,b),(c,(d,e)));");
        // Full-data best trees for RF baselines.
        for enc in Encoding::ALL {
            touch(
                &best_tree_path(&cfg.prefix("d1", enc)),
                "((a,b),(c,(d,e)));",
            );
        }
        // Only replicate 2 of the bin series ever finished.
        touch(
            &best_tree_path(&cfg.sample_prefix("d1", Encoding::Bin, 2)),
            "((a,c),(b,(d,e)));",
        );

        let spy = SpyRunner::with_effect(
            |_: &Path, _: &[std::ffi::OsString], report: Option<&Path>| {
                // Perfect agreement whenever the tool actually runs.
                fs::write(report.unwrap(), "h\nt1\tt2\t1.0\t20\t20\n").unwrap();
            },
        );
        let quartet = QuartetCalc::new(&spy, "qdist").with_scratch_dir(dir.path());
        let eval = Evaluator::new(quartet).evaluate_dataset(&cfg, "d1");

        assert_eq!(eval.gq_bin, 0.0);
        assert_eq!(eval.gq_bin_samples.len(), 4);
        assert_eq!(eval.rf_bin_samples.len(), 4);
        // Replicate 2 exists, everything else is NaN.
        assert_eq!(eval.gq_bin_samples[2], 0.0);
        assert!(eval.gq_bin_samples[0].is_nan());
        assert!(eval.gq_bin_samples[3].is_nan());
        assert!(eval.rf_bin_samples[2] > 0.0);
        assert!(eval.rf_bin_samples[0].is_nan());
        // The dolgo series never ran a single replicate.
        assert!(eval.gq_dolgo_samples.iter().all(|d| d.is_nan()));
        assert_eq!(eval.gq_dolgo_samples.len(), 4);
    }
}

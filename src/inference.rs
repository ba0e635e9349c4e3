//! Inference job orchestration.
//!
//! Walks the dataset × encoding × replicate grid and makes sure every
//! inference job has been run. A job is identified by its output prefix and
//! "done" means the best-tree file exists at that prefix; re-running a done
//! job is a no-op unless forced. The tool is always given a fixed seed and
//! an automatic thread hint, so identical inputs give identical trees.
//!
//! Success is never returned: a job that fails leaves no best tree behind
//! and the evaluation stage records NaN for it.

use crate::config::{Encoding, PipelineConfig, best_tree_path};
use crate::runner::ToolRunner;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct InferenceOrchestrator<'r, R: ToolRunner> {
    runner: &'r R,
    tool: PathBuf,
    force: bool,
}

impl<'r, R: ToolRunner> InferenceOrchestrator<'r, R> {
    pub fn new(runner: &'r R, tool: impl Into<PathBuf>, force: bool) -> Self {
        InferenceOrchestrator {
            runner,
            tool: tool.into(),
            force,
        }
    }

    /// Run one inference job unless its output already exists.
    ///
    /// Skips (with a warning) when the alignment is missing. Creates the
    /// prefix's directory tree. `--redo` is passed on every actual run so
    /// leftovers from a crashed attempt cannot block the tool.
    pub fn ensure_inferred(
        &self,
        msa_path: &Path,
        model: &str,
        prefix: &Path,
        extra_args: &[&str],
    ) {
        if !msa_path.is_file() {
            warn!(msa = %msa_path.display(), "alignment does not exist, skipping job");
            return;
        }
        if let Some(dir) = prefix.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "cannot create output directory");
                return;
            }
        }

        let best = best_tree_path(prefix);
        if best.is_file() && !self.force {
            debug!(best = %best.display(), "best tree present, skipping job");
            return;
        }

        let mut args: Vec<OsString> = vec![
            "--msa".into(),
            msa_path.into(),
            "--model".into(),
            model.into(),
            "--prefix".into(),
            prefix.into(),
            "--threads".into(),
            "auto".into(),
            "--seed".into(),
            "2".into(),
        ];
        args.extend(extra_args.iter().map(OsString::from));
        args.push("--redo".into());

        self.runner.run(&self.tool, &args);
    }

    /// All jobs for one dataset: a full-data run per encoding, then the
    /// replicate runs for the resampled encodings.
    pub fn run_dataset(&self, cfg: &PipelineConfig, dataset: &str) {
        for enc in Encoding::ALL {
            self.ensure_inferred(
                &cfg.msa_path(dataset, enc),
                enc.model(),
                &cfg.prefix(dataset, enc),
                enc.extra_args(),
            );
        }
        for enc in Encoding::RESAMPLED {
            for i in 0..cfg.num_samples {
                self.ensure_inferred(
                    &cfg.sample_msa_path(dataset, enc, i),
                    enc.model(),
                    &cfg.sample_prefix(dataset, enc, i),
                    enc.extra_args(),
                );
            }
        }
    }

    pub fn run_all(&self, cfg: &PipelineConfig, datasets: &[String]) {
        for dataset in datasets {
            info!(dataset, "ensuring inference runs");
            self.run_dataset(cfg, dataset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::SpyRunner;
    use std::io::Write;

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(path).unwrap();
        write!(f, "{content}").unwrap();
    }

    #[test]
    fn missing_alignment_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let spy = SpyRunner::counting();
        let orch = InferenceOrchestrator::new(&spy, "raxml-ng", false);

        orch.ensure_inferred(
            &dir.path().join("absent.phy"),
            "BIN+G",
            &dir.path().join("out/bin"),
            &[],
        );
        assert_eq!(spy.call_count(), 0);
    }

    #[test]
    fn idempotent_skip_when_best_tree_exists() {
        let dir = tempfile::tempdir().unwrap();
        let msa = dir.path().join("bin.phy");
        touch(&msa, "alignment");
        let prefix = dir.path().join("out/bin");

        // The fake tool drops a best tree, like the real one would.
        let best = best_tree_path(&prefix);
        let spy = SpyRunner::with_effect(|_: &Path, _: &[OsString], _: Option<&Path>| {
            touch(&best, "((a,b),(c,d));");
        });
        let orch = InferenceOrchestrator::new(&spy, "raxml-ng", false);

        orch.ensure_inferred(&msa, "BIN+G", &prefix, &[]);
        orch.ensure_inferred(&msa, "BIN+G", &prefix, &[]);
        assert_eq!(spy.call_count(), 1, "second call must be a no-op");
    }

    #[test]
    fn force_reruns_existing_job() {
        let dir = tempfile::tempdir().unwrap();
        let msa = dir.path().join("bin.phy");
        touch(&msa, "alignment");
        let prefix = dir.path().join("out/bin");
        touch(&best_tree_path(&prefix), "((a,b),(c,d));");

        let spy = SpyRunner::counting();
        let orch = InferenceOrchestrator::new(&spy, "raxml-ng", true);
        orch.ensure_inferred(&msa, "BIN+G", &prefix, &[]);
        assert_eq!(spy.call_count(), 1);
    }

    #[test]
    fn fixed_seed_threads_and_redo_always_passed() {
        let dir = tempfile::tempdir().unwrap();
        let msa = dir.path().join("dolgo.catg");
        touch(&msa, "alignment");

        let spy = SpyRunner::counting();
        let orch = InferenceOrchestrator::new(&spy, "raxml-ng", false);
        orch.ensure_inferred(
            &msa,
            Encoding::DolgoCatg.model(),
            &dir.path().join("out/dolgo_catg"),
            Encoding::DolgoCatg.extra_args(),
        );

        let invocations = spy.invocations.lock().unwrap();
        let args: Vec<String> = invocations[0]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let has_pair = |k: &str, v: &str| {
            args.windows(2).any(|w| w[0] == k && w[1] == v)
        };
        assert!(has_pair("--seed", "2"));
        assert!(has_pair("--threads", "auto"));
        assert!(has_pair("--prob-msa", "on"));
        assert_eq!(args.last().map(String::as_str), Some("--redo"));
    }

    #[test]
    fn dataset_grid_covers_encodings_and_replicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::new(dir.path());
        cfg.num_samples = 3;

        // Full-data alignments for all three encodings, replicates for two.
        for enc in Encoding::ALL {
            touch(&cfg.msa_path("d1", enc), "x");
        }
        for enc in Encoding::RESAMPLED {
            for i in 0..cfg.num_samples {
                touch(&cfg.sample_msa_path("d1", enc, i), "x");
            }
        }

        let spy = SpyRunner::counting();
        let orch = InferenceOrchestrator::new(&spy, "raxml-ng", false);
        orch.run_dataset(&cfg, "d1");
        assert_eq!(spy.call_count(), 3 + 2 * 3);
    }
}

//! Tree distance metrics.
//!
//! Two independent metrics compare an inferred tree with a baseline:
//!
//! 1. **Generalized Quartet Distance (GQD)**: delegates to the external
//!    quartet tool and parses its report; `1 - q` where `q` is the quartet
//!    agreement ratio. Range [0, 1].
//! 2. **Robinson-Foulds (RF)**: in-process bipartition comparison over the
//!    shared leaf set, normalized by the maximum possible count. Range [0, 1].
//!
//! Both have a typed core returning [`DistanceError`] and a pipeline-facing
//! f64 surface that collapses every failure to NaN. NaN is how a failed
//! replicate flows through series and aggregates without aborting anything.

use crate::runner::ToolRunner;
use crate::snapshot::{TreeSnapshot, shared_leaf_index};
use phylotree::tree::Tree as PhyloTree;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Why a distance could not be computed. Everything here is local to one
/// pair of trees; the pipeline maps it to a NaN series entry.
#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("tree file missing: {0}")]
    MissingInput(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("malformed tree: {0}")]
    Malformed(String),

    #[error("quartet report has fewer than two lines")]
    ShortReport,

    #[error("quartet report field not usable: {0:?}")]
    BadReportField(String),

    #[error("maximum RF distance is zero (3 or fewer shared leaves)")]
    DegenerateOverlap,
}

/// Read and parse a Newick tree file.
pub fn load_tree(path: &Path) -> Result<PhyloTree, DistanceError> {
    if !path.is_file() {
        return Err(DistanceError::MissingInput(path.to_path_buf()));
    }
    let newick = fs::read_to_string(path).map_err(|source| DistanceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    PhyloTree::from_newick(newick.trim()).map_err(|e| DistanceError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Unrooted Robinson-Foulds distance between two parsed trees, normalized by
/// the maximum possible over their shared leaf set.
///
/// # Algorithm
/// With A and B the canonical non-trivial split sets restricted to the
/// shared leaves:
/// ```text
/// rf     = |A| + |B| - 2|A ∩ B|
/// max_rf = |A| + |B|
/// ```
/// Fewer than four shared leaves leave no non-trivial splits, `max_rf` is
/// zero and the normalization is undefined.
pub fn normalized_rf(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<f64, DistanceError> {
    let leaf_index = shared_leaf_index(tree_a, tree_b);

    let snap_a = TreeSnapshot::from_tree(tree_a, &leaf_index)
        .map_err(|e| DistanceError::Malformed(e.to_string()))?;
    let snap_b = TreeSnapshot::from_tree(tree_b, &leaf_index)
        .map_err(|e| DistanceError::Malformed(e.to_string()))?;

    let max_rf = snap_a.parts.len() + snap_b.parts.len();
    if max_rf == 0 {
        return Err(DistanceError::DegenerateOverlap);
    }

    let inter = snap_a.parts.intersection(&snap_b.parts).count();
    let rf = snap_a.parts.len() + snap_b.parts.len() - 2 * inter;
    Ok(rf as f64 / max_rf as f64)
}

/// RF between two tree files. Any failure (missing file, parse error,
/// degenerate overlap) collapses to NaN.
pub fn rf_distance(path_a: &Path, path_b: &Path) -> f64 {
    let result = load_tree(path_a)
        .and_then(|a| load_tree(path_b).map(|b| (a, b)))
        .and_then(|(a, b)| normalized_rf(&a, &b));
    match result {
        Ok(d) => d,
        Err(e) => {
            debug!(a = %path_a.display(), b = %path_b.display(), error = %e, "RF unavailable");
            f64::NAN
        }
    }
}

/// Generalized Quartet Distance via the external quartet tool.
///
/// Each invocation captures the tool's report into its own temp file, so
/// concurrent callers never race on a shared scratch path. The report is
/// removed on every exit path (RAII).
pub struct QuartetCalc<'r, R: ToolRunner> {
    runner: &'r R,
    tool: PathBuf,
    scratch_dir: PathBuf,
}

impl<'r, R: ToolRunner> QuartetCalc<'r, R> {
    pub fn new(runner: &'r R, tool: impl Into<PathBuf>) -> Self {
        QuartetCalc {
            runner,
            tool: tool.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Place scratch reports somewhere else (tests use a sandbox).
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// GQD between two tree files; NaN on any failure. When either input is
    /// missing the tool is not invoked at all.
    pub fn gq_distance(&self, path_a: &Path, path_b: &Path) -> f64 {
        match self.try_gq_distance(path_a, path_b) {
            Ok(d) => d,
            Err(e) => {
                debug!(a = %path_a.display(), b = %path_b.display(), error = %e, "GQD unavailable");
                f64::NAN
            }
        }
    }

    fn try_gq_distance(&self, path_a: &Path, path_b: &Path) -> Result<f64, DistanceError> {
        for path in [path_a, path_b] {
            if !path.is_file() {
                return Err(DistanceError::MissingInput(path.to_path_buf()));
            }
        }

        // NamedTempFile removes the report when this function returns,
        // whichever branch it returns through.
        let report = tempfile::Builder::new()
            .prefix("qdist-")
            .suffix(".txt")
            .tempfile_in(&self.scratch_dir)
            .map_err(|source| DistanceError::Read {
                path: self.scratch_dir.clone(),
                source,
            })?;

        let args: Vec<OsString> = vec![path_a.into(), path_b.into()];
        self.runner.run_to_file(&self.tool, &args, report.path());

        let content =
            fs::read_to_string(report.path()).map_err(|source| DistanceError::Read {
                path: report.path().to_path_buf(),
                source,
            })?;
        parse_quartet_report(&content)
    }
}

/// Pull the quartet agreement ratio out of the tool's tabular report and
/// turn it into a distance.
///
/// The report's second line is tab-separated with the agreement ratio `q` in
/// the third-from-last column; the result is `1 - q`. A report with fewer
/// than two lines is the tool's failure signal.
fn parse_quartet_report(content: &str) -> Result<f64, DistanceError> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return Err(DistanceError::ShortReport);
    }
    let fields: Vec<&str> = lines[1].split('\t').collect();
    let raw = fields
        .len()
        .checked_sub(3)
        .and_then(|i| fields.get(i))
        .ok_or_else(|| DistanceError::BadReportField(lines[1].to_string()))?;
    let q: f64 = raw
        .trim()
        .parse()
        .map_err(|_| DistanceError::BadReportField(raw.to_string()))?;
    Ok(1.0 - q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::SpyRunner;
    use itertools::Itertools;
    use std::io::Write;
    use std::sync::Mutex;

    fn write_tree(dir: &Path, name: &str, newick: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "{newick}").unwrap();
        path
    }

    #[test]
    fn rf_self_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let t = write_tree(dir.path(), "t.tree", "((a,b),(c,(d,e)));");
        assert_eq!(rf_distance(&t, &t), 0.0);
    }

    #[test]
    fn rf_same_unrooted_topology_different_rooting() {
        let a = PhyloTree::from_newick("((((a,b),c),d),e);").unwrap();
        let b = PhyloTree::from_newick("((a,b),(c,(d,e)));").unwrap();
        assert_eq!(normalized_rf(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn rf_is_symmetric_and_in_range() {
        let a = PhyloTree::from_newick("((a,b),(c,(d,e)));").unwrap();
        let b = PhyloTree::from_newick("((a,c),(b,(d,e)));").unwrap();
        let d_ab = normalized_rf(&a, &b).unwrap();
        let d_ba = normalized_rf(&b, &a).unwrap();
        assert_eq!(d_ab, d_ba);
        assert!((0.0..=1.0).contains(&d_ab));
        assert!(d_ab > 0.0);
    }

    #[test]
    fn rf_symmetric_and_bounded_over_all_pairs() {
        let trees = [
            "(((a,b),(c,d)),(e,f));",
            "(((a,c),(b,d)),(e,f));",
            "(((a,e),(b,f)),(c,d));",
            "((((a,b),c),(d,e)),f);",
        ];
        for indices in (0..trees.len()).combinations(2) {
            let (i0, i1) = (indices[0], indices[1]);
            let t0 = PhyloTree::from_newick(trees[i0]).unwrap();
            let t1 = PhyloTree::from_newick(trees[i1]).unwrap();

            let d01 = normalized_rf(&t0, &t1).unwrap();
            let d10 = normalized_rf(&t1, &t0).unwrap();
            assert_eq!(d01, d10);
            assert!((0.0..=1.0).contains(&d01));
        }
    }

    #[test]
    fn rf_disjoint_split_sets_is_one() {
        // Unrooted: ab|cde + abc|de  vs  ac|bde + acd|be share no split.
        let a = PhyloTree::from_newick("((((a,b),c),d),e);").unwrap();
        let b = PhyloTree::from_newick("((((a,c),d),b),e);").unwrap();
        assert_eq!(normalized_rf(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn rf_nan_for_three_shared_leaves() {
        let a = PhyloTree::from_newick("((a,b),(c,x));").unwrap();
        let b = PhyloTree::from_newick("((a,b),(c,y));").unwrap();
        assert!(matches!(
            normalized_rf(&a, &b),
            Err(DistanceError::DegenerateOverlap)
        ));
    }

    #[test]
    fn rf_nan_on_missing_or_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_tree(dir.path(), "good.tree", "((a,b),(c,d));");
        let bad = write_tree(dir.path(), "bad.tree", "((a,b),(c,d;");
        assert!(rf_distance(&good, &dir.path().join("absent.tree")).is_nan());
        assert!(rf_distance(&bad, &good).is_nan());
    }

    #[test]
    fn gqd_missing_input_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let t = write_tree(dir.path(), "t.tree", "((a,b),(c,d));");
        let spy = SpyRunner::counting();
        let calc = QuartetCalc::new(&spy, "qdist").with_scratch_dir(dir.path());

        assert!(calc.gq_distance(&dir.path().join("nope"), &t).is_nan());
        assert!(calc.gq_distance(&t, &dir.path().join("nope")).is_nan());
        assert_eq!(spy.call_count(), 0);
    }

    #[test]
    fn gqd_parses_third_from_last_field() {
        let dir = tempfile::tempdir().unwrap();
        let t = write_tree(dir.path(), "t.tree", "((a,b),(c,d));");
        let spy = SpyRunner::with_effect(|_: &Path, _: &[OsString], report: Option<&Path>| {
            let report = report.expect("quartet runs capture stdout");
            fs::write(report, "header\t...\nt1\tt2\t5\t0.85\t17\t20\n").unwrap();
        });
        let calc = QuartetCalc::new(&spy, "qdist").with_scratch_dir(dir.path());

        let d = calc.gq_distance(&t, &t);
        assert!((d - 0.15).abs() < 1e-12);
        assert_eq!(spy.call_count(), 1);
    }

    #[test]
    fn gqd_short_report_is_nan_and_scratch_removed() {
        let dir = tempfile::tempdir().unwrap();
        let t = write_tree(dir.path(), "t.tree", "((a,b),(c,d));");
        let seen: Mutex<Option<PathBuf>> = Mutex::new(None);
        let spy = SpyRunner::with_effect(|_: &Path, _: &[OsString], report: Option<&Path>| {
            let report = report.unwrap();
            *seen.lock().unwrap() = Some(report.to_path_buf());
            fs::write(report, "only one line\n").unwrap();
        });
        let calc = QuartetCalc::new(&spy, "qdist").with_scratch_dir(dir.path());

        assert!(calc.gq_distance(&t, &t).is_nan());
        let report = seen.lock().unwrap().clone().unwrap();
        assert!(!report.exists(), "scratch report must be cleaned up");
    }

    #[test]
    fn gqd_garbage_field_is_nan() {
        assert!(matches!(
            parse_quartet_report("h\na\tb\tnot-a-number\tx\ty\n"),
            Err(DistanceError::BadReportField(_))
        ));
        assert!(matches!(
            parse_quartet_report("h\nshort\n"),
            Err(DistanceError::BadReportField(_))
        ));
    }
}

use anyhow::Result;
use clap::Parser;
use lingtree_eval::distances::QuartetCalc;
use lingtree_eval::evaluate::{Evaluator, discover_datasets};
use lingtree_eval::inference::InferenceOrchestrator;
use lingtree_eval::report::render_reports;
use lingtree_eval::runner::SystemRunner;
use lingtree_eval::PipelineConfig;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Evaluate how well trees inferred from binary cognate data and from
/// Dolgopolsky sound-class data recover the curated reference classification,
/// and how stable those inferences are under resampling.
#[derive(Parser, Debug)]
#[command(name = "lingtree-eval", version, about = "Reference-tree evaluation of cognate vs sound-class inferences")]
struct Args {
    /// Data root holding msa/, sound_msa/, glottolog_trees/, raxml/, plots/
    #[arg(short = 'd', long = "data-root", default_value = "data")]
    data_root: PathBuf,

    /// Number of resampled replicates per dataset and encoding
    #[arg(short = 'n', long = "samples", default_value_t = 100)]
    samples: usize,

    /// Dataset names to skip entirely (comma separated)
    #[arg(long = "exclude", value_delimiter = ',', default_values_t = [String::from("abvdoceanic"), String::from("bowernpny")])]
    exclude: Vec<String>,

    /// Re-run inference jobs even when their best tree already exists
    #[arg(long = "force", default_value_t = false)]
    force: bool,

    /// Skip the inference stage and evaluate whatever trees are on disk
    #[arg(long = "skip-inference", default_value_t = false)]
    skip_inference: bool,

    /// Path to the tree-inference binary
    #[arg(long = "raxml-bin", default_value = "./bin/raxml-ng")]
    raxml_bin: PathBuf,

    /// Path to the quartet-distance binary
    #[arg(long = "qdist-bin", default_value = "./bin/qdist")]
    qdist_bin: PathBuf,
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "pipeline failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut cfg = PipelineConfig::new(args.data_root);
    cfg.num_samples = args.samples;
    cfg.exclude = args.exclude;
    cfg.force = args.force;
    cfg.raxml_bin = args.raxml_bin;
    cfg.qdist_bin = args.qdist_bin;

    let datasets = discover_datasets(&cfg)?;
    if datasets.is_empty() {
        warn!(msa_root = %cfg.msa_root().display(), "no datasets with reference trees found");
        return Ok(());
    }
    info!(count = datasets.len(), "datasets discovered");

    let runner = SystemRunner;
    if args.skip_inference {
        info!("inference stage skipped");
    } else {
        InferenceOrchestrator::new(&runner, &cfg.raxml_bin, cfg.force).run_all(&cfg, &datasets);
    }

    let quartet = QuartetCalc::new(&runner, &cfg.qdist_bin);
    let evals = Evaluator::new(quartet).evaluate_all(&cfg, &datasets);

    render_reports(&cfg, &evals)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

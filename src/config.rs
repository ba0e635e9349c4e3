//! Pipeline configuration and filesystem layout.
//!
//! Every path convention of the corpus lives here: per-dataset alignment
//! files, resample directories, inference output prefixes, the reference
//! tree location and the plots directory. Orchestrators never assemble
//! paths themselves.

use std::path::{Path, PathBuf};

/// Character encodings an alignment can come in. A closed set: each variant
/// maps to a fixed substitution model and fixed file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Binary cognate presence/absence.
    Bin,
    /// Dolgopolsky sound-class characters.
    Dolgo,
    /// Sound classes with per-site probability weighting.
    DolgoCatg,
}

impl Encoding {
    /// All encodings that get a full-data inference run.
    pub const ALL: [Encoding; 3] = [Encoding::Bin, Encoding::Dolgo, Encoding::DolgoCatg];

    /// Encodings with resampled replicate alignments.
    pub const RESAMPLED: [Encoding; 2] = [Encoding::Bin, Encoding::Dolgo];

    /// Stem used in output prefixes and plot labels.
    pub fn stem(self) -> &'static str {
        match self {
            Encoding::Bin => "bin",
            Encoding::Dolgo => "dolgo",
            Encoding::DolgoCatg => "dolgo_catg",
        }
    }

    /// Substitution model handed to the inference tool.
    pub fn model(self) -> &'static str {
        match self {
            Encoding::Bin => "BIN+G",
            Encoding::Dolgo => "MULTI14_MK+M{VKPHJMNSRTW+1_}{-}",
            Encoding::DolgoCatg => "MULTI15_MK+M{VKPHJMNSRTW+1_~}{-}",
        }
    }

    /// Extra tool flags the encoding requires.
    pub fn extra_args(self) -> &'static [&'static str] {
        match self {
            Encoding::DolgoCatg => &["--prob-msa", "on"],
            _ => &[],
        }
    }

    /// File name of the full-data alignment.
    fn msa_file(self) -> &'static str {
        match self {
            Encoding::Bin => "bin.phy",
            Encoding::Dolgo => "dolgo.phy",
            Encoding::DolgoCatg => "dolgo.catg",
        }
    }
}

/// All knobs of the pipeline, lifted out of the loops so the orchestrators
/// can be driven against a test sandbox.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root holding `msa/`, `sound_msa/`, `glottolog_trees/`, `raxml/`, `plots/`.
    pub data_root: PathBuf,
    /// Number of resampled replicates per dataset and encoding.
    pub num_samples: usize,
    /// Dataset names skipped entirely.
    pub exclude: Vec<String>,
    /// Re-run inference even when the best tree already exists.
    pub force: bool,
    /// Path to the tree-inference binary.
    pub raxml_bin: PathBuf,
    /// Path to the quartet-distance binary.
    pub qdist_bin: PathBuf,
}

impl PipelineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            data_root: data_root.into(),
            num_samples: 100,
            exclude: vec!["abvdoceanic".to_string(), "bowernpny".to_string()],
            force: false,
            raxml_bin: PathBuf::from("./bin/raxml-ng"),
            qdist_bin: PathBuf::from("./bin/qdist"),
        }
    }

    /// Root of the binary-encoding alignments; its subdirectories define the
    /// dataset universe.
    pub fn msa_root(&self) -> PathBuf {
        self.data_root.join("msa")
    }

    pub fn sound_msa_root(&self) -> PathBuf {
        self.data_root.join("sound_msa")
    }

    pub fn inference_root(&self) -> PathBuf {
        self.data_root.join("raxml")
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.data_root.join("plots")
    }

    /// Curated reference tree for a dataset; its absence excludes the
    /// dataset from the whole evaluation.
    pub fn reference_tree(&self, dataset: &str) -> PathBuf {
        self.data_root
            .join("glottolog_trees")
            .join(dataset)
            .join("glottolog.tree")
    }

    /// Full-data alignment for one encoding.
    pub fn msa_path(&self, dataset: &str, enc: Encoding) -> PathBuf {
        let root = match enc {
            Encoding::Bin => self.msa_root(),
            Encoding::Dolgo | Encoding::DolgoCatg => self.sound_msa_root(),
        };
        root.join(dataset).join(enc.msa_file())
    }

    /// The i-th resampled alignment for one encoding.
    pub fn sample_msa_path(&self, dataset: &str, enc: Encoding, i: usize) -> PathBuf {
        let root = match enc {
            Encoding::Bin => self.msa_root(),
            Encoding::Dolgo | Encoding::DolgoCatg => self.sound_msa_root(),
        };
        root.join(dataset)
            .join("samples")
            .join(format!("sample{i}_{}", enc.stem()))
            .with_extension("phy")
    }

    /// Inference output prefix for a full-data run.
    pub fn prefix(&self, dataset: &str, enc: Encoding) -> PathBuf {
        self.inference_root().join(dataset).join(enc.stem())
    }

    /// Inference output prefix for the i-th replicate run.
    pub fn sample_prefix(&self, dataset: &str, enc: Encoding, i: usize) -> PathBuf {
        self.inference_root()
            .join(dataset)
            .join(format!("{}_samples", enc.stem()))
            .join(format!("sample{i}_{}", enc.stem()))
    }
}

/// Where the inference tool leaves its maximum-likelihood tree for a given
/// output prefix.
pub fn best_tree_path(prefix: &Path) -> PathBuf {
    let mut name = prefix
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    name.push(".raxml.bestTree");
    prefix.with_file_name(name)
}

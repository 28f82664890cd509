//! Command line argument parsing for the pokembed CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::dataset::ItemId;
use crate::embedding::ModelKind;
use crate::embedding::vector::UNIT_NORM_TOLERANCE;
use crate::store::OutputFormat;

/// Pokembed - build and inspect Pokémon image-embedding datasets
#[derive(Parser, Debug, Clone)]
#[command(name = "pokembed")]
#[command(about = "Convert artwork, compute image embeddings, and verify the results")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PokembedArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Format of command results
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub display_format: DisplayFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PokembedArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Flatten RGBA artwork onto white and save it as RGB PNGs
    Convert(ConvertArgs),

    /// Compute embeddings for a directory of artwork
    Embed(EmbedArgs),

    /// Check shapes, norms and id completeness of a saved dataset
    Verify(VerifyArgs),

    /// List the items most similar to one item
    Similar(SimilarArgs),
}

/// Arguments for converting artwork
#[derive(Parser, Debug, Clone)]
pub struct ConvertArgs {
    /// Directory of source PNG files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving RGB PNG files (created if missing)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,
}

/// Arguments for computing embeddings
#[derive(Parser, Debug, Clone)]
pub struct EmbedArgs {
    /// Directory of NNNN.png artwork
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Output file, or path prefix for the npy pair
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Embed ids 1..=N instead of scanning the directory
    #[arg(short = 'n', long, conflicts_with = "manifest")]
    pub count: Option<usize>,

    /// JSON manifest mapping ids to image paths
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Embed at most this many items
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Items per model call
    #[arg(short, long, env = "POKEMBED_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Worker threads
    #[arg(short, long, env = "POKEMBED_WORKERS")]
    pub workers: Option<usize>,

    /// On-disk format of the embeddings
    #[arg(short, long, default_value = "npy")]
    pub output_format: OutputFormat,

    /// Vision model
    #[arg(short, long, default_value = "color-grid")]
    pub model: ModelKind,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Write the run report (JSON) to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Where a saved dataset lives: an npy pair or a single table file
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Id array (.npy)
    #[arg(long, value_name = "FILE", requires = "embeddings")]
    pub ids: Option<PathBuf>,

    /// Embedding matrix (.npy)
    #[arg(long, value_name = "FILE", requires = "ids")]
    pub embeddings: Option<PathBuf>,

    /// Parquet or JSON table
    #[arg(long, value_name = "FILE", conflicts_with_all = ["ids", "embeddings"])]
    pub table: Option<PathBuf>,
}

/// Arguments for verifying a dataset
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Expect exactly the ids 1..=N
    #[arg(short = 'n', long)]
    pub expected_count: Option<usize>,

    /// Allowed deviation of each norm from 1.0
    #[arg(short, long, default_value_t = UNIT_NORM_TOLERANCE)]
    pub tolerance: f32,
}

/// Arguments for similarity lookup
#[derive(Parser, Debug, Clone)]
pub struct SimilarArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Item to find neighbours for
    #[arg(value_name = "ID")]
    pub id: ItemId,

    /// Number of neighbours
    #[arg(short = 'k', long, default_value = "6")]
    pub top_k: usize,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_embed_command() {
        let args = PokembedArgs::try_parse_from([
            "pokembed",
            "embed",
            "artwork_rgb",
            "out/pokemon",
            "--count",
            "1025",
            "--batch-size",
            "16",
            "--output-format",
            "parquet",
            "--progress",
        ])
        .unwrap();

        if let Command::Embed(embed_args) = args.command {
            assert_eq!(embed_args.input_dir, PathBuf::from("artwork_rgb"));
            assert_eq!(embed_args.destination, PathBuf::from("out/pokemon"));
            assert_eq!(embed_args.count, Some(1025));
            assert_eq!(embed_args.batch_size, Some(16));
            assert_eq!(embed_args.output_format, OutputFormat::Parquet);
            assert_eq!(embed_args.model, ModelKind::ColorGrid);
            assert!(embed_args.progress);
        } else {
            panic!("Expected Embed command");
        }
    }

    #[test]
    fn test_count_conflicts_with_manifest() {
        let result = PokembedArgs::try_parse_from([
            "pokembed",
            "embed",
            "in",
            "out",
            "--count",
            "3",
            "--manifest",
            "m.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_command() {
        let args =
            PokembedArgs::try_parse_from(["pokembed", "convert", "artwork", "artwork_rgb"]).unwrap();

        if let Command::Convert(convert_args) = args.command {
            assert_eq!(convert_args.input_dir, PathBuf::from("artwork"));
            assert_eq!(convert_args.output_dir, PathBuf::from("artwork_rgb"));
        } else {
            panic!("Expected Convert command");
        }
    }

    #[test]
    fn test_verify_command() {
        let args = PokembedArgs::try_parse_from([
            "pokembed",
            "verify",
            "--ids",
            "pokemon_ids.npy",
            "--embeddings",
            "pokemon_embeddings.npy",
            "--expected-count",
            "1025",
        ])
        .unwrap();

        if let Command::Verify(verify_args) = args.command {
            assert_eq!(verify_args.dataset.ids, Some(PathBuf::from("pokemon_ids.npy")));
            assert_eq!(verify_args.expected_count, Some(1025));
            assert_eq!(verify_args.tolerance, UNIT_NORM_TOLERANCE);
        } else {
            panic!("Expected Verify command");
        }
    }

    #[test]
    fn test_dataset_arg_rules() {
        // ids without embeddings
        assert!(PokembedArgs::try_parse_from(["pokembed", "verify", "--ids", "a.npy"]).is_err());

        // table excludes the npy pair
        assert!(
            PokembedArgs::try_parse_from([
                "pokembed",
                "verify",
                "--table",
                "e.parquet",
                "--ids",
                "a.npy",
                "--embeddings",
                "b.npy",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_similar_command() {
        let args = PokembedArgs::try_parse_from([
            "pokembed",
            "similar",
            "--table",
            "pokemon.json",
            "25",
            "-k",
            "3",
        ])
        .unwrap();

        if let Command::Similar(similar_args) = args.command {
            assert_eq!(similar_args.id, 25);
            assert_eq!(similar_args.top_k, 3);
            assert_eq!(similar_args.dataset.table, Some(PathBuf::from("pokemon.json")));
        } else {
            panic!("Expected Similar command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = PokembedArgs::try_parse_from(["pokembed", "convert", "a", "b"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = PokembedArgs::try_parse_from(["pokembed", "-vv", "convert", "a", "b"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = PokembedArgs::try_parse_from(["pokembed", "--quiet", "convert", "a", "b"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_display_format() {
        let args =
            PokembedArgs::try_parse_from(["pokembed", "--format", "json", "convert", "a", "b"]).unwrap();
        assert_eq!(args.display_format, DisplayFormat::Json);
    }
}

//! arbor CLI tool
//!
//! Command-line interface for inspecting node types and normalizing documents with arbor-core.
//!
//! ## Commands
//!
//! - `types`: Print the registered node type hierarchy
//! - `normalize <file> --type <TypeName>`: Read a document into a node of the given type and print
//!   its canonical (sparse) serialization

use arbor_core::{
    config::TreeConfig,
    format::{self, DocFormat},
    registry::TYPES,
    tree::{SerializeOptions, Tree},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about = "A tool for inspecting and normalizing arbor documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the registered node type hierarchy
    Types,

    /// Deserialize a document into a node and print it back out
    Normalize {
        /// Path to the JSON, YAML or TOML document
        path: PathBuf,

        /// Node type to instantiate for the document
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Tree configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit defaulted values instead of omitting them
        #[arg(long)]
        full: bool,

        /// Output format (defaults to the input format)
        #[arg(long)]
        to: Option<DocFormat>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Types => {
            print!("{}", TYPES.hierarchy());
            Ok(())
        }

        Commands::Normalize {
            path,
            type_name,
            config,
            full,
            to,
        } => {
            let input_format = DocFormat::from_path(&path).unwrap_or(DocFormat::Json);
            let output_format = to.unwrap_or(input_format);
            let config = match config {
                Some(config) => TreeConfig::load(config)?,
                None => TreeConfig::default(),
            };

            let text = std::fs::read_to_string(&path)?;
            let data = format::parse(&text, input_format)?;

            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .unwrap_or("document")
                .to_string();
            let mut tree = Tree::with_config(config);
            let document = tree.add(tree.root(), &name, &type_name)?;
            tree.deserialize(document, &data)?;
            tree.update_subtree(document, false)?;

            let options = SerializeOptions {
                include_defaults: full,
            };
            match tree.serialize_with(document, &options) {
                Some(value) => println!("{}", format::emit(&value, output_format)?),
                None => tracing::info!("{} holds only default values", tree.path(document)),
            }

            let diagnostics = tree.take_diagnostics();
            if !diagnostics.is_empty() {
                eprintln!("\n=== Diagnostics ({}) ===", diagnostics.len());
                for diagnostic in diagnostics {
                    eprintln!("{diagnostic}");
                }
            }
            Ok(())
        }
    }
}

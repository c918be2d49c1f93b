#![forbid(unsafe_code)]
//! tagtree command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use tagtree::path::parse_path;
use tagtree::{Config, DocPath, Indexer};

#[derive(Parser)]
#[command(name = "tagtree")]
#[command(about = "Tag-comment documentation extraction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".tagtree.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse sources and write the aggregated JSON document
    Build {
        /// Root directory to scan
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Output document path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include entities marked @private
        #[arg(long)]
        show_private: bool,

        /// Include entities marked @internal
        #[arg(long)]
        show_internal: bool,

        /// Restrict output to the @api surface
        #[arg(long)]
        api_only: bool,
    },

    /// Resolve the relative link address between two entity paths
    Resolve {
        /// Address to link from
        from: String,

        /// Address to link to
        to: String,

        /// Root directory to scan
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Build {
            root,
            output,
            show_private,
            show_internal,
            api_only,
        } => {
            config.root = root;
            if let Some(path) = output {
                config.output.path = path;
            }
            config.display.show_private |= show_private;
            config.display.show_internal |= show_internal;
            config.display.api_only |= api_only;

            let output_config = config.output.clone();
            let mut indexer = Indexer::new(config);
            indexer.run()?;

            report(&indexer);
            if indexer.diagnostics().has_errors() {
                eprintln!(
                    "{} errors present, no output written",
                    style("✗").red()
                );
                std::process::exit(1);
            }

            tagtree::output::write_document(indexer.tree(), &output_config)?;
            println!(
                "{} wrote {}",
                style("✓").green(),
                output_config.path.display()
            );
        }

        Commands::Resolve { from, to, root } => {
            config.root = root;
            let mut indexer = Indexer::new(config);
            indexer.run()?;
            report(&indexer);

            let from = parse_path(&from, &DocPath::root(), None)?;
            let to = parse_path(&to, &DocPath::root(), None)?;
            println!("{}", indexer.tree().relative_link_address(&from, &to));
        }
    }

    Ok(())
}

fn report(indexer: &Indexer) {
    for warning in indexer.diagnostics().warnings() {
        eprintln!(
            "{} {}{}",
            style("!").yellow(),
            warning.message,
            location(warning)
        );
    }
    for error in indexer.diagnostics().errors() {
        eprintln!(
            "{} {}{}",
            style("✗").red(),
            error.message,
            location(error)
        );
    }
}

fn location(diagnostic: &tagtree::report::Diagnostic) -> String {
    match &diagnostic.file {
        Some(file) => format!(" ({})", file.display()),
        None => String::new(),
    }
}

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use phototree::config::{CategorizationConfig, default_config_path};
use phototree::core::{AnalyzedImage, CategoryTree, ImageIdStrategy, ScannerService};
use phototree::services::analysis::{load_analysis_file, save_analysis_file};
use phototree::services::{
    CategorizationAlgorithm, CategorizationService, ContentBasedCategorization, FolderPlan,
    HierarchicalClustering, HybridCategorization,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "phototree", version, about = "Sort photos into a category hierarchy")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Categorize a folder of images, or a saved analysis file
    Categorize {
        /// Directory (or single image) to analyze
        #[arg(short, long, value_name = "DIR", required_unless_present = "analysis")]
        path: Option<PathBuf>,
        /// JSON analysis file written by `analyze` or an external tagger
        #[arg(short, long, value_name = "FILE", conflicts_with = "path")]
        analysis: Option<PathBuf>,
        /// Config file (default: the user config location, if present)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Algorithm::Hybrid)]
        algorithm: Algorithm,
        /// How image ids are derived from files
        #[arg(long, value_enum)]
        id_strategy: Option<ImageIdStrategy>,
        /// Only look at the top level of DIR
        #[arg(long)]
        flat: bool,
        /// Print a JSON report instead of a tree
        #[arg(long)]
        json: bool,
        /// Write the JSON report to FILE
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Analyze images and save their tags and features as JSON
    Analyze {
        /// Directory (or single image) to analyze
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Where to write the analysis
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        #[arg(long, value_enum)]
        id_strategy: Option<ImageIdStrategy>,
        #[arg(long)]
        flat: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Print the effective configuration as JSON
    Show {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print where the default config file lives
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Hybrid,
    Content,
    Clustering,
}

impl Algorithm {
    fn build(self, config: &CategorizationConfig) -> Box<dyn CategorizationAlgorithm> {
        match self {
            Algorithm::Hybrid => Box::new(HybridCategorization::from_config(config)),
            Algorithm::Content => Box::new(ContentBasedCategorization::from_config(config)),
            Algorithm::Clustering => Box::new(HierarchicalClustering::from_config(config)),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    algorithm: &'static str,
    image_count: usize,
    categories: Vec<CategoryReport<'a>>,
    plan: &'a FolderPlan,
}

#[derive(Serialize)]
struct CategoryReport<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    depth: usize,
    path: Vec<String>,
    image_count: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Categorize {
            path,
            analysis,
            config,
            algorithm,
            id_strategy,
            flat,
            json,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(strategy) = id_strategy {
                config.image_id_strategy = strategy;
            }

            let service = CategorizationService::new(&config).with_algorithm(algorithm.build(&config));
            let images = match (analysis, path) {
                (Some(file), _) => load_analysis_file(&file)
                    .with_context(|| format!("Failed to load analysis from {}", file.display()))?,
                (None, Some(dir)) => analyze_directory(&service, &dir, !flat)?,
                (None, None) => bail!("either --path or --analysis is required"),
            };
            if images.is_empty() {
                println!("No images to categorize.");
                return Ok(());
            }

            let tree = benchmark("categorization", || service.categorize(&images))
                .context("Failed to categorize images")?;
            let plan = FolderPlan::from_tree(&tree, &images);

            if json || output.is_some() {
                let report = build_report(&tree, &plan, service.algorithm_name(), images.len());
                let rendered = serde_json::to_string_pretty(&report)?;
                match output {
                    Some(file) => {
                        fs::write(&file, rendered)
                            .with_context(|| format!("Failed to write {}", file.display()))?;
                        println!("▶ Report written to {}", file.display());
                    }
                    None => println!("{}", rendered),
                }
            } else {
                print_tree(&tree, &plan);
            }
        }

        Commands::Analyze {
            path,
            output,
            id_strategy,
            flat,
        } => {
            let mut config = load_config(None)?;
            if let Some(strategy) = id_strategy {
                config.image_id_strategy = strategy;
            }

            let service = CategorizationService::new(&config);
            let images = analyze_directory(&service, &path, !flat)?;
            save_analysis_file(&output, &images)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("▶ Saved analysis of {} images to {}", images.len(), output.display());
        }

        Commands::Config { command } => match command {
            ConfigCmd::Show { config } => {
                let config = load_config(config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCmd::Path => match default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => bail!("no config directory on this platform"),
            },
        },
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CategorizationConfig> {
    let config = match path {
        Some(path) => CategorizationConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CategorizationConfig::load_or_default().context("Failed to load default config")?,
    };
    config.validate()?;
    Ok(config)
}

/// Scan `dir` for images and analyze them in parallel behind a progress bar.
fn analyze_directory(
    service: &CategorizationService,
    dir: &Path,
    recursive: bool,
) -> Result<Vec<AnalyzedImage>> {
    println!("▶ Scanning for images in: {}", dir.display());
    let paths = ScannerService::new()
        .recursive(recursive)
        .discover_images(dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    if paths.is_empty() {
        return Ok(Vec::new());
    }

    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    progress.set_message("analyzing");

    let images = benchmark("analyzing images", || {
        service.analyze_paths(&paths, |_| progress.inc(1))
    });
    progress.finish_with_message("analysis complete");

    let skipped = paths.len() - images.len();
    if skipped > 0 {
        println!("⚠ Skipped {} unreadable image(s)", skipped);
    }
    Ok(images)
}

fn build_report<'a>(
    tree: &'a CategoryTree,
    plan: &'a FolderPlan,
    algorithm: &'static str,
    image_count: usize,
) -> Report<'a> {
    let categories = tree
        .get_category_hierarchy()
        .into_iter()
        .map(|(category, depth)| CategoryReport {
            id: category.id.as_str(),
            name: &category.name,
            description: &category.description,
            depth,
            path: tree.get_category_path_names(&category.id),
            image_count: category.image_ids.len(),
        })
        .collect();

    Report {
        generated_at: Utc::now().to_rfc3339(),
        algorithm,
        image_count,
        categories,
        plan,
    }
}

fn print_tree(tree: &CategoryTree, plan: &FolderPlan) {
    println!("Found {} categories:", tree.len());
    for (category, depth) in tree.get_category_hierarchy() {
        println!(
            "{}▶ {} ({} images)",
            "  ".repeat(depth + 1),
            category.name,
            category.image_ids.len()
        );
    }

    println!("Folders:");
    for (folder, count) in plan.folder_counts() {
        println!("   {} ← {} images", folder.display(), count);
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::debug!("{} took {:.2?}", label, start.elapsed());
    result
}

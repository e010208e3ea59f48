//! skogdata CLI
//!
//! Resolve, cache and assemble Trädhöjd tree-height tiles for a polygon.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use skogdata::{write_geotiff, Config, DataSourceCatalog, QueryGeometry, TILE_AUXILIARY};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "skogdata")]
#[command(about = "Resolve, cache and mosaic Trädhöjd tree-height tiles", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Query polygon, given inline as WKT or as a GeoJSON file.
#[derive(Args)]
struct QueryArgs {
    /// Polygon in WKT (SWEREF99 TM)
    #[arg(long, conflicts_with = "geojson", required_unless_present = "geojson")]
    wkt: Option<String>,

    /// GeoJSON file holding a polygon geometry or a single feature
    #[arg(long)]
    geojson: Option<PathBuf>,
}

impl QueryArgs {
    fn parse(&self) -> Result<QueryGeometry> {
        match (&self.wkt, &self.geojson) {
            (Some(wkt), _) => Ok(QueryGeometry::from_wkt(wkt)?),
            (None, Some(path)) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok(QueryGeometry::from_geojson(&text)
                    .with_context(|| format!("parsing {}", path.display()))?)
            }
            (None, None) => anyhow::bail!("either --wkt or --geojson is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tile identifiers covering the polygon
    Resolve(QueryArgs),

    /// Print the archive paths of the covering tiles
    Files(QueryArgs),

    /// Print the tile files that are not cached yet
    Misses(QueryArgs),

    /// Report whether the polygon is covered and fully cached
    Covered(QueryArgs),

    /// Download every missing tile file for the polygon
    Fetch(QueryArgs),

    /// Assemble the tree-height raster and write it as GeoTIFF
    Load {
        #[command(flatten)]
        query: QueryArgs,

        /// Margin around the polygon's bounding box, in metres
        #[arg(long)]
        padding: Option<f64>,

        /// Output GeoTIFF path
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }

    let catalog = DataSourceCatalog::from_config(&config)?;
    tracing::debug!("Cache root {}", catalog.cache().root().display());

    match cli.command {
        Commands::Resolve(query) => {
            let ids = catalog.index().resolve(&query.parse()?)?;
            print_json(&ids)?;
        }

        Commands::Files(query) => {
            let files = catalog.index().filenames(&query.parse()?)?;
            print_json(&files)?;
        }

        Commands::Misses(query) => {
            let misses = catalog
                .index()
                .cache_misses(&query.parse()?, catalog.cache())?;
            let misses: Vec<String> = misses.iter().map(|p| p.display().to_string()).collect();
            print_json(&misses)?;
        }

        Commands::Covered(query) => {
            let query = query.parse()?;
            let index = catalog.index();
            let report = serde_json::json!({
                "covered": index.is_fully_covered(&query)?,
                "cached": index.is_available_in_cache(&query, catalog.cache())?,
            });
            print_json(&report)?;
        }

        Commands::Fetch(query) => {
            let files = catalog.index().filenames(&query.parse()?)?;
            if files.is_empty() {
                anyhow::bail!("Data not available for this polygon");
            }
            catalog
                .cache()
                .ensure_all_present(&files, &TILE_AUXILIARY)
                .context("downloading tiles")?;

            let stats = catalog.cache().fetcher().download_stats();
            tracing::info!(
                "{} tile(s) cached, {} file(s) / {} bytes downloaded",
                files.len(),
                stats.files_downloaded,
                stats.bytes_downloaded
            );
        }

        Commands::Load {
            query,
            padding,
            out,
        } => {
            let padding = padding.unwrap_or(config.padding);
            let raster = catalog
                .tradhojd()
                .load_raster(&query.parse()?, padding)
                .context("assembling raster")?;
            write_geotiff(&raster, &out).with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(
                "Wrote {}x{} raster to {}",
                raster.width(),
                raster.height(),
                out.display()
            );
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

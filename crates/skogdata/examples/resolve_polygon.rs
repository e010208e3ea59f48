//! Example: Resolve the Trädhöjd tiles covering a WKT polygon.
//!
//! Usage: cargo run --example resolve_polygon -- "<wkt>" [cache_dir]
//!
//! Downloads the tile metadata if it is not cached yet, then lists the tiles
//! covering the polygon and which of their files are still missing locally.

use skogdata::{Config, DataSourceCatalog, QueryGeometry};
use std::env;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <wkt> [cache_dir]", args[0]);
        eprintln!(
            "Example: {} \"POLYGON((542501 6930000, 547001 6930000, 547001 6930050, 542501 6930050, 542501 6930000))\" ./cache",
            args[0]
        );
        std::process::exit(1);
    }

    let query = QueryGeometry::from_wkt(&args[1]).expect("Invalid WKT polygon");
    let config = Config {
        cache_dir: args.get(2).map(PathBuf::from),
        ..Config::default()
    };

    let catalog = DataSourceCatalog::from_config(&config).expect("Failed to set up data sources");
    println!("Cache: {}", catalog.cache().root().display());

    let start = Instant::now();
    let index = catalog.index();
    let ids = match index.resolve(&query) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Resolved in {:.3}s", start.elapsed().as_secs_f64());

    if ids.is_empty() {
        println!("Polygon is not fully covered by the archive");
        return;
    }

    for id in &ids {
        println!("  {}", id);
    }

    let misses = index
        .cache_misses(&query, catalog.cache())
        .expect("Failed to check cache");
    println!("{} file(s) missing from cache", misses.len());
    for path in misses {
        println!("  {}", path.display());
    }
}

//! The `process` command: run the acquisition pipeline over a roads file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use roadscout::cache::FsGeometryCache;
use roadscout::elevation::{ElevationClient, ElevationConfig};
use roadscout::net::ReqwestTransport;
use roadscout::overpass::{FetchConfig, OverpassClient};
use roadscout::pipeline::RoadPipeline;
use roadscout::resolve::ResolverConfig;
use roadscout::road::RoadSpec;
use roadscout::routing::{DirectionsClient, RoutingConfig};
use roadscout::strategy::{
    AcquisitionStrategy, DirectQueryStrategy, SegmentationConfig, SegmentedQueryStrategy,
    WaypointRoutingStrategy,
};
use roadscout::validate::{QualityValidator, ValidatorConfig};

use crate::error::CliError;

/// Arguments for `roadscout process`.
#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Path to the roads definitions JSON file.
    pub roads_file: PathBuf,

    /// Directory for output records (one JSON file per road).
    #[arg(long, default_value = "output")]
    pub out: PathBuf,

    /// Geometry cache directory (defaults to the platform cache dir).
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Override the line-geometry service endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Access token for the elevation and routing services
    /// (defaults to the MAPBOX_TOKEN environment variable).
    #[arg(long)]
    pub token: Option<String>,

    /// Skip elevation sampling.
    #[arg(long)]
    pub no_elevation: bool,

    /// Cache entry lifetime in days.
    #[arg(long, default_value_t = 30)]
    pub cache_ttl_days: i64,
}

/// Run the command.
pub fn run(args: ProcessArgs) -> Result<(), CliError> {
    let roads = load_roads(&args.roads_file)?;
    println!("Loaded {} road(s) from {}", roads.len(), args.roads_file.display());

    let token = args
        .token
        .clone()
        .or_else(|| std::env::var("MAPBOX_TOKEN").ok())
        .filter(|t| !t.is_empty());

    let pipeline = build_pipeline(&args, token.as_deref())?;
    let summary = pipeline.process_batch(&roads);

    fs::create_dir_all(&args.out).map_err(|e| CliError::WriteFailed {
        path: args.out.clone(),
        source: e,
    })?;

    for record in &summary.records {
        let path = args.out.join(format!("{}.json", record.code));
        let payload = serde_json::to_string_pretty(record).map_err(|e| CliError::ParseFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, payload).map_err(|e| CliError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;
        println!(
            "  {} - {:.2} km, {} curves, {} -> {}",
            record.code,
            record.metrics.distance_km,
            record.metrics.curve_count_total,
            record.start_point_name,
            record.end_point_name
        );
    }

    if !summary.failures.is_empty() {
        println!("\n{} road(s) failed:", summary.failures.len());
        for (code, error) in &summary.failures {
            println!("  {} - {}", code, error);
        }
    }

    println!(
        "\nDone: {} processed, {} failed",
        summary.records.len(),
        summary.failures.len()
    );
    Ok(())
}

fn load_roads(path: &PathBuf) -> Result<Vec<RoadSpec>, CliError> {
    let raw = fs::read_to_string(path).map_err(|e| CliError::ReadFailed {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| CliError::ParseFailed {
        path: path.clone(),
        reason: e.to_string(),
    })
}

fn build_pipeline(args: &ProcessArgs, token: Option<&str>) -> Result<RoadPipeline, CliError> {
    let transport =
        Arc::new(ReqwestTransport::new().map_err(|e| CliError::Transport(e.to_string()))?);

    let mut fetch_config = FetchConfig::default();
    if let Some(endpoint) = &args.endpoint {
        fetch_config = fetch_config.with_endpoint(endpoint.clone());
    }
    let overpass = Arc::new(OverpassClient::new(transport.clone(), fetch_config));
    let resolver = ResolverConfig::default();

    let mut strategies: Vec<Box<dyn AcquisitionStrategy>> = vec![
        Box::new(DirectQueryStrategy::new(overpass.clone(), resolver.clone())),
        Box::new(SegmentedQueryStrategy::new(
            overpass,
            resolver,
            SegmentationConfig::default(),
        )),
    ];

    if let Some(token) = token {
        let directions = DirectionsClient::new(transport.clone(), RoutingConfig::new(token));
        strategies.push(Box::new(WaypointRoutingStrategy::new(
            Arc::new(directions),
            QualityValidator::new(ValidatorConfig::default().with_min_points(2)),
        )));
    } else {
        tracing::warn!("no access token: waypoint routing tier disabled");
    }

    let cache_dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(FsGeometryCache::default_directory);
    let cache = FsGeometryCache::new(cache_dir).with_ttl_days(args.cache_ttl_days);

    let mut pipeline = RoadPipeline::new(
        Box::new(cache),
        strategies,
        QualityValidator::new(ValidatorConfig::default()),
    );

    if let Some(token) = token {
        if !args.no_elevation {
            pipeline = pipeline
                .with_elevation(ElevationClient::new(transport, ElevationConfig::new(token)));
        }
    }

    Ok(pipeline)
}

use std::fs;
use std::path::PathBuf;

use chanlun::{
    DataReceiver, Engine, EngineConfig, StructureReport, init_logging, write_parquet_snapshot,
};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = std::env::args().collect();
    let with_parquet = args.iter().any(|x| x == "--parquet");
    args.retain(|x| x != "--parquet");
    if args.len() < 3 {
        eprintln!(
            "usage: cargo run -p replay --bin export_structures -- <csv_path> <symbol> [output_dir] [config_path] [--parquet]"
        );
        std::process::exit(2);
    }

    init_logging();

    let csv_path = PathBuf::from(&args[1]);
    let symbol = args[2].clone();
    let output_dir = if args.len() >= 4 {
        PathBuf::from(&args[3])
    } else {
        PathBuf::from("dataset").join(&symbol)
    };
    let config = if args.len() >= 5 {
        EngineConfig::load(&args[4])?
    } else {
        EngineConfig::default()
    };

    let mut receiver = DataReceiver::new(Engine::with_config(symbol.clone(), config)?);
    let stats = receiver.ingest_csv(&csv_path)?;
    let engine = receiver.engine();
    info!(
        %symbol,
        accepted = stats.accepted,
        rejected = stats.rejected,
        levels = engine.level_count(),
        "replay finished"
    );

    fs::create_dir_all(&output_dir)?;
    let report = StructureReport::from_engine(engine);
    let report_path = output_dir.join(format!("{symbol}_structures.json"));
    fs::write(&report_path, report.to_json()?)?;
    if with_parquet {
        write_parquet_snapshot(engine, &output_dir)?;
    }

    println!("wrote structures to {}", report_path.display());
    Ok(())
}

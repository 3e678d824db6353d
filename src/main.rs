use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use sportsbet_export_rs::dates::export_dates;
use sportsbet_export_rs::{ExportReport, PageStorage, SportsbetClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sportsbet_export_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <storage.json> <from> <to> [out_dir]", args[0]);
        eprintln!("  storage.json: snapshot of localStorage, sessionStorage and document.cookie");
        eprintln!("                ({{\"local\": {{..}}, \"session\": {{..}}, \"cookie\": \"..\"}})");
        eprintln!("  from, to: DD/MM/YY, DD/MM/YYYY or YYYY-MM-DD");
        eprintln!("  out_dir: where to write the CSV (default: current directory)");
        std::process::exit(1);
    }

    let snapshot_path = PathBuf::from(&args[1]);
    let snapshot = fs::read_to_string(&snapshot_path)
        .with_context(|| format!("Failed to read {}", snapshot_path.display()))?;
    let storage: PageStorage =
        serde_json::from_str(&snapshot).context("Failed to parse storage snapshot")?;

    let dates = match export_dates(&args[2], &args[3]) {
        Ok(dates) => dates,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let out_dir = args
        .get(4)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let client = SportsbetClient::new().context("Failed to build HTTP client")?;

    println!(
        "Downloading transactions {} to {}... large ranges can take a while.",
        dates.display_from, dates.display_to
    );
    let report = client.export(&storage, &dates).await;
    let result = report.result();

    match report {
        ExportReport::Exported(doc) => {
            let path = out_dir.join(&doc.file_name);
            fs::write(&path, &doc.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Downloaded {} rows to {}", doc.row_count, path.display());
            Ok(())
        }
        _ => {
            eprintln!(
                "{}",
                result.message.as_deref().unwrap_or("Failed to export.")
            );
            std::process::exit(1);
        }
    }
}

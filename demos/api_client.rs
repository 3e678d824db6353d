/// Example HTTP client for the export server
///
/// Run the server first:
/// ```bash
/// cargo run --bin server
/// ```
///
/// Then post a storage snapshot captured from a signed-in tab:
/// ```bash
/// cargo run --example api_client -- storage.json 01/03/24 31/03/24
/// ```
use serde::Deserialize;
use sportsbet_export_rs::ExportResult;

#[derive(Deserialize, Debug)]
struct ExportResponse {
    #[serde(flatten)]
    result: ExportResult,
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize, Debug)]
struct MetricsResponse {
    total_requests: u64,
    exports_completed: u64,
    exports_rejected: u64,
    export_in_flight: bool,
    uptime_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <storage.json> <from> <to>", args[0]);
        std::process::exit(1);
    }
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = reqwest::Client::new();

    println!("=== Sportsbet Export API Client Demo ===\n");

    // 1. Health Check
    println!("1. Checking server health...");
    let health: HealthResponse = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json()
        .await?;
    println!("   Server status: {}", health.status);
    println!("   Version: {}\n", health.version);

    // 2. Export
    println!("2. Exporting {} to {}...", args[2], args[3]);
    let storage: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&args[1])?)?;
    let body = serde_json::json!({
        "storage": storage,
        "fromDate": args[2],
        "toDate": args[3],
    });

    match client
        .post(format!("{}/api/export", base_url))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => {
            let status = response.status();
            let export: ExportResponse = response.json().await?;
            if export.result.success {
                let file_name = export.result.file_name.unwrap_or_default();
                let content = export.content.unwrap_or_default();
                std::fs::write(&file_name, content)?;
                println!(
                    "   Downloaded {} rows to {}\n",
                    export.result.row_count.unwrap_or(0),
                    file_name
                );
            } else {
                println!(
                    "   {} ({})\n",
                    export.result.message.unwrap_or_default(),
                    status
                );
            }
        }
        Err(e) => {
            println!("   Request failed: {}\n", e);
        }
    }

    // 3. Get Metrics
    println!("3. Getting server metrics...");
    let metrics: MetricsResponse = client
        .get(format!("{}/api/metrics", base_url))
        .send()
        .await?
        .json()
        .await?;
    println!("   Total requests: {}", metrics.total_requests);
    println!("   Exports completed: {}", metrics.exports_completed);
    println!("   Exports rejected: {}", metrics.exports_rejected);
    println!("   Export in flight: {}", metrics.export_in_flight);
    println!("   Uptime: {} seconds\n", metrics.uptime_seconds);

    println!("=== Demo Complete ===");

    Ok(())
}

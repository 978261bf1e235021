use clap::Parser;
use page_reaper::{Crawl, CrawlConfig, FetchMode};

mod args;
use args::{Args, apply_overrides};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let base = match (&args.config, &args.url) {
        (Some(path), _) => match CrawlConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                ::log::error!("Failed to load config {}: {}", path, e);
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "status": "failed",
                        "error": "config",
                        "details": e.to_string(),
                    })
                );
                std::process::exit(1);
            }
        },
        (None, Some(url)) => CrawlConfig::new(url),
        (None, None) => {
            eprintln!("Either a start URL or --config is required; see --help");
            std::process::exit(1);
        }
    };
    let config = apply_overrides(base, &args);

    ::log::info!("Starting crawler for: {}", config.start_url);

    // Print WebDriver info message for rendered runs
    if config.mode == FetchMode::Rendered {
        println!("Note: Rendered crawling requires a WebDriver server (e.g., ChromeDriver).");
        println!(
            "Set WEBDRIVER_URL environment variable if not using the default {}",
            config.webdriver_url
        );
    }

    let start_time = std::time::Instant::now();

    match Crawl::new(config).run().await {
        Ok(report) => {
            ::log::info!(
                "Crawl finished in {:.2} seconds",
                start_time.elapsed().as_secs_f64()
            );
            match serde_json::to_string_pretty(&report) {
                Ok(summary) => println!("{summary}"),
                Err(e) => {
                    ::log::error!("Failed to serialize the run summary: {}", e);
                    println!(
                        "{} records saved to {}",
                        report.total_records, report.saved_file
                    );
                }
            }
        }
        Err(e) => {
            ::log::error!("Crawl failed: {}", e);
            eprintln!(
                "{}",
                serde_json::json!({
                    "status": "failed",
                    "error": e.kind(),
                    "details": e.to_string(),
                })
            );
            std::process::exit(1);
        }
    }
}

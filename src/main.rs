use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use zipcast_core::{AppError, Config, ConfigError, ProviderChoice};
use zipcast_services::WebhookNotifier;
use zipcast_weather::pipeline::api_client;
use zipcast_weather::{ForecastPipeline, ZipCode};

mod error_mapping;

/// Multi-period weather forecast for a US ZIP code, from api.weather.gov.
#[derive(Parser, Debug)]
#[command(name = "zipcast", version, about)]
struct Args {
    /// 5-digit ZIP code
    zip: ZipCode,

    /// Number of forecast periods to show (all when omitted or 0)
    limit: Option<usize>,

    /// Config file (default: the platform config dir, zipcast/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Geocoding provider used on a cache miss
    #[arg(long)]
    provider: Option<ProviderChoice>,

    /// Also post the forecast to this Discord-compatible webhook
    #[arg(long)]
    webhook: Option<String>,

    /// Show the detailed forecast text for each period
    #[arg(long)]
    detailed: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = zipcast_core::init() {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:?}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let (mut config, _) = Config::load_validated(args.config.as_deref())
        .map_err(|e| AppError::Config(ConfigError::from_load_failure(&e)))?;

    if let Some(provider) = args.provider {
        config.geocode.provider = provider;
    }
    if let Some(url) = args.webhook {
        config.webhook.url = Some(url);
    }
    let limit = args.limit.or(config.forecast.default_limit);

    let pipeline = ForecastPipeline::from_config(&config).map_err(|e| AppError::Other(e.into()))?;
    tracing::info!(
        "Forecast for {} (geocoder: {})",
        args.zip,
        pipeline.resolver().provider().name()
    );

    let report = pipeline
        .run(&args.zip, limit)
        .await
        .map_err(error_mapping::from_pipeline)?;

    let text = report.render(args.detailed);
    println!("{}", text);

    if let Some(url) = config.webhook.url.as_deref() {
        let api = api_client(&config).map_err(|e| AppError::Other(e.into()))?;
        WebhookNotifier::new(api, url)
            .send(&text)
            .await
            .map_err(error_mapping::from_webhook)?;
    }

    Ok(())
}

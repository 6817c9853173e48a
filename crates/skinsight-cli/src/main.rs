//! `skinsight` host binary

mod cli;
mod config;
mod run;

use anyhow::Context;
use cli::{CliCommand, LogFormat};
use config::AppConfig;
use skinsight_core::Session;
use skinsight_http::HttpAnalysisClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn execute(command: CliCommand) -> anyhow::Result<()> {
    match command {
        CliCommand::Options => {
            print!("{}", cli::options_text());
            Ok(())
        }
        CliCommand::Analyze(args) => {
            let config = AppConfig::resolve(args.config.as_deref())?
                .with_endpoint(args.endpoint.as_deref());
            let client = HttpAnalysisClient::new(&config.http)?;
            tracing::debug!(endpoint = %client.endpoint(), "analysis client ready");

            let session = Session::builder(Arc::new(client))
                .config(config.session)
                .build();
            let body = run::analyze(&session, &args).await?;
            let pretty = serde_json::to_string_pretty(&body).context("failed to render result")?;
            println!("{pretty}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let matches = cli::command().get_matches();
    init_tracing(cli::log_format(&matches));

    let result = match cli::parse(&matches) {
        Ok(command) => execute(command).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        tracing::error!(error = %format!("{err:#}"), "skinsight failed");
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

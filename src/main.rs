mod config;
mod normalize;
mod scheme;
mod server;
mod upstream;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use config::Config;
use scheme::{assemble_batch, assemble_scheme, list_slugs};
use server::AppState;
use upstream::UpstreamClient;

#[derive(Parser)]
#[command(name = "myscheme-proxy", about = "REST proxy for the public MyScheme API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP proxy server
    Serve {
        /// Port to listen on (default: $PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Assemble one scheme and print it as JSON
    Fetch {
        /// Scheme slug, e.g. "agriclinics-and-agribusiness-centres-scheme"
        slug: String,
    },
    /// List scheme slugs from the search index
    Slugs {
        /// Start offset into the index
        #[arg(long, default_value_t = 0)]
        from: usize,
        /// Page size
        #[arg(short = 'n', long, default_value_t = 100)]
        size: usize,
    },
    /// Assemble several schemes in one rate-limited pass
    Batch {
        /// Scheme slugs to assemble
        #[arg(required = true)]
        slugs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_filter = if config::is_development() {
        "myscheme_proxy=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let upstream = UpstreamClient::new(&config);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            info!("Debug mode: {}", config.debug);
            let state = Arc::new(AppState { config, upstream });
            server::serve(state, port).await
        }
        Commands::Fetch { slug } => {
            let record = assemble_scheme(&upstream, &slug).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Slugs { from, size } => {
            let page = list_slugs(&upstream, from, size).await?;
            for slug in &page.slugs {
                println!("{}", slug);
            }
            println!("\n{} of {} total schemes", page.slugs.len(), page.total);
            Ok(())
        }
        Commands::Batch { slugs } => {
            let outcome = assemble_batch(&upstream, &slugs).await;
            let assembled = outcome.schemes.len();
            let report = serde_json::json!({
                "schemes": outcome.schemes,
                "total": assembled,
                "requested": outcome.requested,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

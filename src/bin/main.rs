use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "marquee-server")]
#[command(about = "Movie catalog proxy for the TMDB API", long_about = None)]
struct Args {
    /// YAML config file. All settings have defaults.
    #[arg(short, long)]
    config: Option<String>,

    /// Raise the crate log level to debug.
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.debug {
        "marquee=debug,tower_http=debug"
    } else {
        "marquee=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = marquee::run(args.config.as_deref()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

use anyhow::Result;
use clap::Parser;

use toolrelay::api::rest::api::run_rest_server;
use toolrelay::shared::{config, logging};

#[derive(Parser)]
#[command(name = "toolrelay-api")]
#[command(about = "toolrelay REST API - plans and runs tool calls for natural-language requests")]
struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Directory for rotated log files
    #[arg(long, env = "TOOLRELAY_LOG_DIR", default_value = "logs")]
    log_dir: String,

    #[command(flatten)]
    settings: config::AgentSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    let args = Args::parse();

    let _ = logging::init_service_logging(&args.log_dir, "toolrelay_api");

    run_rest_server(&args.settings, &args.host, args.port).await
}

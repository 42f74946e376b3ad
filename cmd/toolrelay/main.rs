use anyhow::Result;
use clap::{Parser, Subcommand};

use toolrelay::agent::{build_client, ConversationState};
use toolrelay::shared::{config, logging};

#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(about = "Ask a question and let toolrelay plan and run the tools to answer it")]
struct Cli {
    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one message with a fresh conversation
    Ask {
        /// The request to answer
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Model id used to pick credentials
        #[arg(long, default_value = "")]
        model: String,

        /// Key tried before every configured key
        #[arg(long, env = "TOOLRELAY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[command(flatten)]
        settings: config::AgentSettings,
    },
    /// Show CLI version
    Version,
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask {
            message,
            model,
            api_key,
            settings,
        } => {
            let _ = logging::init_cli_logging(cli.verbose);
            let client = build_client(&settings)?;
            client.credentials().set_override(api_key);

            let mut conversation = ConversationState::new();
            let reply = client
                .generate_agent_response(&mut conversation, &message.join(" "), &model)
                .await?;
            println!("{reply}");
        }
        Command::Version => {
            println!("toolrelay {}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

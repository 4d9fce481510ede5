mod chat;
mod config;
mod decoder;
mod error;
mod events;
mod repl;
mod session;
mod streaming;
mod transport;
mod ui;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chat::ChatClient;
use config::Config;
use events::ConversationId;
use repl::Repl;
use session::Session;
use transport::ApiClient;

#[derive(Parser)]
#[command(name = "hunyuan")]
#[command(version)]
#[command(about = "Chat with HunYuan from the terminal", long_about = None)]
struct Cli {
    /// File holding the browser cookie for hunyuan.tencent.com
    #[arg(long, global = true)]
    cookie_file: Option<PathBuf>,

    /// Config file (defaults to ~/.hunyuan/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resume an existing conversation instead of creating one
    #[arg(long, global = true)]
    chat_id: Option<String>,

    /// Print answers once complete instead of streaming them
    #[arg(long, global = true)]
    no_stream: bool,

    /// Keep using a full conversation instead of starting a new one
    #[arg(long, global = true)]
    no_auto_rollover: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        prompt: Vec<String>,
        /// Ignore earlier messages of the conversation
        #[arg(long)]
        skip_history: bool,
    },
    /// Ask for an image and print its link
    Draw { description: Vec<String> },
    /// List recent conversations
    List,
    /// Print the record of a conversation (defaults to --chat-id)
    History { id: Option<String> },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.cookie_file {
        config.cookie_file = Some(path);
    }
    if cli.no_stream {
        config.stream = false;
    }
    if cli.no_auto_rollover {
        config.auto_rollover = false;
    }

    let cookie = config.read_cookie()?;
    let client = ApiClient::new(&config, &cookie)?;
    let chat = ChatClient::from_config(&config);
    let resume = cli.chat_id.map(ConversationId::from);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let session = Session::start(client, resume, config.auto_rollover).await?;
            Repl::new(session, chat, config.stream)?.run().await?;
        }
        Commands::Ask {
            prompt,
            skip_history,
        } => {
            let mut session = Session::start(client, resume, config.auto_rollover).await?;
            let answer = chat
                .ask(&mut session, &prompt.join(" "), None, skip_history)
                .await?;
            println!("{answer}");
        }
        Commands::Draw { description } => {
            let mut session = Session::start(client, resume, config.auto_rollover).await?;
            let link = chat.draw_image(&mut session, &description.join(" ")).await?;
            println!("{link}");
        }
        Commands::List => {
            repl::print_conversations(&session::list_conversations(&client).await?);
        }
        Commands::History { id } => {
            let id = id
                .map(ConversationId::from)
                .or(resume)
                .context("Give a chat id, either as argument or with --chat-id")?;
            let history = session::fetch_conversation(&client, &id).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }

    Ok(())
}

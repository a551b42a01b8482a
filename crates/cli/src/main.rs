mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mcp::Server;
use runtime::{CapabilityRegistry, OpenAiBackend, Session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, ServerEntry};
use error::{Error, Result};

const CONFIG_FILE: &str = "almanac.toml";

#[derive(Parser)]
#[command(name = "almanac")]
#[command(about = "A weather and Notion assistant backed by MCP tool servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// List the tools offered by every configured server
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(config).await,
        Some(Commands::Tools) => cmd_tools(config).await,
    }
}

async fn cmd_chat(config: Config) -> Result<()> {
    println!("almanac v{}", env!("CARGO_PKG_VERSION"));

    let api_key = config.api_key().ok_or_else(|| Error::MissingApiKey {
        var: config.model.api_key_env.clone(),
    })?;
    let backend = OpenAiBackend::builder(api_key, &config.model.name)
        .base_url(&config.model.base_url)
        .build();

    let registry = connect_servers(&config).await;
    if registry.is_empty() {
        warn!("no capability servers connected; continuing without tools");
    }

    println!("Model: {backend}");
    println!("Servers: {}", registry.server_names().join(", "));

    let mut session = Session::new(registry, backend).with_config(config.session);
    println!("Session ID: {}", session.id);
    println!("Type 'quit' to exit, 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" | "bye" => break,
            "help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        match session.chat(input).await {
            Ok(outcome) => {
                let text = outcome.text();
                if !text.is_empty() {
                    println!("\nAssistant: {text}\n");
                }
            }
            Err(e) => {
                eprintln!("\nError: {e}");
                eprintln!("Please try again or type 'help' for assistance.\n");
            }
        }
    }

    session.end().await;
    println!("Goodbye!");
    Ok(())
}

async fn cmd_tools(config: Config) -> Result<()> {
    let registry = connect_servers(&config).await;
    let (specs, failures) = registry.list_all_tools_lenient().await;

    if specs.is_empty() {
        println!("No tools available.");
    }
    for spec in &specs {
        println!("{:<40}  {}", spec.full_name(), spec.description);
    }
    for failure in &failures {
        eprintln!("Error: {failure}");
    }

    registry.close_all().await;
    Ok(())
}

/// Connect and register every configured server, skipping the ones that fail.
async fn connect_servers(config: &Config) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    for (name, entry) in &config.servers {
        let server = match connect(name, entry).await {
            Ok(server) => server,
            Err(e) => {
                warn!(server = %name, error = %e, "failed to connect, skipping");
                continue;
            }
        };

        match registry.register_server(name.clone(), server) {
            Ok(()) => info!(server = %name, "connected"),
            Err(e) => warn!(server = %name, error = %e, "skipping server"),
        }
    }

    registry
}

async fn connect(name: &str, entry: &ServerEntry) -> mcp::Result<Server> {
    let server = Server::connect(entry.server_config(name)).await?;
    if let Err(e) = server.initialize().await {
        server.shutdown().await;
        return Err(e);
    }
    Ok(server)
}

fn print_help() {
    println!(
        "
Commands:
  help               Show this message
  quit, exit, bye    End the session

Anything else is sent to the assistant, for example:
  What's the weather in Paris?
  Find my Notion page about the trip and add tomorrow's forecast to it.
"
    );
}

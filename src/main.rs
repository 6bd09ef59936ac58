//! CLI entry point for `burner-inbox`.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};

use burner_inbox::address::{create_address, share_token, validated_address_from_share_token};
use burner_inbox::config::{self, Config};
use burner_inbox::{DirStore, FileRegistry, ParsedMessage, Parser, Poller, RawMessage, scan_inbox};

#[derive(ClapParser)]
#[command(name = "burner-inbox", version, about = "Disposable email inboxes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $BURNER_INBOX_CONFIG or the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mail directory, overriding the configured one
    #[arg(long, global = true, value_name = "DIR")]
    mail_dir: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and register a new address
    New,
    /// Scan the mail directory once for an address
    Check {
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Scan once for the address carried by a share token issued today
    Open {
        token: String,
        #[arg(long)]
        json: bool,
    },
    /// Keep scanning the mail directory for an address
    Watch { address: String },
    /// Parse one raw message file
    Parse {
        path: PathBuf,
        /// Skip the MIME parser and use line scanning only
        #[arg(long)]
        manual: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = cli
        .config
        .as_deref()
        .map_or_else(config::load_config, config::load_config_from);
    if let Some(dir) = cli.mail_dir {
        config.storage.mail_dir = dir;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    match cli.command {
        Commands::New => cmd_new(&config),
        Commands::Check { address, json } => cmd_check(&config, &address, json),
        Commands::Open { token, json } => cmd_open(&config, &token, json),
        Commands::Watch { address } => cmd_watch(&config, &address),
        Commands::Parse { path, manual, json } => cmd_parse(&path, manual, json),
    }
}

fn setup_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_new(config: &Config) -> anyhow::Result<()> {
    let registry = FileRegistry::new(config::registry_path(config));
    let record = create_address(&registry, &config.general.domain)?;

    println!("{}", record.address);
    println!("share token: {}", share_token(&record.address));
    Ok(())
}

fn cmd_check(config: &Config, address: &str, json: bool) -> anyhow::Result<()> {
    let store = DirStore::new(config.storage.mail_dir.clone());
    let messages = scan_inbox(&store, &Parser::default(), &config.storage.prefix, address);
    print_messages(&messages, json)
}

fn cmd_open(config: &Config, token: &str, json: bool) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let address = validated_address_from_share_token(token, &config.general.domain, today)
        .context("Share token is not a valid address issued today")?;

    println!("{address}");
    cmd_check(config, &address, json)
}

fn cmd_watch(config: &Config, address: &str) -> anyhow::Result<()> {
    let store = DirStore::new(config.storage.mail_dir.clone());
    let poller = Poller::new(store, Parser::default(), address)
        .with_prefix(config.storage.prefix.clone())
        .with_settings(config.polling.settings());

    eprintln!(
        "Watching {address} every {}s (Ctrl-C to stop)",
        config.polling.interval_secs
    );

    let stop = AtomicBool::new(false);
    poller.run(&stop, |messages| {
        println!("--- {} message(s) ---", messages.len());
        for message in messages {
            println!("{message}");
        }
    });
    Ok(())
}

fn cmd_parse(path: &Path, manual: bool, json: bool) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let raw = RawMessage::from_bytes(&bytes, path.display().to_string());

    let parser = if manual {
        Parser::manual()
    } else {
        Parser::default()
    };
    print_messages(&[parser.parse(&raw)], json)
}

fn print_messages(messages: &[ParsedMessage], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages.");
    }
    for message in messages {
        println!("{message}");
        println!("  key:  {}", message.source_key);
        println!("  body: {}", message.body);
    }
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use jobtrail::config::{Config, MAX_LIST_PAGE};
use jobtrail::fixture_store::FixtureOpener;
use jobtrail::gmail_client::GmailOpener;
use jobtrail::identity::IdentityProvider;
use jobtrail::pipeline::{Pipeline, StoreOpener};
use jobtrail::report;
use jobtrail::trigger::{self, Request, Response};

#[derive(Parser)]
#[command(name = "jobtrail")]
#[command(about = "Counts job application emails in a Gmail inbox and reports the pace over time")]
#[command(version = "0.1.0")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Analyse a Gmail-shaped JSON export instead of the live mailbox
    #[arg(short, long, global = true)]
    fixture: Option<String>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Maximum number of inbox emails to inspect
    #[arg(short = 'l', long, global = true)]
    max_results: Option<u32>,

    /// Number of metadata fetches in flight at once
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,

    /// Behaviour when a single email cannot be fetched: isolate or fail-fast
    #[arg(long, global = true)]
    failure_policy: Option<String>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Analyse the cached account (default)
    Analyze,
    /// Choose another Google account, then analyse it
    SwitchAccount,
    /// Answer JSON requests read line by line from stdin
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    let mut config = Config::new()?;
    apply_overrides(&mut config, &args)?;

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("🔑 Credentials: {}", config.gmail.credentials_path.as_deref().unwrap_or("(not set)"));
        println!("💾 Token cache: {}", config.gmail.token_cache_path);
        println!("🔎 Query: {} (max {})", config.gmail.query, config.gmail.max_results);
        println!("⚡ Fetch: {} concurrent, {}s timeout, policy {:?}",
                 config.analysis.fetch_concurrency,
                 config.analysis.fetch_timeout_secs,
                 config.failure_policy()?);
        println!("🏷️  Keywords: {}", config.analysis.keywords.join(", "));
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config)?;
    let opener: Box<dyn StoreOpener> = match &args.fixture {
        Some(path) => {
            info!("🧪 Offline run using fixture {}", path);
            Box::new(FixtureOpener::new(path))
        }
        None => {
            info!("🚀 Live run against Gmail API");
            let provider = IdentityProvider::new(&config.gmail)?;
            Box::new(GmailOpener::new(provider, config.list_timeout()))
        }
    };

    let request = match args.command.unwrap_or(Command::Analyze) {
        Command::Analyze => Request::TriggerAnalysis,
        Command::SwitchAccount => Request::SwitchAccount,
        Command::Serve => {
            info!("Serving requests on stdin");
            let handled = trigger::serve(
                &pipeline,
                opener.as_ref(),
                tokio::io::BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                chrono::Local::now,
            )
            .await
            .context("Request loop failed")?;
            info!("Handled {} request(s)", handled);
            return Ok(());
        }
    };

    let response = trigger::handle_request(&pipeline, opener.as_ref(), request, &chrono::Local::now()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        if let Response::Switched { success, .. } = &response {
            println!("{}", if *success { "✅ Account switched" } else { "❌ Account switch failed" });
        }
        println!("{}", report::render(response.outcome()));
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(max_results) = args.max_results {
        if max_results == 0 || max_results > MAX_LIST_PAGE {
            anyhow::bail!("--max-results must be between 1 and {}", MAX_LIST_PAGE);
        }
        config.gmail.max_results = max_results;
    }
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            anyhow::bail!("--concurrency must be greater than 0");
        }
        config.analysis.fetch_concurrency = concurrency;
    }
    if let Some(policy) = &args.failure_policy {
        config.analysis.failure_policy = policy.clone();
        config.failure_policy()?;
    }
    Ok(())
}

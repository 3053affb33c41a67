//! multisearch CLI - query several search engines from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use multisearch::{
    EngineCapability, SearchCoordinator, SearchRequest, SearchSettings, KNOWN_ENGINES,
};

/// multisearch - multi-engine web search
#[derive(Parser)]
#[command(name = "multisearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one or more engines
    Search(SearchArgs),

    /// List available search engines
    Engines,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Search engines to use (comma-separated), e.g. duckduckgo,bing,browser_google
    #[arg(short, long, value_delimiter = ',')]
    engines: Option<Vec<String>>,

    /// Maximum number of results per engine
    #[arg(short, long, default_value = "10")]
    limit: i64,

    /// Per-engine timeout in seconds
    #[arg(short, long, default_value = "90")]
    timeout: u64,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Proxy URL (e.g., http://127.0.0.1:7890 or socks5://127.0.0.1:1080)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Do not register browser engines
    #[arg(long)]
    no_browser: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Search(args) => run_search(args).await,
        Commands::Engines => list_engines(),
    }
}

fn list_engines() -> Result<()> {
    let mut settings = SearchSettings::default();
    settings.browser.enabled = cfg!(feature = "headless");
    let search = SearchCoordinator::from_settings(settings)?;

    println!("Available search engines:\n");
    for descriptor in search.descriptors() {
        let transport = match descriptor.capability {
            EngineCapability::HttpOnly => "http",
            EngineCapability::BrowserDriven => "browser",
        };
        println!("  {:<16} {}", descriptor.identifier, transport);
    }
    println!();
    println!("Usage: multisearch search \"query\" -e duckduckgo,bing,baidu");
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let mut settings = SearchSettings {
        engine_timeout_secs: args.timeout,
        ..Default::default()
    };
    if let Some(proxy) = &args.proxy {
        settings.proxy.enabled = true;
        settings.proxy.url = proxy.clone();
        if matches!(args.format, OutputFormat::Text) {
            eprintln!("Using proxy: {}", proxy);
        }
    }
    settings.browser.enabled = !args.no_browser;
    settings.browser.headless = !args.headed;

    let engines = args.engines.unwrap_or_default();
    for name in &engines {
        if !KNOWN_ENGINES.contains(&name.trim()) {
            eprintln!("Warning: Unknown engine '{}', skipping", name);
        }
    }

    let search = SearchCoordinator::from_settings(settings)?;
    let request = SearchRequest::new(&args.query)
        .with_limit(args.limit)
        .with_engines(engines);

    let started = std::time::Instant::now();
    let outcome = search.search(&request).await;
    search.shutdown().await;
    let results = outcome?;

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nSearch results for \"{}\" ({} results in {}ms):\n",
                args.query,
                results.len(),
                started.elapsed().as_millis()
            );

            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, result.title);
                println!("   URL: {}", result.url);
                if !result.description.is_empty() {
                    let description: String = result.description.chars().take(150).collect();
                    if description.len() < result.description.len() {
                        println!("   {}...", description);
                    } else {
                        println!("   {}", description);
                    }
                }
                println!("   Engine: {} | Source: {}", result.engine, result.source);
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Compact => {
            for result in &results {
                println!("{}\t{}", result.title, result.url);
            }
        }
    }

    Ok(())
}

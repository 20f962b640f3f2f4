use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use disguise_verify::{Config, Verifier};

#[derive(Parser)]
#[command(name = "disguise-verify")]
#[command(about = "Drives the webcam disguise app and captures before/after undo screenshots")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./config.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target application URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Directory for screenshots (overrides config)
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(url) = cli.url {
        config.target_url = url;
    }
    if let Some(dir) = cli.out_dir {
        config.output_dir = dir;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    config.validate()?;

    println!("Verifying: {}", config.target_url);

    let verifier = Verifier::new(config);
    match verifier.run().await {
        Ok(report) => {
            println!();
            println!("✓ Verification passed ({}ms)", report.duration.as_millis());
            for shot in &report.screenshots {
                println!("  {}", shot.display());
            }
            Ok(())
        }
        Err(err) => {
            println!();
            println!("✗ Verification failed");
            println!("  Error: {err}");
            std::process::exit(1);
        }
    }
}

//! LeafGuard
//!
//! Mounts the detection page in the terminal: connects the live channel,
//! loads history, optionally stages and analyzes an image, and re-renders the
//! page whenever it changes. Ctrl-C unmounts.
//!
//! Run with: cargo run --bin leafguard -- --image leaf.jpg --analyze

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use leafguard::config::Config;
use leafguard::logging::init_logging;
use leafguard::model::ViewMode;
use leafguard::session;
use leafguard::view::PageView;
use leafguard::HttpAnalysisClient;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "leafguard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plant leaf disease detection page")]
struct Args {
    /// Config file (default: search the usual locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analysis service base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Image to stage on startup
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Submit the staged image right away
    #[arg(short, long, requires = "image")]
    analyze: bool,

    /// Initial lower panel (realtime, history)
    #[arg(long, default_value = "realtime")]
    view: ViewMode,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(base_url) = args.base_url {
        config.server.base_url = base_url;
        config.validate()?;
    }

    init_logging(&config.logging).context("initializing logging")?;
    tracing::info!(
        "LeafGuard v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.server.base_url
    );

    let client = Arc::new(HttpAnalysisClient::new(&config.server)?);
    let page = session::mount(&config, client)?;

    if args.view != ViewMode::default() {
        page.select_view(args.view).await?;
    }

    if let Some(image) = &args.image {
        page.stage_file(image)
            .await
            .with_context(|| format!("staging {}", image.display()))?;
        if args.analyze {
            page.analyze().await?;
        }
    }

    let mut updates = page.subscribe();
    let policy = page.upload_policy().clone();
    loop {
        let snapshot = updates.borrow_and_update().clone();
        println!("\n[{}]", Local::now().format("%H:%M:%S"));
        println!("{}", PageView::new(&snapshot).with_policy(&policy));

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, unmounting");
                break;
            }
        }
    }

    page.unmount().await;
    Ok(())
}

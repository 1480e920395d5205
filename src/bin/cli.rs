//! LeafGuard CLI
//!
//! One-shot commands against the analysis service:
//! - Analyze an image
//! - List analysis history
//! - Generate a config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use leafguard::config::{generate_default_config, Config};
use leafguard::logging::init_logging;
use leafguard::model::{AnalysisResult, ImageData};
use leafguard::upload::{UploadError, UploadPolicy, UploadSelection};
use leafguard::view::{describe_image, HISTORY_PLACEHOLDER};
use leafguard::{AnalysisService, ApiError, HttpAnalysisClient};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "leafguard-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plant leaf disease detection from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Analysis service base URL, overrides the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,

    /// Write returned images into this directory
    #[arg(long, global = true)]
    pub save_images: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a leaf image
    Analyze {
        /// Path to a .png, .jpg or .jpeg file
        image: PathBuf,
    },

    /// List past analyses
    History {
        /// Only show the most recent N entries
        #[arg(short, long)]
        last: Option<usize>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.server.base_url = base_url.clone();
        config.validate()?;
    }
    init_logging(&config.logging)?;

    let client = HttpAnalysisClient::new(&config.server)?;
    let json = match cli.format.as_str() {
        "json" => true,
        "text" => false,
        other => bail!("Unknown format '{}' (expected text or json)", other),
    };

    match cli.command {
        Commands::Analyze { image } => {
            let policy = UploadPolicy::from(&config.upload);
            let upload = UploadSelection::load(&image, &policy)
                .await
                .map_err(|e| upload_error(e, &policy))?;

            let result = match client.analyze(&upload).await {
                Ok(result) => result,
                Err(e) => {
                    report_unreachable(&e, client.analyze_url());
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }

            if let (Some(dir), Some(image)) = (&cli.save_images, &result.image) {
                let stem = image_stem(&upload);
                let path = save_image(dir, &stem, image).await?;
                println!("Saved image to {}", path.display());
            }
        }

        Commands::History { last } => {
            let mut entries = match client.history().await {
                Ok(entries) => entries,
                Err(e) => {
                    report_unreachable(&e, client.history_url());
                    return Err(e.into());
                }
            };
            if let Some(last) = last {
                let skip = entries.len().saturating_sub(last);
                entries.drain(..skip);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("{}", HISTORY_PLACEHOLDER);
            } else {
                println!(
                    "{:<26} {:<12} {:<28} {}",
                    "ID", "Decision", "Disease", "Image"
                );
                println!("{}", "-".repeat(90));
                for entry in &entries {
                    println!(
                        "{:<26} {:<12} {:<28} {}",
                        entry.id.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                        truncate(&entry.decision, 12),
                        truncate(&entry.disease_name, 28),
                        entry
                            .image
                            .as_ref()
                            .map(describe_image)
                            .unwrap_or_else(|| "none".to_string())
                    );
                }
                println!();
                println!("{} entries", entries.len());
            }

            if let Some(dir) = &cli.save_images {
                let mut saved = 0;
                for (index, entry) in entries.iter().enumerate() {
                    let Some(image) = &entry.image else {
                        continue;
                    };
                    let stem = entry
                        .id
                        .as_ref()
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_else(|| format!("entry-{}", index + 1));
                    save_image(dir, &stem, image).await?;
                    saved += 1;
                }
                println!("Saved {} images to {}", saved, dir.display());
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("Disease Name: {}", result.disease_name);
    println!("Decision: {}", result.decision);
    println!("Reason: {}", result.reason);
    println!("Treatment: {}", result.treatment);
    if let Some(image) = &result.image {
        println!("Image: {}", describe_image(image));
    }
}

/// Unsupported files get the accepted formats as context
fn upload_error(error: UploadError, policy: &UploadPolicy) -> anyhow::Error {
    match error {
        UploadError::UnsupportedExtension { .. } => {
            anyhow::Error::new(error).context(policy.formats_hint())
        }
        other => other.into(),
    }
}

fn report_unreachable(error: &ApiError, url: &str) {
    if matches!(error, ApiError::Unavailable | ApiError::Timeout) {
        eprintln!("Cannot reach the analysis service at {}", url);
        eprintln!("Set LEAFGUARD_BASE_URL or pass --base-url to point elsewhere.");
    }
}

fn image_stem(upload: &UploadSelection) -> String {
    let name = Path::new(upload.file_name())
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    format!("{}-analyzed", name)
}

async fn save_image(dir: &Path, stem: &str, image: &ImageData) -> anyhow::Result<PathBuf> {
    let bytes = image
        .decode()
        .with_context(|| format!("decoding image for {}", stem))?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(format!("{}.jpg", stem));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_hint_only_for_unsupported_files() {
        let policy = UploadPolicy::default();

        let unsupported = upload_error(
            UploadError::UnsupportedExtension {
                path: PathBuf::from("notes.txt"),
            },
            &policy,
        );
        assert!(format!("{:#}", unsupported).contains("Formats accepted are"));

        let missing = upload_error(
            UploadError::Io {
                path: PathBuf::from("leaf.jpg"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            },
            &policy,
        );
        let message = format!("{:#}", missing);
        assert!(message.contains("leaf.jpg"));
        assert!(!message.contains("Formats accepted"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Healthy", 12), "Healthy");
        assert_eq!(truncate("Powdery Mildew on leaves", 10), "Powdery...");
    }
}

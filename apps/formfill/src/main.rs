use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formfill::profile::profile_text_from_bytes;
use formfill::{Config, FillMap, FillRequest, FillResult, FormFiller, LlmClient};

#[derive(Parser)]
#[command(name = "formfill", version, about = "Fill docx form tables from a profile")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the fields the profile probably does not cover.
    Scan(Inputs),
    /// Report, per placeholder, whether the profile supplies a value.
    Audit(Inputs),
    /// Fill the template and write the result.
    Fill {
        #[command(flatten)]
        inputs: Inputs,
        /// Photo (PNG or JPEG) for cells labelled as photo slots.
        #[arg(long)]
        photo: Option<PathBuf>,
        /// Fill map from an earlier run; skips inference.
        #[arg(long)]
        fill_map: Option<PathBuf>,
        /// Where to write the filled document.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct Inputs {
    /// The `.docx` template.
    #[arg(short, long)]
    template: PathBuf,
    /// Profile text file (UTF-8).
    #[arg(short, long)]
    profile: PathBuf,
}

impl Inputs {
    fn load(&self) -> Result<(Vec<u8>, String)> {
        let template = read(&self.template)?;
        let profile = profile_text_from_bytes(&read(&self.profile)?);
        Ok((template, profile))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FillSummary<'a> {
    fill_map: &'a FillMap,
    missing_fields: &'a [String],
    results: &'a [FillResult],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let llm = LlmClient::from_config(&config)?;
    info!("LLM client initialized (model: {})", llm.model());
    if config.api_key.is_empty() {
        tracing::warn!("MODELSCOPE_API_KEY is not set, inference calls will be rejected");
    }

    let filler = FormFiller::new(Arc::new(llm)).with_settings(config.inference.clone());

    match cli.command {
        Command::Scan(inputs) => {
            let (template, profile) = inputs.load()?;
            let missing = filler.scan_missing_fields(&template, &profile).await?;
            print_json(&missing)?;
        }
        Command::Audit(inputs) => {
            let (template, profile) = inputs.load()?;
            let report = filler.audit_template(&template, &profile).await?;
            print_json(&report)?;
        }
        Command::Fill {
            inputs,
            photo,
            fill_map,
            output,
        } => {
            let (template, profile) = inputs.load()?;
            let photo = photo.as_deref().map(read).transpose()?;
            let precomputed: Option<FillMap> = fill_map
                .as_deref()
                .map(|path| {
                    let bytes = read(path)?;
                    serde_json::from_slice(&bytes)
                        .with_context(|| format!("{} is not a JSON object", path.display()))
                })
                .transpose()?;

            let mut request = FillRequest::new(&template, &profile);
            if let Some(photo) = photo.as_deref() {
                request = request.with_photo(photo);
            }
            if let Some(precomputed) = precomputed.as_ref() {
                request = request.with_precomputed(precomputed);
            }

            let outcome = filler.fill_form(request).await?;
            std::fs::write(&output, &outcome.document)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(
                "Wrote {} ({} filled, {} missing)",
                output.display(),
                outcome.fill_map.filled_count(),
                outcome.missing_fields.len()
            );

            print_json(&FillSummary {
                fill_map: &outcome.fill_map,
                missing_fields: &outcome.missing_fields,
                results: &outcome.results,
            })?;
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Copyright 2021 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use t5_pegasus_summarizer::pipeline;
use t5_pegasus_summarizer::training::FinetuneConfig;
use t5_pegasus_summarizer::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fine-tune and evaluate T5 PEGASUS title generation models
#[derive(Parser)]
#[command(name = "t5-pegasus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON file overriding the default run configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fine-tune the pretrained checkpoint, keeping the weights with the best validation BLEU
    Train(ConfigArgs),
    /// Score saved weights on the test split
    Evaluate {
        #[command(flatten)]
        config: ConfigArgs,
        /// Weights to evaluate instead of `best_model_path`
        #[arg(long)]
        weights: Option<PathBuf>,
    },
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<FinetuneConfig> {
    match &args.config {
        Some(path) => FinetuneConfig::try_from_file(path)
            .with_context(|| format!("invalid configuration file {}", path.display())),
        None => Ok(FinetuneConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Train(args) => {
            let config = load_config(&args)?;
            let report = pipeline::train(&config)?;
            info!(
                best_bleu = report.best_bleu,
                epochs = report.epoch_losses.len(),
                "done"
            );
        }
        Command::Evaluate { config, weights } => {
            let config = load_config(&config)?;
            let metrics = pipeline::evaluate(&config, weights.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }
    Ok(())
}

//! Command line front-end of `ner-forge`.

#[macro_use]
extern crate tracing;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ner_forge::core::{
    CancellationToken, DEFAULT_CONTINUATION, DEFAULT_COST_MODEL,
    DEFAULT_TOKEN_LIMIT, Outcome,
};
use ner_forge::output::write_artifacts;
use ner_forge::{
    DEFAULT_SYSTEM_PROMPT, GeneratorBuilder, LabelingScheme, OutputFormat,
    handle_interrupts,
};
use ner_forge_model::GenerationOptions;
use ner_forge_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use owo_colors::OwoColorize;

const BAR_CHAR: &str = "▎";

#[derive(Parser)]
#[command(name = "ner-forge", version, about = "Generate synthetic NER datasets")]
struct Cli {
    /// API key of the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Model that generates the samples.
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a dataset and write it to a file.
    Generate(GenerateArgs),
    /// List the models available to the API key.
    Models,
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of samples to generate.
    #[arg(short = 'n', long, default_value_t = 100)]
    count: usize,

    /// Shape of the samples: `conll` or `spans`.
    #[arg(long, default_value_t = LabelingScheme::Conll)]
    scheme: LabelingScheme,

    /// Read the task prompt from a file instead of the scheme.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// System prompt of the conversation.
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// Message sent after each sample.
    #[arg(long, default_value = DEFAULT_CONTINUATION)]
    continuation: String,

    /// Estimated transcript size, in tokens, that resets the conversation.
    #[arg(long, default_value_t = DEFAULT_TOKEN_LIMIT)]
    token_limit: usize,

    /// Tokenizer model used to estimate transcript sizes.
    #[arg(long, default_value = DEFAULT_COST_MODEL)]
    cost_model: String,

    #[arg(long, default_value_t = 0.4)]
    temperature: f32,

    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    presence_penalty: f32,

    #[arg(long, allow_negative_numbers = true)]
    frequency_penalty: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Output file. Missing parent directories are created. Defaults to
    /// `dataset.<ext>` with the extension of the output format.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output layout: `conll`, `json` or `delimited`. Defaults to the one
    /// that fits the scheme.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Print every sample as it's generated.
    #[arg(long)]
    print: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = OpenAIConfigBuilder::with_api_key(cli.api_key)
        .with_model(cli.model)
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    let provider = OpenAIProvider::new(config.build());

    match cli.command {
        Command::Generate(args) => generate(provider, args).await,
        Command::Models => {
            let models = provider
                .list_models()
                .await
                .context("failed to list models")?;
            for model in models {
                println!("{model}");
            }
            Ok(())
        }
    }
}

async fn generate(provider: OpenAIProvider, args: GenerateArgs) -> Result<()> {
    let mut options = GenerationOptions::default()
        .with_temperature(args.temperature)
        .with_presence_penalty(args.presence_penalty);
    if let Some(penalty) = args.frequency_penalty {
        options = options.with_frequency_penalty(penalty);
    }
    if let Some(max_tokens) = args.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }

    let progress_bar = ProgressBar::new(args.count as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
        )?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        let progress_bar = progress_bar.clone();
        async move {
            let aborted = handle_interrupts(
                token,
                || async { tokio::signal::ctrl_c().await.is_ok() },
                {
                    let progress_bar = progress_bar.clone();
                    move || {
                        progress_bar.set_message(
                            "finishing the current request, \
                             press Ctrl-C again to abort...",
                        );
                    }
                },
            )
            .await;
            if aborted {
                progress_bar.abandon_with_message("aborted");
                std::process::exit(130);
            }
        }
    });

    let mut builder = GeneratorBuilder::with_model_provider(provider)
        .with_scheme(args.scheme)
        .with_system_prompt(args.system_prompt)
        .with_continuation(args.continuation)
        .with_count(args.count)
        .with_token_limit(args.token_limit)
        .with_cost_model(args.cost_model)
        .with_options(options)
        .with_cancellation(token)
        .on_sample({
            let progress_bar = progress_bar.clone();
            let print = args.print;
            move |index, sample| {
                if print {
                    progress_bar.suspend(|| {
                        println!(
                            "{}{} {}",
                            BAR_CHAR.bright_cyan(),
                            format!("#{}", index + 1).dimmed(),
                            sample.bright_white()
                        );
                    });
                }
                progress_bar.inc(1);
            }
        });
    if let Some(path) = &args.prompt_file {
        let prompt = fs::read_to_string(path).with_context(|| {
            format!("failed to read prompt file {}", path.display())
        })?;
        builder = builder.with_user_prompt(prompt);
    }
    let session = builder.build().context("invalid generation settings")?;

    let outcome = session.run().await;
    progress_bar.finish_and_clear();

    let format = args.format.unwrap_or_else(|| args.scheme.default_format());
    let output = args.output.unwrap_or_else(|| format.default_path());
    write_artifacts(&output, format, outcome.artifacts())
        .with_context(|| format!("failed to write {}", output.display()))?;

    report(&outcome, args.count, &output);
    if let Outcome::PartialSuccess(_, reason) = &outcome {
        warn!("generation stopped early: {reason}");
    }
    Ok(())
}

fn report(outcome: &Outcome, target: usize, output: &std::path::Path) {
    let bar = match outcome {
        Outcome::Completed(_) => BAR_CHAR.bright_green().to_string(),
        Outcome::PartialSuccess(..) => BAR_CHAR.bright_red().to_string(),
        Outcome::Cancelled(_) => BAR_CHAR.bright_yellow().to_string(),
    };
    let status = match outcome {
        Outcome::Completed(_) => "✅ Completed".to_owned(),
        Outcome::PartialSuccess(_, reason) => {
            format!("❌ Stopped early: {reason}")
        }
        Outcome::Cancelled(_) => "⚠️  Cancelled".to_owned(),
    };

    println!("{bar}{}", status.bold());
    println!(
        "{bar}{} of {} samples written to {}",
        outcome.len().bright_white().bold(),
        target,
        output.display().bright_white()
    );
}

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::builder::BoolishValueParser;

#[derive(Parser, Debug)]
#[command(
    name = "translate-gpt",
    version,
    about = "Translate localization strings files using LLM tool calls"
)]
struct Cli {
    /// API token (falls back to OPENAI_API_KEY)
    #[arg(long = "api-token", env = "GPT_API_KEY", hide_env_values = true)]
    api_token: Option<String>,

    /// Chat model name (default: gpt-3.5-turbo)
    #[arg(long = "model-name", env = "GPT_MODEL_NAME")]
    model_name: Option<String>,

    /// Request timeout in seconds, 0 for none (default: 30)
    #[arg(long = "request-timeout", env = "GPT_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Sampling temperature between 0 and 2 (default: 0.5)
    #[arg(long = "temperature", env = "GPT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Skip entries the target file already translates (default: true)
    #[arg(
        long = "skip-translated",
        env = "GPT_SKIP_TRANSLATED",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    skip_translated: Option<bool>,

    /// Source language code. Use "auto" to detect (default: auto)
    #[arg(long = "source-language", env = "GPT_SOURCE_LANGUAGE")]
    source_language: Option<String>,

    /// Target language code (default: en)
    #[arg(long = "target-language", env = "GPT_TARGET_LANGUAGE")]
    target_language: Option<String>,

    /// File to translate (.strings, .xml or .xcstrings)
    #[arg(long = "source-file", env = "GPT_SOURCE_FILE")]
    source_file: Option<PathBuf>,

    /// File to write the translations to; created when missing
    #[arg(long = "target-file", env = "GPT_TARGET_FILE")]
    target_file: Option<PathBuf>,

    /// Free-text context about the application
    #[arg(long = "context", env = "GPT_COMMON_CONTEXT")]
    context: Option<String>,

    /// Entries per request; below 1 sends one entry per request
    #[arg(long = "bunch-size", env = "GPT_BUNCH_SIZE", allow_negative_numbers = true)]
    bunch_size: Option<i64>,

    /// OpenAI-compatible API base URL
    #[arg(long = "base-url", env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Append token usage to output
    #[arg(long = "with-using-tokens")]
    with_using_tokens: bool,

    /// Append model name to output
    #[arg(long = "with-using-model")]
    with_using_model: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    translate_gpt::logging::init(cli.verbose);

    let api_token = cli
        .api_token
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var("OPENAI_API_KEY").ok());
    let output = translate_gpt::run(translate_gpt::Config {
        api_token,
        model_name: cli.model_name,
        base_url: cli.base_url,
        request_timeout: cli.request_timeout,
        temperature: cli.temperature,
        skip_translated: cli.skip_translated,
        source_language: cli.source_language,
        target_language: cli.target_language,
        source_file: cli.source_file,
        target_file: cli.target_file,
        context: cli.context,
        bunch_size: cli.bunch_size,
        settings_path: cli.read_settings,
        with_using_tokens: cli.with_using_tokens,
        with_using_model: cli.with_using_model,
    })
    .await?;
    println!("{}", output);
    Ok(())
}

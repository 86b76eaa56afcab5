pub mod error;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod planner;
pub mod providers;
pub mod settings;
pub mod strings;
pub mod translations;

use std::path::{Path, PathBuf};

pub use error::{Error, Result};
pub use options::Options;
pub use pipeline::{RunSummary, TranslationPipeline};
pub use providers::{OpenAI, ProviderUsage, TranslationClient};

/// Values given on the command line or through the environment. Unset
/// values fall back to settings files, then to defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api_token: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Option<u64>,
    pub temperature: Option<f32>,
    pub skip_translated: Option<bool>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub source_file: Option<PathBuf>,
    pub target_file: Option<PathBuf>,
    pub context: Option<String>,
    pub bunch_size: Option<i64>,
    pub settings_path: Option<PathBuf>,
    pub with_using_tokens: bool,
    pub with_using_model: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let options = Options::resolve(&settings, &config)?;
    let client = OpenAI::new(options.api_token.clone())
        .with_model(options.model_name.clone())
        .with_base_url(options.base_url.clone())
        .with_temperature(options.temperature)
        .with_timeout(options.request_timeout);

    let pipeline = TranslationPipeline::new(client, options);
    let summary = pipeline.run().await?;
    Ok(format_summary(
        &summary,
        &pipeline.options().target_file,
        config.with_using_tokens,
        config.with_using_model,
    ))
}

pub fn format_summary(
    summary: &RunSummary,
    target: &Path,
    with_using_tokens: bool,
    with_using_model: bool,
) -> String {
    let mut lines = vec![format!(
        "{}: {} translated, {} skipped, {} entries, {} request(s)",
        target.display(),
        summary.translated,
        summary.skipped,
        summary.units,
        summary.requests
    )];
    if with_using_model {
        lines.push(format!(
            "model: {}",
            summary.model.as_deref().unwrap_or("none")
        ));
    }
    if with_using_tokens {
        lines.push(format_usage(summary.usage.as_ref()));
    }
    lines.join("\n")
}

fn format_usage(usage: Option<&ProviderUsage>) -> String {
    let Some(usage) = usage.filter(|usage| !usage.is_empty()) else {
        return "tokens: unavailable".to_string();
    };
    let total = usage.total_tokens.or_else(|| {
        usage
            .prompt_tokens
            .zip(usage.completion_tokens)
            .map(|(prompt, completion)| prompt + completion)
    });

    let mut parts = Vec::new();
    if let Some(prompt) = usage.prompt_tokens {
        parts.push(format!("prompt={}", prompt));
    }
    if let Some(completion) = usage.completion_tokens {
        parts.push(format!("completion={}", completion));
    }
    if let Some(total) = total {
        parts.push(format!("total={}", total));
    }
    format!("tokens: {}", parts.join(", "))
}

use std::path::PathBuf;

use crate::Config;
use crate::error::{Error, Result};
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL, TranslateRequest};
use crate::settings::Settings;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_SOURCE_LANGUAGE: &str = "auto";
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Fully resolved run options.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub api_token: String,
    pub model_name: String,
    pub base_url: String,
    /// Seconds; 0 disables the timeout.
    pub request_timeout: u64,
    pub temperature: f32,
    pub skip_translated: bool,
    pub source_language: String,
    pub target_language: String,
    pub source_file: PathBuf,
    pub target_file: PathBuf,
    pub context: Option<String>,
    pub bunch_size: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            model_name: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            skip_translated: true,
            source_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            source_file: PathBuf::new(),
            target_file: PathBuf::new(),
            context: None,
            bunch_size: None,
        }
    }
}

impl Options {
    /// Command line values win over settings files, which win over defaults.
    pub fn resolve(settings: &Settings, config: &Config) -> Result<Self> {
        let defaults = Options::default();
        let source_file = config
            .source_file
            .clone()
            .or_else(|| settings.source_file.clone())
            .ok_or_else(|| Error::Config("missing source file; set --source-file or GPT_SOURCE_FILE".to_string()))?;
        let target_file = config
            .target_file
            .clone()
            .or_else(|| settings.target_file.clone())
            .ok_or_else(|| Error::Config("missing target file; set --target-file or GPT_TARGET_FILE".to_string()))?;

        let options = Options {
            api_token: pick(&config.api_token, &settings.api_token).unwrap_or_default(),
            model_name: pick(&config.model_name, &settings.model_name)
                .unwrap_or(defaults.model_name),
            base_url: pick(&config.base_url, &settings.base_url).unwrap_or(defaults.base_url),
            request_timeout: config
                .request_timeout
                .or(settings.request_timeout)
                .unwrap_or(defaults.request_timeout),
            temperature: config
                .temperature
                .or(settings.temperature)
                .unwrap_or(defaults.temperature),
            skip_translated: config
                .skip_translated
                .or(settings.skip_translated)
                .unwrap_or(defaults.skip_translated),
            source_language: pick(&config.source_language, &settings.source_language)
                .unwrap_or(defaults.source_language),
            target_language: pick(&config.target_language, &settings.target_language)
                .unwrap_or(defaults.target_language),
            source_file,
            target_file,
            context: pick(&config.context, &settings.context),
            bunch_size: bunch_size(config.bunch_size.or(settings.bunch_size)),
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::Config(
                "missing API token; set --api-token, GPT_API_KEY or OPENAI_API_KEY".to_string(),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        let target = self.target_language.trim();
        if target.is_empty() || target.eq_ignore_ascii_case("auto") {
            return Err(Error::Config(format!(
                "target language must be a language code, got '{}'",
                self.target_language
            )));
        }
        if self.source_file.as_os_str().is_empty() || self.target_file.as_os_str().is_empty() {
            return Err(Error::Config("source and target files must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn translate_request(&self) -> TranslateRequest {
        TranslateRequest {
            source_language: self.source_language.trim().to_string(),
            target_language: self.target_language.trim().to_string(),
            context: self.context.clone(),
        }
    }
}

fn pick(flag: &Option<String>, setting: &Option<String>) -> Option<String> {
    flag.iter()
        .chain(setting)
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Sizes below 1 mean "unbatched".
fn bunch_size(value: Option<i64>) -> Option<usize> {
    value
        .and_then(|size| usize::try_from(size).ok())
        .filter(|size| *size >= 1)
}

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const SETTINGS_FILE: &str = "translate-gpt.toml";
pub const LOCAL_SETTINGS_FILE: &str = "translate-gpt.local.toml";

/// Values read from settings files. Unset keys stay `None` so command line
/// flags and environment variables can take precedence over them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub api_token: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Option<u64>,
    pub temperature: Option<f32>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub context: Option<String>,
    pub skip_translated: Option<bool>,
    pub bunch_size: Option<i64>,
    pub source_file: Option<PathBuf>,
    pub target_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    api: Option<ApiSettings>,
    translation: Option<TranslationSettings>,
    files: Option<FileSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiSettings {
    token: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranslationSettings {
    source_language: Option<String>,
    target_language: Option<String>,
    context: Option<String>,
    skip_translated: Option<bool>,
    bunch_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    source: Option<PathBuf>,
    target: Option<PathBuf>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    load_settings_in(Path::new("."), extra_path)
}

/// Reads `translate-gpt.toml` and `translate-gpt.local.toml` from `dir`, then
/// `extra_path`. Later files override earlier ones key by key; missing files
/// are skipped, except an explicit `extra_path`.
pub fn load_settings_in(dir: &Path, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let mut ordered_paths = vec![dir.join(SETTINGS_FILE), dir.join(LOCAL_SETTINGS_FILE)];

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(Error::Config(format!(
                "settings file not found: {}",
                extra.display()
            )));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|err| Error::io("read settings", &path, err))?;
            let parsed: SettingsFile = toml::from_str(&content).map_err(|err| {
                Error::Config(format!(
                    "failed to parse settings {}: {}",
                    path.display(),
                    err.message()
                ))
            })?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(api) = incoming.api {
            replace_text(&mut self.api_token, api.token);
            replace_text(&mut self.model_name, api.model);
            replace_text(&mut self.base_url, api.base_url);
            replace(&mut self.request_timeout, api.timeout);
            replace(&mut self.temperature, api.temperature);
        }
        if let Some(translation) = incoming.translation {
            replace_text(&mut self.source_language, translation.source_language);
            replace_text(&mut self.target_language, translation.target_language);
            replace_text(&mut self.context, translation.context);
            replace(&mut self.skip_translated, translation.skip_translated);
            replace(&mut self.bunch_size, translation.bunch_size);
        }
        if let Some(files) = incoming.files {
            replace(&mut self.source_file, files.source);
            replace(&mut self.target_file, files.target);
        }
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn replace_text(slot: &mut Option<String>, value: Option<String>) {
    replace(slot, value.filter(|value| !value.trim().is_empty()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_files_give_empty_settings() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_settings_in(dir.path(), None).unwrap(), Settings::default());
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"
[api]
model = "gpt-4o-mini"
timeout = 60

[translation]
target_language = "de"
bunch_size = 20
context = "A travel app"
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(LOCAL_SETTINGS_FILE),
            r#"
[api]
token = "sk-local"

[translation]
target_language = "fr"
context = ""
"#,
        )
        .unwrap();
        let extra = dir.path().join("ci.toml");
        fs::write(
            &extra,
            r#"
[files]
source = "en.lproj/Localizable.strings"
target = "fr.lproj/Localizable.strings"
"#,
        )
        .unwrap();

        let settings = load_settings_in(dir.path(), Some(&extra)).unwrap();
        assert_eq!(settings.api_token.as_deref(), Some("sk-local"));
        assert_eq!(settings.model_name.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(settings.request_timeout, Some(60));
        assert_eq!(settings.target_language.as_deref(), Some("fr"));
        assert_eq!(settings.context.as_deref(), Some("A travel app"));
        assert_eq!(settings.bunch_size, Some(20));
        assert_eq!(
            settings.target_file,
            Some(PathBuf::from("fr.lproj/Localizable.strings"))
        );
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = load_settings_in(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.starts_with("settings file not found")));
    }

    #[test]
    fn unknown_keys_are_config_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "[api]\nmodle = \"gpt-4o\"\n").unwrap();
        let err = load_settings_in(dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::error::{Error, Result};
use crate::providers::{BatchItem, ToolSpec, TranslateRequest};

pub const TOOL_NAME: &str = "deliver_translations";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

/// Schema of the forced tool call. Its length bounds match the batch, so a
/// well-behaved model cannot drop or invent entries.
pub fn tool_spec(count: usize) -> ToolSpec {
    let parameters = json!({
        "type": "object",
        "properties": {
            "translations": {
                "type": "array",
                "minItems": count,
                "maxItems": count,
                "items": {
                    "type": "object",
                    "properties": {
                        "key": {"type": "string"},
                        "translation": {"type": "string"}
                    },
                    "required": ["key", "translation"]
                }
            }
        },
        "required": ["translations"]
    });

    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: "Return one translation per input entry, in input order.".to_string(),
        parameters,
    }
}

pub fn render_system_prompt(request: &TranslateRequest, count: usize) -> Result<String> {
    let mut context = TeraContext::new();
    let source_lang = request.source_language.trim();
    let source_lang = if source_lang.is_empty() || source_lang.eq_ignore_ascii_case("auto") {
        "auto"
    } else {
        source_lang
    };
    context.insert("source_lang", source_lang);
    context.insert("target_lang", request.target_language.trim());
    context.insert(
        "context",
        &request
            .context
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty()),
    );
    context.insert("count", &count);
    context.insert("tool_name", TOOL_NAME);

    Ok(Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)?)
}

pub fn render_user_input(batch: &[BatchItem]) -> String {
    json!(batch).to_string()
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    translations: Vec<ToolTranslation>,
}

#[derive(Debug, Deserialize)]
struct ToolTranslation {
    key: String,
    translation: String,
}

/// Checks the tool arguments against the batch and returns the translations
/// in batch order.
pub fn parse_tool_args(value: Value, batch: &[BatchItem]) -> Result<Vec<String>> {
    let args: ToolArgs = serde_json::from_value(value)
        .map_err(|err| Error::Parse(format!("invalid tool arguments: {}", err)))?;
    if args.translations.len() != batch.len() {
        return Err(Error::Parse(format!(
            "expected {} translations, got {}",
            batch.len(),
            args.translations.len()
        )));
    }

    args.translations
        .into_iter()
        .zip(batch)
        .enumerate()
        .map(|(index, (translated, item))| {
            if translated.key != item.key {
                return Err(Error::Parse(format!(
                    "translation {} is for key '{}', expected '{}'",
                    index + 1,
                    translated.key,
                    item.key
                )));
            }
            if translated.translation.trim().is_empty() {
                return Err(Error::Parse(format!(
                    "empty translation for key '{}'",
                    item.key
                )));
            }
            Ok(translated.translation)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: &str, context: Option<&str>) -> TranslateRequest {
        TranslateRequest {
            source_language: source.to_string(),
            target_language: "fr".to_string(),
            context: context.map(str::to_string),
        }
    }

    fn batch() -> Vec<BatchItem> {
        vec![
            BatchItem {
                key: "greeting".to_string(),
                text: "Hello".to_string(),
                comment: Some("Launch screen".to_string()),
            },
            BatchItem {
                key: "farewell".to_string(),
                text: "Bye".to_string(),
                comment: None,
            },
        ]
    }

    #[test]
    fn prompt_names_languages_and_context() {
        let prompt = render_system_prompt(&request("en", Some("A banking app")), 2).unwrap();
        assert!(prompt.contains(r#"from the language with code "en" into the language with code "fr""#));
        assert!(prompt.contains("Context about the application: A banking app"));
        assert!(prompt.contains("Return exactly 2 translations"));
        assert!(prompt.contains("Call the deliver_translations tool"));
    }

    #[test]
    fn prompt_asks_for_detection_when_source_is_auto() {
        let prompt = render_system_prompt(&request("auto", Some("  ")), 1).unwrap();
        assert!(prompt.contains("Detect the language of each source text"));
        assert!(!prompt.contains("Context about the application"));
    }

    #[test]
    fn user_input_is_the_batch_as_json() {
        assert_eq!(
            render_user_input(&batch()),
            r#"[{"key":"greeting","text":"Hello","comment":"Launch screen"},{"key":"farewell","text":"Bye"}]"#
        );
    }

    #[test]
    fn tool_schema_pins_the_count() {
        let spec = tool_spec(3);
        assert_eq!(spec.name, TOOL_NAME);
        assert_eq!(spec.parameters["properties"]["translations"]["minItems"], 3);
        assert_eq!(spec.parameters["properties"]["translations"]["maxItems"], 3);
    }

    #[test]
    fn parses_translations_in_order() {
        let args = json!({"translations": [
            {"key": "greeting", "translation": "Bonjour"},
            {"key": "farewell", "translation": "Au revoir"}
        ]});
        assert_eq!(parse_tool_args(args, &batch()).unwrap(), ["Bonjour", "Au revoir"]);
    }

    #[test]
    fn rejects_count_and_order_mismatches() {
        let short = json!({"translations": [{"key": "greeting", "translation": "Bonjour"}]});
        let err = parse_tool_args(short, &batch()).unwrap_err();
        assert!(matches!(err, Error::Parse(message) if message == "expected 2 translations, got 1"));

        let swapped = json!({"translations": [
            {"key": "farewell", "translation": "Au revoir"},
            {"key": "greeting", "translation": "Bonjour"}
        ]});
        assert!(matches!(parse_tool_args(swapped, &batch()), Err(Error::Parse(_))));

        let blank = json!({"translations": [
            {"key": "greeting", "translation": " "},
            {"key": "farewell", "translation": "Au revoir"}
        ]});
        assert!(matches!(parse_tool_args(blank, &batch()), Err(Error::Parse(_))));

        assert!(matches!(
            parse_tool_args(json!({"result": []}), &batch()),
            Err(Error::Parse(_))
        ));
    }
}

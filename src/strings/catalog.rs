//! Apple string catalogs (`.xcstrings`).
//!
//! A catalog is a JSON document holding every language of a table:
//!
//! ```json
//! {
//!   "sourceLanguage" : "en",
//!   "strings" : {
//!     "greeting" : {
//!       "comment" : "Shown on launch",
//!       "localizations" : {
//!         "fr" : { "stringUnit" : { "state" : "translated", "value" : "Bonjour" } }
//!       }
//!     }
//!   },
//!   "version" : "1.0"
//! }
//! ```
//!
//! The document is kept as a JSON value so fields this tool does not know
//! about survive a rewrite untouched.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value, json};

use super::{SyntaxError, TranslationUnit};

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    root: Map<String, Value>,
}

impl Catalog {
    pub fn new(source_language: &str) -> Self {
        let mut root = Map::new();
        root.insert("sourceLanguage".to_string(), json!(source_language));
        root.insert("strings".to_string(), json!({}));
        root.insert("version".to_string(), json!("1.0"));
        Self { root }
    }

    pub(crate) fn parse(content: &str) -> Result<Self, SyntaxError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|err| SyntaxError::at(err.line(), err.to_string()))?;
        let Value::Object(root) = value else {
            return Err(SyntaxError::new("string catalog must be a JSON object"));
        };
        if !root.get("strings").is_some_and(Value::is_object) {
            return Err(SyntaxError::new("string catalog has no \"strings\" object"));
        }
        Ok(Self { root })
    }

    pub fn source_language(&self) -> &str {
        self.root
            .get("sourceLanguage")
            .and_then(Value::as_str)
            .unwrap_or("en")
    }

    fn strings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root
            .get("strings")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|strings| strings.iter())
    }

    /// Units for `language` (the source language when `None`).
    ///
    /// Source-language entries without a localization use their key as text,
    /// which is how Xcode stores strings extracted from code. Entries of other
    /// languages without a plain string unit are left out, as are entries
    /// whose localization only has plural or device variations.
    pub(crate) fn units(&self, language: Option<&str>) -> Vec<TranslationUnit> {
        let source = self.source_language();
        let language = language.unwrap_or(source);
        let mut units = Vec::new();
        for (key, item) in self.strings() {
            let localization = item
                .get("localizations")
                .and_then(|localizations| localizations.get(language));
            let value = localization
                .and_then(|localization| localization.pointer("/stringUnit/value"))
                .and_then(Value::as_str);
            let source_text = match (value, localization) {
                (Some(value), _) => value.to_string(),
                (None, None) if language == source => key.clone(),
                _ => continue,
            };
            units.push(TranslationUnit {
                key: key.clone(),
                source_text,
                existing_translation: None,
                comment: item
                    .get("comment")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                translatable: item.get("shouldTranslate").and_then(Value::as_bool) != Some(false),
            });
        }
        units
    }

    /// Stores the translations of `units` under `language`. Keys missing from
    /// the catalog are appended; other keys and languages are left alone.
    pub(crate) fn apply(&mut self, units: &[TranslationUnit], language: Option<&str>) {
        let language = language.unwrap_or(self.source_language()).to_string();
        let strings = self
            .root
            .entry("strings")
            .or_insert_with(|| json!({}));
        if !strings.is_object() {
            *strings = json!({});
        }
        let Value::Object(strings) = strings else {
            return;
        };

        for unit in units {
            let item = strings
                .entry(unit.key.clone())
                .or_insert_with(|| new_item(unit));
            let Some(translation) = unit.existing_translation.as_deref() else {
                continue;
            };
            let Value::Object(item) = item else {
                continue;
            };
            let localizations = item
                .entry("localizations")
                .or_insert_with(|| json!({}));
            if let Value::Object(localizations) = localizations {
                let localization = localizations
                    .entry(language.clone())
                    .or_insert_with(|| json!({}));
                if let Value::Object(localization) = localization {
                    localization.insert(
                        "stringUnit".to_string(),
                        json!({"state": "translated", "value": translation}),
                    );
                }
            }
        }
    }

    /// Serializes the way Xcode does: two-space indent, `"key" : value`.
    pub(crate) fn render(&self) -> String {
        let mut output = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut output, XcodeFormatter::new());
        match self.root.serialize(&mut serializer) {
            Ok(()) => String::from_utf8_lossy(&output).into_owned(),
            // Serializing an in-memory JSON map cannot fail; fall back to the
            // compact form so the signature stays infallible.
            Err(_) => Value::Object(self.root.clone()).to_string(),
        }
    }
}

fn new_item(unit: &TranslationUnit) -> Value {
    let mut item = Map::new();
    if let Some(comment) = &unit.comment {
        item.insert("comment".to_string(), json!(comment));
    }
    if !unit.translatable {
        item.insert("shouldTranslate".to_string(), json!(false));
    }
    Value::Object(item)
}

struct XcodeFormatter {
    pretty: PrettyFormatter<'static>,
}

impl XcodeFormatter {
    fn new() -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(b"  "),
        }
    }
}

impl Formatter for XcodeFormatter {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b" : ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "sourceLanguage" : "en",
  "strings" : {
    "greeting" : {
      "comment" : "Shown on launch",
      "localizations" : {
        "en" : { "stringUnit" : { "state" : "translated", "value" : "Hello" } },
        "fr" : { "stringUnit" : { "state" : "translated", "value" : "Bonjour" } }
      }
    },
    "Settings" : {},
    "%lld items" : {
      "localizations" : {
        "en" : { "variations" : { "plural" : {} } }
      }
    },
    "internal_id" : { "shouldTranslate" : false }
  },
  "version" : "1.0"
}"#;

    #[test]
    fn source_units_fall_back_to_key() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let units = catalog.units(None);
        let keys = units.iter().map(|unit| unit.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["greeting", "Settings", "internal_id"]);
        assert_eq!(units[0].source_text, "Hello");
        assert_eq!(units[0].comment.as_deref(), Some("Shown on launch"));
        assert_eq!(units[1].source_text, "Settings");
        assert!(!units[2].translatable);
    }

    #[test]
    fn target_units_only_include_localized_entries() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let units = catalog.units(Some("fr"));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].key, "greeting");
        assert_eq!(units[0].source_text, "Bonjour");
        assert!(catalog.units(Some("de")).is_empty());
    }

    #[test]
    fn apply_adds_language_and_keeps_the_rest() {
        let mut catalog = Catalog::parse(SAMPLE).unwrap();
        let mut units = catalog.units(None);
        units[1].existing_translation = Some("Einstellungen".to_string());
        catalog.apply(&units, Some("de"));

        let reparsed = Catalog::parse(&catalog.render()).unwrap();
        let german = reparsed.units(Some("de"));
        assert_eq!(german.len(), 1);
        assert_eq!(german[0].key, "Settings");
        assert_eq!(german[0].source_text, "Einstellungen");
        assert_eq!(reparsed.units(Some("fr"))[0].source_text, "Bonjour");
        assert!(
            Value::Object(reparsed.root.clone())
                .pointer("/strings/%lld items/localizations/en/variations")
                .is_some()
        );
    }

    #[test]
    fn round_trip_keeps_key_order() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let mut rewritten = catalog.clone();
        rewritten.apply(&catalog.units(None), None);
        let reparsed = Catalog::parse(&rewritten.render()).unwrap();
        assert_eq!(reparsed, catalog);
        let keys = reparsed.strings().map(|(key, _)| key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["greeting", "Settings", "%lld items", "internal_id"]);
    }

    #[test]
    fn renders_in_xcode_layout() {
        let mut catalog = Catalog::new("en");
        catalog.apply(
            &[TranslationUnit::new("title", "Title").with_translation("Titre")],
            Some("fr"),
        );
        insta::assert_snapshot!(catalog.render(), @r#"
        {
          "sourceLanguage" : "en",
          "strings" : {
            "title" : {
              "localizations" : {
                "fr" : {
                  "stringUnit" : {
                    "state" : "translated",
                    "value" : "Titre"
                  }
                }
              }
            }
          },
          "version" : "1.0"
        }
        "#);
    }

    #[test]
    fn rejects_documents_without_strings() {
        assert!(Catalog::parse("[]").is_err());
        assert!(Catalog::parse(r#"{"sourceLanguage": "en"}"#).is_err());
        let err = Catalog::parse("{\n  \"strings\" : {,}\n}").unwrap_err();
        assert_eq!(err.line, Some(2));
    }
}

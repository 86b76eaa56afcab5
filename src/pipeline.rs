use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::options::Options;
use crate::planner::{self, Batch};
use crate::providers::{BatchItem, ProviderUsage, TranslationClient};
use crate::strings::{StringsDocument, StringsFormat, TranslationUnit};

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub units: usize,
    pub translated: usize,
    pub skipped: usize,
    pub requests: usize,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

pub struct TranslationPipeline<C> {
    client: C,
    options: Options,
}

impl<C: TranslationClient> TranslationPipeline<C> {
    pub fn new(client: C, options: Options) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Loads, translates and writes the target file. Nothing is written
    /// unless every batch succeeds.
    pub async fn run(&self) -> Result<RunSummary> {
        let options = &self.options;
        StringsFormat::from_path(&options.source_file)?;
        let target_format = StringsFormat::from_path(&options.target_file)?;

        let source = StringsDocument::load(&options.source_file)?;
        let mut request = options.translate_request();
        if let StringsDocument::Catalog(catalog) = &source {
            if request.source_language.eq_ignore_ascii_case("auto") {
                request.source_language = catalog.source_language().to_string();
            }
        }
        let language = Some(request.target_language.as_str());

        // A copied single-language source holds source texts, not translations.
        let (mut target, existing) = if options.target_file.exists() {
            let target = StringsDocument::load(&options.target_file)?;
            let existing = target.translations(language);
            (target, existing)
        } else if source.format() == target_format {
            let existing = match target_format {
                StringsFormat::StringCatalog => source.translations(language),
                _ => HashMap::new(),
            };
            (source.clone(), existing)
        } else {
            let source_language = Some(request.source_language.as_str())
                .filter(|value| !value.eq_ignore_ascii_case("auto"));
            (StringsDocument::empty(target_format, source_language), HashMap::new())
        };

        let mut units = source.units(None);
        attach_existing(&mut units, existing);

        let batches = planner::plan(&units, options.bunch_size, options.skip_translated);
        let planned = batches.iter().map(Batch::len).sum::<usize>();
        info!(
            "translating {} of {} entries from {} to {} in {} request(s)",
            planned,
            units.len(),
            request.source_language,
            request.target_language,
            batches.len()
        );

        let mut summary = RunSummary {
            units: units.len(),
            skipped: units.len() - planned,
            ..RunSummary::default()
        };
        for (index, batch) in batches.iter().enumerate() {
            let items = batch
                .units(&units)
                .into_iter()
                .map(BatchItem::from)
                .collect::<Vec<_>>();
            info!(
                "batch {}/{}: {} entries starting at '{}'",
                index + 1,
                batches.len(),
                items.len(),
                items.first().map(|item| item.key.as_str()).unwrap_or_default()
            );
            let result = self.client.translate(&items, &request).await?;
            summary.requests += 1;
            merge(&mut units, batch, result.translations)?;
            summary.translated += batch.len();
            if result.model.is_some() {
                summary.model = result.model;
            }
            if let Some(usage) = result.usage {
                summary
                    .usage
                    .get_or_insert_with(ProviderUsage::default)
                    .add(&usage);
            }
        }

        target.apply(&units, language);
        target.save(&options.target_file)?;
        info!(
            "wrote {} ({} translated, {} skipped)",
            options.target_file.display(),
            summary.translated,
            summary.skipped
        );
        Ok(summary)
    }
}

/// Sets the translation found in the target file on each unit with the same key.
pub fn attach_existing(units: &mut [TranslationUnit], mut existing: HashMap<String, String>) {
    for unit in units.iter_mut() {
        if let Some(translation) = existing.remove(&unit.key) {
            unit.existing_translation = Some(translation);
        }
    }
    if !existing.is_empty() {
        debug!("{} target entries have no source entry", existing.len());
    }
}

/// Stores `translations[i]` on the unit at the batch's i-th position.
pub fn merge(units: &mut [TranslationUnit], batch: &Batch, translations: Vec<String>) -> Result<()> {
    if translations.len() != batch.len() {
        return Err(Error::Parse(format!(
            "expected {} translations, got {}",
            batch.len(),
            translations.len()
        )));
    }
    for (position, translation) in batch.positions().iter().zip(translations) {
        let unit = units
            .get_mut(*position)
            .ok_or_else(|| Error::Parse(format!("batch position {} is out of range", position)))?;
        unit.existing_translation = Some(translation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<TranslationUnit> {
        ["one", "two", "three"]
            .into_iter()
            .map(|key| TranslationUnit::new(key, key.to_uppercase()))
            .collect()
    }

    #[test]
    fn merge_assigns_results_by_index() {
        let mut units = units();
        let batches = planner::plan(&units, Some(3), true);
        merge(
            &mut units,
            &batches[0],
            vec!["un".to_string(), "deux".to_string(), "trois".to_string()],
        )
        .unwrap();
        let translations = units
            .iter()
            .map(|unit| unit.output_text())
            .collect::<Vec<_>>();
        assert_eq!(translations, ["un", "deux", "trois"]);
    }

    #[test]
    fn merge_rejects_wrong_count() {
        let mut units = units();
        let batches = planner::plan(&units, Some(2), true);
        let err = merge(&mut units, &batches[0], vec!["un".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(units.iter().all(|unit| unit.existing_translation.is_none()));
    }

    #[test]
    fn attach_existing_matches_keys() {
        let mut units = units();
        let existing = HashMap::from([
            ("two".to_string(), "deux".to_string()),
            ("four".to_string(), "quatre".to_string()),
        ]);
        attach_existing(&mut units, existing);
        assert_eq!(units[0].existing_translation, None);
        assert_eq!(units[1].existing_translation.as_deref(), Some("deux"));
    }
}

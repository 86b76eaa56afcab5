//! Localization file formats.
//!
//! Every format is read into a [`StringsDocument`], which hands out an ordered
//! list of [`TranslationUnit`]s and takes them back once they carry
//! translations. The document keeps whatever the format needs to write the
//! file again (root attributes of Android resources, the other languages of a
//! string catalog), so units only hold what is translated.

mod android;
mod apple;
mod catalog;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use encoding_rs_io::DecodeReaderBytesBuilder;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

pub use android::Resources;
pub use apple::StringsFile;
pub use catalog::Catalog;

/// One key of a localization file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub key: String,
    pub source_text: String,
    pub existing_translation: Option<String>,
    pub comment: Option<String>,
    /// False when the file marks the entry as not to be translated.
    pub translatable: bool,
}

impl TranslationUnit {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
            existing_translation: None,
            comment: None,
            translatable: true,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.existing_translation = Some(translation.into());
        self
    }

    pub fn is_translated(&self) -> bool {
        self.existing_translation
            .as_deref()
            .is_some_and(|value| !value.is_empty())
    }

    /// Text written to the output file for this unit.
    pub fn output_text(&self) -> &str {
        self.existing_translation
            .as_deref()
            .unwrap_or(&self.source_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringsFormat {
    /// Apple `Localizable.strings`.
    AppleStrings,
    /// Android `res/values*/strings.xml`.
    AndroidXml,
    /// Apple `.xcstrings` string catalog.
    StringCatalog,
}

impl StringsFormat {
    pub const EXTENSIONS: [&'static str; 3] = ["strings", "xml", "xcstrings"];

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("strings") => Ok(StringsFormat::AppleStrings),
            Some("xml") => Ok(StringsFormat::AndroidXml),
            Some("xcstrings") => Ok(StringsFormat::StringCatalog),
            _ => Err(Error::format(
                path,
                format!(
                    "translation file must have one of these extensions: .{}",
                    Self::EXTENSIONS.join(", .")
                ),
            )),
        }
    }
}

/// Syntax problem found while reading a file, before the path is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub(crate) line: Option<usize>,
    pub(crate) message: String,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A parsed localization file in its native shape.
#[derive(Debug, Clone)]
pub enum StringsDocument {
    Apple(StringsFile),
    Android(Resources),
    Catalog(Catalog),
}

impl StringsDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let format = StringsFormat::from_path(path)?;
        let bytes = fs::read(path).map_err(|err| Error::io("read", path, err))?;
        let content = decode_text(&bytes).map_err(|err| Error::format(path, err.to_string()))?;
        let document = Self::parse_str(format, &content)
            .map_err(|err| Error::format(path, err.to_string()))?;
        debug!(
            "loaded {} ({} entries)",
            path.display(),
            document.units(None).len()
        );
        Ok(document)
    }

    pub(crate) fn parse_str(
        format: StringsFormat,
        content: &str,
    ) -> std::result::Result<Self, SyntaxError> {
        Ok(match format {
            StringsFormat::AppleStrings => StringsDocument::Apple(StringsFile::parse(content)?),
            StringsFormat::AndroidXml => StringsDocument::Android(Resources::parse(content)?),
            StringsFormat::StringCatalog => StringsDocument::Catalog(Catalog::parse(content)?),
        })
    }

    /// An empty document. `source_language` only matters for string catalogs.
    pub fn empty(format: StringsFormat, source_language: Option<&str>) -> Self {
        match format {
            StringsFormat::AppleStrings => StringsDocument::Apple(StringsFile::default()),
            StringsFormat::AndroidXml => StringsDocument::Android(Resources::default()),
            StringsFormat::StringCatalog => {
                StringsDocument::Catalog(Catalog::new(source_language.unwrap_or("en")))
            }
        }
    }

    pub fn format(&self) -> StringsFormat {
        match self {
            StringsDocument::Apple(_) => StringsFormat::AppleStrings,
            StringsDocument::Android(_) => StringsFormat::AndroidXml,
            StringsDocument::Catalog(_) => StringsFormat::StringCatalog,
        }
    }

    /// Units in file order. `language` selects the localization of a string
    /// catalog (`None` for its source language); other formats hold a single
    /// language and ignore it.
    pub fn units(&self, language: Option<&str>) -> Vec<TranslationUnit> {
        match self {
            StringsDocument::Apple(file) => file.units(),
            StringsDocument::Android(resources) => resources.units(),
            StringsDocument::Catalog(catalog) => catalog.units(language),
        }
    }

    /// Non-empty values by key, as found in this file for `language`.
    pub fn translations(&self, language: Option<&str>) -> HashMap<String, String> {
        self.units(language)
            .into_iter()
            .filter(|unit| !unit.source_text.is_empty())
            .map(|unit| (unit.key, unit.source_text))
            .collect()
    }

    pub fn apply(&mut self, units: &[TranslationUnit], language: Option<&str>) {
        match self {
            StringsDocument::Apple(file) => file.apply(units),
            StringsDocument::Android(resources) => resources.apply(units),
            StringsDocument::Catalog(catalog) => catalog.apply(units, language),
        }
    }

    pub fn render(&self) -> String {
        match self {
            StringsDocument::Apple(file) => file.render(),
            StringsDocument::Android(resources) => resources.render(),
            StringsDocument::Catalog(catalog) => catalog.render(),
        }
    }

    /// Writes the document, creating parent directories. The content goes to
    /// a temporary file next to `path` first, so `path` is replaced in one step.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.render();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|err| Error::io("create directory", dir, err))?;
        let mut file = NamedTempFile::new_in(dir)
            .map_err(|err| Error::io("create temporary file in", dir, err))?;
        file.write_all(content.as_bytes())
            .map_err(|err| Error::io("write", path, err))?;
        file.persist(path)
            .map_err(|err| Error::io("replace", path, err.error))?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}

/// Reads `path` into units, in file order.
pub fn parse(path: &Path) -> Result<Vec<TranslationUnit>> {
    Ok(StringsDocument::load(path)?.units(None))
}

/// Writes `units` to `path`. An existing file is updated in place of being
/// recreated, which keeps the other languages of a string catalog.
pub fn serialize(units: &[TranslationUnit], path: &Path) -> Result<()> {
    let format = StringsFormat::from_path(path)?;
    let mut document = if path.exists() {
        StringsDocument::load(path)?
    } else {
        StringsDocument::empty(format, None)
    };
    document.apply(units, None);
    document.save(path)
}

/// UTF-8 (with or without BOM) and BOM-marked UTF-16, which Xcode still
/// produces for older `.strings` files.
fn decode_text(bytes: &[u8]) -> std::result::Result<String, SyntaxError> {
    let mut decoder = DecodeReaderBytesBuilder::new()
        .bom_override(true)
        .strip_bom(true)
        .build(bytes);
    let mut decoded = String::new();
    decoder
        .read_to_string(&mut decoded)
        .map_err(|_| SyntaxError::new("file is not valid UTF-8 or BOM-marked UTF-16"))?;
    Ok(decoded)
}

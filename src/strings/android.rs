//! Android `strings.xml` resources.
//!
//! Only `<string>` elements are translation units; every other child of
//! `<resources>` is carried through verbatim. Their inner content is kept
//! exactly as written (Android escapes, entities and inline markup such as
//! `<xliff:g>`), so it reaches the model and comes back in resource syntax.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::{SyntaxError, TranslationUnit};

const INDENT: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    /// Attributes of the `<resources>` root, namespace declarations included.
    attributes: Vec<(String, String)>,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    String(StringResource),
    /// Any other child (`<plurals>`, `<string-array>`, ...), kept as written.
    Raw(RawNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StringResource {
    name: String,
    /// Raw inner XML.
    value: String,
    /// Attributes other than `name`, in file order.
    attributes: Vec<(String, String)>,
    comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawNode {
    xml: String,
    comment: Option<String>,
}

impl StringResource {
    fn translatable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|(key, value)| key == "translatable" && value == "false")
    }
}

impl Resources {
    pub(crate) fn parse(content: &str) -> Result<Self, SyntaxError> {
        let mut reader = Reader::from_str(content);
        let mut attributes = None;
        let mut nodes: Vec<Node> = Vec::new();
        let mut comment: Option<String> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|err| syntax_error(content, reader.buffer_position(), err))?;
            match event {
                Event::Start(element) if element.name().as_ref() == b"resources" => {
                    attributes = Some(read_attributes(&element, content, &reader)?);
                    comment = None;
                }
                Event::Empty(element) if element.name().as_ref() == b"resources" => {
                    attributes = Some(read_attributes(&element, content, &reader)?);
                }
                Event::Start(element) if element.name().as_ref() == b"string" => {
                    let (name, extra) = string_attributes(&element, content, &reader)?;
                    let value = reader
                        .read_text(element.name())
                        .map_err(|err| syntax_error(content, reader.buffer_position(), err))?
                        .into_owned();
                    push_string(&mut nodes, name, value, extra, comment.take());
                }
                Event::Empty(element) if element.name().as_ref() == b"string" => {
                    let (name, extra) = string_attributes(&element, content, &reader)?;
                    push_string(&mut nodes, name, String::new(), extra, comment.take());
                }
                Event::Start(element) => {
                    let start = tag_start(content, reader.buffer_position());
                    reader
                        .read_to_end(element.name())
                        .map_err(|err| syntax_error(content, reader.buffer_position(), err))?;
                    nodes.push(Node::Raw(RawNode {
                        xml: content[start..reader.buffer_position()].to_string(),
                        comment: comment.take(),
                    }));
                }
                Event::Empty(_) => {
                    let end = reader.buffer_position();
                    nodes.push(Node::Raw(RawNode {
                        xml: content[tag_start(content, end)..end].to_string(),
                        comment: comment.take(),
                    }));
                }
                Event::Comment(text) => {
                    let text = String::from_utf8_lossy(&text).trim().to_string();
                    comment = Some(match comment.take() {
                        Some(previous) => format!("{}\n{}", previous, text),
                        None => text,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let attributes = attributes.ok_or_else(|| SyntaxError::new("missing <resources> element"))?;
        Ok(Self { attributes, nodes })
    }

    fn strings(&self) -> impl Iterator<Item = &StringResource> {
        self.nodes.iter().filter_map(|node| match node {
            Node::String(resource) => Some(resource),
            Node::Raw(_) => None,
        })
    }

    pub(crate) fn units(&self) -> Vec<TranslationUnit> {
        self.strings()
            .map(|resource| TranslationUnit {
                key: resource.name.clone(),
                source_text: resource.value.clone(),
                existing_translation: None,
                comment: resource.comment.clone(),
                translatable: resource.translatable(),
            })
            .collect()
    }

    /// Replaces the `<string>` elements with `units`. Other children stay
    /// after the string they followed; those whose string is gone move to
    /// the end.
    pub(crate) fn apply(&mut self, units: &[TranslationUnit]) {
        let mut anchored: Vec<(Option<String>, RawNode)> = Vec::new();
        let mut previous: Option<&str> = None;
        for node in &self.nodes {
            match node {
                Node::String(resource) => previous = Some(resource.name.as_str()),
                Node::Raw(raw) => anchored.push((previous.map(str::to_string), raw.clone())),
            }
        }

        let mut nodes = take_anchored(&mut anchored, None);
        for unit in units {
            let mut attributes = self
                .strings()
                .find(|resource| resource.name == unit.key)
                .map(|resource| resource.attributes.clone())
                .unwrap_or_default();
            attributes.retain(|(key, _)| key != "translatable" || !unit.translatable);
            if !unit.translatable && !attributes.iter().any(|(key, _)| key == "translatable") {
                attributes.push(("translatable".to_string(), "false".to_string()));
            }
            nodes.push(Node::String(StringResource {
                name: unit.key.clone(),
                value: unit.output_text().to_string(),
                attributes,
                comment: unit.comment.clone(),
            }));
            nodes.extend(take_anchored(&mut anchored, Some(unit.key.as_str())));
        }
        nodes.extend(anchored.into_iter().map(|(_, raw)| Node::Raw(raw)));
        self.nodes = nodes;
    }

    pub(crate) fn render(&self) -> String {
        let mut output = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources");
        push_attributes(&mut output, &self.attributes);
        output.push_str(">\n");
        for node in &self.nodes {
            let comment = match node {
                Node::String(resource) => resource.comment.as_deref(),
                Node::Raw(raw) => raw.comment.as_deref(),
            };
            if let Some(comment) = comment {
                output.push_str(INDENT);
                output.push_str("<!-- ");
                output.push_str(&comment.replace("--", "- -"));
                output.push_str(" -->\n");
            }
            output.push_str(INDENT);
            match node {
                Node::String(resource) => {
                    output.push_str("<string name=\"");
                    output.push_str(&escape(resource.name.as_str()));
                    output.push('"');
                    push_attributes(&mut output, &resource.attributes);
                    output.push('>');
                    output.push_str(&escape_stray_ampersands(&resource.value));
                    output.push_str("</string>\n");
                }
                Node::Raw(raw) => {
                    output.push_str(&raw.xml);
                    output.push('\n');
                }
            }
        }
        output.push_str("</resources>\n");
        output
    }
}

fn take_anchored(anchored: &mut Vec<(Option<String>, RawNode)>, key: Option<&str>) -> Vec<Node> {
    let mut taken = Vec::new();
    anchored.retain(|(anchor, raw)| {
        if anchor.as_deref() == key {
            taken.push(Node::Raw(raw.clone()));
            false
        } else {
            true
        }
    });
    taken
}

/// Offset of the `<` opening the tag that ends at `end`. Attribute values
/// cannot contain a raw `<`, so the last one before `end` is it.
fn tag_start(content: &str, end: usize) -> usize {
    content[..end.min(content.len())].rfind('<').unwrap_or(0)
}

/// Values are raw XML, but translations may come back with a bare `&`.
fn escape_stray_ampersands(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for (index, ch) in value.char_indices() {
        if ch == '&' && !starts_entity(&value[index + 1..]) {
            output.push_str("&amp;");
        } else {
            output.push(ch);
        }
    }
    output
}

fn starts_entity(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let name = &rest[..end];
    if let Some(hex) = name.strip_prefix("#x") {
        return !hex.is_empty() && hex.chars().all(|ch| ch.is_ascii_hexdigit());
    }
    if let Some(digits) = name.strip_prefix('#') {
        return !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit());
    }
    !name.is_empty() && name.len() <= 32 && name.chars().all(|ch| ch.is_ascii_alphanumeric())
}

fn push_string(
    nodes: &mut Vec<Node>,
    name: String,
    value: String,
    attributes: Vec<(String, String)>,
    comment: Option<String>,
) {
    let existing = nodes.iter_mut().find_map(|node| match node {
        Node::String(resource) if resource.name == name => Some(resource),
        _ => None,
    });
    if let Some(existing) = existing {
        existing.value = value;
        existing.attributes = attributes;
        return;
    }
    nodes.push(Node::String(StringResource {
        name,
        value,
        attributes,
        comment,
    }));
}

fn push_attributes(output: &mut String, attributes: &[(String, String)]) {
    for (key, value) in attributes {
        output.push(' ');
        output.push_str(key);
        output.push_str("=\"");
        output.push_str(&escape(value.as_str()));
        output.push('"');
    }
}

fn string_attributes(
    element: &BytesStart<'_>,
    content: &str,
    reader: &Reader<&[u8]>,
) -> Result<(String, Vec<(String, String)>), SyntaxError> {
    let mut attributes = read_attributes(element, content, reader)?;
    let position = attributes
        .iter()
        .position(|(key, _)| key == "name")
        .ok_or_else(|| {
            SyntaxError::at(
                line_at(content, reader.buffer_position()),
                "<string> element without a name attribute",
            )
        })?;
    let (_, name) = attributes.remove(position);
    Ok((name, attributes))
}

fn read_attributes(
    element: &BytesStart<'_>,
    content: &str,
    reader: &Reader<&[u8]>,
) -> Result<Vec<(String, String)>, SyntaxError> {
    let mut attributes = Vec::new();
    for attribute in element.attributes() {
        let attribute =
            attribute.map_err(|err| syntax_error(content, reader.buffer_position(), err))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| syntax_error(content, reader.buffer_position(), err))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

fn syntax_error(content: &str, position: usize, err: impl std::fmt::Display) -> SyntaxError {
    SyntaxError::at(line_at(content, position), err.to_string())
}

fn line_at(content: &str, position: usize) -> usize {
    let end = position.min(content.len());
    content.as_bytes()[..end]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
        + 1
}

//! Apple `.strings` files: `"key" = "value";` pairs with C-style comments.

use std::iter::Peekable;
use std::str::Chars;

use super::{SyntaxError, TranslationUnit};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringsFile {
    items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Entry(Entry),
    /// Comments set apart by a blank line, such as the file header or
    /// `MARK:` sections. They belong to no entry.
    Detached(Vec<Comment>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    /// Unescaped value.
    value: String,
    comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    Block,
    Line,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comment {
    /// Text without its `/* */` or `//` markers.
    text: String,
    style: CommentStyle,
}

impl Comment {
    /// A block comment for arbitrary text. `*/` cannot appear inside one.
    fn block(text: &str) -> Self {
        Self {
            text: text.replace("*/", "* /"),
            style: CommentStyle::Block,
        }
    }

    fn render(&self, output: &mut String) {
        match self.style {
            CommentStyle::Block => {
                output.push_str("/* ");
                output.push_str(&self.text);
                output.push_str(" */\n");
            }
            CommentStyle::Line => {
                output.push_str("// ");
                output.push_str(&self.text);
                output.push('\n');
            }
        }
    }
}

fn comment_text(comments: &[Comment]) -> Option<String> {
    if comments.is_empty() {
        return None;
    }
    Some(
        comments
            .iter()
            .map(|comment| comment.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

impl StringsFile {
    pub(crate) fn parse(content: &str) -> Result<Self, SyntaxError> {
        let mut scanner = Scanner::new(content);
        let mut items: Vec<Item> = Vec::new();
        let mut comments: Vec<Comment> = Vec::new();

        loop {
            if scanner.skip_whitespace() && !comments.is_empty() {
                items.push(Item::Detached(std::mem::take(&mut comments)));
            }
            match scanner.peek() {
                None => break,
                Some('/') => comments.push(scanner.comment()?),
                Some(_) => {
                    let key = scanner.key()?;
                    scanner.skip_whitespace();
                    scanner.expect('=')?;
                    scanner.skip_whitespace();
                    let value = scanner.quoted()?;
                    scanner.skip_whitespace();
                    scanner.expect(';')?;

                    let mut entry_comments = std::mem::take(&mut comments);
                    scanner.skip_inline_whitespace();
                    if scanner.peek() == Some('/') {
                        entry_comments.push(scanner.comment()?);
                    }

                    // Later definitions win, at the position of the first one.
                    let existing = items.iter_mut().find_map(|item| match item {
                        Item::Entry(entry) if entry.key == key => Some(entry),
                        _ => None,
                    });
                    if let Some(existing) = existing {
                        existing.value = value;
                        if !entry_comments.is_empty() {
                            existing.comments = entry_comments;
                        }
                    } else {
                        items.push(Item::Entry(Entry {
                            key,
                            value,
                            comments: entry_comments,
                        }));
                    }
                }
            }
        }
        if !comments.is_empty() {
            items.push(Item::Detached(comments));
        }

        Ok(Self { items })
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter().filter_map(|item| match item {
            Item::Entry(entry) => Some(entry),
            Item::Detached(_) => None,
        })
    }

    pub(crate) fn units(&self) -> Vec<TranslationUnit> {
        self.entries()
            .map(|entry| TranslationUnit {
                key: entry.key.clone(),
                source_text: entry.value.clone(),
                existing_translation: None,
                comment: comment_text(&entry.comments),
                translatable: true,
            })
            .collect()
    }

    /// Replaces the entries with `units`. Detached comments stay after the
    /// entry they followed; those whose entry is gone move to the end.
    pub(crate) fn apply(&mut self, units: &[TranslationUnit]) {
        let mut anchored: Vec<(Option<String>, Vec<Comment>)> = Vec::new();
        let mut previous: Option<&str> = None;
        for item in &self.items {
            match item {
                Item::Entry(entry) => previous = Some(entry.key.as_str()),
                Item::Detached(comments) => {
                    anchored.push((previous.map(str::to_string), comments.clone()))
                }
            }
        }

        let mut items = take_anchored(&mut anchored, None);
        for unit in units {
            let kept = self
                .entries()
                .find(|entry| entry.key == unit.key)
                .map(|entry| entry.comments.clone())
                .filter(|comments| comment_text(comments) == unit.comment);
            let comments = match (kept, unit.comment.as_deref()) {
                (Some(comments), _) => comments,
                (None, Some(text)) => vec![Comment::block(text)],
                (None, None) => Vec::new(),
            };
            items.push(Item::Entry(Entry {
                key: unit.key.clone(),
                value: unit.output_text().to_string(),
                comments,
            }));
            items.extend(take_anchored(&mut anchored, Some(unit.key.as_str())));
        }
        items.extend(
            anchored
                .into_iter()
                .map(|(_, comments)| Item::Detached(comments)),
        );
        self.items = items;
    }

    pub(crate) fn render(&self) -> String {
        let mut output = String::new();
        for item in &self.items {
            match item {
                Item::Entry(entry) => {
                    if !entry.comments.is_empty() {
                        separate(&mut output);
                    }
                    for comment in &entry.comments {
                        comment.render(&mut output);
                    }
                    output.push_str(&format!(
                        "\"{}\" = \"{}\";\n",
                        escape(&entry.key),
                        escape(&entry.value)
                    ));
                }
                Item::Detached(comments) => {
                    separate(&mut output);
                    for comment in comments {
                        comment.render(&mut output);
                    }
                    output.push('\n');
                }
            }
        }
        output
    }
}

fn take_anchored(
    anchored: &mut Vec<(Option<String>, Vec<Comment>)>,
    key: Option<&str>,
) -> Vec<Item> {
    let mut taken = Vec::new();
    anchored.retain(|(anchor, comments)| {
        if anchor.as_deref() == key {
            taken.push(Item::Detached(comments.clone()));
            false
        } else {
            true
        }
    });
    taken
}

/// Starts a new paragraph unless the output is empty or already has one.
fn separate(output: &mut String) {
    if !output.is_empty() && !output.ends_with("\n\n") {
        output.push('\n');
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            chars: content.chars().peekable(),
            line: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.line, message)
    }

    /// Returns true when the skipped run contained a blank line.
    fn skip_whitespace(&mut self) -> bool {
        let mut newlines = 0;
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            if ch == '\n' {
                newlines += 1;
            }
            self.bump();
        }
        newlines > 1
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.bump();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of file", expected))),
        }
    }

    fn comment(&mut self) -> Result<Comment, SyntaxError> {
        let start = self.line;
        self.expect('/')?;
        match self.bump() {
            Some('/') => {
                let mut text = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    text.push(ch);
                    self.bump();
                }
                Ok(Comment {
                    text: text.trim().to_string(),
                    style: CommentStyle::Line,
                })
            }
            Some('*') => {
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some('*') if self.peek() == Some('/') => {
                            self.bump();
                            return Ok(Comment {
                                text: text.trim().to_string(),
                                style: CommentStyle::Block,
                            });
                        }
                        Some(ch) => text.push(ch),
                        None => return Err(SyntaxError::at(start, "unterminated comment")),
                    }
                }
            }
            _ => Err(SyntaxError::at(start, "expected a comment after '/'")),
        }
    }

    fn key(&mut self) -> Result<String, SyntaxError> {
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let mut key = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | '$') {
                key.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        if key.is_empty() {
            return Err(match self.peek() {
                Some(ch) => self.error(format!("expected a key, found '{}'", ch)),
                None => self.error("expected a key"),
            });
        }
        Ok(key)
    }

    fn quoted(&mut self) -> Result<String, SyntaxError> {
        let start = self.line;
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(SyntaxError::at(start, "unterminated string")),
                Some('"') => return Ok(value),
                Some('\\') => {
                    let ch = self.escape_sequence()?;
                    value.push(ch);
                }
                Some(ch) => value.push(ch),
            }
        }
    }

    fn escape_sequence(&mut self) -> Result<char, SyntaxError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('0') => Ok('\0'),
            Some('U' | 'u') => {
                let high = self.hex4()?;
                if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair written as two \U escapes.
                    if self.bump() != Some('\\') || !matches!(self.bump(), Some('U' | 'u')) {
                        return Err(self.error("unpaired surrogate in \\U escape"));
                    }
                    let low = self.hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.error("invalid surrogate pair in \\U escape"));
                    }
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(combined)
                        .ok_or_else(|| self.error("invalid surrogate pair in \\U escape"));
                }
                char::from_u32(high).ok_or_else(|| self.error("invalid \\U escape"))
            }
            Some(ch) => Ok(ch),
            None => Err(self.error("unterminated escape sequence")),
        }
    }

    fn hex4(&mut self) -> Result<u32, SyntaxError> {
        let mut digits = String::with_capacity(4);
        for _ in 0..4 {
            match self.bump() {
                Some(ch) if ch.is_ascii_hexdigit() => digits.push(ch),
                _ => return Err(self.error("expected four hex digits in \\U escape")),
            }
        }
        u32::from_str_radix(&digits, 16).map_err(|_| self.error("invalid \\U escape"))
    }
}

use regex::Regex;
use serde::de::{self, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_saphyr::{Location, Spanned};
use std::fmt;
use thiserror::Error;

/// First line of every synced lint configuration.
pub const SYNC_HEADER: &str = "# This file is synced from `Homebrew/brew` by the `.github` repository, do not modify it directly.";

/// Top-level keys matching this pattern are specific to the reference repository
/// and never synced. Only `require` is anchored.
pub const EXCLUDED_KEYS: &str =
    r"\Arequire|inherit_from|inherit_mode|Cask/|Formula|Homebrew|Performance/|RSpec|Sorbet/";

/// Explicit YAML tags a lint configuration may carry, in shorthand form.
const ALLOWED_TAGS: &[&str] = &[
    "!",
    REGEXP_TAG,
    "!ruby/symbol",
    "!ruby/sym",
    "!!str",
    "!!int",
    "!!float",
    "!!bool",
    "!!null",
    "!!seq",
    "!!map",
];

/// Tag of a Ruby regular expression literal
const REGEXP_TAG: &str = "!ruby/regexp";

/// Tags of a Ruby symbol
const SYMBOL_TAGS: &[&str] = &["!ruby/symbol", "!ruby/sym"];

/// Prefix of the verbose form of core schema tags
const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// Errors that can occur when loading or rendering a lint configuration
#[derive(Debug, Error)]
pub enum LintConfigError {
    #[error("failed to parse YAML lint configuration")]
    Parse(#[source] Box<serde_saphyr::Error>),

    #[error("disallowed YAML tag `{tag}` on line {line}")]
    DisallowedTag { tag: String, line: usize },

    #[error("YAML alias `{alias}` on line {line} is not allowed")]
    Alias { alias: String, line: usize },

    #[error("YAML merge key on line {line} is not allowed")]
    MergeKey { line: usize },

    #[error("`{0}` is not a Ruby regular expression literal")]
    InvalidRegexp(String),

    #[error("failed to serialize lint configuration: {0}")]
    Serialize(String),

    #[error("invalid regex pattern")]
    Regex(#[from] regex::Error),
}

/// A plain YAML value, or one of the Ruby literals RuboCop configurations use.
#[derive(Debug, Clone, PartialEq)]
pub enum LintValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// `!ruby/regexp` literal, slashes and flags included (`/\Afoo/i`).
    Regexp(String),
    /// Symbol name without the leading colon.
    Symbol(String),
    Sequence(Vec<LintValue>),
    Mapping(LintMapping),
}

impl LintValue {
    /// Text of a scalar as it would be read back by a Ruby tag.
    fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(v) => Some(v.to_string()),
            Self::Integer(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::String(v) | Self::Regexp(v) | Self::Symbol(v) => Some(v.clone()),
            Self::Null | Self::Sequence(_) | Self::Mapping(_) => None,
        }
    }

    /// Whether any string in this value contains `needle`.
    fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::String(v) | Self::Regexp(v) | Self::Symbol(v) => v.contains(needle),
            Self::Sequence(items) => items.iter().any(|item| item.mentions(needle)),
            Self::Mapping(mapping) => mapping.mentions(needle),
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::Float(_) => false,
        }
    }

    /// Replace Ruby literals with placeholder strings, collecting their YAML text.
    fn with_placeholders(&self, marker: &str, literals: &mut Vec<String>) -> Self {
        match self {
            Self::Regexp(source) => placeholder(marker, literals, regexp_yaml(source)),
            Self::Symbol(name) => placeholder(marker, literals, symbol_yaml(name)),
            Self::Sequence(items) => Self::Sequence(
                items
                    .iter()
                    .map(|item| item.with_placeholders(marker, literals))
                    .collect(),
            ),
            Self::Mapping(mapping) => Self::Mapping(mapping.with_placeholders(marker, literals)),
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::Float(_) | Self::String(_) => {
                self.clone()
            }
        }
    }
}

/// String-keyed mapping that keeps document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LintMapping(Vec<(String, LintValue)>);

impl LintMapping {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&LintValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any key or string value contains `needle`.
    fn mentions(&self, needle: &str) -> bool {
        self.0
            .iter()
            .any(|(key, value)| key.contains(needle) || value.mentions(needle))
    }

    /// Copy of this mapping with Ruby literals swapped for placeholders.
    fn with_placeholders(&self, marker: &str, literals: &mut Vec<String>) -> Self {
        Self(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), value.with_placeholders(marker, literals)))
                .collect(),
        )
    }
}

/// Placeholder for the next collected literal. The trailing `-end` keeps
/// `marker-1-end` from matching inside `marker-10-end`.
fn placeholder_text(marker: &str, index: usize) -> String {
    format!("{marker}-{index}-end")
}

/// Record `yaml` and return the placeholder standing in for it.
fn placeholder(marker: &str, literals: &mut Vec<String>, yaml: String) -> LintValue {
    let text = placeholder_text(marker, literals.len());
    literals.push(yaml);
    LintValue::String(text)
}

/// YAML text of a regular expression literal.
fn regexp_yaml(source: &str) -> String {
    if is_plain_safe(source) {
        format!("{REGEXP_TAG} {source}")
    } else {
        format!("{REGEXP_TAG} {}", double_quoted(source))
    }
}

/// YAML text of a symbol: `:name` when Psych reads it back as a symbol,
/// an explicitly tagged string otherwise.
fn symbol_yaml(name: &str) -> String {
    let word = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && name
            .trim_end_matches(['?', '!', '='])
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if word {
        format!(":{name}")
    } else {
        format!("!ruby/symbol {}", double_quoted(name))
    }
}

/// Whether `text` reads back unchanged as a plain scalar after a tag.
fn is_plain_safe(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|first| !"-?:,[]{}#&*!|>'\"%@`".contains(first))
        && text.trim() == text
        && !text.contains(": ")
        && !text.contains(" #")
        && !text.ends_with(':')
        && !text
            .chars()
            .any(|c| c.is_control() || matches!(c, ',' | '[' | ']' | '{' | '}'))
}

/// Double-quoted YAML scalar for `text`.
fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len().saturating_add(2));
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parsed YAML node whose children keep their source location, so tags and
/// quoting can be recovered from the document text afterwards.
enum Node {
    /// Scalar as `serde-saphyr` typed it; Ruby literals are still strings here.
    Scalar(LintValue),
    /// Sequence items
    Sequence(Vec<Spanned<Node>>),
    /// Mapping entries in document order
    Mapping(Vec<(String, Spanned<Node>)>),
}

/// Visitor accepting only plain YAML values
struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a plain scalar, sequence or string-keyed mapping")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::Integer(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        i64::try_from(v)
            .map(|v| Node::Scalar(LintValue::Integer(v)))
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::String(v.to_owned())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::Scalar(LintValue::String(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Spanned<Node>>()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Node, A::Error> {
        EntriesVisitor.visit_map(map).map(Node::Mapping)
    }
}

/// Visitor for string-keyed mappings
struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Vec<(String, Spanned<Node>)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<String, Spanned<Node>>()? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

/// Top-level mapping of a lint configuration document
struct Document(Vec<(String, Spanned<Node>)>);

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor).map(Document)
    }
}

/// Turn parsed entries into a [`LintMapping`], reading tags and quoting from `source`.
fn resolve_entries(
    entries: Vec<(String, Spanned<Node>)>,
    source: &str,
) -> Result<LintMapping, LintConfigError> {
    entries
        .into_iter()
        .map(|(key, node)| Ok((key, resolve(node, source)?)))
        .collect::<Result<Vec<_>, _>>()
        .map(LintMapping)
}

/// Resolve one node and its children.
fn resolve(node: Spanned<Node>, source: &str) -> Result<LintValue, LintConfigError> {
    match node.value {
        Node::Scalar(value) => resolve_scalar(value, &node.referenced, source),
        Node::Sequence(items) => items
            .into_iter()
            .map(|item| resolve(item, source))
            .collect::<Result<Vec<_>, _>>()
            .map(LintValue::Sequence),
        Node::Mapping(entries) => resolve_entries(entries, source).map(LintValue::Mapping),
    }
}

/// Apply Psych's reading of Ruby tags and plain `:name` scalars.
fn resolve_scalar(
    value: LintValue,
    location: &Location,
    source: &str,
) -> Result<LintValue, LintConfigError> {
    let Some((before, raw)) = byte_index(source, location)
        .and_then(|start| Some((source.get(..start)?, source.get(start..)?)))
    else {
        return Ok(value);
    };

    match preceding_tag(before) {
        Some(tag) if tag == REGEXP_TAG => {
            let text = value.scalar_text().unwrap_or_default();
            if is_regexp_literal(&text) {
                Ok(LintValue::Regexp(text))
            } else {
                Err(LintConfigError::InvalidRegexp(text))
            }
        }
        Some(tag) if SYMBOL_TAGS.contains(&tag.as_str()) => {
            Ok(value.scalar_text().map_or(value, LintValue::Symbol))
        }
        Some(_) => Ok(value),
        None => Ok(plain_symbol(value, raw)),
    }
}

/// A plain scalar starting with `:` and at least one more character is a symbol.
fn plain_symbol(value: LintValue, raw: &str) -> LintValue {
    match value {
        LintValue::String(text) if raw.starts_with(':') && text.len() > 1 => {
            let name = text.get(1..).unwrap_or_default();
            let name = ['"', '\'']
                .iter()
                .find_map(|quote| name.strip_prefix(*quote)?.strip_suffix(*quote))
                .unwrap_or(name);
            LintValue::Symbol(name.to_owned())
        }
        other => other,
    }
}

/// `/body/flags` with only the flags Ruby accepts.
fn is_regexp_literal(text: &str) -> bool {
    text.strip_prefix('/')
        .and_then(|body| body.rsplit_once('/'))
        .is_some_and(|(_, flags)| flags.chars().all(|c| matches!(c, 'm' | 'i' | 'x' | 'n')))
}

/// Byte offset of a 1-indexed line and character column.
fn byte_index(source: &str, location: &Location) -> Option<usize> {
    let line = usize::try_from(location.line()).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column()).ok()?.checked_sub(1)?;
    let line_start: usize = source.split_inclusive('\n').take(line).map(str::len).sum();
    let (offset, _) = source.get(line_start..)?.char_indices().nth(column)?;
    line_start.checked_add(offset)
}

/// Tag directly preceding a node, skipping an anchor, in shorthand form.
fn preceding_tag(before: &str) -> Option<String> {
    let rest = before.trim_end();
    let mut token = last_token(rest)?;
    if token.starts_with('&') {
        token = last_token(rest.strip_suffix(token)?.trim_end())?;
    }
    token.starts_with('!').then(|| shorthand_tag(token))
}

/// Last node property or indicator in `text`.
fn last_token(text: &str) -> Option<&str> {
    if text.ends_with('>')
        && let Some(start) = text.rfind("!<")
    {
        return text.get(start..);
    }
    text.rsplit(|c: char| c.is_whitespace() || matches!(c, '[' | '{' | ','))
        .next()
}

/// Shorthand form of a verbose tag: `!<tag:yaml.org,2002:str>` is `!!str`
/// and `!<!ruby/regexp>` is `!ruby/regexp`.
fn shorthand_tag(tag: &str) -> String {
    match tag.strip_prefix("!<").and_then(|t| t.strip_suffix('>')) {
        Some(uri) => uri
            .strip_prefix(CORE_TAG_PREFIX)
            .map_or_else(|| uri.to_owned(), |core| format!("!!{core}")),
        None => tag.to_owned(),
    }
}

impl Serialize for LintValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(v) | Self::Regexp(v) => serializer.serialize_str(v),
            Self::Symbol(name) => serializer.serialize_str(&format!(":{name}")),
            Self::Sequence(items) => serializer.collect_seq(items),
            Self::Mapping(mapping) => mapping.serialize(serializer),
        }
    }
}

impl Serialize for LintMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Top-level lint configuration document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LintConfig(LintMapping);

impl LintConfig {
    /// Parse a lint configuration, accepting only plain YAML values and the
    /// Ruby regular expression and symbol literals.
    ///
    /// Anchors are accepted but aliases and merge keys are not, matching
    /// Psych's safe loading.
    ///
    /// # Errors
    ///
    /// Returns [`LintConfigError::DisallowedTag`], [`LintConfigError::Alias`] or
    /// [`LintConfigError::MergeKey`] if [`check_syntax`] rejects the document.
    /// Returns [`LintConfigError::Parse`] if the document is malformed or not a plain mapping.
    /// Returns [`LintConfigError::InvalidRegexp`] if a `!ruby/regexp` value is not `/…/flags`.
    pub fn parse(content: &str) -> Result<Self, LintConfigError> {
        check_syntax(content)?;
        let Document(entries) = serde_saphyr::from_str(content)
            .map_err(|source| LintConfigError::Parse(Box::new(source)))?;
        resolve_entries(entries, content).map(Self)
    }

    /// Drop every top-level key matching [`EXCLUDED_KEYS`].
    ///
    /// # Errors
    ///
    /// Returns [`LintConfigError::Regex`] if the pattern fails to compile.
    pub fn without_excluded_keys(self) -> Result<Self, LintConfigError> {
        let excluded = Regex::new(EXCLUDED_KEYS)?;
        let entries = self
            .0
            .0
            .into_iter()
            .filter(|(key, _)| !excluded.is_match(key))
            .collect();
        Ok(Self(LintMapping(entries)))
    }

    #[must_use]
    pub fn mapping(&self) -> &LintMapping {
        &self.0
    }

    /// Render the configuration as the file written into target repositories:
    /// the sync header, a YAML document and a trailing blank line.
    ///
    /// Regular expressions keep their `!ruby/regexp` tag and symbols render as
    /// `:name`, so Psych loads the same values the reference file holds.
    ///
    /// # Errors
    ///
    /// Returns [`LintConfigError::Serialize`] if the mapping cannot be serialized.
    pub fn render(&self) -> Result<String, LintConfigError> {
        let mut document = if self.0.is_empty() {
            "--- {}\n".to_owned()
        } else {
            let mut marker = "ruby-literal".to_owned();
            while self.0.mentions(&marker) {
                marker.push_str("-x");
            }
            let mut literals = Vec::new();
            let plain = self.0.with_placeholders(&marker, &mut literals);

            let mut yaml = serde_saphyr::to_string(&plain)
                .map_err(|e| LintConfigError::Serialize(e.to_string()))?;
            for (index, literal) in literals.iter().enumerate() {
                let text = placeholder_text(&marker, index);
                for quoted in [format!("\"{text}\""), format!("'{text}'"), text] {
                    yaml = yaml.replace(&quoted, literal);
                }
            }

            if yaml.starts_with("---") {
                yaml
            } else {
                format!("---\n{yaml}")
            }
        };
        if !document.ends_with('\n') {
            document.push('\n');
        }
        Ok(format!("{SYNC_HEADER}\n{document}\n"))
    }
}

/// Reject explicit tags outside [`ALLOWED_TAGS`], aliases and merge keys.
///
/// Quoted scalars (including ones spanning several lines), comments and block
/// scalar bodies are not inspected. Verbose tags such as
/// `!<tag:yaml.org,2002:str>` are checked in their shorthand form. A plain
/// scalar that continues on the next line is scanned like any other line.
///
/// # Errors
///
/// Returns [`LintConfigError::DisallowedTag`], [`LintConfigError::Alias`] or
/// [`LintConfigError::MergeKey`] for the first offending line.
pub fn check_syntax(content: &str) -> Result<(), LintConfigError> {
    let tag = Regex::new(r"(?:^|[\s\[{,])(!<[^>]*>|![^\s,\[\]{}]*)")?;
    let alias = Regex::new(r"(?:^|[\[{,]|[-:?]\s)\s*(\*[^\s,\[\]{}]+)")?;
    let merge_key = Regex::new(r"(?:^|[\s\[{,])<<\s*:(?:\s|$)")?;
    let block_start = Regex::new(r"(?:^|[\s:-])[|>][+-]?\d*[+-]?$")?;

    let mut open_quote: Option<char> = None;
    let mut block_indent: Option<usize> = None;

    for (index, line) in content.lines().enumerate() {
        let line_number = index.saturating_add(1);
        let indent = line.len().saturating_sub(line.trim_start().len());

        if open_quote.is_none()
            && let Some(parent) = block_indent
        {
            if line.trim().is_empty() || indent > parent {
                continue;
            }
            block_indent = None;
        }

        let code = mask_line(line, &mut open_quote);

        for cap in tag.captures_iter(&code) {
            if let Some(found) = cap.get(1)
                && !ALLOWED_TAGS.contains(&shorthand_tag(found.as_str()).as_str())
            {
                return Err(LintConfigError::DisallowedTag {
                    tag: found.as_str().to_owned(),
                    line: line_number,
                });
            }
        }

        if merge_key.is_match(&code) {
            return Err(LintConfigError::MergeKey { line: line_number });
        }

        if let Some(found) = alias.captures(&code).and_then(|cap| cap.get(1)) {
            return Err(LintConfigError::Alias {
                alias: found.as_str().to_owned(),
                line: line_number,
            });
        }

        if open_quote.is_none() && block_start.is_match(code.trim_end()) {
            block_indent = Some(indent);
        }
    }

    Ok(())
}

/// Copy of `line` with quoted scalars reduced to `""` and any comment removed.
/// `open_quote` carries a quoted scalar that is still open across lines.
fn mask_line(line: &str, open_quote: &mut Option<char>) -> String {
    let mut code = String::with_capacity(line.len());
    let mut previous: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match *open_quote {
            Some('"') => match c {
                '\\' => {
                    chars.next();
                }
                '"' => *open_quote = None,
                _ => {}
            },
            Some(quote) => {
                if c == quote {
                    if chars.peek() == Some(&quote) {
                        chars.next();
                    } else {
                        *open_quote = None;
                    }
                }
            }
            None => {
                let at_token_start = previous
                    .is_none_or(|p| p.is_whitespace() || matches!(p, '[' | '{' | ','));
                if c == '#' && previous.is_none_or(char::is_whitespace) {
                    break;
                }
                if matches!(c, '"' | '\'') && at_token_start {
                    *open_quote = Some(c);
                    code.push_str("\"\"");
                    previous = Some('"');
                } else {
                    code.push(c);
                    previous = Some(c);
                }
            }
        }
    }

    code
}

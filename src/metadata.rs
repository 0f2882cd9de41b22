//! Document metadata headers: parse, validate, generate, rewrite.
//!
//! A document is a text file that may start with a YAML header fenced by
//! `---` lines:
//!
//! ```text
//! ---
//! title: Intro to Rust
//! description: First steps
//! update: 2024-03-01
//! category: tech
//! tags: [rust, beginners]
//! ---
//! # Body starts here
//! ```
//!
//! ## Fields
//!
//! | Key | Type | Required |
//! |-----|------|----------|
//! | `title` | non-empty string | yes |
//! | `description` | non-empty string | yes |
//! | `update` | `YYYY-MM-DD` or RFC 3339 timestamp | no |
//! | `category` | string | no |
//! | `tags` | list of strings | no |
//!
//! The build injects `series`, `seriesOrder`, `seriesInfo`, `href`, `params`
//! and `pagination`. Any other key passes through untouched.
//!
//! ## Write contract
//!
//! Every write rebuilds the whole document (header + body) in memory and
//! hands it to [`Io::write`], which commits atomically. A failed call leaves
//! the file as it was. The body is carried over byte for byte; header key
//! order is whatever the YAML serializer produces for the merged mapping.
//!
//! ## Repairing invalid headers
//!
//! [`generate`] merges defaults under a partial header and drops any known
//! key whose value has the wrong type. Feeding it a document's raw header
//! yields the closest valid [`DocumentMeta`]: that is how documents failing
//! validation get their defaults injected.

use crate::io::{Io, IoError};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::Deserialize;
use serde_yaml::{Mapping, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const UPDATE: &str = "update";
pub const CATEGORY: &str = "category";
pub const TAGS: &str = "tags";
pub const SERIES: &str = "series";
pub const SERIES_ORDER: &str = "seriesOrder";
pub const SERIES_INFO: &str = "seriesInfo";
pub const HREF: &str = "href";
pub const PARAMS: &str = "params";
pub const PAGINATION: &str = "pagination";

const KNOWN_FIELDS: &[&str] = &[
    TITLE,
    DESCRIPTION,
    UPDATE,
    CATEGORY,
    TAGS,
    SERIES,
    SERIES_ORDER,
    SERIES_INFO,
    HREF,
    PARAMS,
    PAGINATION,
];

pub const DEFAULT_TITLE: &str = "DEFAULT TITLE";
pub const DEFAULT_DESCRIPTION: &str = "DEFAULT DESCRIPTION";

const FENCE: &str = "---";

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Invalid metadata in {}: {}", .path.display(), join_issues(.issues))]
    Validation {
        path: PathBuf,
        issues: Vec<FieldIssue>,
    },
    #[error("Malformed header in {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("{} already has a metadata header", .0.display())]
    HeaderExists(PathBuf),
    #[error("Cannot serialize header for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Io(#[from] IoError),
}

/// One failed check against a header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Typed values
// =============================================================================

/// A header date, kept in the form it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaDate {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl MetaDate {
    pub fn now() -> Self {
        MetaDate::DateTime(Utc::now().trunc_subsecs(0).fixed_offset())
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(MetaDate::Date(date));
        }
        DateTime::parse_from_rfc3339(s).ok().map(MetaDate::DateTime)
    }
}

impl fmt::Display for MetaDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            MetaDate::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageLink {
    pub title: String,
    pub href: String,
}

impl PageLink {
    fn to_value(&self) -> Value {
        let mut m = Mapping::new();
        m.insert(TITLE.into(), self.title.as_str().into());
        m.insert(HREF.into(), self.href.as_str().into());
        Value::Mapping(m)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub prev: Option<PageLink>,
    #[serde(default)]
    pub next: Option<PageLink>,
}

impl Pagination {
    fn to_value(&self) -> Value {
        let mut m = Mapping::new();
        if let Some(prev) = &self.prev {
            m.insert("prev".into(), prev.to_value());
        }
        if let Some(next) = &self.next {
            m.insert("next".into(), next.to_value());
        }
        Value::Mapping(m)
    }
}

/// Where a document sits in its series.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeriesInfo {
    pub name: String,
    /// 1-based.
    pub position: u32,
    pub total: u32,
    pub entries: Vec<PageLink>,
}

impl SeriesInfo {
    fn to_value(&self) -> Value {
        let mut m = Mapping::new();
        m.insert("name".into(), self.name.as_str().into());
        m.insert("position".into(), Value::Number(Number::from(self.position)));
        m.insert("total".into(), Value::Number(Number::from(self.total)));
        m.insert(
            "entries".into(),
            Value::Sequence(self.entries.iter().map(PageLink::to_value).collect()),
        );
        Value::Mapping(m)
    }
}

fn params_value(params: &BTreeMap<String, String>) -> Value {
    Value::Mapping(
        params
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect(),
    )
}

fn tags_value(tags: &[String]) -> Value {
    Value::Sequence(tags.iter().map(|t| Value::from(t.as_str())).collect())
}

// =============================================================================
// DocumentMeta
// =============================================================================

/// A validated document header.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub title: String,
    pub description: String,
    pub update: Option<MetaDate>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub series: Option<String>,
    pub series_order: Option<u32>,
    pub series_info: Option<SeriesInfo>,
    pub href: Option<String>,
    pub params: Option<BTreeMap<String, String>>,
    pub pagination: Option<Pagination>,
    /// Keys this crate does not interpret, in header order.
    pub extra: Mapping,
}

impl DocumentMeta {
    /// Validate a raw header mapping.
    pub fn from_mapping(mapping: &Mapping) -> Result<Self, Vec<FieldIssue>> {
        let (meta, issues) = read_fields(mapping);
        if issues.is_empty() {
            Ok(meta)
        } else {
            Err(issues)
        }
    }

    pub fn to_mapping(&self) -> Mapping {
        let mut m = Mapping::new();
        m.insert(TITLE.into(), self.title.as_str().into());
        m.insert(DESCRIPTION.into(), self.description.as_str().into());
        if let Some(update) = &self.update {
            m.insert(UPDATE.into(), Value::String(update.to_string()));
        }
        if let Some(category) = &self.category {
            m.insert(CATEGORY.into(), category.as_str().into());
        }
        if let Some(tags) = &self.tags {
            m.insert(TAGS.into(), tags_value(tags));
        }
        if let Some(series) = &self.series {
            m.insert(SERIES.into(), series.as_str().into());
        }
        if let Some(order) = self.series_order {
            m.insert(SERIES_ORDER.into(), Value::Number(Number::from(order)));
        }
        if let Some(info) = &self.series_info {
            m.insert(SERIES_INFO.into(), info.to_value());
        }
        if let Some(href) = &self.href {
            m.insert(HREF.into(), href.as_str().into());
        }
        if let Some(params) = &self.params {
            m.insert(PARAMS.into(), params_value(params));
        }
        if let Some(pagination) = &self.pagination {
            m.insert(PAGINATION.into(), pagination.to_value());
        }
        for (k, v) in &self.extra {
            m.insert(k.clone(), v.clone());
        }
        m
    }
}

fn issue(field: &str, reason: &str) -> FieldIssue {
    FieldIssue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// A present, non-null value.
fn present<'m>(mapping: &'m Mapping, field: &str) -> Option<&'m Value> {
    match mapping.get(field) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v),
    }
}

fn required_string(mapping: &Mapping, field: &str, issues: &mut Vec<FieldIssue>) -> String {
    match mapping.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => {
            issues.push(issue(field, "must not be empty"));
            String::new()
        }
        Some(_) => {
            issues.push(issue(field, "must be a string"));
            String::new()
        }
        None => {
            issues.push(issue(field, "is required"));
            String::new()
        }
    }
}

fn optional_string(mapping: &Mapping, field: &str, issues: &mut Vec<FieldIssue>) -> Option<String> {
    let value = present(mapping, field)?;
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            issues.push(issue(field, "must be a string"));
            None
        }
    }
}

fn optional_typed<T: serde::de::DeserializeOwned>(
    mapping: &Mapping,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<T> {
    let value = present(mapping, field)?;
    match serde_yaml::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            issues.push(issue(field, &e.to_string()));
            None
        }
    }
}

/// Read every known field, collecting issues instead of stopping at the
/// first. Invalid fields are left unset (required strings left empty).
fn read_fields(mapping: &Mapping) -> (DocumentMeta, Vec<FieldIssue>) {
    let mut issues = Vec::new();

    let title = required_string(mapping, TITLE, &mut issues);
    let description = required_string(mapping, DESCRIPTION, &mut issues);

    let update = present(mapping, UPDATE).and_then(|v| {
        let date = v.as_str().and_then(MetaDate::parse);
        if date.is_none() {
            issues.push(issue(UPDATE, "must be a date (YYYY-MM-DD or RFC 3339)"));
        }
        date
    });

    let category = optional_string(mapping, CATEGORY, &mut issues);

    let tags = present(mapping, TAGS).and_then(|v| {
        let strings: Option<Vec<String>> = v
            .as_sequence()
            .and_then(|seq| seq.iter().map(|t| t.as_str().map(String::from)).collect());
        if strings.is_none() {
            issues.push(issue(TAGS, "must be a list of strings"));
        }
        strings
    });

    let series = optional_string(mapping, SERIES, &mut issues);
    let series_order = present(mapping, SERIES_ORDER).and_then(|v| {
        let order = v.as_u64().and_then(|n| u32::try_from(n).ok());
        if order.is_none() {
            issues.push(issue(SERIES_ORDER, "must be a non-negative integer"));
        }
        order
    });
    let series_info = optional_typed::<SeriesInfo>(mapping, SERIES_INFO, &mut issues);
    let href = optional_string(mapping, HREF, &mut issues);
    let params = optional_typed::<BTreeMap<String, String>>(mapping, PARAMS, &mut issues);
    let pagination = optional_typed::<Pagination>(mapping, PAGINATION, &mut issues);

    let extra = mapping
        .iter()
        .filter(|(k, _)| !k.as_str().is_some_and(|k| KNOWN_FIELDS.contains(&k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let meta = DocumentMeta {
        title,
        description,
        update,
        category,
        tags,
        series,
        series_order,
        series_info,
        href,
        params,
        pagination,
        extra,
    };
    (meta, issues)
}

// =============================================================================
// PartialMeta
// =============================================================================

/// A set of header fields to merge over an existing header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMeta(Mapping);

impl PartialMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set an arbitrary key.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn title(self, title: &str) -> Self {
        self.set(TITLE, title.into())
    }

    pub fn description(self, description: &str) -> Self {
        self.set(DESCRIPTION, description.into())
    }

    pub fn update(self, date: MetaDate) -> Self {
        self.set(UPDATE, Value::String(date.to_string()))
    }

    pub fn category(self, category: &str) -> Self {
        self.set(CATEGORY, category.into())
    }

    pub fn tags(self, tags: &[String]) -> Self {
        self.set(TAGS, tags_value(tags))
    }

    pub fn series(self, series: &str) -> Self {
        self.set(SERIES, series.into())
    }

    pub fn series_order(self, order: u32) -> Self {
        self.set(SERIES_ORDER, Value::Number(Number::from(order)))
    }

    pub fn series_info(self, info: &SeriesInfo) -> Self {
        self.set(SERIES_INFO, info.to_value())
    }

    pub fn href(self, href: &str) -> Self {
        self.set(HREF, href.into())
    }

    pub fn params(self, params: &BTreeMap<String, String>) -> Self {
        self.set(PARAMS, params_value(params))
    }

    pub fn pagination(self, pagination: &Pagination) -> Self {
        self.set(PAGINATION, pagination.to_value())
    }
}

/// Shallow merge: every key of `overlay` replaces the same key in `base`.
fn merge_mapping(base: &mut Mapping, overlay: &Mapping) {
    for (k, v) in overlay {
        base.insert(k.clone(), v.clone());
    }
}

/// Defaults merged under `partial`; partial wins where its values are valid.
pub fn generate(partial: &PartialMeta) -> DocumentMeta {
    let mut mapping = Mapping::new();
    mapping.insert(TITLE.into(), DEFAULT_TITLE.into());
    mapping.insert(DESCRIPTION.into(), DEFAULT_DESCRIPTION.into());
    mapping.insert(UPDATE.into(), Value::String(MetaDate::now().to_string()));
    merge_mapping(&mut mapping, partial.mapping());

    let (mut meta, _) = read_fields(&mapping);
    if meta.title.is_empty() {
        meta.title = DEFAULT_TITLE.to_string();
    }
    if meta.description.is_empty() {
        meta.description = DEFAULT_DESCRIPTION.to_string();
    }
    if meta.update.is_none() {
        meta.update = Some(MetaDate::now());
    }
    meta
}

// =============================================================================
// Header splitting
// =============================================================================

/// The header of a document as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHeader {
    Absent,
    Mapping(Mapping),
    Malformed(String),
}

/// A document read without validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub header: RawHeader,
    pub body: String,
}

/// A validated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub meta: DocumentMeta,
}

/// Split `text` into `(header, body)`. No opening fence, or no closing
/// fence, means no header.
pub fn split_header(text: &str) -> (Option<&str>, &str) {
    let Some(after_open) = text
        .strip_prefix("---\r\n")
        .or_else(|| text.strip_prefix("---\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            let header = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (Some(header), body);
        }
        offset += line.len();
    }
    (None, text)
}

fn parse_raw(text: &str) -> RawDocument {
    let (header, body) = split_header(text);
    let header = match header {
        None => RawHeader::Absent,
        Some(h) if h.trim().is_empty() => RawHeader::Mapping(Mapping::new()),
        Some(h) => match serde_yaml::from_str::<Value>(h) {
            Ok(Value::Mapping(m)) => RawHeader::Mapping(m),
            Ok(Value::Null) => RawHeader::Mapping(Mapping::new()),
            Ok(_) => RawHeader::Malformed("header is not a key/value mapping".to_string()),
            Err(e) => RawHeader::Malformed(e.to_string()),
        },
    };
    RawDocument {
        header,
        body: body.to_string(),
    }
}

/// Full document text: fenced header for `meta`, then `body`.
pub fn render_document(meta: &DocumentMeta, body: &str) -> Result<String, serde_yaml::Error> {
    render_mapping(&meta.to_mapping(), body)
}

fn render_mapping(header: &Mapping, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(&Value::Mapping(header.clone()))?;
    Ok(format!("{FENCE}\n{yaml}{FENCE}\n{body}"))
}

/// `meta` as a header mapping, provided it would pass extraction again.
fn validated_mapping(path: &Path, meta: &DocumentMeta) -> Result<Mapping, MetaError> {
    let mapping = meta.to_mapping();
    DocumentMeta::from_mapping(&mapping).map_err(|issues| MetaError::Validation {
        path: path.to_path_buf(),
        issues,
    })?;
    Ok(mapping)
}

fn compose(path: &Path, header: &Mapping, body: &str) -> Result<String, MetaError> {
    render_mapping(header, body).map_err(|source| MetaError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// MetaEngine
// =============================================================================

/// Header operations on documents addressed by path.
#[derive(Clone, Copy)]
pub struct MetaEngine<'a> {
    io: &'a dyn Io,
}

impl<'a> MetaEngine<'a> {
    pub fn new(io: &'a dyn Io) -> Self {
        Self { io }
    }

    /// Read a document's header and body without validating.
    pub fn read_header(&self, path: &Path) -> Result<RawDocument, MetaError> {
        let text = self.io.read_file(path)?;
        Ok(parse_raw(&text))
    }

    /// Read and validate a document.
    pub fn extract_from_file(&self, path: &Path) -> Result<Document, MetaError> {
        let raw = self.read_header(path)?;
        let mapping = match raw.header {
            RawHeader::Mapping(m) => m,
            RawHeader::Absent => Mapping::new(),
            RawHeader::Malformed(reason) => {
                return Err(MetaError::Malformed {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        };
        let meta = DocumentMeta::from_mapping(&mapping).map_err(|issues| MetaError::Validation {
            path: path.to_path_buf(),
            issues,
        })?;
        Ok(Document {
            content: raw.body,
            meta,
        })
    }

    pub fn generate(&self, partial: &PartialMeta) -> DocumentMeta {
        generate(partial)
    }

    /// Merge `partial` over the current header and rewrite it. A missing or
    /// malformed header counts as empty. The merged header must validate.
    pub fn update(&self, path: &Path, partial: &PartialMeta) -> Result<(), MetaError> {
        let raw = self.read_header(path)?;
        let mut mapping = match raw.header {
            RawHeader::Mapping(m) => m,
            RawHeader::Absent | RawHeader::Malformed(_) => Mapping::new(),
        };
        merge_mapping(&mut mapping, partial.mapping());

        DocumentMeta::from_mapping(&mapping).map_err(|issues| MetaError::Validation {
            path: path.to_path_buf(),
            issues,
        })?;

        let text = compose(path, &mapping, &raw.body)?;
        self.io.write(path, &text)?;
        Ok(())
    }

    /// Overwrite the header, and the body when `content` is given. `meta`
    /// must validate; the file is left alone when it does not.
    pub fn replace(
        &self,
        path: &Path,
        meta: &DocumentMeta,
        content: Option<&str>,
    ) -> Result<(), MetaError> {
        let body = match content {
            Some(c) => c.to_string(),
            None => self.read_header(path)?.body,
        };
        let mapping = validated_mapping(path, meta)?;
        let text = compose(path, &mapping, &body)?;
        self.io.write(path, &text)?;
        Ok(())
    }

    /// Add a header to a document that has none. `meta` must validate.
    pub fn inject(
        &self,
        path: &Path,
        meta: &DocumentMeta,
        content: Option<&str>,
    ) -> Result<(), MetaError> {
        let raw = match self.read_header(path) {
            Ok(raw) => raw,
            Err(MetaError::Io(IoError::NotFound(_))) if content.is_some() => RawDocument {
                header: RawHeader::Absent,
                body: String::new(),
            },
            Err(e) => return Err(e),
        };
        if raw.header != RawHeader::Absent {
            return Err(MetaError::HeaderExists(path.to_path_buf()));
        }
        let body = content.map(str::to_string).unwrap_or(raw.body);
        let mapping = validated_mapping(path, meta)?;
        let text = compose(path, &mapping, &body)?;
        self.io.write(path, &text)?;
        Ok(())
    }
}

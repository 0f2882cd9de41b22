//! Route shapes: which path segments are dynamic parameters.
//!
//! A route shape is a slash-separated pattern. With the default delimiters a
//! segment is one of:
//!
//! ```text
//! [name]       single dynamic parameter, binds exactly one path component
//! [...name]    spread parameter, binds every remaining component (must be last)
//! anything     static divider, a positional anchor
//! ```
//!
//! The same shape is used twice: once when the build is configured (the shape
//! is analyzed and rejected early if malformed) and once per published
//! document, when the document's destination path is bound against the shape
//! to produce its `params` and `href`.
//!
//! ## Binding
//!
//! Static dividers consume one component each. The consumed components are
//! kept as anchors and prefixed to the value of the next dynamic slot, so the
//! `href` rebuilt from the params still contains them:
//!
//! ```text
//! shape       /blog/[slug]
//! components  blog, hello
//! params      slug = "blog/hello"
//! href        /blog/hello
//! ```
//!
//! ## Alternate grammars
//!
//! [`RouteAnalyzer::with_grammar`] takes caller-supplied regular expressions
//! (each with a `param` capture group) for vaults that use another
//! dynamic-segment syntax, e.g. `:name` and `*name`.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Invalid route delimiter: {0}")]
    InvalidDelimiter(String),
    #[error("Route segment contains a path separator: {0:?}")]
    SeparatorInSegment(String),
    #[error("Spread parameter [...{param}] must be the last segment of {path:?}")]
    SpreadNotLast { param: String, path: String },
    #[error("Invalid route grammar: {0}")]
    Grammar(String),
    #[error("Path {path:?} does not match route shape: {reason}")]
    Mismatch { path: String, reason: String },
}

/// Characters that cannot appear in file names on common filesystems.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RouteSegmentSpec {
    Dynamic { param_name: String, multiple: bool },
    Static { divider_name: String },
}

impl RouteSegmentSpec {
    pub fn is_spread(&self) -> bool {
        matches!(self, RouteSegmentSpec::Dynamic { multiple: true, .. })
    }
}

/// An analyzed route: its segments and the dynamic parameter names in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteShape {
    pub segments: Vec<RouteSegmentSpec>,
    pub dynamic_params: Vec<String>,
}

/// Result of binding a concrete path against a [`RouteShape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub params: BTreeMap<String, String>,
    pub href: String,
}

impl RouteShape {
    /// Bind concrete path components against this shape.
    pub fn bind(&self, components: &[&str]) -> Result<RouteBinding, RouteError> {
        let mismatch = |reason: String| RouteError::Mismatch {
            path: components.join("/"),
            reason,
        };

        let mut params = BTreeMap::new();
        let mut anchors: Vec<&str> = Vec::new();
        let mut rest = components;

        for segment in &self.segments {
            match segment {
                RouteSegmentSpec::Static { divider_name } => {
                    let (first, tail) = rest.split_first().ok_or_else(|| {
                        mismatch(format!("missing component for divider {divider_name:?}"))
                    })?;
                    anchors.push(*first);
                    rest = tail;
                }
                RouteSegmentSpec::Dynamic {
                    param_name,
                    multiple: false,
                } => {
                    let (first, tail) = rest.split_first().ok_or_else(|| {
                        mismatch(format!("missing component for [{param_name}]"))
                    })?;
                    anchors.push(*first);
                    params.insert(param_name.clone(), anchors.join("/"));
                    anchors.clear();
                    rest = tail;
                }
                RouteSegmentSpec::Dynamic {
                    param_name,
                    multiple: true,
                } => {
                    if rest.is_empty() {
                        return Err(mismatch(format!("nothing left for [...{param_name}]")));
                    }
                    anchors.extend_from_slice(rest);
                    params.insert(param_name.clone(), anchors.join("/"));
                    anchors.clear();
                    rest = &[];
                }
            }
        }

        if !rest.is_empty() {
            return Err(mismatch(format!(
                "{} unmatched trailing component(s)",
                rest.len()
            )));
        }

        let href = format!(
            "/{}",
            self.dynamic_params
                .iter()
                .filter_map(|p| params.get(p).map(String::as_str))
                .collect::<Vec<_>>()
                .join("/")
        );

        Ok(RouteBinding { params, href })
    }
}

/// Pair of patterns recognizing single and spread dynamic segments.
#[derive(Debug, Clone)]
pub struct RouteGrammar {
    single: Regex,
    spread: Regex,
}

impl RouteGrammar {
    /// Both patterns must define a `param` capture group.
    pub fn new(single: Regex, spread: Regex) -> Result<Self, RouteError> {
        for (label, re) in [("single", &single), ("spread", &spread)] {
            if !re.capture_names().flatten().any(|n| n == "param") {
                return Err(RouteError::Grammar(format!(
                    "{label} pattern {:?} has no `param` capture group",
                    re.as_str()
                )));
            }
        }
        Ok(Self { single, spread })
    }

    fn from_delimiters(open: char, close: char) -> Result<Self, RouteError> {
        let o = regex::escape(&open.to_string());
        let c = regex::escape(&close.to_string());
        let name = format!(r"[^/\\{o}{c}]+");
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| RouteError::Grammar(e.to_string()))
        };
        Ok(Self {
            single: compile(format!(r"^{o}(?P<param>{name}){c}$"))?,
            spread: compile(format!(r"^{o}\.\.\.(?P<param>{name}){c}$"))?,
        })
    }
}

/// Analyzes route shapes written in a configurable grammar.
#[derive(Debug, Clone)]
pub struct RouteAnalyzer {
    grammar: RouteGrammar,
}

impl Default for RouteAnalyzer {
    fn default() -> Self {
        match Self::new("[", "]") {
            Ok(analyzer) => analyzer,
            Err(e) => unreachable!("default delimiters are valid: {e}"),
        }
    }
}

impl RouteAnalyzer {
    /// Analyzer for `open`/`close` delimited parameters.
    ///
    /// Each delimiter must be exactly one character, the two must differ,
    /// and neither may be a control character or one of `/ \ : * ? " < > |`.
    pub fn new(open: &str, close: &str) -> Result<Self, RouteError> {
        let open = single_char(open, "open")?;
        let close = single_char(close, "close")?;
        if open == close {
            return Err(RouteError::InvalidDelimiter(format!(
                "open and close tags are both {open:?}"
            )));
        }
        Ok(Self {
            grammar: RouteGrammar::from_delimiters(open, close)?,
        })
    }

    pub fn with_grammar(grammar: RouteGrammar) -> Self {
        Self { grammar }
    }

    /// Classify one path segment.
    pub fn analyze_single_param(&self, segment: &str) -> Result<RouteSegmentSpec, RouteError> {
        if segment.contains(['/', '\\']) {
            return Err(RouteError::SeparatorInSegment(segment.to_string()));
        }
        if let Some(caps) = self.grammar.spread.captures(segment) {
            return Ok(RouteSegmentSpec::Dynamic {
                param_name: caps["param"].to_string(),
                multiple: true,
            });
        }
        if let Some(caps) = self.grammar.single.captures(segment) {
            return Ok(RouteSegmentSpec::Dynamic {
                param_name: caps["param"].to_string(),
                multiple: false,
            });
        }
        Ok(RouteSegmentSpec::Static {
            divider_name: segment.to_string(),
        })
    }

    /// Analyze a full route shape such as `/[category]/[...post]`.
    pub fn analyze_param(&self, path: &str) -> Result<RouteShape, RouteError> {
        let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for segment in &raw {
            segments.push(self.analyze_single_param(segment)?);
        }

        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter().enumerate() {
            if let RouteSegmentSpec::Dynamic {
                param_name,
                multiple: true,
            } = segment
                && i != last
            {
                return Err(RouteError::SpreadNotLast {
                    param: param_name.clone(),
                    path: path.to_string(),
                });
            }
        }

        let dynamic_params = segments
            .iter()
            .filter_map(|s| match s {
                RouteSegmentSpec::Dynamic { param_name, .. } => Some(param_name.clone()),
                RouteSegmentSpec::Static { .. } => None,
            })
            .collect();

        Ok(RouteShape {
            segments,
            dynamic_params,
        })
    }
}

fn single_char(tag: &str, which: &str) -> Result<char, RouteError> {
    let mut chars = tag.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(RouteError::InvalidDelimiter(format!(
                "{which} tag {tag:?} must be exactly one character"
            )));
        }
    };
    if c.is_control() || RESERVED.contains(&c) {
        return Err(RouteError::InvalidDelimiter(format!(
            "{which} tag {c:?} is not allowed in file names"
        )));
    }
    Ok(c)
}

//! Selector grammar: `v.id | v.label_id | v.data | v.property.<ident> | r |
//! r.<ident>`, optionally prefixed with `#<label_id>:` for labeled
//! selectors.
//!
//! Dataframe requests carry a comma-joined list of selectors, each
//! optionally renamed with `<col_name>=<selector>`.

use crate::error::EngineError;
use regex::Regex;
use std::sync::OnceLock;

fn label_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#(\d+):(.+)$").unwrap())
}

/// What a single selector extracts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectorKind {
    VertexId,
    VertexLabelId,
    VertexData,
    VertexProperty(String),
    Result,
    ResultField(String),
}

/// A parsed selector, with its optional label qualifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    pub label_id: Option<u32>,
    pub kind: SelectorKind,
}

impl Selector {
    /// Parse a single selector expression. Fails with `InvalidValue` on any
    /// unrecognized shape.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        let (label_id, body) = if let Some(caps) = label_prefix_re().captures(raw) {
            let label_id: u32 = caps[1].parse().map_err(|_| bad(raw))?;
            (Some(label_id), caps[2].to_string())
        } else {
            (None, raw.to_string())
        };

        let kind = match body.as_str() {
            "v.id" => SelectorKind::VertexId,
            "v.label_id" => SelectorKind::VertexLabelId,
            "v.data" => SelectorKind::VertexData,
            "r" => SelectorKind::Result,
            other if other == "r." => return Err(bad(raw)),
            other if other.starts_with("r.") => {
                SelectorKind::ResultField(other.trim_start_matches("r.").to_string())
            }
            other if other.starts_with("v.property.") => {
                let ident = other.trim_start_matches("v.property.");
                if ident.is_empty() {
                    return Err(bad(raw));
                }
                SelectorKind::VertexProperty(ident.to_string())
            }
            _ => return Err(bad(raw)),
        };

        Ok(Selector { label_id, kind })
    }

    /// A short, stable column name for this selector, used as the default
    /// dataframe column header when no explicit rename is given.
    #[must_use]
    pub fn default_column_name(&self) -> String {
        let base = match &self.kind {
            SelectorKind::VertexId => "v.id".to_string(),
            SelectorKind::VertexLabelId => "v.label_id".to_string(),
            SelectorKind::VertexData => "v.data".to_string(),
            SelectorKind::VertexProperty(p) => format!("v.property.{p}"),
            SelectorKind::Result => "r".to_string(),
            SelectorKind::ResultField(f) => format!("r.{f}"),
        };
        match self.label_id {
            Some(l) => format!("#{l}:{base}"),
            None => base,
        }
    }
}

fn bad(raw: &str) -> EngineError {
    EngineError::InvalidValue {
        key: "selector".to_string(),
        message: format!("unparseable selector expression: '{raw}'"),
    }
}

/// A selector with an optional explicit output column name
/// (`<col_name>=<selector>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedSelector {
    pub name: String,
    pub selector: Selector,
}

/// Parse a comma-joined dataframe selector list.
pub fn parse_selector_list(raw: &str) -> Result<Vec<NamedSelector>, EngineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|piece| {
            if let Some((name, expr)) = piece.split_once('=') {
                let selector = Selector::parse(expr)?;
                Ok(NamedSelector {
                    name: name.trim().to_string(),
                    selector,
                })
            } else {
                let selector = Selector::parse(piece)?;
                let name = selector.default_column_name();
                Ok(NamedSelector { name, selector })
            }
        })
        .collect()
}

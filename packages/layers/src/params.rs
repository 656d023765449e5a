//! Declared query parameters.
//!
//! Every parameter carries its own name; nothing is inferred from where it
//! is declared. Values are parsed from the raw query pairs of a request,
//! and unset single-valued parameters are left out entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{AsRefStr, Display, EnumString};

/// Kind of value a parameter accepts, as advertised to frontends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamKind {
    /// Free text.
    #[default]
    Text,
}

/// A query parameter a layer understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryParam {
    /// Query string key.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: ParamKind,
    /// Whether the parameter may repeat.
    #[serde(default)]
    pub many: bool,
    /// Whether only the frontend acts on the parameter. Such parameters
    /// are parsed but never filter items.
    #[serde(default)]
    pub frontend_only: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Feature property the parameter filters on. Defaults to `name`.
    #[serde(default)]
    pub property: Option<String>,
    /// Values a frontend may offer for the parameter.
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// Whether `text` is one of the accepted values.
    #[must_use]
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Single(value) => value == text,
            Self::Many(values) => values.iter().any(|value| value == text),
        }
    }
}

/// Parsed parameters keyed by name.
pub type ParsedParams = BTreeMap<String, ParamValue>;

impl QueryParam {
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: ParamKind::default(),
            many: false,
            frontend_only: false,
            default: None,
            property: None,
            options: None,
        }
    }

    #[must_use]
    pub const fn many(mut self) -> Self {
        self.many = true;
        self
    }

    #[must_use]
    pub const fn frontend_only(mut self) -> Self {
        self.frontend_only = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    #[must_use]
    pub fn with_options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Feature property this parameter filters on.
    #[must_use]
    pub fn property(&self) -> &str {
        self.property.as_deref().unwrap_or(&self.name)
    }

    /// Metadata advertised to frontends.
    #[must_use]
    pub fn render_meta(&self) -> Value {
        json!({
            "label": self.label,
            "type": self.kind,
            "many": self.many,
            "frontend_only": self.frontend_only,
            "default": self.default,
        })
    }

    /// The values a frontend may offer, or `None` when the parameter takes
    /// free text without a fixed set of options.
    #[must_use]
    pub fn render_options(&self) -> Option<Value> {
        self.options.as_ref().map(|options| json!(options))
    }

    /// Reads this parameter from raw query pairs.
    ///
    /// A repeatable parameter always yields a (possibly empty) list; a
    /// single one yields its first occurrence or `None`.
    #[must_use]
    pub fn parse(&self, pairs: &[(String, String)]) -> Option<ParamValue> {
        let mut values = pairs
            .iter()
            .filter(|(key, _)| *key == self.name)
            .map(|(_, value)| value.clone());

        if self.many {
            Some(ParamValue::Many(values.collect()))
        } else {
            values.next().map(ParamValue::Single)
        }
    }
}

/// Parses every declared parameter, leaving out unset ones.
#[must_use]
pub fn parse_params(params: &[QueryParam], pairs: &[(String, String)]) -> ParsedParams {
    params
        .iter()
        .filter_map(|param| param.parse(pairs).map(|value| (param.name.clone(), value)))
        .collect()
}

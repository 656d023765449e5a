#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the generic map API server.
//!
//! Layer-specific query parameters are declared per layer, so list
//! requests are read as raw key/value pairs. [`ListOptions`] picks out the
//! keys every layer understands.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Response of the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiItems<T> {
    pub items: Vec<T>,
}

/// Response of the detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiItem<T> {
    pub item: T,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Loose boolean parsing for query flags: `true`, `t`, `1`, `yes`, `y`,
/// or `on`, ignoring case and surrounding whitespace.
#[must_use]
pub fn to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "y" | "t"
    )
}

/// A shared list option that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid `{key}` value `{value}`: expected {expected}")]
pub struct InvalidListOption {
    /// Query key.
    pub key: &'static str,
    /// Raw value.
    pub value: String,
    /// What the key accepts.
    pub expected: &'static str,
}

/// Query options shared by every list request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// `x/y/z` tile address.
    pub tile: Option<String>,
    /// `nw/se` geohash pair.
    pub viewport: Option<String>,
    /// `viewport.zoom`
    pub zoom: Option<f64>,
    /// `viewport.mpp`, meters per pixel.
    pub meters_per_pixel: Option<f64>,
    /// `viewport.size` as `<width>x<height>` pixels.
    pub size: Option<(u32, u32)>,
    /// Whether the client asks for clustering.
    pub clustering: bool,
}

fn parse_number(key: &'static str, value: String) -> Result<f64, InvalidListOption> {
    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(InvalidListOption {
            key,
            value,
            expected: "a finite number",
        }),
    }
}

fn parse_size(value: String) -> Result<(u32, u32), InvalidListOption> {
    let parsed = value.split_once('x').and_then(|(width, height)| {
        Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
    });
    parsed.ok_or(InvalidListOption {
        key: "viewport.size",
        value,
        expected: "`<width>x<height>`",
    })
}

impl ListOptions {
    /// Picks the shared options out of raw query pairs. The first
    /// occurrence of each key wins.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidListOption`] if `viewport.zoom`, `viewport.mpp`,
    /// or `viewport.size` is present but malformed.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, InvalidListOption> {
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, value)| value.clone())
        };

        Ok(Self {
            tile: first("tile"),
            viewport: first("viewport"),
            zoom: first("viewport.zoom")
                .map(|value| parse_number("viewport.zoom", value))
                .transpose()?,
            meters_per_pixel: first("viewport.mpp")
                .map(|value| parse_number("viewport.mpp", value))
                .transpose()?,
            size: first("viewport.size").map(parse_size).transpose()?,
            clustering: first("clustering").is_some_and(|value| to_bool(&value)),
        })
    }

    /// Whether the request carries the viewport detail named by `key`
    /// (`viewport.size`, `viewport.zoom` or `viewport.mpp`).
    #[must_use]
    pub fn provides(&self, key: &str) -> bool {
        match key {
            "viewport.size" => self.size.is_some(),
            "viewport.zoom" => self.zoom.is_some(),
            "viewport.mpp" => self.meters_per_pixel.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn parses_bool_flags() {
        for value in ["true", "1", "yes", "YES", " on ", "y", "T"] {
            assert!(to_bool(value), "{value}");
        }
        for value in ["false", "0", "no", "", "maybe"] {
            assert!(!to_bool(value), "{value}");
        }
    }

    #[test]
    fn picks_shared_options() {
        let options = ListOptions::from_pairs(&pairs(&[
            ("kind", "shop"),
            ("tile", "1/2/3"),
            ("clustering", "1"),
            ("tile", "4/5/6"),
        ]))
        .unwrap();
        assert_eq!(
            options,
            ListOptions {
                tile: Some("1/2/3".to_string()),
                clustering: true,
                ..ListOptions::default()
            }
        );
        assert_eq!(ListOptions::from_pairs(&[]).unwrap(), ListOptions::default());
    }

    #[test]
    fn parses_viewport_details() {
        let options = ListOptions::from_pairs(&pairs(&[
            ("viewport.zoom", "12"),
            ("viewport.mpp", "38.2"),
            ("viewport.size", "800x600"),
        ]))
        .unwrap();
        assert_eq!(options.zoom, Some(12.0));
        assert_eq!(options.meters_per_pixel, Some(38.2));
        assert_eq!(options.size, Some((800, 600)));
        for key in ["viewport.size", "viewport.zoom", "viewport.mpp"] {
            assert!(options.provides(key), "{key}");
            assert!(!ListOptions::default().provides(key), "{key}");
        }
        assert!(!options.provides("viewport.other"));
    }

    #[test]
    fn rejects_malformed_viewport_details() {
        for (key, value) in [
            ("viewport.zoom", "high"),
            ("viewport.mpp", "NaN"),
            ("viewport.size", "800"),
            ("viewport.size", "800x"),
            ("viewport.size", "-1x600"),
        ] {
            let error = ListOptions::from_pairs(&pairs(&[(key, value)])).unwrap_err();
            assert_eq!(error.key, key);
        }
    }

    #[test]
    fn serializes_wrappers() {
        assert_eq!(
            serde_json::to_value(ApiItems { items: vec![1, 2] }).unwrap(),
            serde_json::json!({"items": [1, 2]})
        );
        assert_eq!(
            serde_json::to_value(ApiError::new("nope")).unwrap(),
            serde_json::json!({"error": "nope"})
        );
    }
}

//! Query string extraction
//!
//! Decodes `application/x-www-form-urlencoded` query strings and reports
//! missing or malformed parameters in the `{"loc", "msg", "type"}` shape
//! clients of this API already expect.

use percent_encoding::percent_decode_str;
use serde_json::json;

/// Decoded query parameters in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

/// Parameter extraction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Field required")]
    Missing(&'static str),

    #[error("Input should be a valid integer, unable to parse string as an integer")]
    NotInteger { name: &'static str, value: String },
}

impl QueryError {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Missing(name) | Self::NotInteger { name, .. } => *name,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Missing(_) => "missing",
            Self::NotInteger { .. } => "int_parsing",
        }
    }

    /// One entry of a 422 `detail` list
    pub fn to_detail(&self) -> serde_json::Value {
        let input = match self {
            Self::Missing(_) => serde_json::Value::Null,
            Self::NotInteger { value, .. } => json!(value),
        };
        json!({
            "type": self.kind(),
            "loc": ["query", self.name()],
            "msg": self.to_string(),
            "input": input,
        })
    }
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// Value of `name`; the last occurrence wins when a key repeats
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn required(&self, name: &'static str) -> Result<String, QueryError> {
        self.get(name)
            .map(ToString::to_string)
            .ok_or(QueryError::Missing(name))
    }

    /// Integer parameter, `default` when absent
    pub fn int_or(&self, name: &'static str, default: i64) -> Result<i64, QueryError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| QueryError::NotInteger {
                name,
                value: raw.to_string(),
            }),
        }
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

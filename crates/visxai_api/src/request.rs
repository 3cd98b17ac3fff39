//! Request envelope and lenient field access.
//!
//! Numeric fields are accepted either as JSON numbers or as strings holding
//! a number (`"3"`, `"0.02"`).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ApiError, Result};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Read-only request.
    Get,
    /// Request carrying a JSON body.
    #[default]
    Post,
}

/// A decoded request: method, JSON body and query parameters.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// JSON body; `Null` when absent.
    pub body: Value,
    /// Query parameters.
    pub query: BTreeMap<String, String>,
}

impl Request {
    /// POST request with `body`.
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body,
            query: BTreeMap::new(),
        }
    }

    /// GET request without a body.
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            body: Value::Null,
            query: BTreeMap::new(),
        }
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    /// Raw body field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }

    /// Query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// The base64 image payload.
    pub fn image(&self) -> Result<&str> {
        match self.field("image") {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(_) => Err(ApiError::BadRequest("'image' must be a non-empty string".to_string())),
            None => Err(ApiError::BadRequest(
                "Invalid input data format: 'image' field is required".to_string(),
            )),
        }
    }

    /// Whether the body carries an image.
    pub fn has_image(&self) -> bool {
        self.field("image").is_some()
    }

    /// Optional non-negative integer field.
    pub fn usize_opt(&self, key: &str) -> Result<Option<usize>> {
        let Some(value) = self.field(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64().map(|v| v as usize),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| {
                ApiError::BadRequest(format!("'{key}' must be a non-negative integer, got {value}"))
            })
    }

    /// Non-negative integer field with a default.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        Ok(self.usize_opt(key)?.unwrap_or(default))
    }

    /// Required non-negative integer field.
    pub fn usize_required(&self, key: &str) -> Result<usize> {
        self.usize_opt(key)?
            .ok_or_else(|| ApiError::BadRequest(format!("missing '{key}'")))
    }

    /// Optional float field.
    pub fn f32_opt(&self, key: &str) -> Result<Option<f32>> {
        let Some(value) = self.field(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("'{key}' must be a number, got {value}")))
    }

    /// Float array field of exactly `len` values.
    pub fn f32_array(&self, key: &str, len: usize) -> Result<Vec<f32>> {
        let values = match self.field(key) {
            Some(Value::Array(values)) if !values.is_empty() => values,
            _ => return Err(ApiError::BadRequest(format!("No {key} provided"))),
        };
        let flat = flatten_numbers(values)
            .ok_or_else(|| ApiError::BadRequest(format!("'{key}' must contain only numbers")))?;
        if flat.len() != len {
            return Err(ApiError::BadRequest(format!(
                "'{key}' must hold {len} values, got {}",
                flat.len()
            )));
        }
        Ok(flat)
    }
}

/// Flatten nested numeric arrays in row-major order.
fn flatten_numbers(values: &[Value]) -> Option<Vec<f32>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Number(n) => out.push(n.as_f64()? as f32),
            Value::Array(inner) => out.extend(flatten_numbers(inner)?),
            _ => return None,
        }
    }
    Some(out)
}

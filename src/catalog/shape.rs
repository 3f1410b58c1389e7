use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Stable movie shape handed to the frontend. Every key is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub poster_url: Option<String>,
    pub rating: Option<f64>,
    pub release_date: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ShapeError {
    #[error("movie record is not a JSON object")]
    NotAnObject,
    #[error("movie record is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("movie record field '{0}' has an unusable value")]
    InvalidField(&'static str),
}

#[derive(Debug, Clone)]
pub struct Shaper {
    image_base_url: String,
}

impl Default for Shaper {
    fn default() -> Self {
        Self::new(IMAGE_BASE_URL)
    }
}

impl Shaper {
    pub fn new(image_base_url: &str) -> Self {
        Self {
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn shape(&self, raw: &Value) -> Result<MovieRecord, ShapeError> {
        let obj = raw.as_object().ok_or(ShapeError::NotAnObject)?;

        let id = match obj.get("id") {
            None | Some(Value::Null) => return Err(ShapeError::MissingField("id")),
            Some(v) => coerce_int(v).ok_or(ShapeError::InvalidField("id"))?,
        };
        let title = match obj.get("title") {
            None | Some(Value::Null) => return Err(ShapeError::MissingField("title")),
            Some(v) => coerce_string(v).ok_or(ShapeError::InvalidField("title"))?,
        };

        let string_field = |key: &str| obj.get(key).and_then(coerce_string);

        let poster_path = string_field("poster_path");
        let poster_url = poster_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", self.image_base_url, p));

        Ok(MovieRecord {
            id,
            title,
            overview: string_field("overview"),
            poster_path,
            poster_url,
            rating: obj.get("vote_average").and_then(coerce_float),
            release_date: string_field("release_date"),
        })
    }

    /// Shapes every entry of `raw.results`. A missing list, or a non-object input, is empty.
    pub fn shape_results(&self, raw: &Value) -> Result<Vec<MovieRecord>, ShapeError> {
        match raw.get("results").and_then(Value::as_array) {
            Some(results) => results.iter().map(|r| self.shape(r)).collect(),
            None => Ok(Vec::new()),
        }
    }
}

// Upstream fields are coerced the way a loose JSON producer needs: numbers
// sent as strings are accepted, integral floats count as integers.

fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

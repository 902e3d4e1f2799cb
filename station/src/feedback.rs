//! Three-field extractor for the comfort feedback body.
//!
//! The body is a flat JSON object such as
//! `{"rating": 0.7, "temp": 22.5, "humidity": 48.0}`. Only those three keys
//! are understood; anything else in the object is ignored.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    pub rating: f64,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    #[error("body does not contain a JSON object")]
    MissingObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a finite number")]
    InvalidNumber(&'static str),
    #[error("rating must be within 0.0..=1.0")]
    RatingOutOfRange,
}

impl Feedback {
    pub fn decode(body: &[u8]) -> Result<Self, FeedbackError> {
        let text = String::from_utf8_lossy(body);
        let object = object_span(&text).ok_or(FeedbackError::MissingObject)?;

        let rating = number_field(object, "rating")?;
        let temperature = number_field(object, "temp")?;
        let humidity = number_field(object, "humidity")?;

        if !(0.0..=1.0).contains(&rating) {
            return Err(FeedbackError::RatingOutOfRange);
        }

        Ok(Self {
            rating,
            temperature,
            humidity,
        })
    }
}

fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn number_field(object: &str, key: &'static str) -> Result<f64, FeedbackError> {
    let quoted = format!("\"{key}\"");
    let key_at = object
        .find(&quoted)
        .ok_or(FeedbackError::MissingField(key))?;
    let after_key = &object[key_at + quoted.len()..];

    let colon = after_key
        .find(':')
        .ok_or(FeedbackError::InvalidNumber(key))?;
    if !after_key[..colon].trim().is_empty() {
        return Err(FeedbackError::InvalidNumber(key));
    }

    let value = &after_key[colon + 1..];
    let value_end = value
        .find(|c: char| c == ',' || c == '}')
        .ok_or(FeedbackError::InvalidNumber(key))?;

    value[..value_end]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or(FeedbackError::InvalidNumber(key))
}

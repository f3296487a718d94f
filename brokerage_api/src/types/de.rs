//! Lenient decoders for vendor numeric fields.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

/// Decodes a JSON number, a decimal string, or null into `Option<f64>`.
///
/// The brokerage sends amounts as strings (`"-1234.56"`) on some endpoints and
/// as numbers on others. Empty strings decode to `None`.
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid number {:?}: {}", s, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "super::flexible_f64")]
        value: Option<f64>,
    }

    fn decode(json: &str) -> Result<Option<f64>, serde_json::Error> {
        serde_json::from_str::<Holder>(json).map(|h| h.value)
    }

    #[test]
    fn accepts_numbers_and_strings() {
        assert_eq!(decode(r#"{"value": 12.5}"#).unwrap(), Some(12.5));
        assert_eq!(decode(r#"{"value": -3}"#).unwrap(), Some(-3.0));
        assert_eq!(decode(r#"{"value": "-1234.56"}"#).unwrap(), Some(-1234.56));
    }

    #[test]
    fn null_missing_and_empty_are_none() {
        assert_eq!(decode(r#"{"value": null}"#).unwrap(), None);
        assert_eq!(decode(r#"{}"#).unwrap(), None);
        assert_eq!(decode(r#"{"value": "  "}"#).unwrap(), None);
    }

    #[test]
    fn garbage_string_is_an_error() {
        assert!(decode(r#"{"value": "twelve"}"#).is_err());
    }
}

//! ============================================================================
//! Verification Response Parser
//! ============================================================================
//! The model does not reliably return bare JSON, so the object is cut out of
//! the text (first `{` to last `}`), parsed strictly, then validated field by
//! field into a typed result.
//! ============================================================================

use serde_json::{Map, Value};

use super::VerificationError;
use crate::types::{CollectionVerification, ReportVerification};

/// Span from the first `{` to the last `}`, inclusive.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

pub fn parse_report_response(raw: &str) -> Result<ReportVerification, VerificationError> {
    let object = parse_object(raw)?;

    Ok(ReportVerification {
        waste_type: required_string(&object, "wasteType")?,
        quantity: required_string(&object, "quantity")?,
        confidence: required_confidence(&object)?,
        description: required_string(&object, "description")?,
        recommendation: required_string(&object, "recommendation")?,
    })
}

pub fn parse_collection_response(raw: &str) -> Result<CollectionVerification, VerificationError> {
    let object = parse_object(raw)?;

    Ok(CollectionVerification {
        waste_type_match: required_bool(&object, "wasteTypeMatch")?,
        quantity_match: required_bool(&object, "quantityMatch")?,
        confidence: required_confidence(&object)?,
    })
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, VerificationError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| malformed("no JSON object in model response"))?;

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(malformed("model response is not a JSON object")),
        Err(e) => Err(malformed(format!("invalid JSON: {}", e))),
    }
}

fn required_string(object: &Map<String, Value>, key: &str) -> Result<String, VerificationError> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(malformed(format!("'{}' is empty", key))),
        Some(other) => Err(malformed(format!("'{}' must be a string, got {}", key, other))),
        None => Err(malformed(format!("missing '{}'", key))),
    }
}

fn required_bool(object: &Map<String, Value>, key: &str) -> Result<bool, VerificationError> {
    match object.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(malformed(format!("'{}' must be a boolean, got {}", key, other))),
        None => Err(malformed(format!("missing '{}'", key))),
    }
}

fn required_confidence(object: &Map<String, Value>) -> Result<f64, VerificationError> {
    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| malformed("'confidence' is not representable as f64"))?,
        Some(other) => return Err(malformed(format!("'confidence' must be a number, got {}", other))),
        None => return Err(malformed("missing 'confidence'")),
    };

    if !(0.0..=1.0).contains(&confidence) {
        return Err(malformed(format!("'confidence' {} outside [0, 1]", confidence)));
    }
    Ok(confidence)
}

fn malformed(reason: impl Into<String>) -> VerificationError {
    VerificationError::MalformedResponse(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FENCED: &str = "Sure! ```json\n{\"wasteType\":\"plastic\",\"quantity\":\"2kg\",\"confidence\":0.8,\"description\":\"d\",\"recommendation\":\"r\"}\n```";

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("noise {\"a\":1} trailing"), Some("{\"a\":1}"));
        assert_eq!(
            extract_json_object("{\"a\":{\"b\":2}} done"),
            Some("{\"a\":{\"b\":2}}")
        );
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_fenced_report() {
        let result = parse_report_response(FENCED).unwrap();
        assert_eq!(
            result,
            ReportVerification {
                waste_type: "plastic".into(),
                quantity: "2kg".into(),
                confidence: 0.8,
                description: "d".into(),
                recommendation: "r".into(),
            }
        );
    }

    #[test]
    fn test_prose_wrapping_is_discarded() {
        let wrappers = [
            ("", ""),
            ("Here is the analysis:\n", "\nLet me know if you need more."),
            ("```\n", "\n```"),
            ("```json\n", "\n```\nThanks"),
        ];
        let object = r#"{"wasteTypeMatch": true, "quantityMatch": false, "confidence": 0.75}"#;

        for (before, after) in wrappers {
            let raw = format!("{}{}{}", before, object, after);
            let result = parse_collection_response(&raw).unwrap();
            assert!(result.waste_type_match);
            assert!(!result.quantity_match);
            assert_eq!(result.confidence, 0.75);
        }
    }

    #[test]
    fn test_missing_and_empty_fields() {
        let missing = r#"{"wasteType":"glass","quantity":"1kg","confidence":0.7,"description":"d"}"#;
        let err = parse_report_response(missing).unwrap_err();
        assert!(err.to_string().contains("recommendation"));

        let empty = r#"{"wasteType":"  ","quantity":"1kg","confidence":0.7,"description":"d","recommendation":"r"}"#;
        assert!(matches!(
            parse_report_response(empty),
            Err(VerificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_confidence_validation() {
        for bad in ["1.2", "-0.1", "\"0.8\"", "null"] {
            let raw = format!(
                r#"{{"wasteTypeMatch":true,"quantityMatch":true,"confidence":{}}}"#,
                bad
            );
            assert!(
                matches!(
                    parse_collection_response(&raw),
                    Err(VerificationError::MalformedResponse(_))
                ),
                "expected rejection for confidence {}",
                bad
            );
        }

        for ok in ["0", "1", "0.6"] {
            let raw = format!(
                r#"{{"wasteTypeMatch":true,"quantityMatch":true,"confidence":{}}}"#,
                ok
            );
            assert!(parse_collection_response(&raw).is_ok());
        }
    }

    #[test]
    fn test_wrong_types_are_malformed() {
        let raw = r#"{"wasteTypeMatch":"yes","quantityMatch":true,"confidence":0.9}"#;
        assert!(parse_collection_response(raw).is_err());

        assert!(parse_collection_response("not json at all").is_err());
        assert!(parse_collection_response("{ broken: json }").is_err());
    }
}

use thiserror::Error;

/// Why a line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    /// The line is not syntactically valid JSON.
    #[error("The line could not be parsed as JSON: {0}")]
    BadJson(String),

    /// The line parsed, but the device protocol is JSON objects.
    #[error("The line is valid JSON but not an object")]
    NotAnObject,
}

/// Check that a line is a syntactically valid JSON object.
///
/// The parsed value is discarded; on success the original line is
/// returned untouched so downstream consumers see the raw representation.
pub fn validate(line: &str) -> Result<&str, ValidateError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| ValidateError::BadJson(e.to_string()))?;

    if !value.is_object() {
        return Err(ValidateError::NotAnObject);
    }

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn valid_object_is_forwarded_verbatim() {
        let line = r#"{"temperature":21.5,"waterDetected":false}"#;

        assert_eq!(validate(line), Ok(line));
    }

    #[test]
    fn empty_object_is_ok() {
        assert_eq!(validate("{}"), Ok("{}"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(validate("not-json"), Err(ValidateError::BadJson(_))));
    }

    #[test]
    fn truncated_json_is_rejected() {
        assert!(matches!(
            validate(r#"{"temperature":21."#),
            Err(ValidateError::BadJson(_))
        ));
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert_eq!(validate("42"), Err(ValidateError::NotAnObject));
        assert_eq!(validate(r#""hello""#), Err(ValidateError::NotAnObject));
        assert_eq!(validate("[1,2,3]"), Err(ValidateError::NotAnObject));
    }
}

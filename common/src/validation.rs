//! Input validation shared by the HTTP routes and the CLI driver.

use thiserror::Error;

pub const MIN_QUESTION_CHARS: usize = 5;
pub const MAX_QUESTION_CHARS: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question is required")]
    MissingQuestion,

    #[error("invalid question length: must be between {min} and {max} characters (got {len})")]
    QuestionLength { len: usize, min: usize, max: usize },

    #[error("model id is required")]
    MissingModelId,

    #[error("invalid model id format: {0}")]
    MalformedModelId(String),

    #[error("invalid model id, not in catalog: {0}")]
    UnknownModel(String),
}

/// Length is counted in characters, so CJK questions are not penalized.
pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::MissingQuestion);
    }
    let len = question.chars().count();
    if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&len) {
        return Err(ValidationError::QuestionLength {
            len,
            min: MIN_QUESTION_CHARS,
            max: MAX_QUESTION_CHARS,
        });
    }
    Ok(())
}

/// Catalog ids are lowercase ASCII letters, digits and hyphens.
pub fn validate_model_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::MissingModelId);
    }
    let well_formed = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(ValidationError::MalformedModelId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_bounds() {
        assert!(validate_question("abcd").is_err());
        assert!(validate_question("abcde").is_ok());
        assert!(validate_question(&"x".repeat(1000)).is_ok());
        assert!(matches!(
            validate_question(&"x".repeat(1001)),
            Err(ValidationError::QuestionLength { len: 1001, .. })
        ));
    }

    #[test]
    fn test_question_counts_characters() {
        // 5 CJK characters = 15 bytes, still exactly at the lower bound
        assert!(validate_question("应该换工作").is_ok());
        assert!(validate_question("换工作吗").is_err());
    }

    #[test]
    fn test_blank_question_is_missing() {
        assert_eq!(validate_question("     "), Err(ValidationError::MissingQuestion));
    }

    #[test]
    fn test_model_id_format() {
        assert!(validate_model_id("40-70-rule").is_ok());
        assert!(validate_model_id("system1-system2").is_ok());
        assert_eq!(validate_model_id(""), Err(ValidationError::MissingModelId));
        assert!(validate_model_id("Bad_Id").is_err());
    }
}

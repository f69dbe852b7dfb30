//! Parsing of confidence-score arguments.

use thiserror::Error;

/// Errors when parsing a confidence-score argument.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreParseError {
    #[error("confidence scores are empty")]
    Empty,

    #[error("invalid confidence scores: {0}")]
    Invalid(String),

    #[error("confidence score out of range: {0}")]
    OutOfRange(f64),
}

/// Parse a JSON list of scores (`[0.9, 0.8]`) or a single number (`0.9`).
///
/// Every score must be a finite value in `[0, 1]`. An empty list is allowed.
pub fn parse_confidence_scores(raw: &str) -> Result<Vec<f64>, ScoreParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScoreParseError::Empty);
    }

    let scores: Vec<f64> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| ScoreParseError::Invalid(e.to_string()))?
    } else {
        let value: f64 = raw
            .parse()
            .map_err(|_| ScoreParseError::Invalid(raw.to_string()))?;
        vec![value]
    };

    if let Some(bad) = scores
        .iter()
        .copied()
        .find(|s| !s.is_finite() || !(0.0..=1.0).contains(s))
    {
        return Err(ScoreParseError::OutOfRange(bad));
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let scores = parse_confidence_scores("[0.91, 0.5, 1]").unwrap();
        assert_eq!(scores, vec![0.91, 0.5, 1.0]);
        assert!(parse_confidence_scores("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_confidence_scores(" 0.8734 ").unwrap(), vec![0.8734]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_confidence_scores(""), Err(ScoreParseError::Empty));
        assert!(matches!(parse_confidence_scores("abc"), Err(ScoreParseError::Invalid(_))));
        assert!(matches!(parse_confidence_scores("[0.1,"), Err(ScoreParseError::Invalid(_))));
        assert_eq!(parse_confidence_scores("[0.2, 1.5]"), Err(ScoreParseError::OutOfRange(1.5)));
    }
}

//! Pattern matching for classification clearances
//!
//! Provides regex-based deny rules evaluated against a classification's
//! abbreviation and title.

use crate::error::ConfigError;
use crate::taxonomy::Classification;
use regex::Regex;

/// Compiled pattern matcher
#[derive(Debug)]
pub struct PatternMatcher {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl PatternMatcher {
    /// Create a new pattern matcher from a list of regex patterns
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|regex| CompiledPattern {
                        source: pattern.clone(),
                        regex,
                    })
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns: compiled })
    }

    /// Create an empty pattern matcher (matches nothing)
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// First pattern matching either the abbreviation or the title
    pub fn find_classification_match(&self, classification: &Classification) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| {
                (!classification.abbreviation.is_empty()
                    && p.regex.is_match(&classification.abbreviation))
                    || p.regex.is_match(&classification.title)
            })
            .map(|p| p.source.as_str())
    }

    /// Check if this matcher has any patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Get the number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ClassificationId;

    fn label(title: &str, abbreviation: &str) -> Classification {
        Classification {
            id: ClassificationId(1),
            title: title.to_string(),
            subtitle: String::new(),
            abbreviation: abbreviation.to_string(),
            color: String::new(),
            parent: None,
            is_default: false,
        }
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = PatternMatcher::empty();
        assert!(matcher.is_empty());
        assert!(matcher.find_classification_match(&label("Secret", "S")).is_none());
    }

    #[test]
    fn test_matches_abbreviation_or_title() {
        let matcher =
            PatternMatcher::new(&["^NF$".to_string(), "(?i)exercise".to_string()]).unwrap();
        assert_eq!(matcher.len(), 2);

        assert_eq!(
            matcher.find_classification_match(&label("No Foreign", "NF")),
            Some("^NF$")
        );
        assert_eq!(
            matcher.find_classification_match(&label("Exercise Only", "EX")),
            Some("(?i)exercise")
        );
        assert_eq!(
            matcher.find_classification_match(&label("Internal", "INT")),
            None
        );
    }

    #[test]
    fn test_empty_abbreviation_not_matched() {
        let matcher = PatternMatcher::new(&["^$".to_string()]).unwrap();
        assert!(matcher.find_classification_match(&label("Internal", "")).is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternMatcher::new(&["[invalid".to_string()]);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }
}

//! Route path patterns.
//!
//! # Responsibilities
//! - Compile a route's path pattern into a regular expression
//! - Full-string matching against an incoming request path
//! - Expose captured group values aligned with the declared group names
//!
//! # Design Decisions
//! - The raw pattern is parsed on its own before anchoring, so a
//!   malformed spec is rejected instead of being "closed" by the wrapper
//! - Anchoring is explicit (`^(?:spec)$`); a prefix or substring hit never
//!   counts as a match
//! - Unnamed groups are kept in the capture list but carry no name

use regex::Regex;
use thiserror::Error;

/// Error raised when a route's path pattern cannot be compiled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern is not a well-formed regular expression.
    #[error("invalid route pattern `{pattern}`: {message}")]
    Syntax { pattern: String, message: String },

    /// The pattern parsed but could not be compiled (e.g. size limit).
    #[error("route pattern `{pattern}` could not be compiled: {message}")]
    Compile { pattern: String, message: String },
}

/// A compiled, fully-anchored route pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    /// Capture group names in declaration order, excluding the implicit
    /// whole-match group. `None` marks an unnamed group.
    group_names: Vec<Option<String>>,
}

impl Pattern {
    /// Compile a path pattern.
    pub fn compile(spec: &str) -> Result<Self, PatternError> {
        regex_syntax::Parser::new()
            .parse(spec)
            .map_err(|e| PatternError::Syntax {
                pattern: spec.to_string(),
                message: e.to_string(),
            })?;

        let regex = Regex::new(&format!("^(?:{})$", spec)).map_err(|e| PatternError::Compile {
            pattern: spec.to_string(),
            message: e.to_string(),
        })?;

        let group_names = regex
            .capture_names()
            .skip(1)
            .map(|name| name.map(str::to_string))
            .collect();

        Ok(Self {
            source: spec.to_string(),
            regex,
            group_names,
        })
    }

    /// The source string this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Declared capture group names, in order.
    pub fn group_names(&self) -> &[Option<String>] {
        &self.group_names
    }

    /// Match `path` in full.
    ///
    /// Groups that did not participate in the match capture an empty string.
    pub fn matches<'p>(&self, path: &'p str) -> Option<PatternMatch<'p>> {
        let captures = self.regex.captures(path)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 || whole.end() != path.len() {
            return None;
        }

        let values = captures
            .iter()
            .skip(1)
            .map(|group| group.map_or("", |m| m.as_str()))
            .collect();

        Some(PatternMatch {
            matched: whole.as_str(),
            values,
        })
    }

    /// Named captures from a successful match, as `(name, value)` pairs.
    pub fn named_values<'p>(&self, found: &PatternMatch<'p>) -> Vec<(&str, &'p str)> {
        self.group_names
            .iter()
            .zip(found.values.iter().copied())
            .filter_map(|(name, value)| name.as_deref().map(|name| (name, value)))
            .collect()
    }
}

/// Result of a successful full match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch<'p> {
    matched: &'p str,
    values: Vec<&'p str>,
}

impl<'p> PatternMatch<'p> {
    /// The matched span. Always the entire input path.
    pub fn matched(&self) -> &'p str {
        self.matched
    }

    /// Captured values, aligned with [`Pattern::group_names`].
    pub fn values(&self) -> &[&'p str] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_only() {
        let pattern = Pattern::compile("/a").unwrap();
        assert!(pattern.matches("/a").is_some());
        assert!(pattern.matches("/ab").is_none());
        assert!(pattern.matches("/xa").is_none());
        assert!(pattern.matches("").is_none());
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        // Without grouping the anchors, `^/a|/ab$` would accept "/abc".
        let pattern = Pattern::compile("/a|/ab").unwrap();
        assert_eq!(pattern.matches("/ab").unwrap().matched(), "/ab");
        assert!(pattern.matches("/abc").is_none());
        assert!(pattern.matches("x/ab").is_none());
    }

    #[test]
    fn test_named_and_unnamed_groups() {
        let pattern = Pattern::compile("/user/(?P<id>[0-9]+)/(post|page)/(?P<slug>[a-z-]+)").unwrap();
        assert_eq!(
            pattern.group_names(),
            &[Some("id".to_string()), None, Some("slug".to_string())]
        );

        let found = pattern.matches("/user/42/post/hello-world").unwrap();
        assert_eq!(found.values(), &["42", "post", "hello-world"]);

        let named = pattern.named_values(&found);
        assert_eq!(named, vec![("id", "42"), ("slug", "hello-world")]);
    }

    #[test]
    fn test_optional_group_captures_empty() {
        let pattern = Pattern::compile("/files(?P<ext>\\.[a-z]+)?").unwrap();
        let found = pattern.matches("/files").unwrap();
        let named = pattern.named_values(&found);
        assert_eq!(named, vec![("ext", "")]);
    }

    #[test]
    fn test_malformed_specs_are_rejected() {
        assert!(matches!(
            Pattern::compile("(unterminated"),
            Err(PatternError::Syntax { .. })
        ));
        // Would become valid if only wrapped in `^(?:...)$`.
        assert!(matches!(
            Pattern::compile("a)(b"),
            Err(PatternError::Syntax { .. })
        ));
    }

    #[test]
    fn test_error_message_names_the_pattern() {
        let err = Pattern::compile("(?P<id[0-9]+)").unwrap_err();
        assert!(err.to_string().contains("(?P<id[0-9]+)"));
    }
}

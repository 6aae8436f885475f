//! Email content matching for extracting data from message bodies.
//!
//! This module provides the [`Matcher`] trait used by the mailbox scanner, a
//! regex-based implementation and a closure-based one for custom logic. Extraction
//! patterns supplied as strings are compiled by [`crate::pattern::compile_pattern`].
//!
//! # Example
//!
//! ```
//! use email_check::matcher::{Matcher, MatchRule, RegexMatcher};
//!
//! // With a capture group, the group is extracted
//! let order = RegexMatcher::new(r"id: (\d+)").unwrap();
//! assert_eq!(order.find_match("order id: 7788 confirmed").as_deref(), Some("7788"));
//!
//! // Without one, the whole match is
//! let word = RegexMatcher::new("confirmed").unwrap();
//! assert_eq!(word.find_match("order confirmed today").as_deref(), Some("confirmed"));
//!
//! // The rule can be overridden
//! let whole = RegexMatcher::new(r"id: (\d+)").unwrap().with_rule(MatchRule::WholeMatch);
//! assert_eq!(whole.find_match("order id: 7788").as_deref(), Some("id: 7788"));
//! ```

use regex::{Captures, Regex};
use std::borrow::Cow;

/// Trait for matching and extracting content from message bodies.
///
/// Implement this trait to define custom matching logic.
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    /// Uses `Cow<str>` to avoid allocations when the match can be borrowed
    /// directly from the input text.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging and error messages.
    fn description(&self) -> &str;
}

/// Which part of a regex match becomes the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchRule {
    /// The first capture group if the pattern has one, otherwise the whole match.
    ///
    /// A first group that did not take part in the match falls back to the whole
    /// match.
    #[default]
    FirstGroupOrWhole,
    /// Always the whole match.
    WholeMatch,
    /// Always the first capture group; no group means no match.
    FirstGroup,
}

impl MatchRule {
    /// Picks the extracted text out of a successful match.
    #[must_use]
    pub fn select<'a>(self, captures: &Captures<'a>) -> Option<&'a str> {
        let whole = captures.get(0).map(|m| m.as_str());
        match self {
            MatchRule::WholeMatch => whole,
            MatchRule::FirstGroup => captures.get(1).map(|m| m.as_str()),
            MatchRule::FirstGroupOrWhole if captures.len() > 1 => {
                captures.get(1).map(|m| m.as_str()).or(whole)
            }
            MatchRule::FirstGroupOrWhole => whole,
        }
    }
}

/// Regex-based matcher.
///
/// Extraction follows its [`MatchRule`] (by default the first capture group if
/// present, otherwise the whole match).
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    rule: MatchRule,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher from a bare pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::from_regex(regex, format!("regex pattern: {pattern}")))
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?, description))
    }

    /// Wraps an already compiled regex.
    #[must_use]
    pub fn from_regex(regex: Regex, description: impl Into<String>) -> Self {
        Self {
            regex,
            rule: MatchRule::default(),
            description: description.into(),
        }
    }

    /// Replaces the extraction rule.
    #[must_use]
    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rule = rule;
        self
    }

    /// Returns the extraction rule.
    #[must_use]
    pub fn rule(&self) -> MatchRule {
        self.rule
    }

    /// Returns the compiled regex.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| self.rule.select(&caps))
            .map(Cow::Borrowed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher using a closure for custom matching logic.
///
/// # Example
///
/// ```
/// use email_check::matcher::{ClosureMatcher, Matcher};
/// use std::borrow::Cow;
///
/// let matcher = ClosureMatcher::new(
///     |text| {
///         text.lines()
///             .find(|line| line.starts_with("Code:"))
///             .map(|line| Cow::Owned(line.trim_start_matches("Code:").trim().to_string()))
///     },
///     "code line extractor"
/// );
///
/// let text = "Hello\nCode: ABC123\nThanks";
/// assert_eq!(matcher.find_match(text).as_deref(), Some("ABC123"));
/// ```
pub struct ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    matcher_fn: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    /// Creates a new closure-based matcher.
    #[must_use]
    pub fn new(matcher_fn: F, description: impl Into<String>) -> Self {
        Self {
            matcher_fn,
            description: description.into(),
        }
    }
}

impl<F> Matcher for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        (self.matcher_fn)(text)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F>
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_group_preferred() {
        let matcher = RegexMatcher::new(r"id: (\d+)").unwrap();
        assert_eq!(
            matcher.find_match("order id: 7788 confirmed").as_deref(),
            Some("7788")
        );
        assert_eq!(matcher.find_match("no order here"), None);
    }

    #[test]
    fn test_whole_match_without_groups() {
        let matcher = RegexMatcher::new("confirmed").unwrap();
        assert_eq!(
            matcher.find_match("order confirmed today").as_deref(),
            Some("confirmed")
        );
    }

    #[test]
    fn test_unparticipating_group_falls_back_to_whole_match() {
        let matcher = RegexMatcher::new(r"code(?: (\d+))?").unwrap();
        assert_eq!(matcher.find_match("code pending").as_deref(), Some("code"));
        assert_eq!(matcher.find_match("code 42").as_deref(), Some("42"));
    }

    #[test]
    fn test_rule_overrides() {
        let text = "order id: 7788 confirmed";

        let whole = RegexMatcher::new(r"id: (\d+)")
            .unwrap()
            .with_rule(MatchRule::WholeMatch);
        assert_eq!(whole.find_match(text).as_deref(), Some("id: 7788"));

        let group_only = RegexMatcher::new("confirmed")
            .unwrap()
            .with_rule(MatchRule::FirstGroup);
        assert_eq!(group_only.find_match(text), None);
        assert_eq!(group_only.rule(), MatchRule::FirstGroup);
    }

    #[test]
    fn test_closure_matcher() {
        let matcher = ClosureMatcher::new(
            |text| {
                text.lines()
                    .find(|line| line.contains("SECRET"))
                    .map(|line| Cow::Owned(line.replace("SECRET:", "").trim().to_string()))
            },
            "secret extractor",
        );

        let text = "Header\nSECRET: my-value\nFooter";
        assert_eq!(matcher.find_match(text).as_deref(), Some("my-value"));
        assert_eq!(matcher.description(), "secret extractor");
    }

    #[test]
    fn test_regex_matcher_returns_borrowed() {
        let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
        let result = matcher.find_match("Your code: 12345");
        assert!(matches!(result, Some(Cow::Borrowed("12345"))));
    }
}

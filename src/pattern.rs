//! Extraction pattern parsing.
//!
//! Callers pass patterns either as a delimited literal (`/body/flags`) or as a
//! bare pattern. A string counts as a literal only if it matches
//! `^/.+/[gimsuy]*$`; the body is everything between the first and the last `/`.
//! Anything else, including an unterminated `/foo`, is a bare pattern.
//!
//! | flag | effect                                          |
//! |------|-------------------------------------------------|
//! | `i`  | case-insensitive                                |
//! | `m`  | `^` and `$` match at line boundaries            |
//! | `s`  | `.` matches newlines                            |
//! | `u`  | Unicode; always on                              |
//! | `g`  | accepted; only the first match is ever used     |
//! | `y`  | sticky; the match must start at the first byte  |

use crate::error::{Error, Result};
use crate::matcher::{MatchRule, Matcher, RegexMatcher};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

static LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/.+/[gimsuy]*$").expect("literal grammar is a valid regex"));

/// A compiled extraction pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    body: String,
    flags: String,
    matcher: RegexMatcher,
}

/// Compiles a pattern given as `/body/flags` or as a bare pattern.
///
/// Pure: the same input always yields an equivalent pattern.
///
/// # Errors
///
/// - [`Error::DuplicatePatternFlag`] if a flag is repeated
/// - [`Error::InvalidPattern`] if the body is not a valid regex
///
/// # Example
///
/// ```
/// use email_check::pattern::compile_pattern;
///
/// let pattern = compile_pattern("/foo/gi").unwrap();
/// assert_eq!(pattern.body(), "foo");
/// assert_eq!(pattern.flags(), "gi");
///
/// let bare = compile_pattern("/foo").unwrap();
/// assert_eq!(bare.body(), "/foo");
/// assert_eq!(bare.flags(), "");
/// ```
pub fn compile_pattern(spec: &str) -> Result<CompiledPattern> {
    let (body, flags) = split_literal(spec).unwrap_or((spec, ""));

    for (idx, flag) in flags.char_indices() {
        if flags[..idx].contains(flag) {
            return Err(Error::DuplicatePatternFlag {
                pattern: spec.to_string(),
                flag,
            });
        }
    }

    let invalid = |source| Error::InvalidPattern {
        pattern: body.to_string(),
        source,
    };

    // The body must stand alone before it is wrapped in the sticky anchor
    let mut regex = build_regex(body, flags).map_err(invalid)?;
    if flags.contains('y') {
        regex = build_regex(&format!(r"\A(?:{body})"), flags).map_err(invalid)?;
    }

    Ok(CompiledPattern {
        body: body.to_string(),
        flags: flags.to_string(),
        matcher: RegexMatcher::from_regex(regex, format!("pattern: {spec}")),
    })
}

/// Splits `/body/flags` into body and flags, or `None` for a bare pattern.
fn split_literal(spec: &str) -> Option<(&str, &str)> {
    if !LITERAL.is_match(spec) {
        return None;
    }
    let last_slash = spec.rfind('/')?;
    Some((&spec[1..last_slash], &spec[last_slash + 1..]))
}

fn build_regex(source: &str, flags: &str) -> std::result::Result<Regex, regex::Error> {
    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' => {
                builder.unicode(true);
            }
            // `g` and `y` need no engine option
            _ => {}
        }
    }
    builder.build()
}

impl CompiledPattern {
    /// Returns the pattern body without delimiters or flags.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the flags, in the order given.
    #[must_use]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Returns the extraction rule.
    #[must_use]
    pub fn rule(&self) -> MatchRule {
        self.matcher.rule()
    }

    /// Replaces the extraction rule.
    #[must_use]
    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.matcher = self.matcher.with_rule(rule);
        self
    }
}

impl Matcher for CompiledPattern {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.matcher.find_match(text)
    }

    fn description(&self) -> &str {
        self.matcher.description()
    }
}

//! Remote file name filters

use crate::config::FilterSyntax;
use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

/// Compiled file name filter
///
/// A regex filter must match the whole name, not a substring of it.
#[derive(Clone, Debug)]
pub enum FileFilter {
    /// Shell-style glob
    Glob {
        /// Source pattern
        pattern: String,
        /// Compiled matcher
        matcher: GlobMatcher,
    },
    /// Anchored regular expression
    Regex {
        /// Source pattern
        pattern: String,
        /// Compiled expression, anchored at both ends
        regex: Regex,
    },
}

impl FileFilter {
    /// Compile `pattern` using the given syntax
    pub fn new(pattern: &str, syntax: FilterSyntax) -> Result<Self> {
        match syntax {
            FilterSyntax::Glob => Self::glob(pattern),
            FilterSyntax::Regex => Self::regex(pattern),
        }
    }

    /// Compile a glob filter (`*.csv`, `report-??.txt`, `{a,b}.json`)
    pub fn glob(pattern: &str) -> Result<Self> {
        // `*` never crosses a `/`
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                Error::config("poll.filterPattern", format!("invalid glob {pattern:?}: {e}"))
            })?;
        Ok(FileFilter::Glob {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Compile a regex filter matched against the entire file name
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            Error::config(
                "poll.filterPattern",
                format!("invalid regex {pattern:?}: {e}"),
            )
        })?;
        Ok(FileFilter::Regex {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether `name` passes the filter
    pub fn is_match(&self, name: &str) -> bool {
        match self {
            FileFilter::Glob { matcher, .. } => matcher.is_match(name),
            FileFilter::Regex { regex, .. } => regex.is_match(name),
        }
    }

    /// The pattern the filter was compiled from
    pub fn pattern(&self) -> &str {
        match self {
            FileFilter::Glob { pattern, .. } | FileFilter::Regex { pattern, .. } => pattern,
        }
    }
}

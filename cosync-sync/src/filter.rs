//! Ignore-pattern filter.
//!
//! Every non-empty line of the ignore source is compiled as a regex. A path is
//! excluded when any pattern finds a match anywhere in it (search semantics,
//! not anchored equality). Lines that fail to compile are skipped and handed
//! back to the caller; they never abort the run.

use regex::Regex;

use crate::error::FilterError;

/// Conventional name of the ignore file at the working-tree root.
pub const IGNORE_FILE_NAME: &str = ".syncignore";

/// Ordered list of compiled ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<Regex>,
}

impl IgnoreFilter {
    /// A filter that excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile each non-empty line into a pattern.
    ///
    /// Returns the filter together with one [`FilterError`] per line that was
    /// skipped because it is not a valid regex. Line numbers are 1-based.
    pub fn compile<I, S>(lines: I) -> (Self, Vec<FilterError>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        let mut errors = Vec::new();

        for (idx, line) in lines.into_iter().enumerate() {
            // An empty regex matches every path.
            let pattern = line.as_ref().trim_end_matches('\r');
            if pattern.is_empty() {
                continue;
            }
            match Regex::new(pattern) {
                Ok(re) => patterns.push(re),
                Err(source) => errors.push(FilterError::Compile {
                    line: idx + 1,
                    pattern: pattern.to_owned(),
                    source,
                }),
            }
        }

        (Self { patterns }, errors)
    }

    /// Compile the raw contents of an ignore file.
    pub fn parse(content: &str) -> (Self, Vec<FilterError>) {
        Self::compile(content.split('\n'))
    }

    /// `true` when any pattern matches anywhere in `path`.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// The first pattern that excludes `path`, if any.
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(path))
            .map(Regex::as_str)
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// `true` when the filter excludes nothing.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

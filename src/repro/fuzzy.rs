use std::ffi::OsStr;

use regex::{NoExpand, Regex};

/// Stands in for every volatile part of a normalized argument.
pub const FUZZY_PLACEHOLDER: &str = "[[FUZZY_VALUE]]";

#[derive(Debug, Clone)]
struct FuzzyMatcher {
    pattern: Regex,
    /// Same pattern anchored to the whole argument.
    full: Regex,
    groups: usize,
}

impl FuzzyMatcher {
    fn new(raw: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(raw)?;
        let full = Regex::new(&format!(r"\A(?:{raw})\z"))?;
        let groups = pattern.captures_len() - 1;
        Ok(Self {
            pattern,
            full,
            groups,
        })
    }

    fn apply(&self, arg: String) -> String {
        // Without groups the matched parts are volatile.
        if self.groups == 0 {
            return self
                .pattern
                .replace_all(&arg, NoExpand(FUZZY_PLACEHOLDER))
                .into_owned();
        }

        // With groups the captured parts are stable and the rest is volatile,
        // but only when the whole argument matches.
        let Some(caps) = self.full.captures(&arg) else {
            return arg;
        };

        let groups: Vec<_> = caps.iter().skip(1).flatten().collect();
        let mut out = groups
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(FUZZY_PLACEHOLDER);

        if caps.get(1).is_some_and(|g| g.start() > 0) {
            out.insert_str(0, FUZZY_PLACEHOLDER);
        }
        if groups.last().is_some_and(|g| g.end() < arg.len()) {
            out.push_str(FUZZY_PLACEHOLDER);
        }
        out
    }
}

/// Ordered list of regexes that normalize volatile argument substrings.
#[derive(Debug, Clone, Default)]
pub struct FuzzyMatchers {
    matchers: Vec<FuzzyMatcher>,
}

impl FuzzyMatchers {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matchers = patterns
            .into_iter()
            .map(|p| FuzzyMatcher::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().map(|m| m.pattern.as_str())
    }

    /// Normalize a single argument, applying every pattern in order.
    pub fn compile_arg(&self, arg: &str) -> String {
        self.matchers
            .iter()
            .fold(arg.to_string(), |acc, matcher| matcher.apply(acc))
    }

    /// Normalize a command line. Output has the same length and order.
    pub fn compile<S: AsRef<OsStr>>(&self, args: &[S]) -> Vec<String> {
        args.iter()
            .map(|arg| self.compile_arg(&arg.as_ref().to_string_lossy()))
            .collect()
    }
}

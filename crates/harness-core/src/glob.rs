//! File-name globs
//!
//! `*` matches any run of characters, `?` exactly one, everything else is
//! literal. Patterns are compiled to an anchored regex once.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 8);
        // File names are case-insensitive on Windows
        if cfg!(windows) {
            expr.push_str("(?i)");
        }
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("*.Tests.so", "Math.Tests.so", true)]
    #[case("*.Tests.so", "Math.Tests.so.1", false)]
    #[case("*.Tests.so", "Math.Testsxso", false)]
    #[case("lib?.so", "liba.so", true)]
    #[case("lib?.so", "libab.so", false)]
    #[case("[core]+.so", "[core]+.so", true)]
    #[case("*", "", true)]
    fn test_glob_matching(#[case] pattern: &str, #[case] name: &str, #[case] expected: bool) {
        let glob = GlobPattern::new(pattern).unwrap();
        assert_eq!(glob.matches(name), expected, "{} vs {}", pattern, name);
    }

    #[test]
    fn test_keeps_source_text() {
        assert_eq!(GlobPattern::new("*.dll").unwrap().as_str(), "*.dll");
    }
}

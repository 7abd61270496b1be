use crate::{ConfigError, ConfigResult};
use regex::Regex;

/// Compiles a pattern that must match the whole candidate string
///
/// # Arguments
///
/// * `pattern` - The regular expression, without anchors
///
/// # Returns
///
/// * `Ok(Regex)` - Anchored regex
/// * `Err(ConfigError::InvalidRegex)` - The pattern does not compile
pub fn compile_full_match(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// URL admission rule made of positive and negative patterns
///
/// A URL satisfies the rule when no negative pattern matches it and at least
/// one positive pattern does. Patterns always match the entire URL.
///
/// # Textual form
///
/// - `+pattern` adds a positive pattern
/// - `-pattern` adds a negative pattern
/// - `pattern` (no prefix) adds a positive pattern
///
/// # Example
///
/// ```
/// use crawl_frontier::url::RegexRule;
///
/// let rule = RegexRule::from_rules(["+https://example\\.com/.*", "-.*\\.png"]).unwrap();
/// assert!(rule.satisfy("https://example.com/a"));
/// assert!(!rule.satisfy("https://example.com/a.png"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegexRule {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
    sources: Vec<String>,
}

impl RegexRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a rule from a list of textual rules
    pub fn from_rules<I, S>(rules: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rule = Self::new();
        for r in rules {
            rule.add_rule(r.as_ref())?;
        }
        Ok(rule)
    }

    /// Adds one textual rule; empty strings are ignored
    pub fn add_rule(&mut self, rule: &str) -> ConfigResult<&mut Self> {
        if rule.is_empty() {
            return Ok(self);
        }

        if let Some(pattern) = rule.strip_prefix('+') {
            self.add_positive(pattern)?;
        } else if let Some(pattern) = rule.strip_prefix('-') {
            self.add_negative(pattern)?;
        } else {
            self.add_positive(rule)?;
        }
        Ok(self)
    }

    pub fn add_positive(&mut self, pattern: &str) -> ConfigResult<&mut Self> {
        self.positive.push(compile_full_match(pattern)?);
        self.sources.push(format!("+{}", pattern));
        Ok(self)
    }

    pub fn add_negative(&mut self, pattern: &str) -> ConfigResult<&mut Self> {
        self.negative.push(compile_full_match(pattern)?);
        self.sources.push(format!("-{}", pattern));
        Ok(self)
    }

    /// True when the rule has no positive pattern and can admit nothing
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty()
    }

    /// Checks a URL against the rule
    pub fn satisfy(&self, url: &str) -> bool {
        if self.negative.iter().any(|re| re.is_match(url)) {
            return false;
        }
        self.positive.iter().any(|re| re.is_match(url))
    }

    /// Textual rules in insertion order, with explicit `+`/`-` prefixes
    pub fn rules(&self) -> &[String] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_rule_is_positive() {
        let rule = RegexRule::from_rules(["https://example\\.com/.*"]).unwrap();
        assert!(!rule.is_empty());
        assert!(rule.satisfy("https://example.com/page"));
        assert!(!rule.satisfy("https://other.com/page"));
    }

    #[test]
    fn test_negative_wins() {
        let rule =
            RegexRule::from_rules(["+https://example\\.com/.*", "-.*\\.(jpg|png)"]).unwrap();
        assert!(rule.satisfy("https://example.com/index.html"));
        assert!(!rule.satisfy("https://example.com/logo.png"));
    }

    #[test]
    fn test_only_negative_admits_nothing() {
        let rule = RegexRule::from_rules(["-.*\\.png"]).unwrap();
        assert!(rule.is_empty());
        assert!(!rule.satisfy("https://example.com/"));
    }

    #[test]
    fn test_full_match_required() {
        let rule = RegexRule::from_rules(["https://example\\.com/"]).unwrap();
        assert!(rule.satisfy("https://example.com/"));
        assert!(!rule.satisfy("https://example.com/more"));
    }

    #[test]
    fn test_empty_rule_string_ignored() {
        let rule = RegexRule::from_rules(["", "+a.*"]).unwrap();
        assert_eq!(rule.rules(), &["+a.*".to_string()]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = RegexRule::from_rules(["+https://(unclosed"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_group() {
        let re = compile_full_match("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));
    }
}

//! Tier classification
//!
//! Maps a request to the name of the tier that handles it. Rules are
//! evaluated in order and the first match wins; requests no rule matches go
//! to the default tier.

use http::Method;
use serde::{Deserialize, Serialize};
use tiercache_proxy::FetchRequest;
use url::Url;

use crate::error::CoreError;

/// Maximum iterations allowed for pattern matching to prevent ReDoS
const MAX_MATCH_ITERATIONS: usize = 10000;

/// How a classifier rule matches a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// Glob over the URL path (`*` within a segment, `**` across segments)
    Glob,
    /// Literal URL path prefix
    Prefix,
    /// Any request whose origin differs from the configured origin
    CrossOrigin,
}

/// A classifier rule as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleConfig {
    pub tier: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub pattern: String,
}

impl RuleConfig {
    pub fn glob(pattern: &str, tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            kind: RuleKind::Glob,
            pattern: pattern.to_string(),
        }
    }

    pub fn prefix(pattern: &str, tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            kind: RuleKind::Prefix,
            pattern: pattern.to_string(),
        }
    }

    pub fn cross_origin(tier: &str) -> Self {
        Self {
            tier: tier.to_string(),
            kind: RuleKind::CrossOrigin,
            pattern: String::new(),
        }
    }
}

/// Compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    parts: Vec<PatternPart>,
}

#[derive(Debug, Clone)]
enum PatternPart {
    /// Literal text that must match exactly
    Literal(String),
    /// Any run of characters within one path segment (*)
    SingleWildcard,
    /// Any run of characters, including '/' (**)
    MultiWildcard,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();

        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];

            if ch == '*' {
                if !current.is_empty() {
                    parts.push(PatternPart::Literal(std::mem::take(&mut current)));
                }

                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    parts.push(PatternPart::MultiWildcard);
                    i += 2;
                } else {
                    parts.push(PatternPart::SingleWildcard);
                    i += 1;
                }
            } else {
                current.push(ch);
                i += 1;
            }
        }

        if !current.is_empty() {
            parts.push(PatternPart::Literal(current));
        }

        Self { parts }
    }

    pub fn matches(&self, text: &str) -> bool {
        let mut iterations = 0;
        Self::match_recursive(&self.parts, text, 0, 0, &mut iterations)
    }

    fn match_recursive(
        parts: &[PatternPart],
        text: &str,
        part_idx: usize,
        pos: usize,
        iterations: &mut usize,
    ) -> bool {
        *iterations += 1;
        if *iterations > MAX_MATCH_ITERATIONS {
            tracing::warn!(
                "Pattern matching exceeded {} iterations, aborting",
                MAX_MATCH_ITERATIONS
            );
            return false;
        }

        if part_idx >= parts.len() {
            return pos >= text.len();
        }

        let remaining = &text[pos..];

        match &parts[part_idx] {
            PatternPart::Literal(lit) => {
                remaining.starts_with(lit.as_str())
                    && Self::match_recursive(parts, text, part_idx + 1, pos + lit.len(), iterations)
            }
            PatternPart::SingleWildcard => {
                let segment_end = remaining.find('/').unwrap_or(remaining.len());
                Self::boundaries(&remaining[..segment_end]).any(|offset| {
                    Self::match_recursive(parts, text, part_idx + 1, pos + offset, iterations)
                })
            }
            PatternPart::MultiWildcard => {
                if part_idx + 1 == parts.len() {
                    return true;
                }
                Self::boundaries(remaining).any(|offset| {
                    Self::match_recursive(parts, text, part_idx + 1, pos + offset, iterations)
                })
            }
        }
    }

    /// Every char boundary of `s`, including its end
    fn boundaries(s: &str) -> impl Iterator<Item = usize> + '_ {
        s.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(s.len()))
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(GlobPattern),
    Prefix(String),
    CrossOrigin,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    tier: String,
    matcher: Matcher,
}

/// First-match-wins request classifier
#[derive(Debug, Clone)]
pub struct TierClassifier {
    origin: Option<Url>,
    rules: Vec<CompiledRule>,
    default_tier: String,
}

impl TierClassifier {
    pub fn new(rules: &[RuleConfig], default_tier: &str, origin: Option<Url>) -> Self {
        let rules = rules
            .iter()
            .map(|r| CompiledRule {
                tier: r.tier.clone(),
                matcher: match r.kind {
                    RuleKind::Glob => Matcher::Glob(GlobPattern::compile(&r.pattern)),
                    RuleKind::Prefix => Matcher::Prefix(r.pattern.clone()),
                    RuleKind::CrossOrigin => Matcher::CrossOrigin,
                },
            })
            .collect();

        Self {
            origin,
            rules,
            default_tier: default_tier.to_string(),
        }
    }

    /// Only GET requests over http(s) are cacheable
    pub fn check_cacheable(request: &FetchRequest) -> Result<(), CoreError> {
        if request.method != Method::GET {
            return Err(CoreError::NotCacheable(format!(
                "method {} is not cacheable",
                request.method
            )));
        }
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(CoreError::NotCacheable(format!(
                "scheme {} is not cacheable",
                request.url.scheme()
            )));
        }
        Ok(())
    }

    /// Name of the tier handling this request
    pub fn classify(&self, request: &FetchRequest) -> Result<&str, CoreError> {
        Self::check_cacheable(request)?;

        let path = request.url.path();
        for rule in &self.rules {
            let matched = match &rule.matcher {
                Matcher::Glob(glob) => glob.matches(path),
                Matcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
                Matcher::CrossOrigin => self.is_cross_origin(&request.url),
            };
            if matched {
                return Ok(&rule.tier);
            }
        }

        Ok(&self.default_tier)
    }

    fn is_cross_origin(&self, url: &Url) -> bool {
        self.origin
            .as_ref()
            .is_some_and(|origin| origin.origin() != url.origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_TIER, DYNAMIC_TIER, STATIC_TIER, default_rules};

    fn classifier() -> TierClassifier {
        TierClassifier::new(
            &default_rules(),
            DYNAMIC_TIER,
            Some(Url::parse("https://app.example.com").unwrap()),
        )
    }

    fn classify(c: &TierClassifier, url: &str) -> String {
        c.classify(&FetchRequest::parse(url).unwrap())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_glob_single_wildcard() {
        let glob = GlobPattern::compile("library/*");
        assert!(glob.matches("library/nginx"));
        assert!(!glob.matches("library/nested/nginx"));
        assert!(!glob.matches("other/nginx"));

        let glob = GlobPattern::compile("*.js");
        assert!(glob.matches("app.js"));
        assert!(!glob.matches("dir/app.js"));
    }

    #[test]
    fn test_glob_multi_wildcard() {
        let glob = GlobPattern::compile("**/*.css");
        assert!(glob.matches("/styles/main.css"));
        assert!(glob.matches("/a/b/c/site.min.css"));
        assert!(!glob.matches("/styles/main.css.map"));

        let glob = GlobPattern::compile("**/api/**");
        assert!(glob.matches("GET https://example.com/api/users?page=1"));
        assert!(!glob.matches("GET https://example.com/apis/users"));
    }

    #[test]
    fn test_glob_exact() {
        let glob = GlobPattern::compile("/favicon.ico");
        assert!(glob.matches("/favicon.ico"));
        assert!(!glob.matches("/favicon.ico2"));
    }

    #[test]
    fn test_classify_static_assets() {
        let c = classifier();
        assert_eq!(classify(&c, "https://app.example.com/js/app.js"), STATIC_TIER);
        assert_eq!(classify(&c, "https://app.example.com/logo.png?v=3"), STATIC_TIER);
        assert_eq!(classify(&c, "https://app.example.com/static/data"), STATIC_TIER);
        // Static rules win over cross-origin
        assert_eq!(classify(&c, "https://cdn.example.net/lib.js"), STATIC_TIER);
    }

    #[test]
    fn test_classify_api() {
        let c = classifier();
        assert_eq!(classify(&c, "https://app.example.com/api/users"), API_TIER);
        assert_eq!(classify(&c, "https://app.example.com/graphql"), API_TIER);
        assert_eq!(classify(&c, "https://other.example.com/page"), API_TIER);
    }

    #[test]
    fn test_classify_default() {
        let c = classifier();
        assert_eq!(classify(&c, "https://app.example.com/"), DYNAMIC_TIER);
        assert_eq!(classify(&c, "https://app.example.com/blog/post-1"), DYNAMIC_TIER);
    }

    #[test]
    fn test_no_origin_means_no_cross_origin() {
        let c = TierClassifier::new(&default_rules(), DYNAMIC_TIER, None);
        assert_eq!(classify(&c, "https://other.example.com/page"), DYNAMIC_TIER);
    }

    #[test]
    fn test_first_match_wins() {
        let c = TierClassifier::new(
            &[
                RuleConfig::prefix("/api/", "first"),
                RuleConfig::glob("/api/**", "second"),
            ],
            "fallback",
            None,
        );
        assert_eq!(classify(&c, "https://x.test/api/items"), "first");
        assert_eq!(classify(&c, "https://x.test/other"), "fallback");
    }

    #[test]
    fn test_not_cacheable() {
        let c = classifier();
        let post = FetchRequest::new(
            Method::POST,
            Url::parse("https://app.example.com/api/users").unwrap(),
        );
        assert!(matches!(c.classify(&post), Err(CoreError::NotCacheable(_))));

        let ftp = FetchRequest::parse("ftp://app.example.com/file.js").unwrap();
        assert!(matches!(c.classify(&ftp), Err(CoreError::NotCacheable(_))));
    }
}

//! Path patterns with named segments, compiled once into a regex.
//!
//! Syntax:
//! - `/posts/:id` matches one non-empty segment and names it `id`
//! - `/posts/:id?` makes the whole segment optional
//! - `*` matches anything, including `/`
//!
//! Matching ignores ASCII case and tolerates a single trailing slash.

use std::fmt;

use regex::Regex;

#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern, returning a human readable reason on failure.
    pub fn compile(pattern: &str) -> Result<Self, String> {
        if !pattern.starts_with('/') {
            return Err(format!("path pattern '{pattern}' must start with '/'"));
        }

        let mut params = Vec::new();
        let mut expr = String::from("(?i)^");

        let trimmed = pattern.trim_end_matches('/');
        for segment in trimmed.split('/').skip(1) {
            if let Some(name) = segment.strip_prefix(':').and_then(|s| s.strip_suffix('?')) {
                check_param_name(name, &params)?;
                expr.push_str(&format!("(?:/(?P<{name}>[^/]+?))?"));
                params.push(name.to_string());
                continue;
            }

            expr.push('/');
            compile_segment(segment, &mut expr, &mut params)?;
        }
        expr.push_str("/?$");

        let regex = Regex::new(&expr).map_err(|e| e.to_string())?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            params,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the `:param` segments, in pattern order
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

fn compile_segment(segment: &str, expr: &mut String, params: &mut Vec<String>) -> Result<(), String> {
    let mut literal = String::new();
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                check_param_name(&name, params)?;

                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(&format!("(?P<{name}>[^/]+?)"));
                params.push(name);
            }
            '*' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(".*");
            }
            other => literal.push(other),
        }
    }

    expr.push_str(&regex::escape(&literal));
    Ok(())
}

fn check_param_name(name: &str, seen: &[String]) -> Result<(), String> {
    match name.chars().next() {
        None => Err("parameter name missing after ':'".to_string()),
        Some(first) if first.is_ascii_digit() => {
            Err(format!("parameter name ':{name}' must not start with a digit"))
        }
        Some(_) if seen.iter().any(|p| p == name) => {
            Err(format!("parameter ':{name}' appears more than once"))
        }
        Some(_) => Ok(()),
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> PathPattern {
        PathPattern::compile(p).expect("pattern compiles")
    }

    #[test]
    fn test_literal_paths() {
        let p = pattern("/cache2s");
        assert!(p.is_match("/cache2s"));
        assert!(p.is_match("/cache2s/"));
        assert!(p.is_match("/CACHE2S"));
        assert!(!p.is_match("/cache2s/extra"));
        assert!(!p.is_match("/cache2"));
    }

    #[test]
    fn test_root() {
        let p = pattern("/");
        assert!(p.is_match("/"));
        assert!(!p.is_match("/a"));
    }

    #[test]
    fn test_named_segment() {
        let p = pattern("/posts/:id");
        assert!(p.is_match("/posts/42"));
        assert!(!p.is_match("/posts"));
        assert!(!p.is_match("/posts/42/comments"));
        assert_eq!(p.params(), ["id".to_string()]);
    }

    #[test]
    fn test_optional_segment() {
        let p = pattern("/users/:id?");
        assert!(p.is_match("/users"));
        assert!(p.is_match("/users/7"));
        assert!(!p.is_match("/users/7/8"));
    }

    #[test]
    fn test_params_inside_segment() {
        let p = pattern("/flights/:from-:to");
        assert!(p.is_match("/flights/ams-lhr"));
        assert!(!p.is_match("/flights/ams"));
    }

    #[test]
    fn test_wildcard() {
        let p = pattern("/static/*");
        assert!(p.is_match("/static/css/site.css"));
        assert!(p.is_match("/static/"));
        assert!(!p.is_match("/public/site.css"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = pattern("/v1.0/items");
        assert!(p.is_match("/v1.0/items"));
        assert!(!p.is_match("/v1x0/items"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::compile("cache").is_err());
        assert!(PathPattern::compile("/a/:").is_err());
        assert!(PathPattern::compile("/a/:1st").is_err());
        assert!(PathPattern::compile("/a/:id/b/:id").is_err());
    }
}

//! Path pattern matching.
//!
//! # Responsibilities
//! - Match request paths against policy patterns
//! - Capture named parameters for downstream handlers
//!
//! # Pattern syntax
//! - `literal` segments match exactly (case-sensitive)
//! - `{name}` matches one segment of ASCII digits and captures it
//! - `{*name}` matches the remainder of the path (possibly empty) and must be last
//!
//! # Design Decisions
//! - No regex to guarantee O(n) matching
//! - Trailing slashes are significant: `/users` does not match `/users/`

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Numeric(String),
    Rest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    NotAbsolute(String),

    #[error("wildcard must be the last segment: {0}")]
    WildcardNotLast(String),

    #[error("empty parameter name in: {0}")]
    EmptyName(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let rest = source
            .strip_prefix('/')
            .ok_or_else(|| PatternError::NotAbsolute(source.to_string()))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            for (i, part) in parts.iter().enumerate() {
                let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                    Some(inner) => {
                        if let Some(name) = inner.strip_prefix('*') {
                            if i + 1 != parts.len() {
                                return Err(PatternError::WildcardNotLast(source.to_string()));
                            }
                            Segment::Rest(non_empty(name, source)?)
                        } else {
                            Segment::Numeric(non_empty(inner, source)?)
                        }
                    }
                    None => Segment::Literal(part.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `path`, returning captured parameters on success.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest(name) => {
                    let tail = parts.get(i..).filter(|p| !p.is_empty())?;
                    params.insert(name.clone(), tail.join("/"));
                    return Some(params);
                }
                Segment::Literal(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Numeric(name) => {
                    let value = parts.get(i)?;
                    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                    params.insert(name.clone(), value.to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn non_empty(name: &str, source: &str) -> Result<String, PatternError> {
    if name.is_empty() {
        Err(PatternError::EmptyName(source.to_string()))
    } else {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_root() {
        let root = PathPattern::parse("/").unwrap();
        assert!(root.matches("/"));
        assert!(!root.matches("/users"));

        let users = PathPattern::parse("/users").unwrap();
        assert!(users.matches("/users"));
        assert!(!users.matches("/users/"));
        assert!(!users.matches("/Users"));
    }

    #[test]
    fn test_numeric_capture() {
        let pattern = PathPattern::parse("/projects/{id}/tasks/pending").unwrap();
        let params = pattern.captures("/projects/42/tasks/pending").unwrap();
        assert_eq!(params["id"], "42");

        assert!(!pattern.matches("/projects/abc/tasks/pending"));
        assert!(!pattern.matches("/projects/42/tasks"));
    }

    #[test]
    fn test_wildcard_tail() {
        let pattern = PathPattern::parse("/statistics/{*section}").unwrap();
        assert_eq!(pattern.captures("/statistics/7").unwrap()["section"], "7");
        assert_eq!(pattern.captures("/statistics/a/b").unwrap()["section"], "a/b");
        assert_eq!(pattern.captures("/statistics/").unwrap()["section"], "");
        assert!(!pattern.matches("/statistics"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(PathPattern::parse("users"), Err(PatternError::NotAbsolute(_))));
        assert!(matches!(
            PathPattern::parse("/{*all}/x"),
            Err(PatternError::WildcardNotLast(_))
        ));
        assert!(matches!(PathPattern::parse("/users/{}"), Err(PatternError::EmptyName(_))));
    }
}

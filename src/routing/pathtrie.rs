//! Segment trie over URL paths.
//!
//! # Responsibilities
//! - Store payloads under path patterns with static segments, `:name` wildcards
//!   and trailing `*name` / `**` catch-alls
//! - Reject ambiguous patterns at insertion time
//! - Look up a path with full backtracking, asking the caller whether a
//!   candidate payload accepts the request
//!
//! # Design Decisions
//! - One node per segment; static children are a hash map, at most one wildcard
//!   and one catch-all child per node
//! - Lookup order per node: static, wildcard (non-empty segment only), catch-all
//! - A catch-all also matches an empty remainder, so `/a/**` answers `/a`, `/a/`
//!   and `/a/x/y`
//! - Captured values are percent-decoded; the catch-all value has no leading slash

use std::collections::HashMap;

use thiserror::Error;

/// Parameter name used for `**` and bare `*` catch-alls.
pub const FREE_WILDCARD: &str = "*";

/// Captured path parameters in pattern order.
pub type Params = Vec<(String, String)>;

/// Errors raised while inserting a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    #[error("wildcard :{conflicting} in {pattern:?} conflicts with existing wildcard :{existing}")]
    WildcardConflict {
        pattern: String,
        existing: String,
        conflicting: String,
    },

    #[error("catch-all *{conflicting} in {pattern:?} conflicts with existing catch-all *{existing}")]
    CatchAllConflict {
        pattern: String,
        existing: String,
        conflicting: String,
    },

    #[error("path pattern {0:?} is already registered")]
    Duplicate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'p> {
    Static(&'p str),
    Wildcard(&'p str),
    CatchAll(&'p str),
}

#[derive(Debug)]
struct Node<T> {
    statics: HashMap<String, Node<T>>,
    wildcard: Option<Box<WildcardChild<T>>>,
    catch_all: Option<CatchAllChild<T>>,
    value: Option<T>,
}

#[derive(Debug)]
struct WildcardChild<T> {
    name: String,
    node: Node<T>,
}

#[derive(Debug)]
struct CatchAllChild<T> {
    name: String,
    value: T,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            statics: HashMap::new(),
            wildcard: None,
            catch_all: None,
            value: None,
        }
    }
}

/// A path trie mapping patterns to payloads.
#[derive(Debug)]
pub struct PathTrie<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

/// Split a path into segments. `/` has none, a trailing slash yields a final empty segment.
fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment<'_>>, TrieError> {
    let invalid = |reason| TrieError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let raw = split_segments(pattern);
    let last = raw.len().saturating_sub(1);
    let mut segments = Vec::with_capacity(raw.len());
    for (i, seg) in raw.into_iter().enumerate() {
        if let Some(name) = seg.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("empty wildcard name"));
            }
            segments.push(Segment::Wildcard(name));
        } else if let Some(name) = seg.strip_prefix('*') {
            if i != last {
                return Err(invalid("catch-all must be the last segment"));
            }
            let name = if name.is_empty() || name == "*" {
                FREE_WILDCARD
            } else {
                name
            };
            segments.push(Segment::CatchAll(name));
        } else {
            segments.push(Segment::Static(seg));
        }
    }
    Ok(segments)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `value` under `pattern`.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<(), TrieError> {
        let segments = parse_pattern(pattern)?;
        let mut node = &mut self.root;

        for segment in segments {
            match segment {
                Segment::Static(s) => {
                    node = node.statics.entry(s.to_string()).or_default();
                }
                Segment::Wildcard(name) => {
                    let child = node.wildcard.get_or_insert_with(|| {
                        Box::new(WildcardChild {
                            name: name.to_string(),
                            node: Node::default(),
                        })
                    });
                    if child.name != name {
                        return Err(TrieError::WildcardConflict {
                            pattern: pattern.to_string(),
                            existing: child.name.clone(),
                            conflicting: name.to_string(),
                        });
                    }
                    node = &mut child.node;
                }
                Segment::CatchAll(name) => {
                    // parse_pattern guarantees this is the last segment
                    if let Some(existing) = &node.catch_all {
                        if existing.name != name {
                            return Err(TrieError::CatchAllConflict {
                                pattern: pattern.to_string(),
                                existing: existing.name.clone(),
                                conflicting: name.to_string(),
                            });
                        }
                        return Err(TrieError::Duplicate(pattern.to_string()));
                    }
                    node.catch_all = Some(CatchAllChild {
                        name: name.to_string(),
                        value,
                    });
                    self.len += 1;
                    return Ok(());
                }
            }
        }

        if node.value.is_some() {
            return Err(TrieError::Duplicate(pattern.to_string()));
        }
        node.value = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Find the first payload registered for `path`, regardless of request conditions.
    pub fn lookup(&self, path: &str) -> Option<(&T, Params)> {
        self.lookup_with(path, |_| Some(()))
            .map(|(value, _, params)| (value, params))
    }

    /// Find the first payload for `path` that `accept` agrees to, backtracking
    /// into wildcard and catch-all alternatives when a candidate is refused.
    pub fn lookup_with<'t, R, F>(&'t self, path: &str, mut accept: F) -> Option<(&'t T, R, Params)>
    where
        F: FnMut(&'t T) -> Option<R>,
    {
        let segments = split_segments(path);
        let mut captured: Vec<(&'t str, String)> = Vec::new();
        let (value, accepted) = find(&self.root, &segments, &mut captured, &mut accept)?;
        let params = captured
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Some((value, accepted, params))
    }
}

fn find<'t, T, R, F>(
    node: &'t Node<T>,
    segments: &[&str],
    captured: &mut Vec<(&'t str, String)>,
    accept: &mut F,
) -> Option<(&'t T, R)>
where
    F: FnMut(&'t T) -> Option<R>,
{
    let Some((head, rest)) = segments.split_first() else {
        if let Some(value) = &node.value {
            if let Some(accepted) = accept(value) {
                return Some((value, accepted));
            }
        }
        return try_catch_all(node, String::new(), captured, accept);
    };

    if let Some(child) = node.statics.get(*head) {
        if let Some(found) = find(child, rest, captured, accept) {
            return Some(found);
        }
    }

    if !head.is_empty() {
        if let Some(wildcard) = &node.wildcard {
            captured.push((wildcard.name.as_str(), decode(head)));
            if let Some(found) = find(&wildcard.node, rest, captured, accept) {
                return Some(found);
            }
            captured.pop();
        }
    }

    if node.catch_all.is_none() {
        return None;
    }
    try_catch_all(node, decode(&segments.join("/")), captured, accept)
}

fn try_catch_all<'t, T, R, F>(
    node: &'t Node<T>,
    remainder: String,
    captured: &mut Vec<(&'t str, String)>,
    accept: &mut F,
) -> Option<(&'t T, R)>
where
    F: FnMut(&'t T) -> Option<R>,
{
    let catch_all = node.catch_all.as_ref()?;
    captured.push((catch_all.name.as_str(), remainder));
    match accept(&catch_all.value) {
        Some(accepted) => Some((&catch_all.value, accepted)),
        None => {
            captured.pop();
            None
        }
    }
}

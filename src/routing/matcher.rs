//! Request matcher.
//!
//! # Responsibilities
//! - Group compiled routes by normalized path and place the groups in the path trie
//! - Keep path-less routes in a root leaf list
//! - Match a request: trie first, root leaves second
//!
//! # Design Decisions
//! - One matcher per table generation, immutable after construction
//! - Groups are inserted in order of first appearance, so conflicts are reported
//!   against the later group deterministically
//! - A path route whose path equals a subtree base is promoted into the subtree
//!   group with an exact path condition
//! - Request paths are cleaned once per match; parameters are decoded by the trie

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::routing::error::DefinitionError;
use crate::routing::leaf::{match_leaves, sort_leaves, LeafMatcher};
use crate::routing::pathtrie::{PathTrie, FREE_WILDCARD};
use crate::routing::route::{CompiledRoute, TreePath};

/// Matching option bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchingOptions(u32);

impl MatchingOptions {
    pub const NONE: MatchingOptions = MatchingOptions(0);

    /// Match paths with and without a trailing slash equally.
    pub const IGNORE_TRAILING_SLASH: MatchingOptions = MatchingOptions(1);

    pub fn contains(self, other: MatchingOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn ignore_trailing_slash(self) -> bool {
        self.contains(Self::IGNORE_TRAILING_SLASH)
    }
}

impl std::ops::BitOr for MatchingOptions {
    type Output = MatchingOptions;

    fn bitor(self, rhs: Self) -> Self {
        MatchingOptions(self.0 | rhs.0)
    }
}

/// Clean a URL path: collapse repeated slashes, resolve `.` and `..`, keep a trailing slash.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    if cleaned.is_empty() || trailing {
        cleaned.push('/');
    }
    cleaned
}

fn normalize_path(path: &str, options: MatchingOptions) -> String {
    let mut cleaned = clean_path(path);
    if options.ignore_trailing_slash() && cleaned.len() > 1 && cleaned.ends_with('/') {
        cleaned.pop();
    }
    cleaned
}

/// Split a subtree argument into its base path and free wildcard name.
fn subtree_base(path: &str) -> (String, String) {
    let cleaned = clean_path(path);
    let trimmed = cleaned.trim_end_matches('/');
    if let Some(pos) = trimmed.rfind('/') {
        if let Some(name) = trimmed[pos + 1..].strip_prefix('*') {
            let name = if name.is_empty() || name == "*" {
                FREE_WILDCARD
            } else {
                name
            };
            return (trimmed[..pos].to_string(), name.to_string());
        }
    }
    (trimmed.to_string(), FREE_WILDCARD.to_string())
}

/// Name of a trailing `*name` segment in a path pattern.
fn free_wildcard_param(pattern: &str) -> Option<String> {
    let last = pattern.rsplit('/').next()?;
    let name = last.strip_prefix('*')?;
    if name.is_empty() || name == "*" {
        Some(FREE_WILDCARD.to_string())
    } else {
        Some(name.to_string())
    }
}

/// Trie payload: the ordered leaves of one path.
#[derive(Debug)]
pub struct PathMatcher {
    pub leaves: Vec<LeafMatcher>,
    pub free_wildcard_param: Option<String>,
}

/// Path parameters of a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A matched route and its path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<CompiledRoute>,
    pub params: PathParams,
}

#[derive(Debug)]
struct Group {
    key: String,
    subtree: bool,
    leaves: Vec<LeafMatcher>,
}

/// Trie plus root leaves for one table generation.
#[derive(Debug)]
pub struct Matcher {
    paths: PathTrie<PathMatcher>,
    root_leaves: Vec<LeafMatcher>,
    options: MatchingOptions,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            paths: PathTrie::new(),
            root_leaves: Vec::new(),
            options: MatchingOptions::NONE,
        }
    }
}

impl Matcher {
    /// Build a matcher. Routes of a group that could not be placed in the
    /// trie are returned with the cause.
    pub fn new(
        routes: Vec<Arc<CompiledRoute>>,
        options: MatchingOptions,
    ) -> (Self, Vec<(Arc<CompiledRoute>, DefinitionError)>) {
        let mut root_leaves = Vec::new();
        let mut groups: Vec<Group> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for route in routes {
            if route.tree_path == TreePath::None {
                root_leaves.push(LeafMatcher::new(route));
                continue;
            }

            let (key, subtree) = match &route.tree_path {
                TreePath::None => continue,
                TreePath::Path(p) => (normalize_path(p, options), false),
                TreePath::Subtree(p) => {
                    let (base, name) = subtree_base(p);
                    (format!("{}/*{}", base, name), true)
                }
            };

            let index = *by_key.entry(key.clone()).or_insert_with(|| {
                groups.push(Group {
                    key,
                    subtree,
                    leaves: Vec::new(),
                });
                groups.len() - 1
            });
            groups[index].leaves.push(LeafMatcher::new(route));
        }

        promote_into_subtrees(&mut groups, &by_key);

        let mut paths = PathTrie::new();
        let mut rejected = Vec::new();
        for mut group in groups {
            if group.leaves.is_empty() {
                continue;
            }

            sort_leaves(&mut group.leaves);
            let group_routes: Vec<Arc<CompiledRoute>> =
                group.leaves.iter().map(|leaf| leaf.route.clone()).collect();
            let payload = PathMatcher {
                leaves: group.leaves,
                free_wildcard_param: free_wildcard_param(&group.key),
            };

            if let Err(err) = paths.insert(&group.key, payload) {
                tracing::warn!(path = %group.key, error = %err, routes = group_routes.len(), "path conflict");
                rejected.extend(
                    group_routes
                        .into_iter()
                        .map(|route| (route, DefinitionError::PathConflict(err.clone()))),
                );
            }
        }

        sort_leaves(&mut root_leaves);

        (
            Self {
                paths,
                root_leaves,
                options,
            },
            rejected,
        )
    }

    /// Match a request against the trie, then against the path-less routes.
    pub fn match_request(&self, req: &Request<Body>) -> Option<RouteMatch> {
        let path = normalize_path(req.uri().path(), self.options);

        let found = self
            .paths
            .lookup_with(&path, |pm| match_leaves(&pm.leaves, req, &path));
        if let Some((pm, leaf, params)) = found {
            let mut params: HashMap<String, String> = params.into_iter().collect();
            if let Some(name) = &pm.free_wildcard_param {
                if let Some(value) = params.get_mut(name) {
                    value.insert(0, '/');
                }
            }
            return Some(RouteMatch {
                route: leaf.route.clone(),
                params: PathParams(params),
            });
        }

        match_leaves(&self.root_leaves, req, &path).map(|leaf| RouteMatch {
            route: leaf.route.clone(),
            params: PathParams::default(),
        })
    }
}

fn has_wildcards(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with(':') || segment.starts_with('*'))
}

/// Move path groups whose path equals a subtree base into that subtree group.
///
/// Wildcard paths stay in place: the trie holds them as the node value next
/// to the subtree's catch-all, and an exact-path comparison could never match.
fn promote_into_subtrees(groups: &mut [Group], by_key: &HashMap<String, usize>) {
    let subtrees: HashMap<String, usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.subtree)
        .filter_map(|(i, g)| {
            let base = g.key.rsplit_once("/*").map(|(base, _)| base)?;
            Some((base.to_string(), i))
        })
        .collect();
    if subtrees.is_empty() {
        return;
    }

    for (key, &index) in by_key {
        if groups[index].subtree || has_wildcards(key) {
            continue;
        }
        let base = key.trim_end_matches('/');
        let Some(&target) = subtrees.get(base) else {
            continue;
        };

        let moved: Vec<LeafMatcher> = groups[index]
            .leaves
            .drain(..)
            .map(|leaf| LeafMatcher::with_exact_path(leaf.route, Some(key.clone())))
            .collect();
        groups[target].leaves.extend(moved);
    }
}

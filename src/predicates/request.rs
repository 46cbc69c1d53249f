//! Query and cookie predicates.
//!
//! - `QueryParam(name)` / `QueryParam(name, regexp)`
//! - `Cookie(name)` / `Cookie(name, regexp)`
//!
//! With one argument the parameter or cookie only has to be present.

use axum::body::Body;
use axum::http::{header, Request};
use regex::Regex;

use crate::routing::definition::{expect_args, string_arg, Arg, ArgumentError};
use crate::routing::registry::{Predicate, PredicateSpec};

fn parse_args(args: &[Arg]) -> Result<(String, Option<Regex>), ArgumentError> {
    expect_args(args, 1, 2)?;
    let name = string_arg(args, 0)?.to_string();
    let pattern = if args.len() == 2 {
        let raw = string_arg(args, 1)?;
        Some(Regex::new(raw).map_err(|err| ArgumentError::Invalid(err.to_string()))?)
    } else {
        None
    };
    Ok((name, pattern))
}

fn value_matches(pattern: &Option<Regex>, value: &str) -> bool {
    pattern.as_ref().map_or(true, |re| re.is_match(value))
}

#[derive(Debug, Clone, Copy)]
pub struct QueryParamSpec;

impl PredicateSpec for QueryParamSpec {
    fn name(&self) -> &str {
        "QueryParam"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgumentError> {
        let (name, pattern) = parse_args(args)?;
        Ok(Box::new(QueryParam { name, pattern }))
    }
}

#[derive(Debug, Clone)]
pub struct QueryParam {
    name: String,
    pattern: Option<Regex>,
}

impl Predicate for QueryParam {
    fn matches(&self, req: &Request<Body>) -> bool {
        let Some(query) = req.uri().query() else {
            return false;
        };
        url::form_urlencoded::parse(query.as_bytes())
            .any(|(key, value)| key == self.name && value_matches(&self.pattern, &value))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieSpec;

impl PredicateSpec for CookieSpec {
    fn name(&self) -> &str {
        "Cookie"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgumentError> {
        let (name, pattern) = parse_args(args)?;
        Ok(Box::new(Cookie { name, pattern }))
    }
}

#[derive(Debug, Clone)]
pub struct Cookie {
    name: String,
    pattern: Option<Regex>,
}

impl Predicate for Cookie {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|h| h.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(key, value)| key == self.name && value_matches(&self.pattern, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("Cookie", cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_query_param() {
        let present = QueryParamSpec.create(&["debug".into()]).unwrap();
        let pattern = QueryParamSpec.create(&["lang".into(), "^(en|de)$".into()]).unwrap();

        assert!(present.matches(&request("/?debug=", None)));
        assert!(!present.matches(&request("/?other=1", None)));
        assert!(!present.matches(&request("/", None)));

        assert!(pattern.matches(&request("/?x=1&lang=de", None)));
        assert!(!pattern.matches(&request("/?lang=fr", None)));
    }

    #[test]
    fn test_cookie() {
        let predicate = CookieSpec.create(&["session".into(), "^[a-f0-9]+$".into()]).unwrap();

        assert!(predicate.matches(&request("/", Some("theme=dark; session=abc123"))));
        assert!(!predicate.matches(&request("/", Some("session=XYZ"))));
        assert!(!predicate.matches(&request("/", None)));
    }

    #[test]
    fn test_invalid_regex() {
        let result = CookieSpec.create(&["session".into(), "(".into()]);
        assert!(matches!(result, Err(ArgumentError::Invalid(_))));
    }
}

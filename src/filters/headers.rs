//! Header manipulation filters.
//!
//! - `setRequestHeader(name, value)`, `setResponseHeader(name, value)`
//! - `appendRequestHeader(name, value)`, `appendResponseHeader(name, value)`
//! - `dropRequestHeader(name)`, `dropResponseHeader(name)`

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response};

use crate::routing::definition::{expect_args, string_arg, Arg, ArgumentError};
use crate::routing::registry::{Filter, FilterSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Set,
    Append,
    Drop,
}

/// Spec for one header filter variant.
#[derive(Debug, Clone)]
pub struct HeaderFilterSpec {
    name: &'static str,
    direction: Direction,
    action: Action,
}

/// All header filter specs.
pub fn specs() -> Vec<HeaderFilterSpec> {
    let variant = |name, direction, action| HeaderFilterSpec {
        name,
        direction,
        action,
    };
    vec![
        variant("setRequestHeader", Direction::Request, Action::Set),
        variant("setResponseHeader", Direction::Response, Action::Set),
        variant("appendRequestHeader", Direction::Request, Action::Append),
        variant("appendResponseHeader", Direction::Response, Action::Append),
        variant("dropRequestHeader", Direction::Request, Action::Drop),
        variant("dropResponseHeader", Direction::Response, Action::Drop),
    ]
}

impl FilterSpec for HeaderFilterSpec {
    fn name(&self) -> &str {
        self.name
    }

    fn create_filter(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgumentError> {
        let value = if self.action == Action::Drop {
            expect_args(args, 1, 1)?;
            None
        } else {
            expect_args(args, 2, 2)?;
            let raw = string_arg(args, 1)?;
            let value = HeaderValue::from_str(raw)
                .map_err(|_| ArgumentError::Invalid(format!("invalid header value {:?}", raw)))?;
            Some(value)
        };

        let raw = string_arg(args, 0)?;
        let name = HeaderName::from_bytes(raw.as_bytes())
            .map_err(|_| ArgumentError::Invalid(format!("invalid header name {:?}", raw)))?;

        Ok(Box::new(HeaderFilter {
            direction: self.direction,
            action: self.action,
            name,
            value,
        }))
    }
}

/// A configured header filter instance.
#[derive(Debug)]
pub struct HeaderFilter {
    direction: Direction,
    action: Action,
    name: HeaderName,
    value: Option<HeaderValue>,
}

impl HeaderFilter {
    fn apply(&self, headers: &mut HeaderMap) {
        match (self.action, &self.value) {
            (Action::Set, Some(value)) => {
                headers.insert(self.name.clone(), value.clone());
            }
            (Action::Append, Some(value)) => {
                headers.append(self.name.clone(), value.clone());
            }
            _ => {
                headers.remove(&self.name);
            }
        }
    }
}

impl Filter for HeaderFilter {
    fn request(&self, req: &mut Request<Body>) {
        if self.direction == Direction::Request {
            self.apply(req.headers_mut());
        }
    }

    fn response(&self, res: &mut Response<Body>) {
        if self.direction == Direction::Response {
            self.apply(res.headers_mut());
        }
    }
}

//! `HostAny(host, ...)`: exact, case-insensitive host match against a list.

use axum::body::Body;
use axum::http::{header, Request};

use crate::routing::definition::{string_arg, Arg, ArgumentError};
use crate::routing::registry::{Predicate, PredicateSpec};

#[derive(Debug, Clone, Copy)]
pub struct HostAnySpec;

impl PredicateSpec for HostAnySpec {
    fn name(&self) -> &str {
        "HostAny"
    }

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgumentError> {
        if args.is_empty() {
            return Err(ArgumentError::Count {
                expected: "at least 1".to_string(),
                got: 0,
            });
        }
        let hosts = (0..args.len())
            .map(|i| string_arg(args, i).map(str::to_lowercase))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(HostAny { hosts }))
    }
}

/// Matches when the Host header equals one of the hosts, with or without its port.
#[derive(Debug, Clone)]
pub struct HostAny {
    hosts: Vec<String>,
}

impl Predicate for HostAny {
    fn matches(&self, req: &Request<Body>) -> bool {
        let Some(host) = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_lowercase)
        else {
            return false;
        };
        let bare = host.rsplit_once(':').map_or(host.as_str(), |(name, _)| name);
        self.hosts.iter().any(|h| *h == host || h == bare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(host: &str) -> Request<Body> {
        Request::builder().header("Host", host).body(Body::default()).unwrap()
    }

    #[test]
    fn test_host_any() {
        let predicate = HostAnySpec.create(&["example.com".into(), "www.example.com".into()]).unwrap();

        assert!(predicate.matches(&request("example.com")));
        assert!(predicate.matches(&request("WWW.EXAMPLE.COM")));
        assert!(predicate.matches(&request("example.com:8080")));
        assert!(!predicate.matches(&request("other.com")));
        assert!(!predicate.matches(&Request::new(Body::default())));
    }

    #[test]
    fn test_requires_hosts() {
        assert!(HostAnySpec.create(&[]).is_err());
        assert!(HostAnySpec.create(&[Arg::Bool(true)]).is_err());
    }
}

//! Algorithm provisioning.
//!
//! # Responsibilities
//! - Parse the endpoints of every load-balanced route
//! - Resolve the algorithm name and create a fresh instance per route
//! - Reject load-balanced routes without endpoints, with unknown algorithms
//!   or with a fade-in exponent that is not a finite positive number

use crate::load_balancer::{AlgorithmKind, LbEndpoint, LoadBalancedBackend, DEFAULT_POWER_OF_N_CHOICES};
use crate::routing::builder::PostProcessor;
use crate::routing::definition::Backend;
use crate::routing::error::{DefinitionError, InvalidRoute};
use crate::routing::route::CompiledRoute;

/// Attaches endpoints and an algorithm to load-balanced routes.
#[derive(Debug, Clone)]
pub struct AlgorithmProvider {
    power_of_n_choices: usize,
}

impl Default for AlgorithmProvider {
    fn default() -> Self {
        Self::new(DEFAULT_POWER_OF_N_CHOICES)
    }
}

impl AlgorithmProvider {
    pub fn new(power_of_n_choices: usize) -> Self {
        Self { power_of_n_choices }
    }

    fn provision(&self, route: &mut CompiledRoute) -> Result<(), DefinitionError> {
        let Backend::LoadBalanced {
            endpoints,
            algorithm,
            fade_in,
        } = &route.definition.backend
        else {
            return Ok(());
        };

        if endpoints.is_empty() {
            return Err(DefinitionError::NoEndpoints);
        }

        let parsed = endpoints
            .iter()
            .map(|e| LbEndpoint::parse(e))
            .collect::<Result<Vec<_>, _>>()?;
        let kind: AlgorithmKind = algorithm.parse()?;

        if let Some(fade_in) = fade_in {
            if !fade_in.exponent.is_finite() || fade_in.exponent <= 0.0 {
                return Err(DefinitionError::InvalidFadeIn(fade_in.exponent));
            }
        }

        route.load_balancer = Some(LoadBalancedBackend {
            algorithm: kind.create(parsed.len(), self.power_of_n_choices),
            endpoints: parsed,
            fade_in: *fade_in,
        });
        Ok(())
    }
}

impl PostProcessor for AlgorithmProvider {
    fn name(&self) -> &'static str {
        "algorithm-provider"
    }

    fn process(&self, routes: Vec<CompiledRoute>) -> (Vec<CompiledRoute>, Vec<InvalidRoute>) {
        let mut valid = Vec::with_capacity(routes.len());
        let mut invalid = Vec::new();

        for mut route in routes {
            match self.provision(&mut route) {
                Ok(()) => valid.push(route),
                Err(err) => {
                    tracing::error!(route_id = %route.id, error = %err, "failed to provision load balanced route");
                    invalid.push(InvalidRoute::new(route.index, route.definition.clone(), err));
                }
            }
        }

        (valid, invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::definition::{FadeIn, RouteDefinition};
    use crate::routing::route::{Conditions, TreePath};
    use std::sync::Arc;
    use std::time::Duration;

    fn compiled(index: usize, backend: Backend) -> CompiledRoute {
        let definition = Arc::new(RouteDefinition::new(format!("r{}", index), backend));
        CompiledRoute {
            id: definition.id.clone(),
            index,
            definition,
            scheme: String::new(),
            host: String::new(),
            filters: Vec::new(),
            predicates: Vec::new(),
            conditions: Conditions::default(),
            tree_path: TreePath::None,
            load_balancer: None,
        }
    }

    #[test]
    fn test_provisions_load_balanced_routes() {
        let mut fading = Backend::load_balanced(&["http://a", "https://b:8443"], "consistentHash");
        if let Backend::LoadBalanced { fade_in, .. } = &mut fading {
            *fade_in = Some(FadeIn::new(Duration::from_secs(10), 2.0));
        }
        let routes = vec![
            compiled(0, Backend::load_balanced(&["http://a", "http://b"], "")),
            compiled(1, fading),
            compiled(2, Backend::network("http://c")),
        ];

        let (valid, invalid) = AlgorithmProvider::default().process(routes);
        assert!(invalid.is_empty());
        assert_eq!(valid.len(), 3);

        let lb = valid[0].load_balancer.as_ref().unwrap();
        assert_eq!(lb.algorithm.kind(), AlgorithmKind::RoundRobin);
        assert_eq!(lb.endpoints[1].host, "b:80");

        let lb = valid[1].load_balancer.as_ref().unwrap();
        assert_eq!(lb.algorithm.kind(), AlgorithmKind::ConsistentHash);
        assert_eq!(lb.endpoints[1].host, "b:8443");
        assert_eq!(lb.fade_in.unwrap().exponent, 2.0);

        assert!(valid[2].load_balancer.is_none());
    }

    #[test]
    fn test_rejects_invalid_load_balanced_routes() {
        let routes = vec![
            compiled(0, Backend::load_balanced(&[], "random")),
            compiled(1, Backend::load_balanced(&["http://a"], "fastest")),
            compiled(2, Backend::load_balanced(&["not a url"], "random")),
            compiled(3, Backend::load_balanced(&["http://a"], "random")),
        ];

        let (valid, invalid) = AlgorithmProvider::default().process(routes);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].id, "r3");

        assert_eq!(invalid.len(), 3);
        assert_eq!(invalid[0].error, DefinitionError::NoEndpoints);
        assert_eq!(invalid[1].error, DefinitionError::UnknownAlgorithm("fastest".into()));
        assert!(matches!(invalid[2].error, DefinitionError::InvalidEndpoint { .. }));
        assert_eq!(invalid[1].index, 1);
    }

    #[test]
    fn test_rejects_invalid_fade_in_exponent() {
        let with_exponent = |index, exponent| {
            let mut backend = Backend::load_balanced(&["http://a", "http://b"], "random");
            if let Backend::LoadBalanced { fade_in, .. } = &mut backend {
                *fade_in = Some(FadeIn::new(Duration::from_secs(10), exponent));
            }
            compiled(index, backend)
        };
        let routes = vec![
            with_exponent(0, f64::NAN),
            with_exponent(1, -1.0),
            with_exponent(2, 0.0),
            with_exponent(3, f64::INFINITY),
            with_exponent(4, 0.5),
        ];

        let (valid, invalid) = AlgorithmProvider::default().process(routes);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].id, "r4");

        let indices: Vec<_> = invalid.iter().map(|i| i.index).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
        assert!(invalid
            .iter()
            .all(|i| matches!(i.error, DefinitionError::InvalidFadeIn(_))));
    }
}

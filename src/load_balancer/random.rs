//! Random load balancing strategy.

use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{fade_in, Algorithm, AlgorithmKind, LbContext, LbEndpoint};

/// Uniform random selector, seeded from its creation time.
#[derive(Debug)]
pub struct RandomChoice {
    rng: Mutex<StdRng>,
}

impl Default for RandomChoice {
    fn default() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(seed)
    }
}

impl RandomChoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Algorithm for RandomChoice {
    fn select<'a>(&self, ctx: &LbContext<'a>) -> Option<&'a LbEndpoint> {
        let len = ctx.endpoints.len();
        if len <= 1 {
            return ctx.endpoints.first();
        }

        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let index = rng.gen_range(0..len);
            fade_in::apply(ctx, index, &mut *rng)
        };
        ctx.endpoints.get(index)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_covers_all_endpoints() {
        let eps: Vec<_> = ["http://a", "http://b", "http://c", "http://d"]
            .iter()
            .map(|e| LbEndpoint::parse(e).unwrap())
            .collect();
        let lb = RandomChoice::with_seed(42);
        let ctx = LbContext::new(&eps);

        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            let selected = lb.select(&ctx).unwrap();
            counts[eps.iter().position(|e| e.host == selected.host).unwrap()] += 1;
        }
        for count in counts {
            assert!((800..1200).contains(&count), "skewed distribution {:?}", counts);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let eps: Vec<_> = ["http://a", "http://b", "http://c"]
            .iter()
            .map(|e| LbEndpoint::parse(e).unwrap())
            .collect();
        let ctx = LbContext::new(&eps);
        let a = RandomChoice::with_seed(9);
        let b = RandomChoice::with_seed(9);
        for _ in 0..20 {
            assert_eq!(a.select(&ctx).unwrap().host, b.select(&ctx).unwrap().host);
        }
    }
}

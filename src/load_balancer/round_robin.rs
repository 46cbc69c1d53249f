//! Round-robin load balancing strategy.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{fade_in, Algorithm, AlgorithmKind, LbContext, LbEndpoint};

#[derive(Debug)]
struct State {
    cursor: usize,
    rng: StdRng,
}

/// Round-robin selector.
/// The cursor starts at a random index so replicas don't restart in lockstep.
#[derive(Debug)]
pub struct RoundRobin {
    state: Mutex<State>,
}

impl RoundRobin {
    pub fn new(endpoints: usize) -> Self {
        let mut rng = StdRng::from_entropy();
        let cursor = rng.gen_range(0..endpoints.max(1));
        Self::with_state(cursor, rng)
    }

    fn with_state(cursor: usize, rng: StdRng) -> Self {
        Self {
            state: Mutex::new(State { cursor, rng }),
        }
    }
}

impl Algorithm for RoundRobin {
    fn select<'a>(&self, ctx: &LbContext<'a>) -> Option<&'a LbEndpoint> {
        let len = ctx.endpoints.len();
        if len <= 1 {
            return ctx.endpoints.first();
        }

        let index = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.cursor = (state.cursor + 1) % len;
            let cursor = state.cursor;
            fade_in::apply(ctx, cursor, &mut state.rng)
        };
        ctx.endpoints.get(index)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<LbEndpoint> {
        (0..n)
            .map(|i| LbEndpoint::parse(&format!("http://10.0.0.{}:8080", i + 1)).unwrap())
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::with_state(0, StdRng::seed_from_u64(1));
        let eps = endpoints(2);
        let ctx = LbContext::new(&eps);

        let s1 = lb.select(&ctx).unwrap();
        assert_eq!(s1.host, eps[1].host);

        let s2 = lb.select(&ctx).unwrap();
        assert_eq!(s2.host, eps[0].host);

        let s3 = lb.select(&ctx).unwrap();
        assert_eq!(s3.host, eps[1].host);
    }

    #[test]
    fn test_even_distribution_from_random_start() {
        let eps = endpoints(3);
        let lb = RoundRobin::new(eps.len());
        let ctx = LbContext::new(&eps);

        let mut counts = [0usize; 3];
        for _ in 0..300 {
            let selected = lb.select(&ctx).unwrap();
            let i = eps.iter().position(|e| e.host == selected.host).unwrap();
            counts[i] += 1;
        }
        assert_eq!(counts, [100, 100, 100]);
    }

    #[test]
    fn test_single_endpoint() {
        let eps = endpoints(1);
        let lb = RoundRobin::new(1);
        for _ in 0..3 {
            assert_eq!(lb.select(&LbContext::new(&eps)).unwrap().host, eps[0].host);
        }
    }
}

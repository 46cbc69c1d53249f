//! Power-of-random-N-choices load balancing strategy.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{fade_in, Algorithm, AlgorithmKind, LbContext, LbEndpoint};

/// Draws N random endpoints and selects the one with the fewest in-flight requests.
/// In case of a tie, the first draw is kept.
#[derive(Debug)]
pub struct PowerOfRandomNChoices {
    rng: Mutex<StdRng>,
    choices: usize,
}

impl PowerOfRandomNChoices {
    pub fn new(choices: usize) -> Self {
        Self::with_rng(choices, StdRng::from_entropy())
    }

    fn with_rng(choices: usize, rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            choices: choices.max(1),
        }
    }

    pub fn choices(&self) -> usize {
        self.choices
    }
}

/// Higher is better.
fn score(endpoint: &LbEndpoint) -> i64 {
    -endpoint.metrics.inflight()
}

impl Algorithm for PowerOfRandomNChoices {
    fn select<'a>(&self, ctx: &LbContext<'a>) -> Option<&'a LbEndpoint> {
        let len = ctx.endpoints.len();
        if len <= 1 {
            return ctx.endpoints.first();
        }

        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let mut best = rng.gen_range(0..len);
            for _ in 1..self.choices {
                let candidate = rng.gen_range(0..len);
                if score(&ctx.endpoints[candidate]) > score(&ctx.endpoints[best]) {
                    best = candidate;
                }
            }
            fade_in::apply(ctx, best, &mut *rng)
        };
        ctx.endpoints.get(index)
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::PowerOfRandomNChoices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Vec<LbEndpoint> {
        vec![
            LbEndpoint::parse("http://127.0.0.1:8080").unwrap(),
            LbEndpoint::parse("http://127.0.0.1:8081").unwrap(),
        ]
    }

    #[test]
    fn test_prefers_fewer_inflight() {
        let eps = endpoints();
        // artificially load the first endpoint
        let _guards: Vec<_> = (0..5).map(|_| eps[0].acquire()).collect();

        // with many draws both endpoints are almost surely among the candidates
        let lb = PowerOfRandomNChoices::with_rng(16, StdRng::seed_from_u64(3));
        let ctx = LbContext::new(&eps);
        for _ in 0..20 {
            assert_eq!(lb.select(&ctx).unwrap().host, eps[1].host);
        }
    }

    #[test]
    fn test_single_choice_is_random() {
        let eps = endpoints();
        let _guards: Vec<_> = (0..5).map(|_| eps[0].acquire()).collect();

        let lb = PowerOfRandomNChoices::with_rng(1, StdRng::seed_from_u64(5));
        let ctx = LbContext::new(&eps);
        let picked_loaded = (0..200)
            .filter(|_| lb.select(&ctx).unwrap().host == eps[0].host)
            .count();
        assert!(picked_loaded > 50 && picked_loaded < 150);
    }

    #[test]
    fn test_choices_at_least_one() {
        assert_eq!(PowerOfRandomNChoices::new(0).choices(), 1);
        assert_eq!(PowerOfRandomNChoices::new(3).choices(), 3);
    }
}

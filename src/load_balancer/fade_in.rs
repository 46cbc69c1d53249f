//! Fade-in weighting for recently detected endpoints.
//!
//! An endpoint detected `t` ago with fade-in duration `d` has weight
//! `(t / d) ^ exponent`, and weight 1 once the window has passed. A chosen
//! endpoint is kept with probability equal to its weight; otherwise the choice
//! is redrawn proportionally to all weights, so selection shares converge to
//! the weight ratio regardless of the underlying algorithm.

use std::time::Instant;

use rand::Rng;

use crate::load_balancer::{LbContext, LbEndpoint};
use crate::routing::definition::FadeIn;

/// Selection weight in `[0, 1]` of an endpoint detected at `detected`.
pub fn weight(fade_in: &FadeIn, detected: Instant, now: Instant) -> f64 {
    let duration = fade_in.duration();
    if duration.is_zero() {
        return 1.0;
    }

    let elapsed = now.saturating_duration_since(detected);
    if elapsed >= duration {
        return 1.0;
    }

    let relative = elapsed.as_secs_f64() / duration.as_secs_f64();
    relative.powf(fade_in.exponent).clamp(0.0, 1.0)
}

fn endpoint_weight(ctx: &LbContext<'_>, fade_in: &FadeIn, endpoint: &LbEndpoint) -> f64 {
    weight(fade_in, endpoint.metrics.detected(), ctx.now)
}

/// Whether the endpoint is still inside its fade-in window.
pub fn is_fading(ctx: &LbContext<'_>, endpoint: &LbEndpoint) -> bool {
    ctx.fade_in
        .map(|f| endpoint_weight(ctx, &f, endpoint) < 1.0)
        .unwrap_or(false)
}

/// Indices of endpoints past their fade-in window.
pub fn settled_indices(ctx: &LbContext<'_>) -> Vec<usize> {
    ctx.endpoints
        .iter()
        .enumerate()
        .filter(|(_, ep)| !is_fading(ctx, ep))
        .map(|(i, _)| i)
        .collect()
}

/// Keep the chosen index with probability equal to its weight, otherwise
/// redraw proportionally to all endpoint weights.
pub fn apply<R: Rng>(ctx: &LbContext<'_>, chosen: usize, rng: &mut R) -> usize {
    let Some(fade_in) = ctx.fade_in else {
        return chosen;
    };
    let Some(endpoint) = ctx.endpoints.get(chosen) else {
        return chosen;
    };

    let w = endpoint_weight(ctx, &fade_in, endpoint);
    if w >= 1.0 || rng.gen::<f64>() < w {
        return chosen;
    }

    weighted_choice(ctx, &fade_in, rng).unwrap_or(chosen)
}

fn weighted_choice<R: Rng>(ctx: &LbContext<'_>, fade_in: &FadeIn, rng: &mut R) -> Option<usize> {
    let weights: Vec<f64> = ctx
        .endpoints
        .iter()
        .map(|ep| endpoint_weight(ctx, fade_in, ep))
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let target = rng.gen::<f64>() * total;
    let mut upto = 0.0;
    for (i, w) in weights.iter().enumerate() {
        upto += w;
        if upto > target {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

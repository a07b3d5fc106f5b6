//! Deterministic roaming traffic.
//!
//! RULE: replayed scenarios never call a platform RNG. Every session is
//! drawn from one `TrafficRng` seeded by the caller, so the same seed
//! produces the same invocation stream and the same clock advances.

use crate::{command::Invocation, record::Operator, seed};
use chrono::Duration;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Chance that a session discovers the subscriber's own operator (denied).
const SAME_OPERATOR_CHANCE: f64 = 0.05;
/// Chance that a session is an inbound call instead of an outbound one.
const INBOUND_CHANCE: f64 = 0.25;
/// Chance that a paid call is followed by an overage check.
const OVERAGE_CHANCE: f64 = 0.10;
/// Upper bound of a generated call, in seconds.
const MAX_CALL_SECONDS: u64 = 45 * 60;

const VISITED: [(&str, f64, f64); 5] = [
    ("LONDON", 51.5072, -0.1276),
    ("PARIS", 48.8566, 2.3522),
    ("NEW YORK", 40.7128, -74.0060),
    ("TOKYO", 35.6762, 139.6503),
    ("MADRID", 40.4168, -3.7038),
];

/// Seeded RNG stream for traffic generation.
pub struct TrafficRng {
    inner: Pcg64Mcg,
}

impl TrafficRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.next_u64_below(items.len() as u64) as usize]
    }
}

/// One invocation plus how far the clock moves before it is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficStep {
    pub advance: Duration,
    pub invocation: Invocation,
}

/// Generates complete roaming sessions against the seeded inventory.
pub struct TrafficGenerator {
    rng: TrafficRng,
    subscribers: Vec<(String, Operator)>,
}

impl TrafficGenerator {
    pub fn new(seed: u64) -> Self {
        let subscribers = seed::inventory()
            .into_iter()
            .map(|e| (e.key, e.home_operator))
            .collect();
        Self { rng: TrafficRng::new(seed), subscribers }
    }

    /// One session: discovery, authentication, rating, a call, payment and
    /// sometimes an overage check.
    pub fn session(&mut self) -> Vec<TrafficStep> {
        let (key, home) = self.rng.pick(&self.subscribers).clone();
        let serving = if self.rng.chance(SAME_OPERATOR_CHANCE) {
            home
        } else {
            partner_of(home)
        };
        let &(city, lat, long) = self.rng.pick(&VISITED);
        let destination = format!("1555{:07}", self.rng.next_u64_below(10_000_000));
        let call_start = if self.rng.chance(INBOUND_CHANCE) { "CallIn" } else { "CallOut" };
        let call_seconds = 1 + self.rng.next_u64_below(MAX_CALL_SECONDS) as i64;

        let setup_gap = Duration::seconds(1 + self.rng.next_u64_below(30) as i64);
        let mut steps = vec![
            step(setup_gap, "discoverRP", [
                key.clone(),
                serving.code().to_string(),
                city.to_string(),
                lat.to_string(),
                long.to_string(),
            ]),
            step(Duration::seconds(1), "authentication", [key.clone()]),
            step(Duration::seconds(1), "updateRates", [key.clone()]),
            step(Duration::seconds(5), call_start, [key.clone(), destination]),
            step(Duration::seconds(call_seconds), "CallEnd", [key.clone()]),
            step(Duration::seconds(2), "CallPay", [key.clone()]),
        ];
        if self.rng.chance(OVERAGE_CHANCE) {
            steps.push(step(Duration::seconds(1), "Overage", [key]));
        }
        steps
    }

    /// Concatenated sessions totalling at least `min_steps` steps.
    pub fn steps(&mut self, min_steps: usize) -> Vec<TrafficStep> {
        let mut all = Vec::with_capacity(min_steps + 7);
        while all.len() < min_steps {
            all.extend(self.session());
        }
        all
    }
}

fn partner_of(home: Operator) -> Operator {
    match home {
        Operator::Abc => Operator::Xyz,
        Operator::Xyz => Operator::Abc,
    }
}

fn step<const N: usize>(advance: Duration, function: &str, args: [String; N]) -> TrafficStep {
    TrafficStep { advance, invocation: Invocation::new(function, args) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = TrafficGenerator::new(7).steps(100);
        let b = TrafficGenerator::new(7).steps(100);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = TrafficGenerator::new(1).steps(50);
        let b = TrafficGenerator::new(2).steps(50);
        assert_ne!(a, b);
    }

    #[test]
    fn every_session_parses() {
        let mut generator = TrafficGenerator::new(0xC0FFEE);
        for _ in 0..50 {
            let session = generator.session();
            assert!(session.len() >= 6);
            assert_eq!(session[0].invocation.function, "discoverRP");
            for s in &session {
                s.invocation.parse().expect("generated invocation parses");
            }
        }
    }
}

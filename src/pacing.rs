use std::time::Duration;

use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    Fixed(Duration),
    /// Uniform over `min..=max`.
    Jitter { min: Duration, max: Duration },
}

impl DelayPolicy {
    pub fn jitter((min, max): (Duration, Duration)) -> Self {
        DelayPolicy::Jitter { min, max }
    }

    fn sample(&self) -> Duration {
        match *self {
            DelayPolicy::Fixed(d) => d,
            DelayPolicy::Jitter { min, max } => {
                let lo = min.min(max).as_millis() as u64;
                let hi = min.max(max).as_millis() as u64;
                Duration::from_millis(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

/// Delays between page interactions. The first `challenge_requests`
/// interactions of a run wait `initial_settle` instead of the page policy.
#[derive(Debug)]
pub struct Pacer {
    interactions: u64,
    challenge_requests: u64,
    initial_settle: Duration,
}

impl Pacer {
    pub fn new(initial_settle: Duration, challenge_requests: u32) -> Self {
        Self {
            interactions: 0,
            challenge_requests: challenge_requests as u64,
            initial_settle,
        }
    }

    pub fn interactions(&self) -> u64 {
        self.interactions
    }

    pub fn next_delay(&mut self, policy: &DelayPolicy) -> Duration {
        let delay = if self.interactions < self.challenge_requests {
            self.initial_settle.max(policy.sample())
        } else {
            policy.sample()
        };
        self.interactions += 1;
        delay
    }

    pub async fn settle(&mut self, policy: &DelayPolicy) {
        let delay = self.next_delay(policy);
        if delay.is_zero() {
            return;
        }
        debug!(
            "Settling for {:.1}s before interaction {}",
            delay.as_secs_f64(),
            self.interactions()
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn challenge_phase_then_policy() {
        let mut p = Pacer::new(ms(10_000), 2);
        let policy = DelayPolicy::Fixed(ms(2000));
        assert_eq!(p.next_delay(&policy), ms(10_000));
        assert_eq!(p.next_delay(&policy), ms(10_000));
        assert_eq!(p.next_delay(&policy), ms(2000));
        assert_eq!(p.interactions(), 3);
    }

    #[test]
    fn jitter_stays_in_range() {
        let mut p = Pacer::new(Duration::ZERO, 0);
        let policy = DelayPolicy::jitter((ms(4000), ms(6000)));
        for _ in 0..200 {
            let d = p.next_delay(&policy);
            assert!(d >= ms(4000) && d <= ms(6000), "{:?}", d);
        }
    }

    #[test]
    fn degenerate_jitter() {
        let mut p = Pacer::new(Duration::ZERO, 0);
        assert_eq!(p.next_delay(&DelayPolicy::jitter((ms(5), ms(5)))), ms(5));
        let swapped = p.next_delay(&DelayPolicy::jitter((ms(9), ms(3))));
        assert!(swapped >= ms(3) && swapped <= ms(9));
    }
}

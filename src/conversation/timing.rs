//! Synthesized conversation clock
//!
//! Logged wall-clock times reflect API latency, not how long the exchange
//! would plausibly take between people. This clock advances by a randomized
//! pause plus a duration derived from the message text itself.

use rand::Rng;

const PAUSE_MIN_MS: u64 = 500;
const PAUSE_MAX_MS: u64 = 2000;
const MS_PER_WORD: u64 = 300;
const MS_PER_PERIOD: u64 = 500;
const MS_PER_COMMA: u64 = 200;
const JITTER_MIN: f64 = 0.85;
const JITTER_MAX: f64 = 1.15;
const MIN_DURATION_MS: u64 = 1000;

/// Pause before a speaker begins, in milliseconds
pub fn random_pause_ms<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(PAUSE_MIN_MS..=PAUSE_MAX_MS)
}

/// How long speaking `message` plausibly takes, in milliseconds
pub fn message_duration_ms<R: Rng>(message: &str, rng: &mut R) -> u64 {
    let words = message.split_whitespace().count() as u64;
    let periods = message.matches('.').count() as u64;
    let commas = message.matches(',').count() as u64;

    let base = words * MS_PER_WORD + periods * MS_PER_PERIOD + commas * MS_PER_COMMA;
    let jitter = rng.gen_range(JITTER_MIN..=JITTER_MAX);
    let jittered = (base as f64 * jitter) as u64;

    jittered.max(MIN_DURATION_MS)
}

/// Monotonic clock advanced once per dialogue entry
#[derive(Debug, Default)]
pub struct ConversationClock {
    elapsed_ms: u64,
}

impl ConversationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Advance for one spoken message, returning the new clock reading
    pub fn advance<R: Rng>(&mut self, message: &str, rng: &mut R) -> u64 {
        self.elapsed_ms += random_pause_ms(rng) + message_duration_ms(message, rng);
        self.elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pause_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let pause = random_pause_ms(&mut rng);
            assert!((PAUSE_MIN_MS..=PAUSE_MAX_MS).contains(&pause));
        }
    }

    #[test]
    fn test_short_message_hits_duration_floor() {
        let mut rng = StdRng::seed_from_u64(7);
        // One word, no punctuation: 300ms base, under the floor even at
        // maximum jitter
        assert_eq!(message_duration_ms("Hi", &mut rng), MIN_DURATION_MS);
    }

    #[test]
    fn test_duration_scales_with_words_and_punctuation() {
        let mut rng = StdRng::seed_from_u64(7);
        let message = "First point, second point. Third point, done.";
        // 7 words, 2 periods, 2 commas: 3500ms base before jitter
        let duration = message_duration_ms(message, &mut rng);
        assert!(duration >= (3500.0 * JITTER_MIN) as u64);
        assert!(duration <= (3500.0 * JITTER_MAX) as u64 + 1);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut clock = ConversationClock::new();

        let first = clock.advance("Hello everyone, welcome.", &mut rng);
        let second = clock.advance("Thanks for having me.", &mut rng);
        assert!(second > first);
        assert_eq!(clock.elapsed_ms(), second);
    }
}

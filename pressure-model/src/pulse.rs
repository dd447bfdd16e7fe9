use crate::ModelConfig;
use common_types::{OperatingMode, PulseBatch, PulseTint};

/// One pulse per this many users
pub const USERS_PER_PULSE: u64 = 1_000_000;
pub const MAX_PULSES_PER_TICK: u32 = 50;

/// Decide how many request pulses the front-end spawns in one tick and how to tint them.
///
/// Direct mode pulses are all failures once demand exceeds capacity. Queued mode pulses always
/// enter the queue first.
pub fn sample_pulses(users: u64, mode: OperatingMode, config: &ModelConfig) -> PulseBatch {
    let pulses = users / USERS_PER_PULSE + u64::from(users % USERS_PER_PULSE != 0);
    let count = pulses.min(MAX_PULSES_PER_TICK as u64) as u32;
    let tint = match mode {
        OperatingMode::Direct if users <= config.capacity() => PulseTint::Success,
        OperatingMode::Direct => PulseTint::Failure,
        OperatingMode::Queued => PulseTint::Queued,
    };
    PulseBatch { count, tint }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::SERVER_CAPACITY;
    use common_types::OperatingMode::{Direct, Queued};
    use test_case::test_case;

    #[test_case(0, 0)]
    #[test_case(100, 1)]
    #[test_case(1_000_000, 1)]
    #[test_case(1_000_001, 2)]
    #[test_case(49_000_000, 49)]
    #[test_case(SERVER_CAPACITY, 50)]
    #[test_case(u64::MAX, 50)]
    fn pulse_count(users: u64, expected: u32) {
        let config = ModelConfig::default();
        assert_eq!(sample_pulses(users, Direct, &config).count, expected);
        assert_eq!(sample_pulses(users, Queued, &config).count, expected);
    }

    #[test]
    fn pulse_tint() {
        let config = ModelConfig::default();
        assert_eq!(
            sample_pulses(SERVER_CAPACITY, Direct, &config).tint,
            PulseTint::Success
        );
        assert_eq!(
            sample_pulses(SERVER_CAPACITY + 1, Direct, &config).tint,
            PulseTint::Failure
        );
        assert_eq!(sample_pulses(100, Queued, &config).tint, PulseTint::Queued);
        assert_eq!(
            sample_pulses(SERVER_CAPACITY * 2, Queued, &config).tint,
            PulseTint::Queued
        );
    }
}

/// How often, in frames, the fixed evaluation order may be randomly perturbed.
pub const DEFAULT_REORDER_PERIOD: u64 = 100;
/// Custom chips with more input bits than this are only cached when they opt in.
pub const MAX_NUM_INPUT_BITS_WHEN_AUTO_CACHING: usize = 12;
/// Custom chips with more input bits than this are never cached.
pub const MAX_NUM_INPUT_BITS_WHEN_USER_CACHING: usize = 24;
/// Lookup table cells keep the tristate flags in their high half, so wider pins can't be cached.
pub const MAX_PIN_WIDTH_WHEN_CACHING: usize = 16;

/// Tunables of a [super::Simulator].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Frames between clock transitions, 0 keeps every clock low.
    pub steps_per_clock_transition: u64,
    /// Frames between ticks that may randomly reorder evaluation, 0 disables reordering.
    pub reorder_period: u64,
    /// Seed of the master random generator, [None] seeds from entropy.
    pub seed: Option<u64>,
    /// Evaluate eligible custom chips through lookup tables.
    pub cache_enabled: bool,
    pub max_auto_cache_input_bits: usize,
    pub max_user_cache_input_bits: usize,
}
impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            steps_per_clock_transition: 50,
            reorder_period: DEFAULT_REORDER_PERIOD,
            seed: None,
            cache_enabled: true,
            max_auto_cache_input_bits: MAX_NUM_INPUT_BITS_WHEN_AUTO_CACHING,
            max_user_cache_input_bits: MAX_NUM_INPUT_BITS_WHEN_USER_CACHING,
        }
    }
}
impl SimConfig {
    /// Returns the default configuration with a fixed seed.
    pub fn seeded(seed: u64) -> SimConfig {
        SimConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

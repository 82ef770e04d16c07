//! Environment abstraction for deterministic testing.
//!
//! Decouples the coordination engine from system resources (time,
//! randomness). Tests inject a virtual clock and a seeded RNG; production
//! uses the real system clock and OS entropy.

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now_millis()` never goes backwards within a single execution context
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time as milliseconds since the Unix epoch.
    ///
    /// Message ordering and room activity use this value directly, so
    /// subsequent calls must return times >= previous calls.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for user and connection ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Convenience for room and message ids.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

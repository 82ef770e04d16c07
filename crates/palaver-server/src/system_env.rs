//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` backs the engine with the real wall clock and OS
//! cryptographic randomness. Production behavior is therefore
//! non-deterministic; deterministic tests inject their own environment.

use palaver_core::env::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom, which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux). Room, message, and guest-user ids are
/// unguessable.
///
/// # Panics
///
/// Panics if the OS RNG fails. Intentional: without functioning randomness
/// the server would mint colliding ids, and RNG failure indicates OS-level
/// trouble no retry will fix.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

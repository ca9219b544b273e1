//! Injected randomness, so the sampling gate stays testable.

/// A source of uniform randomness in `[0, 1)`, used only by the sampling
/// gate. Production code draws from a cryptographically secure RNG;
/// tests substitute a deterministic sequence (see `tk-testkit`).
pub trait RandomSource: Send + Sync {
    fn sample_unit(&mut self) -> f64;
}

/// The real RNG, backed by the OS CSPRNG.
#[derive(Debug, Default)]
pub struct SecureRandomSource;

impl RandomSource for SecureRandomSource {
    fn sample_unit(&mut self) -> f64 {
        use rand::Rng;
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

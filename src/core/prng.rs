// Seeded PRNG for field initialisation and tau noise.
//
// This is NOT cryptographically secure.
// The whole state is one u64 so checkpoints can capture it exactly.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    pub(crate) fn from_state(state: u64) -> Self {
        Self::new(state)
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform sample in [0, 1) with 53 bits of precision.
    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Standard normal sample (Box-Muller).
    ///
    /// Consumes exactly two uniforms per call; the second variate of the pair
    /// is discarded so the generator never carries hidden state.
    pub fn next_gaussian(&mut self) -> f64 {
        // u1 in (0, 1] keeps ln() finite.
        let u1 = 1.0 - self.next_f64_01();
        let u2 = self.next_f64_01();
        (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).cos()
    }

    /// Add `amp * U[0,1)` to every element, in slice (row-major) order.
    pub fn add_uniform(&mut self, out: &mut [f64], amp: f64) {
        for v in out.iter_mut() {
            *v += amp * self.next_f64_01();
        }
    }

    /// Overwrite every element with a standard normal sample, in slice order.
    pub fn fill_gaussian(&mut self, out: &mut [f64]) {
        for v in out.iter_mut() {
            *v = self.next_gaussian();
        }
    }
}

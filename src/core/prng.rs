// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It only drives pool-formation sampling, so a fixed seed gives a
// reproducible run.

/// Source of sampling decisions for pool creation.
///
/// The network draws from it once per timestep; tests substitute a
/// [`Scripted`] sequence to pin down exactly which nodes get linked.
pub trait RandomSource {
    /// Uniform index in `0..len`. Callers never pass `len == 0`.
    fn next_index(&mut self, len: usize) -> usize;
}

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

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        // Use the high bits; the low bits of xorshift* are the weakest.
        let v = (self.next_u64() >> 11) % span;
        low + v as usize
    }
}

impl RandomSource for Prng {
    #[inline]
    fn next_index(&mut self, len: usize) -> usize {
        self.gen_range_usize(0, len)
    }
}

/// Replays a fixed list of indices, cycling when exhausted. Each value is
/// reduced modulo the requested length.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    values: Vec<usize>,
    cursor: usize,
}

impl Scripted {
    pub fn new(values: impl Into<Vec<usize>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// Number of draws served so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for Scripted {
    fn next_index(&mut self, len: usize) -> usize {
        if self.values.is_empty() || len == 0 {
            return 0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v % len
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn next_index(&mut self, len: usize) -> usize {
        (**self).next_index(len)
    }
}

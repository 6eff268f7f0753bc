//! Seeded Gaussian stream for scenario generation.
//!
//! Scenario sets must be reproducible from a single 32-bit seed, so the stream
//! is pinned to a concrete algorithm rather than "whatever `rand` uses today":
//!
//! - MT19937 seeded with `init_genrand(seed)`
//! - 53-bit uniforms built from two 32-bit draws: `(a >> 5, b >> 6)`
//! - Marsaglia polar method; each accepted pair yields two normals, the second
//!   is cached and returned by the next call
//!
//! This is the same stream the classic NumPy `RandomState(seed).standard_normal()`
//! produces, which keeps scenario files comparable with older tooling.

use rand_mt::Mt;

pub struct GaussianStream {
    mt: Mt,
    cached: Option<f64>,
}

impl GaussianStream {
    pub fn new(seed: u32) -> Self {
        Self {
            mt: Mt::new(seed),
            cached: None,
        }
    }

    /// Uniform deviate in `[0, 1)` with 53 bits of resolution.
    pub fn next_uniform(&mut self) -> f64 {
        let a = (self.mt.next_u32() >> 5) as f64;
        let b = (self.mt.next_u32() >> 6) as f64;
        (a * 67_108_864.0 + b) / 9_007_199_254_740_992.0
    }

    /// Standard normal deviate.
    pub fn next_normal(&mut self) -> f64 {
        if let Some(v) = self.cached.take() {
            return v;
        }
        loop {
            let x1 = 2.0 * self.next_uniform() - 1.0;
            let x2 = 2.0 * self.next_uniform() - 1.0;
            let r2 = x1 * x1 + x2 * x2;
            if r2 >= 1.0 || r2 == 0.0 {
                continue;
            }
            let f = (-2.0 * r2.ln() / r2).sqrt();
            self.cached = Some(f * x1);
            return f * x2;
        }
    }

    /// Fill `out` with standard normals.
    pub fn fill_normal(&mut self, out: &mut [f64]) {
        for v in out.iter_mut() {
            *v = self.next_normal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mt19937_reference_output() {
        // Reference values for init_genrand(5489), the MT19937 default seed.
        let mut mt = Mt::new(5489);
        assert_eq!(mt.next_u32(), 3_499_211_612);
        assert_eq!(mt.next_u32(), 581_869_302);
    }

    #[test]
    fn normal_stream_matches_legacy_reference() {
        // RandomState(42).standard_normal(3)
        let expected: [f64; 3] = [0.4967141530112327, -0.13826430117118466, 0.6476885381006925];
        let mut g = GaussianStream::new(42);
        for e in expected {
            assert_eq!(g.next_normal().to_bits(), e.to_bits());
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = GaussianStream::new(20210103);
        let mut b = GaussianStream::new(20210103);
        for _ in 0..1_000 {
            assert_eq!(a.next_normal().to_bits(), b.next_normal().to_bits());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = GaussianStream::new(1);
        let mut b = GaussianStream::new(2);
        let same = (0..100).filter(|_| a.next_normal() == b.next_normal()).count();
        assert!(same < 100);
    }

    #[test]
    fn moments_are_standard() {
        let mut g = GaussianStream::new(42);
        let n = 200_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let z = g.next_normal();
            sum += z;
            sum_sq += z * z;
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!(mean.abs() < 0.01, "mean={mean}");
        assert!((var - 1.0).abs() < 0.02, "var={var}");
    }

    #[test]
    fn uniforms_stay_in_unit_interval() {
        let mut g = GaussianStream::new(7);
        for _ in 0..10_000 {
            let u = g.next_uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }
}

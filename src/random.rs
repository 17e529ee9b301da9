use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded index sampler used for candidate-feature draws and event
/// subsampling.
///
/// The sampler is explicit learner state so that reproducibility is a
/// first-class property: identical seeds yield identical draws.
#[derive(Clone, Debug)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw `n` indices uniformly from `lo..hi`.
    ///
    /// Without replacement, draws are rejected until an unseen index comes
    /// up, so `n` must not exceed the range length.
    pub fn sample_range(&mut self, n: usize, lo: usize, hi: usize, replace: bool) -> Vec<usize> {
        assert!(hi > lo, "empty sampling range {}..{}", lo, hi);
        assert!(
            replace || n <= hi - lo,
            "cannot draw {} distinct indices from {}..{}",
            n,
            lo,
            hi
        );
        let mut out = Vec::with_capacity(n);
        let mut already_picked = HashSet::new();
        for _ in 0..n {
            let mut pick = self.rng.gen_range(lo..hi);
            if !replace {
                while !already_picked.insert(pick) {
                    pick = self.rng.gen_range(lo..hi);
                }
            }
            out.push(pick);
        }
        out
    }

    /// Draw `n` elements of `items` by sampled index.
    pub fn sample<T: Copy>(&mut self, n: usize, items: &[T], replace: bool) -> Vec<T> {
        self.sample_range(n, 0, items.len(), replace)
            .into_iter()
            .map(|i| items[i])
            .collect()
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new(0)
    }
}

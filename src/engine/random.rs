use std::time::Duration;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::config::{DelayRange, PixelRange};

pub struct EngineRng {
    inner: StdRng,
}

impl EngineRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.inner.random_bool(probability)
        }
    }

    pub fn delay(&mut self, range: DelayRange) -> Duration {
        Duration::from_millis(self.between(range.min_ms, range.max_ms))
    }

    pub fn pixels(&mut self, range: PixelRange) -> u32 {
        self.between(range.min_px, range.max_px)
    }

    fn between<T>(&mut self, min: T, max: T) -> T
    where
        T: rand::distr::uniform::SampleUniform + PartialOrd + Copy,
    {
        if min >= max {
            return min;
        }
        self.inner.random_range(min..=max)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

pub fn fresh_seed() -> u64 {
    rand::rng().random()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = EngineRng::seeded(42);
        let mut b = EngineRng::seeded(42);
        for _ in 0..32 {
            assert_eq!(a.chance(0.5), b.chance(0.5));
            assert_eq!(
                a.delay(DelayRange::new(10, 500)),
                b.delay(DelayRange::new(10, 500))
            );
        }
    }

    #[test]
    fn degenerate_probabilities_and_ranges() {
        let mut rng = EngineRng::seeded(1);
        assert!((0..100).all(|_| rng.chance(1.0)));
        assert!((0..100).all(|_| !rng.chance(0.0)));
        assert_eq!(rng.delay(DelayRange::new(250, 250)), Duration::from_millis(250));
        assert_eq!(rng.pixels(PixelRange::new(9, 3)), 9);
    }

    #[test]
    fn samples_stay_in_bounds() {
        let mut rng = EngineRng::seeded(7);
        for _ in 0..200 {
            let v = rng.pixels(PixelRange::new(100, 120));
            assert!((100..=120).contains(&v));
        }
    }
}

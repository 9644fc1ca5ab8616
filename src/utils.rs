use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

use crate::prelude::*;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
}

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> SimResult<()> {
    for _ in 0..n_cycles {
        signal.rising_edge().await?;
    }
    Ok(())
}

pub(crate) fn seed(seed: u64) {
    RNG.with(|r| *r.borrow_mut() = StdRng::seed_from_u64(seed));
}

#[inline]
pub fn rand() -> f32 {
    RNG.with(|r| r.borrow_mut().gen::<f32>())
}

/// Uniform integer in `0..ceil`.
#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    RNG.with(|r| r.borrow_mut().gen_range(0..ceil.max(1)))
}

#[inline]
pub fn rand_bit() -> u32 {
    rand_int(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        seed(7);
        let a: Vec<u32> = (0..16).map(|_| rand_int(100)).collect();
        seed(7);
        let b: Vec<u32> = (0..16).map(|_| rand_int(100)).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| *v < 100));
    }

    #[test]
    fn rand_is_a_seeded_unit_interval() {
        seed(3);
        let a: Vec<f32> = (0..32).map(|_| rand()).collect();
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
        seed(3);
        assert_eq!(a, (0..32).map(|_| rand()).collect::<Vec<f32>>());
    }

    #[test]
    fn rand_bit_is_a_bit() {
        seed(1);
        assert!((0..64).map(|_| rand_bit()).all(|b| b <= 1));
    }
}

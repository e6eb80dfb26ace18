// HEALPix bad pixel value
pub const UNSEEN: f64 = -1.6375e30;

pub const MIN_ORDER: u32 = 7;

pub const DEFAULT_NCORES: usize = 6;

pub const PROGRESS_STEP: usize = 10000;

/// Seed pixels folded together by one parallel task. Fixed, so that the
/// summation order does not depend on the number of threads.
pub const SEED_CHUNK: usize = 512;

/// True when `x` is the masked sentinel, also after a round trip through
/// single precision storage.
pub fn is_unseen(x: f64) -> bool {
    (x - UNSEEN).abs() <= UNSEEN.abs() * 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_survives_f32() {
        assert!(is_unseen(UNSEEN));
        assert!(is_unseen(UNSEEN as f32 as f64));
        assert!(!is_unseen(0.0));
        assert!(!is_unseen(-1.0e30));
    }
}

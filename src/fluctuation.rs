use rand::{
    seq::SliceRandom
    , Rng
};

use crate::skymap::{
    Mask
    , SkyMap
};

pub fn fluctuation_map(map: &SkyMap, mean: f64) -> SkyMap {
    SkyMap::from_fn(map.grid(), |i| map.data()[i] - mean)
}

pub fn permute_unmasked<R: Rng + ?Sized>(map: &mut SkyMap, mask: &Mask, rng: &mut R) {
    let idx = mask.indices();
    let mut values: Vec<f64> = idx.iter().map(|&i| map.data()[i]).collect();
    values.shuffle(rng);
    let data = map.data_mut();
    idx.iter()
        .zip(values.into_iter())
        .for_each(|(&i, x)| data[i] = x);
}

/// Mean subtracted and spatially scrambled copy of `map`, the null
/// reference of the correlation estimate.
pub fn control_map<R: Rng + ?Sized>(map: &SkyMap, mean: f64, mask: &Mask, rng: &mut R) -> SkyMap {
    let mut out = fluctuation_map(map, mean);
    permute_unmasked(&mut out, mask, rng);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::UNSEEN
        , healpix::Grid
    };
    use rand::{
        rngs::StdRng
        , SeedableRng
    };

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn permutation_keeps_values_and_mask() {
        let mut map = SkyMap::from_fn(Grid::new(8).unwrap(), |i| (i * 7 % 31) as f64);
        for i in (0..map.npix()).step_by(5) {
            map.data_mut()[i] = UNSEEN;
        }
        let mask = Mask::from_map(&map);
        let original = map.clone();

        let mut rng = StdRng::seed_from_u64(7);
        permute_unmasked(&mut map, &mask, &mut rng);

        let valid = |m: &SkyMap| mask.indices().iter().map(|&i| m.data()[i]).collect::<Vec<_>>();
        assert_eq!(sorted(valid(&map)), sorted(valid(&original)));
        assert_ne!(valid(&map), valid(&original));
        for i in (0..map.npix()).step_by(5) {
            assert_eq!(map.data()[i], UNSEEN);
        }
    }

    #[test]
    fn fluctuation_subtracts_mean() {
        let map = SkyMap::from_fn(Grid::new(2).unwrap(), |i| i as f64);
        let d = fluctuation_map(&map, 23.5);
        assert_eq!(d.data()[0], -23.5);
        assert!(d.data().iter().sum::<f64>().abs() < 1e-12);

        let mut rng = StdRng::seed_from_u64(1);
        let mask = Mask::from_map(&map);
        let c = control_map(&map, 23.5, &mask, &mut rng);
        assert_eq!(sorted(c.data().to_vec()), sorted(d.data().to_vec()));
    }
}

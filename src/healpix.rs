use std::f64::consts::{
    FRAC_PI_2
    , PI
};

use cdshealpix::nested::{
    get
    , Layer
};

use crate::{
    constants::{
        is_unseen
        , UNSEEN
    }
    , coordinates::{
        SphCoord
        , Vec3d
    }
    , error::{
        CsiError
        , Result
    }
};

pub const MAX_ORDER: u32 = 29;

pub fn nside2npix(nside: usize) -> usize {
    12 * nside * nside
}

pub fn nside2pixarea(nside: usize) -> f64 {
    4.0 * PI / nside2npix(nside) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    nside: usize,
    order: u32,
}

impl Grid {
    pub fn new(nside: usize) -> Result<Self> {
        if nside.is_power_of_two() && nside.trailing_zeros() <= MAX_ORDER {
            Ok(Grid {
                nside,
                order: nside.trailing_zeros(),
            })
        } else {
            Err(CsiError::Map(format!(
                "NSIDE={} is not a power of two up to 2^{}",
                nside, MAX_ORDER
            )))
        }
    }

    pub fn from_npix(npix: usize) -> Result<Self> {
        let nside = ((npix / 12) as f64).sqrt().round() as usize;
        if npix == 0 || nside2npix(nside) != npix {
            return Err(CsiError::Map(format!("{} pixels is not 12*nside^2", npix)));
        }
        Grid::new(nside)
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn npix(&self) -> usize {
        nside2npix(self.nside)
    }

    pub fn pixarea(&self) -> f64 {
        nside2pixarea(self.nside)
    }

    fn layer(&self) -> &'static Layer {
        get(self.order as u8)
    }

    pub fn ring2nest(&self, ipix: usize) -> usize {
        self.layer().from_ring(ipix as u64) as usize
    }

    pub fn nest2ring(&self, inest: usize) -> usize {
        self.layer().to_ring(inest as u64) as usize
    }

    pub fn pix2vec(&self, ipix: usize) -> Vec3d {
        self.nest2vec(self.ring2nest(ipix) as u64)
    }

    fn nest2vec(&self, inest: u64) -> Vec3d {
        let (lon, lat) = self.layer().center(inest);
        Vec3d::from_sph_coord(SphCoord::new(FRAC_PI_2 - lat, lon))
    }

    /// RING pixels whose centre lies within `radius` of `centre`, ascending.
    ///
    /// The cone coverage of `cdshealpix` may contain cells whose centre is
    /// outside the disc; membership is decided on the centre alone, so a
    /// larger radius always gives a superset.
    pub fn query_disc(&self, centre: &Vec3d, radius: f64) -> Vec<usize> {
        if radius <= 0.0 {
            return Vec::new();
        }
        if radius >= PI {
            return (0..self.npix()).collect();
        }
        let (lon, lat) = centre.to_lonlat();
        let cos_r = radius.cos();
        let mut pixels: Vec<usize> = self
            .layer()
            .cone_coverage_approx(lon, lat, radius)
            .flat_iter()
            .filter(|&h| self.nest2vec(h).dot(centre) >= cos_r)
            .map(|h| self.nest2ring(h as usize))
            .collect();
        pixels.sort_unstable();
        pixels
    }
}

/// Changes the resolution of a RING map from `from` to `to`.
///
/// Degrading averages the non-`UNSEEN` children of every coarse pixel and
/// leaves `UNSEEN` where all of them are masked. Upgrading copies each
/// parent value to its children.
pub fn ud_grade(map: &[f64], from: Grid, to: Grid) -> Vec<f64> {
    debug_assert_eq!(map.len(), from.npix());
    if from == to {
        return map.to_vec();
    }
    let mut nest_in = vec![0.0; map.len()];
    map.iter()
        .enumerate()
        .for_each(|(ipix, &x)| nest_in[from.ring2nest(ipix)] = x);

    let nest_out: Vec<f64> = if from.order > to.order {
        let nchild = 1 << (2 * (from.order - to.order));
        nest_in
            .chunks(nchild)
            .map(|children| {
                let (sum, n) = children
                    .iter()
                    .filter(|&&x| !is_unseen(x))
                    .fold((0.0, 0_usize), |(s, n), &x| (s + x, n + 1));
                if n == 0 {
                    UNSEEN
                } else {
                    sum / n as f64
                }
            })
            .collect()
    } else {
        let shift = 2 * (to.order - from.order);
        (0..to.npix()).map(|inest| nest_in[inest >> shift]).collect()
    };

    let mut result = vec![0.0; to.npix()];
    nest_out
        .iter()
        .enumerate()
        .for_each(|(inest, &x)| result[to.nest2ring(inest)] = x);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdshealpix::nside as depth2nside;

    fn grid(nside: usize) -> Grid {
        Grid::new(nside).unwrap()
    }

    #[test]
    fn grid_sizes() {
        assert_eq!(grid(16).npix(), 3072);
        assert_eq!(Grid::from_npix(3072).unwrap(), grid(16));
        assert_eq!(Grid::from_npix(12).unwrap().nside(), 1);
        assert!(Grid::from_npix(100).is_err());
        assert!(Grid::from_npix(0).is_err());
        assert!(Grid::new(12).is_err());
        assert_eq!(grid(128).order, 7);
        assert_eq!(depth2nside(7) as usize, 128);
        assert!(Grid::new(1 << 30).is_err());
        assert!((grid(1).pixarea() - PI / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ring_nest_bijection() {
        for nside in [1, 2, 4, 8, 16] {
            let g = grid(nside);
            let mut seen = vec![false; g.npix()];
            for ipix in 0..g.npix() {
                let inest = g.ring2nest(ipix);
                assert!(!seen[inest]);
                seen[inest] = true;
                assert_eq!(g.nest2ring(inest), ipix);
            }
        }
        assert_eq!(grid(2).ring2nest(0), 3);
        assert_eq!(grid(1).ring2nest(5), 5);
    }

    #[test]
    fn centres_are_unit_vectors_ordered_by_ring() {
        let g = grid(8);
        let mut last_z = 1.0;
        for ipix in 0..g.npix() {
            let v = g.pix2vec(ipix);
            assert!((v.dot(&v) - 1.0).abs() < 1e-12);
            assert!(v.z <= last_z + 1e-12);
            last_z = v.z;
        }
    }

    #[test]
    fn disc_matches_brute_force() {
        let g = grid(16);
        for (seed, radius_deg) in [(0, 5.0), (700, 12.0), (1535, 30.0), (3071, 3.0), (2000, 95.0)] {
            let centre = g.pix2vec(seed);
            let radius = f64::to_radians(radius_deg);
            let expected: Vec<usize> = (0..g.npix())
                .filter(|&p| g.pix2vec(p).dot(&centre) >= radius.cos())
                .collect();
            assert_eq!(g.query_disc(&centre, radius), expected);
        }
    }

    #[test]
    fn tiny_and_degenerate_discs() {
        let g = grid(16);
        let centre = g.pix2vec(1234);
        assert_eq!(g.query_disc(&centre, 1e-4), vec![1234]);
        assert!(g.query_disc(&centre, 0.0).is_empty());
        assert_eq!(g.query_disc(&centre, PI).len(), g.npix());
    }

    #[test]
    fn discs_are_nested() {
        let g = grid(32);
        let centre = g.pix2vec(5000);
        let small = g.query_disc(&centre, 10_f64.to_radians());
        let large = g.query_disc(&centre, 12_f64.to_radians());
        assert!(small.len() < large.len());
        assert!(small.iter().all(|p| large.binary_search(p).is_ok()));
    }

    #[test]
    fn degrade_ignores_unseen_children() {
        let (fine, coarse) = (grid(4), grid(2));
        let mut nest = vec![1.0; fine.npix()];
        nest[0] = UNSEEN;
        nest[1] = 3.0;
        nest[4..8].iter_mut().for_each(|x| *x = UNSEEN);
        let ring: Vec<f64> = (0..nest.len()).map(|p| nest[fine.ring2nest(p)]).collect();

        let low = ud_grade(&ring, fine, coarse);
        assert_eq!(low.len(), 48);
        assert!((low[coarse.nest2ring(0)] - 5.0 / 3.0).abs() < 1e-12);
        assert!(is_unseen(low[coarse.nest2ring(1)]));
        assert_eq!(low[coarse.nest2ring(2)], 1.0);
    }

    #[test]
    fn upgrade_then_degrade_is_identity() {
        let map: Vec<f64> = (0..grid(4).npix()).map(|p| p as f64 * 0.5).collect();
        let high = ud_grade(&map, grid(4), grid(16));
        assert_eq!(high.len(), grid(16).npix());
        let back = ud_grade(&high, grid(16), grid(4));
        for (a, b) in map.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}

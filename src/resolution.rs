use log::info;

use crate::{
    healpix::{
        nside2pixarea
        , Grid
    }
    , skymap::SkyMap
};

/// Coarsest grid whose pixel area stays below `cont_ang^2` (`cont_ang` in
/// radians), never going under order `min_order`. Grids already below the
/// floor keep their resolution.
pub fn matched_grid(grid: Grid, cont_ang: f64, min_order: u32) -> Grid {
    let mut nside = grid.nside();
    let target = cont_ang * cont_ang;
    while nside.trailing_zeros() > min_order && nside2pixarea(nside / 2) < target {
        nside /= 2;
    }
    if nside == grid.nside() {
        grid
    } else {
        Grid::new(nside).unwrap_or(grid)
    }
}

pub fn udgrade_as_psf(map: &SkyMap, cont_ang: f64, min_order: u32) -> SkyMap {
    let out = map.ud_grade(matched_grid(map.grid(), cont_ang, min_order));
    info!("Udgraded map from NSIDE={} to NSIDE={}", map.nside(), out.nside());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_nside(nside: usize, cont_ang: f64, min_order: u32) -> usize {
        matched_grid(Grid::new(nside).unwrap(), cont_ang, min_order).nside()
    }

    #[test]
    fn stops_at_floor() {
        assert_eq!(matched_nside(1024, 10_f64.to_radians(), 7), 128);
        assert_eq!(matched_nside(64, 10_f64.to_radians(), 7), 64);
        assert_eq!(matched_nside(1024, 10_f64.to_radians(), 3), 8);
    }

    #[test]
    fn keeps_pixels_smaller_than_psf() {
        for &psf_deg in &[0.05, 0.1, 0.3, 0.8, 2.0] {
            let cont: f64 = f64::to_radians(psf_deg);
            let nside = matched_nside(2048, cont, 0);
            assert!(nside2pixarea(nside) < cont * cont || nside == 2048);
            assert!(nside2pixarea(nside / 2) >= cont * cont);
        }
    }

    #[test]
    fn monotonic_in_target() {
        let mut last = usize::MAX;
        for i in 1..200 {
            let cont = (i as f64 * 0.02).to_radians();
            let nside = matched_nside(1024, cont, 2);
            assert!(nside <= last);
            last = nside;
        }
    }

    #[test]
    fn nan_radius_keeps_resolution() {
        assert_eq!(matched_nside(512, f64::NAN, 0), 512);
    }

    #[test]
    fn degrades_map() {
        let map = SkyMap::filled(Grid::new(256).unwrap(), 2.0);
        let out = udgrade_as_psf(&map, 3_f64.to_radians(), 7);
        assert_eq!(out.nside(), 128);
        assert!(out.data().iter().all(|&x| x == 2.0));
    }
}

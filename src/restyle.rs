//! Flux maps of macro energy bins from count and exposure maps.
//!
//! Counts and exposures of every observation period are summed, turned into
//! a flux per micro energy bin, cleaned from the foreground and summed again
//! over the micro bins of each macro bin. The mean flux, its error and the
//! white noise level of every macro bin end up in the parameter table read
//! by the correlation analysis.

use std::{
    fs
    , path::Path
};

use log::{
    info
    , warn
};

use crate::{
    cfg::{
        ForegroundCfg
        , RestyleCfg
    }
    , constants::is_unseen
    , error::{
        CsiError
        , Result
    }
    , fits::{
        read_map
        , write_map
    }
    , healpix::Grid
    , params::{
        energy_label
        , write_energy_bins
        , EnergyBin
    }
    , skymap::{
        Mask
        , SkyMap
    }
    , utils::geometric_mean
};

pub fn read_on_grid(path: &Path, grid: Grid) -> Result<SkyMap> {
    let map = read_map(path)?;
    Ok(if map.grid() == grid {
        map
    } else {
        map.ud_grade(grid)
    })
}

/// Reads a count map and brings it to `grid` keeping the total number of
/// counts.
pub fn read_counts_on_grid(path: &Path, grid: Grid) -> Result<SkyMap> {
    let map = read_map(path)?;
    if map.grid() == grid {
        return Ok(map);
    }
    let scale = map.npix() as f64 / grid.npix() as f64;
    let mut out = map.ud_grade(grid);
    out.data_mut()
        .iter_mut()
        .filter(|x| !is_unseen(**x))
        .for_each(|x| *x *= scale);
    Ok(out)
}

pub struct Foreground {
    energy: Vec<f64>,
    maps: Vec<SkyMap>,
}

impl Foreground {
    pub fn new(energy: Vec<f64>, maps: Vec<SkyMap>) -> Result<Self> {
        if energy.len() < 2 || energy.len() != maps.len() {
            return Err(CsiError::config(
                "foreground",
                "need at least two maps with increasing energies",
            ));
        }
        for m in &maps[1..] {
            maps[0].check_same_grid(m)?;
        }
        Ok(Foreground { energy, maps })
    }

    pub fn load(entries: &[ForegroundCfg], grid: Grid) -> Result<Self> {
        let maps = entries
            .iter()
            .map(|f| {
                info!("Reading foreground {}", f.file.display());
                read_on_grid(&f.file, grid)
            })
            .collect::<Result<Vec<_>>>()?;
        Foreground::new(entries.iter().map(|f| f.energy).collect(), maps)
    }

    /// Intensity integrated from `emin` to `emax`, pixel by pixel a power law
    /// through the two tabulated energies around the bin centre. Pixels with
    /// non-positive or masked intensities integrate to zero.
    pub fn integral(&self, emin: f64, emax: f64) -> SkyMap {
        let centre = geometric_mean(emin, emax);
        let k = self
            .energy
            .partition_point(|&e| e <= centre)
            .clamp(1, self.energy.len() - 1);
        let (E0, E1) = (self.energy[k - 1], self.energy[k]);
        let (m0, m1) = (&self.maps[k - 1], &self.maps[k]);
        SkyMap::from_fn(m0.grid(), |i| {
            let (f0, f1) = (m0.data()[i], m1.data()[i]);
            if f0 <= 0.0 || f1 <= 0.0 || is_unseen(f0) || is_unseen(f1) {
                return 0.0;
            }
            let index = (f1 / f0).ln() / (E1 / E0).ln();
            power_law_integral(f0, E0, index, emin, emax)
        })
    }
}

pub fn power_law_integral(f0: f64, E0: f64, index: f64, emin: f64, emax: f64) -> f64 {
    let g1 = index + 1.0;
    if g1.abs() < 1e-10 {
        f0 * E0 * (emax / emin).ln()
    } else {
        f0 * E0 / g1 * ((emax / E0).powf(g1) - (emin / E0).powf(g1))
    }
}

/// Scale of the foreground inside the masked pixels around its brightest
/// point: `|<fore> - <flux>| / <fore>` over that region. Zero when the
/// region holds no masked pixel.
pub fn foreground_norm(fore: &SkyMap, flux: &SkyMap, mask: &Mask, radius: f64) -> f64 {
    let grid = fore.grid();
    let imax = fore
        .data()
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
        .0;
    let region: Vec<usize> = grid
        .query_disc(&grid.pix2vec(imax), radius)
        .into_iter()
        .filter(|&i| !mask.is_valid(i))
        .collect();
    if region.is_empty() {
        warn!("no masked pixel around the foreground maximum, foreground not subtracted");
        return 0.0;
    }
    let mean = |m: &SkyMap| region.iter().map(|&i| m.data()[i]).sum::<f64>() / region.len() as f64;
    let fore_mean = mean(fore);
    if fore_mean == 0.0 {
        warn!("foreground vanishes around its maximum, foreground not subtracted");
        return 0.0;
    }
    (fore_mean - mean(flux)).abs() / fore_mean
}

pub struct MicroBinMaps {
    pub counts: SkyMap,
    pub exposure: SkyMap,
}

fn load_micro_bin(cfg: &RestyleCfg, grid: Grid, ibin: usize) -> Result<MicroBinMaps> {
    let mut counts = SkyMap::filled(grid, 0.0);
    let mut exposure = SkyMap::filled(grid, 0.0);
    for p in &cfg.periods {
        info!("Ref: {}", p.label);
        let c = read_counts_on_grid(&p.counts[ibin], grid)?;
        let e0 = read_on_grid(&p.exposures[ibin], grid)?;
        let e1 = read_on_grid(&p.exposures[ibin + 1], grid)?;
        counts
            .data_mut()
            .iter_mut()
            .zip(c.data())
            .for_each(|(acc, &x)| *acc += x);
        exposure
            .data_mut()
            .iter_mut()
            .zip(e0.data().iter().zip(e1.data()))
            .for_each(|(acc, (&a, &b))| *acc += geometric_mean(a, b));
    }
    Ok(MicroBinMaps { counts, exposure })
}

pub struct MacroBin {
    pub flux: SkyMap,
    pub fluxerr: SkyMap,
    pub params: EnergyBin,
}

/// Combines the micro bins `micro` (energies `edges`) of one macro bin.
/// Pixels outside `mask` or without exposure in any micro bin are masked.
pub fn combine_micro_bins(
    micro: &[MicroBinMaps]
    , edges: &[(f64, f64)]
    , mask: &Mask
    , foreground: Option<&Foreground>
    , gamma: f64
    , fore_region: f64
) -> Result<MacroBin> {
    if micro.is_empty() || micro.len() != edges.len() {
        return Err(CsiError::Map(format!(
            "{} micro bin maps for {} energy ranges",
            micro.len(),
            edges.len()
        )));
    }
    let grid = micro[0].counts.grid();
    let sr = grid.pixarea();
    let npix = grid.npix();
    let mask = mask.restrict(|i| micro.iter().all(|m| m.exposure.data()[i] > 0.0));
    let unmask = mask.indices();
    let (E_MIN, E_MAX) = (edges[0].0, edges[edges.len() - 1].1);
    let E_MEAN = (edges[0].1 + edges[edges.len() - 1].0) * 0.5;
    if unmask.is_empty() {
        return Err(CsiError::Map(format!(
            "macro bin {} is fully masked",
            energy_label(E_MIN, E_MAX)
        )));
    }

    let emean0 = geometric_mean(edges[0].0, edges[0].1);
    let mut macro_flux = vec![0.0; npix];
    let mut err_weight = vec![0.0; npix];
    let mut CN = 0.0;
    for (m, &(emin, emax)) in micro.iter().zip(edges) {
        let counts = m.counts.data();
        let exposure = m.exposure.data();
        let flux = SkyMap::from_fn(grid, |i| {
            if exposure[i] > 0.0 {
                counts[i] / exposure[i] / sr
            } else {
                0.0
            }
        });
        let norm = match foreground {
            Some(fg) => {
                let fore = fg.integral(emin, emax);
                let norm = foreground_norm(&fore, &flux, &mask, fore_region);
                info!("Foreground Normalization: {:.3}", norm);
                Some((norm, fore))
            }
            None => None,
        };
        for i in 0..npix {
            macro_flux[i] += flux.data()[i];
            if let Some((norm, fore)) = &norm {
                macro_flux[i] -= norm * fore.data()[i];
            }
        }

        let scale = (geometric_mean(emin, emax) / emean0).powf(-gamma);
        for &i in &unmask {
            err_weight[i] += scale / (exposure[i] * exposure[i]);
        }
        CN += unmask
            .iter()
            .map(|&i| counts[i] / (exposure[i] * exposure[i]))
            .sum::<f64>()
            / unmask.len() as f64
            / sr;
    }
    info!("CN (white noise) term = {:e}", CN);

    let counts0 = micro[0].counts.data();
    let mut flux = SkyMap::from_fn(grid, |i| macro_flux[i]);
    let mut fluxerr = SkyMap::from_fn(grid, |i| (counts0[i] * err_weight[i]).sqrt() / sr);
    flux.apply_mask(&mask);
    fluxerr.apply_mask(&mask);

    let N = unmask.len() as f64;
    let F_MEAN = unmask.iter().map(|&i| flux.data()[i]).sum::<f64>() / N;
    let FERR_MEAN = unmask
        .iter()
        .map(|&i| fluxerr.data()[i].powi(2))
        .sum::<f64>()
        .sqrt()
        / N;
    let FSKY = mask.fsky();
    info!("Fsky = {:.3}", FSKY);
    Ok(MacroBin {
        flux,
        fluxerr,
        params: EnergyBin {
            emin: E_MIN,
            emax: E_MAX,
            emean: E_MEAN,
            flux_mean: F_MEAN,
            flux_err_mean: FERR_MEAN,
            cn: CN,
            fsky: FSKY,
        },
    })
}

/// Builds the flux and flux error maps of every macro bin of `cfg` and
/// writes their parameter table, replacing an existing one.
pub fn mk_restyle(cfg: &RestyleCfg) -> Result<Vec<EnergyBin>> {
    info!("Starting flux analysis...");
    let grid = Grid::new(cfg.nside)?;
    let flux_dir = cfg.flux_dir();
    fs::create_dir_all(&flux_dir).map_err(|e| CsiError::io(&flux_dir, e))?;
    let foreground = if cfg.foreground.is_empty() {
        warn!("no foreground maps given, fluxes are not foreground subtracted");
        None
    } else {
        Some(Foreground::load(&cfg.foreground, grid)?)
    };

    let mut rows = Vec::with_capacity(cfg.macro_bins.len());
    for (imacro, &(first, last)) in cfg.macro_bins.iter().enumerate() {
        info!("Considering bins from {} to {}...", first, last);
        let mask_file = cfg.mask_file(imacro);
        let mask = Mask::from_weights(&read_on_grid(mask_file, grid)?);
        info!("Retrieving count and exposure maps...");
        let micro = (first..=last)
            .map(|ibin| load_micro_bin(cfg, grid, ibin))
            .collect::<Result<Vec<_>>>()?;
        let edges: Vec<(f64, f64)> = cfg.micro_bins[first..=last]
            .iter()
            .map(|b| (b.emin, b.emax))
            .collect();

        let out = combine_micro_bins(
            &micro
            , &edges
            , &mask
            , foreground.as_ref()
            , cfg.power_law_index
            , cfg.fore_region_deg.to_radians()
        )?;
        let label = out.params.label();
        info!("Merged fluxes from {:.2} to {:.2} MeV", out.params.emin, out.params.emax);
        let flux_name = flux_dir.join(format!("{}_flux_{}.fits", cfg.out_label, label));
        let err_name = flux_dir.join(format!("{}_fluxerr_{}.fits", cfg.out_label, label));
        write_map(&flux_name, &out.flux, Some("G"))?;
        write_map(&err_name, &out.fluxerr, Some("G"))?;
        info!("Created {}", flux_name.display());
        info!("Created {}", err_name.display());
        info!(
            "F_MEAN, FERR_MEAN = {:e}, {:e}",
            out.params.flux_mean, out.params.flux_err_mean
        );
        rows.push(out.params);
    }

    let params_name = cfg.params_file();
    write_energy_bins(&params_name, &rows)?;
    info!("Created {}", params_name.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(nside: usize) -> Grid {
        Grid::new(nside).unwrap()
    }

    fn micro(nside: usize, counts: f64, exposure: f64) -> MicroBinMaps {
        MicroBinMaps {
            counts: SkyMap::filled(grid(nside), counts),
            exposure: SkyMap::filled(grid(nside), exposure),
        }
    }

    #[test]
    fn power_law_integrals() {
        // flat spectrum
        assert!((power_law_integral(2.0, 100.0, 0.0, 100.0, 300.0) - 400.0).abs() < 1e-9);
        // E^-1
        let log = power_law_integral(1.0, 100.0, -1.0, 100.0, 100.0 * std::f64::consts::E);
        assert!((log - 100.0).abs() < 1e-9);
        // E^-2: 100^2 (1/100 - 1/200)
        assert!((power_law_integral(1.0, 100.0, -2.0, 100.0, 200.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn foreground_follows_tabulated_power_law() {
        let g = grid(2);
        let mut low = SkyMap::filled(g, 1.0);
        low.data_mut()[0] = 0.0;
        let fg = Foreground::new(
            vec![100.0, 1000.0, 10000.0],
            vec![low, SkyMap::filled(g, 1e-2), SkyMap::filled(g, 1e-4)],
        )
        .unwrap();
        let fore = fg.integral(100.0, 200.0);
        assert!((fore.data()[5] - 50.0).abs() < 1e-9);
        assert_eq!(fore.data()[0], 0.0);
        let high = fg.integral(2000.0, 4000.0);
        // 1e-2 * 1000^2 * (1/2000 - 1/4000)
        assert!((high.data()[5] - 2.5).abs() < 1e-9);
        assert!(Foreground::new(vec![100.0], vec![SkyMap::filled(g, 1.0)]).is_err());
    }

    #[test]
    fn counts_keep_their_total() {
        let dir = tempfile::tempdir().unwrap();
        let fname = dir.path().join("counts.fits");
        let fine = SkyMap::from_fn(grid(8), |i| (i % 3) as f64);
        write_map(&fname, &fine, None).unwrap();
        let coarse = read_counts_on_grid(&fname, grid(2)).unwrap();
        let total = |m: &SkyMap| m.data().iter().sum::<f64>();
        assert!((total(&coarse) - total(&fine)).abs() < 1e-9);
        let exposure = read_on_grid(&fname, grid(2)).unwrap();
        assert!((total(&exposure) * 16.0 - total(&fine)).abs() < 1e-9);
    }

    #[test]
    fn uniform_sky_without_foreground() {
        let nside = 4;
        let sr = grid(nside).pixarea();
        let micro = vec![micro(nside, 4.0, 2.0), micro(nside, 9.0, 3.0)];
        let edges = vec![(100.0, 400.0), (400.0, 1600.0)];
        let mut weights = SkyMap::filled(grid(nside), 1.0);
        weights.data_mut()[0] = 0.0;
        let out = combine_micro_bins(
            &micro
            , &edges
            , &Mask::from_weights(&weights)
            , None
            , 2.0
            , 2_f64.to_radians()
        )
        .unwrap();

        let expected_flux = (4.0 / 2.0 + 9.0 / 3.0) / sr;
        assert!(is_unseen(out.flux.data()[0]));
        assert!((out.flux.data()[1] - expected_flux).abs() < 1e-9 * expected_flux);
        assert!((out.params.flux_mean - expected_flux).abs() < 1e-9 * expected_flux);

        // emean ratio 4, weight 4^-2
        let err = (4.0_f64 * (1.0 / 4.0 + 1.0 / 16.0 / 9.0)).sqrt() / sr;
        assert!((out.fluxerr.data()[7] - err).abs() < 1e-9 * err);
        let n: f64 = 191.0;
        assert!((out.params.flux_err_mean - err * n.sqrt() / n).abs() < 1e-9 * err);

        let cn = (4.0 / 4.0 + 9.0 / 9.0) / sr;
        assert!((out.params.cn - cn).abs() < 1e-9 * cn);
        assert_eq!(out.params.emin, 100.0);
        assert_eq!(out.params.emax, 1600.0);
        assert_eq!(out.params.emean, 400.0);
        assert!((out.params.fsky - n / 192.0).abs() < 1e-12);
    }

    #[test]
    fn unexposed_pixels_are_masked() {
        let mut m = micro(2, 1.0, 1.0);
        m.exposure.data_mut()[3] = 0.0;
        let mask = Mask::from_weights(&SkyMap::filled(grid(2), 1.0));
        let out = combine_micro_bins(&[m], &[(100.0, 200.0)], &mask, None, 2.0, 0.1).unwrap();
        assert!(is_unseen(out.flux.data()[3]) && is_unseen(out.fluxerr.data()[3]));
        assert!(out.params.flux_mean.is_finite());

        let dark = micro(2, 1.0, 0.0);
        assert!(combine_micro_bins(&[dark], &[(100.0, 200.0)], &mask, None, 2.0, 0.1).is_err());
    }

    #[test]
    fn foreground_is_normalised_in_masked_region() {
        let g = grid(8);
        let centre = g.pix2vec(300);
        let near = |i: usize| g.pix2vec(i).angle_to(&centre) < 20_f64.to_radians();
        // flux is the foreground plus a flat 1.0 everywhere
        let fore = SkyMap::from_fn(g, |i| if i == 300 { 8.0 } else if near(i) { 4.0 } else { 0.0 });
        let flux = SkyMap::from_fn(g, |i| fore.data()[i] + 1.0);
        let mask = Mask::from_weights(&SkyMap::from_fn(g, |i| if near(i) { 0.0 } else { 1.0 }));
        let norm = foreground_norm(&fore, &flux, &mask, 10_f64.to_radians());
        let region: Vec<usize> = g.query_disc(&centre, 10_f64.to_radians());
        let fore_mean = region.iter().map(|&i| fore.data()[i]).sum::<f64>() / region.len() as f64;
        assert!((norm - 1.0 / fore_mean).abs() < 1e-12);

        let open = Mask::from_weights(&SkyMap::filled(g, 1.0));
        assert_eq!(foreground_norm(&fore, &flux, &open, 10_f64.to_radians()), 0.0);
    }

    #[test]
    fn restyle_writes_maps_and_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name);
        let fine = grid(8);
        write_map(path("mask.fits"), &SkyMap::filled(fine, 1.0), None).unwrap();
        for (i, c) in [2.0, 1.0].iter().enumerate() {
            write_map(path(&format!("c{}.fits", i)), &SkyMap::filled(fine, *c), None).unwrap();
        }
        for i in 0..3 {
            write_map(path(&format!("e{}.fits", i)), &SkyMap::filled(fine, 1e3), None).unwrap();
        }
        let text = format!(
            "
out_label: P8_y1
binning_label: 2bins
out_dir: {out}
nside: 4
power_law_index: 2.0
mask_files: [{out}/mask.fits]
micro_bins:
  - {{emin: 1000, emax: 1737.8}}
  - {{emin: 1737.8, emax: 3019.9}}
macro_bins: [[0, 0], [0, 1]]
periods:
  - label: y1
    counts: [{out}/c0.fits, {out}/c1.fits]
    exposures: [{out}/e0.fits, {out}/e1.fits, {out}/e2.fits]
  - label: y2
    counts: [{out}/c0.fits, {out}/c1.fits]
    exposures: [{out}/e0.fits, {out}/e1.fits, {out}/e2.fits]
",
            out = dir.path().display()
        );
        let cfg: RestyleCfg = serde_yaml::from_str(&text).unwrap();
        cfg.validate().unwrap();
        let rows = mk_restyle(&cfg).unwrap();

        let sr = grid(4).pixarea();
        // 2 periods, 4 fine pixels per coarse one
        let flux0 = 2.0 * 4.0 * 2.0 / 2e3 / sr;
        assert!((rows[0].flux_mean - flux0).abs() < 1e-9 * flux0);
        assert!(rows[1].flux_mean > rows[0].flux_mean);
        assert_eq!(rows[1].label(), "1000-3019");

        let table = crate::params::read_energy_bins(cfg.params_file()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table[1].cn > table[0].cn);
        let map = read_map(path("output_flux/P8_y1_flux_1000-1737.fits")).unwrap();
        assert_eq!(map.nside(), 4);
        assert!(path("output_flux/P8_y1_fluxerr_1000-3019.fits").exists());

        // a second run replaces the table
        mk_restyle(&cfg).unwrap();
        assert_eq!(crate::params::read_energy_bins(cfg.params_file()).unwrap().len(), 2);
    }
}

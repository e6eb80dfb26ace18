use std::{
    fs::{
        self
        , File
    }
    , io::Write
    , path::PathBuf
};

use log::info;

use crate::{
    cfg::{
        MergeBinCfg
        , MergeCfg
    }
    , constants::UNSEEN
    , error::{
        CsiError
        , Result
    }
    , fits::{
        read_map
        , write_map
    }
    , params::{
        energy_label
        , read_energy_bins
        , write_energy_bins
        , EnergyBin
    }
    , skymap::{
        Mask
        , SkyMap
    }
};

pub fn sum_flux_maps(maps: &[SkyMap]) -> Result<SkyMap> {
    let first = maps
        .first()
        .ok_or_else(|| CsiError::Map("nothing to merge".to_string()))?;
    let mut mask = Mask::from_map(first);
    for m in &maps[1..] {
        first.check_same_grid(m)?;
        mask = mask.intersect(&Mask::from_map(m));
    }
    Ok(SkyMap::from_fn(first.grid(), |i| {
        if mask.is_valid(i) {
            maps.iter().map(|m| m.data()[i]).sum()
        } else {
            UNSEEN
        }
    }))
}

fn label_params(cfg: &MergeCfg, label: &str, energy: &str) -> Result<EnergyBin> {
    let path = cfg.params_file(label);
    read_energy_bins(&path)?
        .into_iter()
        .find(|b| b.label() == energy)
        .ok_or_else(|| CsiError::Map(format!("{} has no {} MeV bin", path.display(), energy)))
}

/// Error and white noise terms of a sum of independent flux maps: errors add
/// in quadrature, noise levels add.
pub fn sum_noise_terms(parts: &[EnergyBin]) -> (f64, f64) {
    let ferr = parts
        .iter()
        .map(|b| b.flux_err_mean * b.flux_err_mean)
        .sum::<f64>()
        .sqrt();
    (ferr, parts.iter().map(|b| b.cn).sum())
}

fn merge_bin(cfg: &MergeCfg, bin: &MergeBinCfg) -> Result<(PathBuf, EnergyBin)> {
    let label = energy_label(bin.emin, bin.emax);
    info!("considering bin: {} MeV...", bin.emean as i64);
    let maps = bin
        .labels
        .iter()
        .map(|l| read_map(cfg.flux_dir.join(format!("{}_flux_{}.fits", l, label))))
        .collect::<Result<Vec<_>>>()?;
    let parts = bin
        .labels
        .iter()
        .map(|l| label_params(cfg, l, &label))
        .collect::<Result<Vec<_>>>()?;
    let (flux_err_mean, cn) = sum_noise_terms(&parts);
    let merged = sum_flux_maps(&maps)?;
    let mask = Mask::from_map(&merged);
    let flux_mean = merged
        .mean_over(&mask)
        .ok_or_else(|| CsiError::Map(format!("merged bin {} is fully masked", label)))?;

    let out_name = cfg
        .flux_dir
        .join(format!("{}_flux_{}.fits", cfg.out_label, label));
    write_map(&out_name, &merged, Some("G"))?;
    info!("Created {}", out_name.display());
    Ok((
        out_name,
        EnergyBin {
            emin: bin.emin,
            emax: bin.emax,
            emean: bin.emean,
            flux_mean,
            flux_err_mean,
            cn,
            fsky: mask.fsky(),
        },
    ))
}

pub fn mk_merge(cfg: &MergeCfg) -> Result<Vec<EnergyBin>> {
    info!("Starting analysis...");
    fs::create_dir_all(&cfg.out_dir).map_err(|e| CsiError::io(&cfg.out_dir, e))?;
    let bins = cfg
        .bins
        .iter()
        .map(|b| merge_bin(cfg, b).map(|(_, eb)| eb))
        .collect::<Result<Vec<_>>>()?;

    let spec_name = cfg.out_dir.join(format!("{}_ESpec.txt", cfg.out_label));
    let write_spec = || -> std::io::Result<()> {
        let mut f = File::create(&spec_name)?;
        writeln!(f, "# E_MEAN \t F_MEAN \t E2_F_MEAN")?;
        for b in &bins {
            writeln!(
                f,
                "{:.2} \t {:e} \t {:e}",
                b.emean,
                b.flux_mean,
                b.flux_mean * b.emean * b.emean
            )?;
        }
        Ok(())
    };
    write_spec().map_err(|e| CsiError::io(&spec_name, e))?;
    info!("Created {}", spec_name.display());

    let params_name = cfg.out_dir.join(format!(
        "{}_{}_parameters.txt",
        cfg.out_label, cfg.binning_label
    ));
    write_energy_bins(&params_name, &bins)?;
    info!("Created {}", params_name.display());
    Ok(bins)
}

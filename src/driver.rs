use std::{
    fs::{
        self
        , File
    }
    , io::{
        BufWriter
        , Write
    }
    , path::PathBuf
};

use log::{
    info
    , warn
};
use rand::{
    rngs::StdRng
    , Rng
    , SeedableRng
};
use rayon::{
    ThreadPool
    , ThreadPoolBuilder
};

use crate::{
    binning::AngularBinning
    , cfg::{
        ControlSource
        , CsiCfg
        , MeanSource
    }
    , csi::{
        estimate_csi
        , CorrelationBin
        , CsiTask
    }
    , error::{
        CsiError
        , Result
    }
    , fits::read_map
    , fluctuation::{
        control_map
        , fluctuation_map
    }
    , output::{
        write_record
        , CsiRecord
    }
    , params::{
        read_energy_bins
        , EnergyBin
    }
    , psf::PsfRef
    , resolution::udgrade_as_psf
    , skymap::{
        Mask
        , SkyMap
    }
};

pub fn build_pool(ncores: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(ncores)
        .thread_name(|i| format!("csi-worker-{}", i))
        .build()?)
}

/// Pixels masked in either map are excluded. `mean` is subtracted from both
/// maps; the control map is then permuted over the valid pixels.
pub fn estimate_bin<R: Rng + ?Sized>(
    pool: &ThreadPool
    , flux: &SkyMap
    , control: &SkyMap
    , mean: f64
    , binning: &AngularBinning
    , rng: &mut R
) -> Result<Vec<CorrelationBin>> {
    flux.check_same_grid(control)?;
    let mask = Mask::from_map(flux).intersect(&Mask::from_map(control));
    let d_flux = fluctuation_map(flux, mean);
    let d_control = control_map(control, mean, &mask, rng);
    let task = CsiTask::new(&d_flux, &d_control, &mask, binning)?;
    Ok(estimate_csi(pool, &task))
}

/// Resolution-matched flux and control maps of one energy bin.
fn load_bin_maps(cfg: &CsiCfg, bin: &EnergyBin, cont_ang: f64) -> Result<(SkyMap, SkyMap)> {
    let flux_path = cfg.flux_map_path(&bin.label());
    info!("Reading {}", flux_path.display());
    let flux = udgrade_as_psf(&read_map(&flux_path)?, cont_ang, cfg.min_order);
    let control = match &cfg.control {
        ControlSource::FluxMap => flux.clone(),
        ControlSource::Map(path) => {
            info!("Reading control map {}", path.display());
            udgrade_as_psf(&read_map(path)?, cont_ang, cfg.min_order)
        }
    };
    Ok((flux, control))
}

pub fn csi_for_bin<R: Rng + ?Sized>(
    cfg: &CsiCfg
    , pool: &ThreadPool
    , psf: &PsfRef
    , binning: &AngularBinning
    , bin: &EnergyBin
    , rng: &mut R
) -> Result<CsiRecord> {
    info!("Considering bin {:.2} - {:.2} ...", bin.emin, bin.emax);
    let cont_ang = psf.eval(bin.emean).to_radians();
    let (flux, control) = load_bin_maps(cfg, bin, cont_ang)?;

    let mask = Mask::from_map(&flux).intersect(&Mask::from_map(&control));
    info!("fsky = {:.6}", mask.fsky());
    let mean = match cfg.mean {
        MeanSource::ParamFile => bin.flux_mean,
        MeanSource::Map => flux
            .mean_over(&mask)
            .ok_or_else(|| CsiError::Map(format!("bin {} is fully masked", bin.label())))?,
    };

    let bins = estimate_bin(pool, &flux, &control, mean, binning, rng)?;
    Ok(CsiRecord {
        emin: bin.emin,
        emax: bin.emax,
        emean: bin.emean,
        bins,
    })
}

/// Runs the whole analysis described by `cfg` and returns the table written.
pub fn mk_csi(cfg: &CsiCfg, pool: &ThreadPool) -> Result<PathBuf> {
    info!("Starting Csi analysis...");
    let binning = cfg.binning()?;
    let psf = PsfRef::from_file(&cfg.psf_ref_file)?;
    let energy_bins = read_energy_bins(cfg.params_file())?;
    if cfg.control == ControlSource::FluxMap {
        warn!("control map is the permuted flux map itself; set `control` to use an independent map");
    }
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    fs::create_dir_all(&cfg.out_dir).map_err(|e| CsiError::io(&cfg.out_dir, e))?;
    let out_path = cfg.output_path();
    let mut out = File::create(&out_path)
        .map(BufWriter::new)
        .map_err(|e| CsiError::io(&out_path, e))?;

    for bin in &energy_bins {
        let rec = csi_for_bin(cfg, pool, &psf, &binning, bin, &mut rng)?;
        write_record(&mut out, &rec)
            .and_then(|_| out.flush())
            .map_err(|e| CsiError::io(&out_path, e))?;
    }
    info!("Created {}", out_path.display());
    Ok(out_path)
}

//! Two-point angular correlation ("Csi") of fluctuation maps.
//!
//! Every valid seed pixel contributes, for each angular bin, the products of
//! its value with the values of the valid pixels in the annulus around it.

use log::{
    debug
    , info
    , warn
};
use ndarray::Array1;
use rayon::{
    prelude::*
    , ThreadPool
};

use crate::{
    binning::AngularBinning
    , constants::{
        PROGRESS_STEP
        , SEED_CHUNK
    }
    , error::{
        CsiError
        , Result
    }
    , healpix::Grid
    , skymap::{
        Mask
        , SkyMap
    }
};

#[derive(Debug, Clone, PartialEq)]
pub struct PixelPairAccumulator {
    pub fluct_sum: Array1<f64>,
    pub control_sum: Array1<f64>,
    pub counts: Array1<usize>,
}

impl PixelPairAccumulator {
    pub fn zeros(nbins: usize) -> Self {
        PixelPairAccumulator {
            fluct_sum: Array1::zeros(nbins),
            control_sum: Array1::zeros(nbins),
            counts: Array1::zeros(nbins),
        }
    }

    pub fn add(&mut self, other: &PixelPairAccumulator) {
        self.fluct_sum += &other.fluct_sum;
        self.control_sum += &other.control_sum;
        self.counts += &other.counts;
    }
}

/// Read-only inputs shared by all per-pixel tasks of one energy bin.
pub struct CsiTask<'a> {
    grid: Grid,
    fluct: &'a [f64],
    control: &'a [f64],
    mask: &'a Mask,
    binning: &'a AngularBinning,
}

impl<'a> CsiTask<'a> {
    pub fn new(
        fluct: &'a SkyMap
        , control: &'a SkyMap
        , mask: &'a Mask
        , binning: &'a AngularBinning
    ) -> Result<Self> {
        fluct.check_same_grid(control)?;
        if mask.npix() != fluct.npix() {
            return Err(CsiError::Map(format!(
                "mask has {} pixels, maps have {}",
                mask.npix(),
                fluct.npix()
            )));
        }
        Ok(CsiTask {
            grid: fluct.grid(),
            fluct: fluct.data(),
            control: control.data(),
            mask,
            binning,
        })
    }

    pub fn seeds(&self) -> Vec<usize> {
        self.mask.indices()
    }

    /// Adds the annulus sums around the valid pixel `seed` to `acc`.
    pub fn accumulate_into(&self, seed: usize, acc: &mut PixelPairAccumulator) {
        debug_assert!(self.mask.is_valid(seed));
        let veci = self.grid.pix2vec(seed);
        let di = self.fluct[seed];
        let ri = self.control[seed];

        let discs: Vec<Vec<usize>> = self
            .binning
            .edges_rad()
            .iter()
            .map(|&th| self.grid.query_disc(&veci, th))
            .collect();

        for (k, pair) in discs.windows(2).enumerate() {
            for j in annulus(&pair[1], &pair[0]) {
                if j == seed || !self.mask.is_valid(j) {
                    continue;
                }
                acc.fluct_sum[k] += di * self.fluct[j];
                acc.control_sum[k] += ri * self.control[j];
                acc.counts[k] += 1;
            }
        }
    }

    pub fn accumulate(&self, seed: usize) -> PixelPairAccumulator {
        let mut acc = PixelPairAccumulator::zeros(self.binning.nbins());
        self.accumulate_into(seed, &mut acc);
        acc
    }
}

/// Pixels of `outer` missing from `inner`, both sorted ascending.
pub fn annulus(outer: &[usize], inner: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(outer.len().saturating_sub(inner.len()));
    let mut inner = inner.iter().peekable();
    for &p in outer {
        while inner.next_if(|&&q| q < p).is_some() {}
        if inner.peek() != Some(&&p) {
            result.push(p);
        }
    }
    result
}

pub fn reduce<'a>(
    parts: impl IntoIterator<Item = &'a PixelPairAccumulator>
    , nbins: usize
) -> PixelPairAccumulator {
    parts
        .into_iter()
        .fold(PixelPairAccumulator::zeros(nbins), |mut total, p| {
            total.add(p);
            total
        })
}

/// One angular bin of the correlation function, `theta` in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationBin {
    pub theta: f64,
    pub csi: f64,
    pub control: f64,
    pub npairs: usize,
}

/// Mean pair product per bin; NaN where no pair was found.
pub fn normalize(total: &PixelPairAccumulator, binning: &AngularBinning) -> Vec<CorrelationBin> {
    binning
        .mean_angles_rad()
        .into_iter()
        .enumerate()
        .map(|(k, theta)| {
            let n = total.counts[k];
            if n == 0 {
                let edges = binning.edges_deg();
                warn!(
                    "no pixel pairs between {} and {} deg, bin left undefined",
                    edges[k],
                    edges[k + 1]
                );
                CorrelationBin {
                    theta,
                    csi: f64::NAN,
                    control: f64::NAN,
                    npairs: 0,
                }
            } else {
                CorrelationBin {
                    theta,
                    csi: total.fluct_sum[k] / n as f64,
                    control: total.control_sum[k] / n as f64,
                    npairs: n,
                }
            }
        })
        .collect()
}

/// Folds the seeds chunk by chunk inside `pool`, then adds the chunk sums in
/// seed order. The chunk boundaries do not depend on the pool size.
pub fn estimate_csi(pool: &ThreadPool, task: &CsiTask) -> Vec<CorrelationBin> {
    let seeds = task.seeds();
    let nseeds = seeds.len();
    let nbins = task.binning.nbins();
    info!("Computing Csi over {} seed pixels...", nseeds);
    let chunks: Vec<PixelPairAccumulator> = pool.install(|| {
        seeds
            .par_chunks(SEED_CHUNK)
            .enumerate()
            .map(|(ichunk, chunk)| {
                if (ichunk * SEED_CHUNK) % PROGRESS_STEP < SEED_CHUNK {
                    debug!("seed pixel {} of {}", ichunk * SEED_CHUNK, nseeds);
                }
                chunk
                    .iter()
                    .fold(PixelPairAccumulator::zeros(nbins), |mut acc, &seed| {
                        task.accumulate_into(seed, &mut acc);
                        acc
                    })
            })
            .collect()
    });
    normalize(&reduce(&chunks, nbins), task.binning)
}

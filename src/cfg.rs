use std::{
    fs::File
    , path::{
        Path
        , PathBuf
    }
};

use serde::{
    Deserialize
    , Serialize
};

use crate::{
    binning::AngularBinning
    , constants::{
        DEFAULT_NCORES
        , MIN_ORDER
    }
    , error::{
        CsiError
        , Result
    }
    , healpix::{
        Grid
        , MAX_ORDER
    }
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSource {
    FluxMap,
    Map(PathBuf),
}

impl Default for ControlSource {
    fn default() -> Self {
        ControlSource::FluxMap
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeanSource {
    ParamFile,
    Map,
}

impl Default for MeanSource {
    fn default() -> Self {
        MeanSource::ParamFile
    }
}

fn default_min_order() -> u32 {
    MIN_ORDER
}

fn default_ncores() -> usize {
    DEFAULT_NCORES
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsiCfg {
    pub in_label: String,
    pub out_label: String,
    pub binning_label: String,
    pub psf_ref_file: PathBuf,
    pub out_dir: PathBuf,
    pub theta_bins_deg: Vec<f64>,
    #[serde(default)]
    pub flux_dir: Option<PathBuf>,
    #[serde(default)]
    pub params_file: Option<PathBuf>,
    #[serde(default)]
    pub control: ControlSource,
    #[serde(default)]
    pub mean: MeanSource,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_min_order")]
    pub min_order: u32,
    #[serde(default = "default_ncores")]
    pub ncores: usize,
}

fn require_label(key: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(CsiError::config(key, "must not be empty"))
    } else {
        Ok(())
    }
}

fn load_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| CsiError::io(path, e))?;
    serde_yaml::from_reader(file).map_err(|source| CsiError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

impl CsiCfg {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let cfg: CsiCfg = load_yaml(path.as_ref())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        require_label("in_label", &self.in_label)?;
        require_label("out_label", &self.out_label)?;
        require_label("binning_label", &self.binning_label)?;
        self.binning()?;
        if self.ncores == 0 {
            return Err(CsiError::config("ncores", "at least one worker is needed"));
        }
        if self.min_order > MAX_ORDER {
            return Err(CsiError::config(
                "min_order",
                format!("HEALPix orders stop at {}", MAX_ORDER),
            ));
        }
        Ok(())
    }

    pub fn binning(&self) -> Result<AngularBinning> {
        AngularBinning::from_degrees(&self.theta_bins_deg)
    }

    pub fn flux_dir(&self) -> PathBuf {
        self.flux_dir
            .clone()
            .unwrap_or_else(|| self.out_dir.join("output_flux"))
    }

    pub fn params_file(&self) -> PathBuf {
        self.params_file.clone().unwrap_or_else(|| {
            self.out_dir.join(format!(
                "{}_{}_parameters.txt",
                self.in_label, self.binning_label
            ))
        })
    }

    pub fn flux_map_path(&self, energy_label: &str) -> PathBuf {
        self.flux_dir()
            .join(format!("{}_flux_{}.fits", self.in_label, energy_label))
    }

    pub fn output_path(&self) -> PathBuf {
        self.out_dir
            .join(format!("{}_{}_csi.txt", self.out_label, self.binning_label))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeBinCfg {
    pub emin: f64,
    pub emax: f64,
    pub emean: f64,
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeCfg {
    pub out_label: String,
    pub binning_label: String,
    pub flux_dir: PathBuf,
    pub out_dir: PathBuf,
    #[serde(default)]
    pub params_dir: Option<PathBuf>,
    pub bins: Vec<MergeBinCfg>,
}

impl MergeCfg {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let cfg: MergeCfg = load_yaml(path.as_ref())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        require_label("out_label", &self.out_label)?;
        require_label("binning_label", &self.binning_label)?;
        if self.bins.is_empty() {
            return Err(CsiError::config("bins", "no energy bins given"));
        }
        if let Some(b) = self.bins.iter().find(|b| b.labels.is_empty()) {
            return Err(CsiError::config(
                "bins",
                format!("bin {}-{} has no labels", b.emin, b.emax),
            ));
        }
        if let Some(b) = self.bins.iter().find(|b| b.emax <= b.emin) {
            return Err(CsiError::config(
                "bins",
                format!("bin {}-{} is empty", b.emin, b.emax),
            ));
        }
        Ok(())
    }

    pub fn params_file(&self, label: &str) -> PathBuf {
        self.params_dir
            .as_ref()
            .unwrap_or(&self.out_dir)
            .join(format!("{}_{}_parameters.txt", label, self.binning_label))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroBinCfg {
    pub emin: f64,
    pub emax: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeriodCfg {
    pub label: String,
    pub counts: Vec<PathBuf>,
    pub exposures: Vec<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForegroundCfg {
    pub energy: f64,
    pub file: PathBuf,
}

fn default_nside() -> usize {
    512
}

fn default_fore_region_deg() -> f64 {
    2.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestyleCfg {
    pub out_label: String,
    pub binning_label: String,
    pub out_dir: PathBuf,
    #[serde(default)]
    pub flux_dir: Option<PathBuf>,
    #[serde(default = "default_nside")]
    pub nside: usize,
    pub power_law_index: f64,
    /// One mask for every macro bin, or one per macro bin.
    pub mask_files: Vec<PathBuf>,
    pub micro_bins: Vec<MicroBinCfg>,
    /// Inclusive `[first, last]` micro bin indices.
    pub macro_bins: Vec<(usize, usize)>,
    pub periods: Vec<PeriodCfg>,
    #[serde(default)]
    pub foreground: Vec<ForegroundCfg>,
    #[serde(default = "default_fore_region_deg")]
    pub fore_region_deg: f64,
}

impl RestyleCfg {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let cfg: RestyleCfg = load_yaml(path.as_ref())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        require_label("out_label", &self.out_label)?;
        require_label("binning_label", &self.binning_label)?;
        Grid::new(self.nside).map_err(|e| CsiError::config("nside", e.to_string()))?;

        let n = self.micro_bins.len();
        if n == 0 {
            return Err(CsiError::config("micro_bins", "no energy bins given"));
        }
        if let Some(b) = self
            .micro_bins
            .iter()
            .find(|b| !(b.emin > 0.0 && b.emax > b.emin && b.emax.is_finite()))
        {
            return Err(CsiError::config(
                "micro_bins",
                format!("bin {}-{} is not a positive energy range", b.emin, b.emax),
            ));
        }
        if self.macro_bins.is_empty() {
            return Err(CsiError::config("macro_bins", "no energy bins given"));
        }
        if let Some(&(first, last)) = self
            .macro_bins
            .iter()
            .find(|&&(first, last)| first > last || last >= n)
        {
            return Err(CsiError::config(
                "macro_bins",
                format!("[{}, {}] is not a range of the {} micro bins", first, last, n),
            ));
        }
        if self.mask_files.len() != 1 && self.mask_files.len() != self.macro_bins.len() {
            return Err(CsiError::config(
                "mask_files",
                format!(
                    "expected 1 or {} files, found {}",
                    self.macro_bins.len(),
                    self.mask_files.len()
                ),
            ));
        }
        if self.periods.is_empty() {
            return Err(CsiError::config("periods", "no observation period given"));
        }
        for p in &self.periods {
            if p.counts.len() != n || p.exposures.len() != n + 1 {
                return Err(CsiError::config(
                    "periods",
                    format!(
                        "period {} needs {} count and {} exposure maps",
                        p.label,
                        n,
                        n + 1
                    ),
                ));
            }
        }
        if self.foreground.len() == 1
            || self.foreground.windows(2).any(|w| w[1].energy <= w[0].energy)
        {
            return Err(CsiError::config(
                "foreground",
                "need at least two maps with increasing energies",
            ));
        }
        if !(self.fore_region_deg > 0.0) {
            return Err(CsiError::config("fore_region_deg", "must be positive"));
        }
        Ok(())
    }

    pub fn mask_file(&self, imacro: usize) -> &Path {
        if self.mask_files.len() == 1 {
            &self.mask_files[0]
        } else {
            &self.mask_files[imacro]
        }
    }

    pub fn flux_dir(&self) -> PathBuf {
        self.flux_dir
            .clone()
            .unwrap_or_else(|| self.out_dir.join("output_flux"))
    }

    pub fn params_file(&self) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}_parameters.txt",
            self.out_label, self.binning_label
        ))
    }
}

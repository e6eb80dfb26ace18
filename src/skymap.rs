use crate::{
    constants::{
        is_unseen
        , UNSEEN
    }
    , error::{
        CsiError
        , Result
    }
    , healpix::{
        ud_grade
        , Grid
    }
};

#[derive(Debug, Clone, PartialEq)]
pub struct SkyMap {
    grid: Grid,
    data: Vec<f64>,
}

impl SkyMap {
    pub fn new(data: Vec<f64>) -> Result<Self> {
        let grid = Grid::from_npix(data.len())?;
        Ok(SkyMap { grid, data })
    }

    pub fn filled(grid: Grid, value: f64) -> Self {
        SkyMap {
            grid,
            data: vec![value; grid.npix()],
        }
    }

    pub fn from_fn(grid: Grid, f: impl Fn(usize) -> f64) -> Self {
        SkyMap {
            grid,
            data: (0..grid.npix()).map(f).collect(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn nside(&self) -> usize {
        self.grid.nside()
    }

    pub fn npix(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn ud_grade(&self, to: Grid) -> SkyMap {
        SkyMap {
            grid: to,
            data: ud_grade(&self.data, self.grid, to),
        }
    }

    /// Mean over the pixels valid in `mask`, `None` if there are none.
    pub fn mean_over(&self, mask: &Mask) -> Option<f64> {
        let idx = mask.indices();
        if idx.is_empty() {
            None
        } else {
            Some(idx.iter().map(|&i| self.data[i]).sum::<f64>() / idx.len() as f64)
        }
    }

    pub fn apply_mask(&mut self, mask: &Mask) {
        self.data
            .iter_mut()
            .zip(mask.valid.iter())
            .filter(|&(_, &v)| !v)
            .for_each(|(x, _)| *x = UNSEEN);
    }

    pub fn check_same_grid(&self, other: &SkyMap) -> Result<()> {
        if self.grid == other.grid {
            Ok(())
        } else {
            Err(CsiError::Map(format!(
                "NSIDE mismatch: {} vs {}",
                self.nside(),
                other.nside()
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    valid: Vec<bool>,
}

impl Mask {
    pub fn from_map(map: &SkyMap) -> Self {
        Mask {
            valid: map.data.iter().map(|&x| !is_unseen(x)).collect(),
        }
    }

    pub fn from_weights(weights: &SkyMap) -> Self {
        Mask {
            valid: weights
                .data
                .iter()
                .map(|&x| x != 0.0 && !is_unseen(x))
                .collect(),
        }
    }

    pub fn intersect(&self, other: &Mask) -> Mask {
        Mask {
            valid: self
                .valid
                .iter()
                .zip(other.valid.iter())
                .map(|(&a, &b)| a && b)
                .collect(),
        }
    }

    pub fn restrict(&self, keep: impl Fn(usize) -> bool) -> Mask {
        Mask {
            valid: self
                .valid
                .iter()
                .enumerate()
                .map(|(i, &v)| v && keep(i))
                .collect(),
        }
    }

    pub fn npix(&self) -> usize {
        self.valid.len()
    }

    pub fn is_valid(&self, ipix: usize) -> bool {
        self.valid[ipix]
    }

    pub fn indices(&self) -> Vec<usize> {
        self.valid
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    pub fn fsky(&self) -> f64 {
        if self.valid.is_empty() {
            0.0
        } else {
            self.count() as f64 / self.valid.len() as f64
        }
    }
}

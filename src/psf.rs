use std::path::Path;

use crate::{
    error::{
        CsiError
        , Result
    }
    , utils::read_numeric_rows
};

#[derive(Debug, Clone)]
pub struct PsfRef {
    energy: Vec<f64>,
    radius_deg: Vec<f64>,
}

impl PsfRef {
    pub fn new(energy: Vec<f64>, radius_deg: Vec<f64>) -> Result<Self> {
        if energy.len() < 2 || energy.len() != radius_deg.len() {
            return Err(CsiError::config(
                "psf_ref_file",
                "need at least two (energy, radius) points",
            ));
        }
        if energy.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CsiError::config(
                "psf_ref_file",
                "energies must be strictly increasing",
            ));
        }
        if radius_deg.iter().any(|&r| r <= 0.0 || !r.is_finite()) {
            return Err(CsiError::config(
                "psf_ref_file",
                "containment radii must be positive",
            ));
        }
        Ok(PsfRef { energy, radius_deg })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut energy = Vec::new();
        let mut radius = Vec::new();
        for (line, row) in read_numeric_rows(path)? {
            if row.len() < 2 {
                return Err(CsiError::Table {
                    path: path.to_path_buf(),
                    line,
                    reason: "expected energy and radius".to_string(),
                });
            }
            energy.push(row[0]);
            radius.push(row[1]);
        }
        PsfRef::new(energy, radius)
    }

    /// Containment radius in degrees, linear interpolation clamped to the
    /// tabulated range. NaN energies give NaN.
    pub fn eval(&self, energy: f64) -> f64 {
        if energy.is_nan() {
            return f64::NAN;
        }
        let n = self.energy.len();
        if energy <= self.energy[0] {
            return self.radius_deg[0];
        }
        if energy >= self.energy[n - 1] {
            return self.radius_deg[n - 1];
        }
        let i = self.energy.partition_point(|&e| e <= energy);
        let (e0, e1) = (self.energy[i - 1], self.energy[i]);
        let (r0, r1) = (self.radius_deg[i - 1], self.radius_deg[i]);
        r0 + (r1 - r0) * (energy - e0) / (e1 - e0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn interpolates_and_clamps() {
        let psf = PsfRef::new(vec![100.0, 1000.0, 10000.0], vec![5.0, 1.0, 0.2]).unwrap();
        assert_eq!(psf.eval(10.0), 5.0);
        assert_eq!(psf.eval(1e6), 0.2);
        assert_eq!(psf.eval(1000.0), 1.0);
        assert!((psf.eval(550.0) - 3.0).abs() < 1e-12);
        assert!(psf.eval(f64::NAN).is_nan());
        assert_eq!(psf.eval(f64::INFINITY), 0.2);
    }

    #[test]
    fn rejects_unsorted() {
        assert!(PsfRef::new(vec![100.0, 50.0], vec![1.0, 2.0]).is_err());
        assert!(PsfRef::new(vec![100.0], vec![1.0]).is_err());
        assert!(PsfRef::new(vec![1.0, 2.0], vec![1.0, 0.0]).is_err());
    }

    #[test]
    fn from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# energy psf68\n100 6.0\n1000 0.9\n100000 0.1").unwrap();
        let psf = PsfRef::from_file(f.path()).unwrap();
        assert_eq!(psf.eval(1000.0), 0.9);
    }
}

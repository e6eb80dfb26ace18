use crate::{
    error::{
        CsiError
        , Result
    }
    , utils::geometric_mean
};

#[derive(Debug, Clone, PartialEq)]
pub struct AngularBinning {
    edges_deg: Vec<f64>,
    edges_rad: Vec<f64>,
}

impl AngularBinning {
    pub fn from_degrees(edges_deg: &[f64]) -> Result<Self> {
        let fail = |reason: &str| Err(CsiError::config("theta_bins_deg", reason));
        if edges_deg.len() < 2 {
            return fail("at least two thresholds are needed");
        }
        if edges_deg
            .iter()
            .any(|&t| !t.is_finite() || !(0.0..=180.0).contains(&t))
        {
            return fail("thresholds must lie within [0, 180] degrees");
        }
        // nested discs, hence well defined annuli, need strictly increasing edges
        if edges_deg.windows(2).any(|w| w[1] <= w[0]) {
            return fail("thresholds must be strictly increasing");
        }
        Ok(AngularBinning {
            edges_deg: edges_deg.to_vec(),
            edges_rad: edges_deg.iter().map(|t| t.to_radians()).collect(),
        })
    }

    pub fn nbins(&self) -> usize {
        self.edges_deg.len() - 1
    }

    pub fn edges_deg(&self) -> &[f64] {
        &self.edges_deg
    }

    pub fn edges_rad(&self) -> &[f64] {
        &self.edges_rad
    }

    pub fn mean_angles_rad(&self) -> Vec<f64> {
        self.edges_rad
            .windows(2)
            .map(|w| geometric_mean(w[0], w[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_angles() {
        let b = AngularBinning::from_degrees(&[0.0, 1.0, 4.0, 16.0]).unwrap();
        assert_eq!(b.nbins(), 3);
        let theta = b.mean_angles_rad();
        assert_eq!(theta[0], 0.0);
        assert!((theta[1] - 2_f64.to_radians()).abs() < 1e-15);
        assert!((theta[2] - 8_f64.to_radians()).abs() < 1e-15);
        assert!((b.edges_rad()[3] - 16_f64.to_radians()).abs() < 1e-15);
    }

    #[test]
    fn validation() {
        assert!(AngularBinning::from_degrees(&[1.0]).is_err());
        assert!(AngularBinning::from_degrees(&[0.0, 1.0, 1.0]).is_err());
        assert!(AngularBinning::from_degrees(&[2.0, 1.0]).is_err());
        assert!(AngularBinning::from_degrees(&[-1.0, 1.0]).is_err());
        assert!(AngularBinning::from_degrees(&[0.0, 181.0]).is_err());
        assert!(AngularBinning::from_degrees(&[0.0, f64::NAN]).is_err());
    }
}

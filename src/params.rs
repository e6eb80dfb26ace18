use std::{
    fs::File
    , io::Write
    , path::Path
};

use crate::{
    error::{
        CsiError
        , Result
    }
    , utils::read_numeric_rows
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyBin {
    pub emin: f64,
    pub emax: f64,
    pub emean: f64,
    pub flux_mean: f64,
    pub flux_err_mean: f64,
    pub cn: f64,
    pub fsky: f64,
}

pub fn energy_label(emin: f64, emax: f64) -> String {
    format!("{}-{}", emin.trunc() as i64, emax.trunc() as i64)
}

impl EnergyBin {
    pub fn label(&self) -> String {
        energy_label(self.emin, self.emax)
    }
}

/// Reads `E_MIN E_MAX E_MEAN F_MEAN FERR_MEAN CN FSKY` rows. Energies must
/// be finite and positive.
pub fn read_energy_bins(path: impl AsRef<Path>) -> Result<Vec<EnergyBin>> {
    let path = path.as_ref();
    read_numeric_rows(path)?
        .into_iter()
        .map(|(line, row)| {
            let fail = |reason: String| CsiError::Table {
                path: path.to_path_buf(),
                line,
                reason,
            };
            if row.len() < 7 {
                return Err(fail(format!("expected 7 columns, found {}", row.len())));
            }
            if row[..3].iter().any(|&e| !e.is_finite() || e <= 0.0) {
                return Err(fail(format!(
                    "energies {} {} {} must be finite and positive",
                    row[0], row[1], row[2]
                )));
            }
            Ok(EnergyBin {
                emin: row[0],
                emax: row[1],
                emean: row[2],
                flux_mean: row[3],
                flux_err_mean: row[4],
                cn: row[5],
                fsky: row[6],
            })
        })
        .collect()
}

pub fn write_energy_bins(path: impl AsRef<Path>, bins: &[EnergyBin]) -> Result<()> {
    let path = path.as_ref();
    let write = || -> std::io::Result<()> {
        let mut f = File::create(path)?;
        writeln!(f, "# \t E_MIN \t E_MAX \t E_MEAN \t F_MEAN \t FERR_MEAN \t CN \t FSKY")?;
        for b in bins {
            writeln!(
                f,
                "{:.2} \t {:.2} \t {:.2} \t {:e} \t {:e} \t {:e} \t {:.6}",
                b.emin, b.emax, b.emean, b.flux_mean, b.flux_err_mean, b.cn, b.fsky
            )?;
        }
        Ok(())
    };
    write().map_err(|e| CsiError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fname = dir.path().join("P8_13bins_parameters.txt");
        let bins = vec![
            EnergyBin {
                emin: 524.81,
                emax: 1000.0,
                emean: 722.35,
                flux_mean: 3.2e-7,
                flux_err_mean: 1.0e-9,
                cn: 2.5e-17,
                fsky: 0.31,
            },
            EnergyBin {
                emin: 1000.0,
                emax: 1737.8,
                emean: 1318.26,
                flux_mean: 1.1e-7,
                flux_err_mean: 4.0e-10,
                cn: 1.0e-17,
                fsky: 0.3,
            },
        ];
        write_energy_bins(&fname, &bins).unwrap();
        let back = read_energy_bins(&fname).unwrap();
        assert_eq!(back, bins);
        assert_eq!(back[0].label(), "524-1000");
        assert_eq!(back[1].label(), "1000-1737");
    }

    #[test]
    fn short_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fname = dir.path().join("bad.txt");
        std::fs::write(&fname, "# header\n100 200 150 1e-7\n").unwrap();
        let err = read_energy_bins(&fname).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn non_finite_energy_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fname = dir.path().join("nan.txt");
        std::fs::write(&fname, "100 200 150 1e-7 1e-9 1e-17 0.3
200 400 NaN 1e-7 1e-9 1e-17 0.3
")
            .unwrap();
        let err = read_energy_bins(&fname).unwrap_err();
        assert!(err.to_string().contains(":2:"));
        std::fs::write(&fname, "inf 200 150 1e-7 1e-9 1e-17 0.3
").unwrap();
        assert!(read_energy_bins(&fname).is_err());
    }
}

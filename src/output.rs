use std::{
    fs::File
    , io::{
        BufRead
        , BufReader
        , Write
    }
    , path::Path
};

use crate::{
    csi::CorrelationBin
    , error::{
        CsiError
        , Result
    }
    , utils::join_values
};

#[derive(Debug, Clone, PartialEq)]
pub struct CsiRecord {
    pub emin: f64,
    pub emax: f64,
    pub emean: f64,
    pub bins: Vec<CorrelationBin>,
}

impl CsiRecord {
    pub fn thetas(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.theta).collect()
    }

    pub fn csi(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.csi).collect()
    }

    pub fn control(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.control).collect()
    }
}

/// Appends the `ENERGY`, `THETA` (radians), `CSI` and `R` rows of `rec`.
pub fn write_record<W: Write>(w: &mut W, rec: &CsiRecord) -> std::io::Result<()> {
    writeln!(w, "ENERGY\t {:.2} {:.2} {:.2}", rec.emin, rec.emax, rec.emean)?;
    writeln!(w, "THETA\t{}", join_values(rec.thetas()))?;
    writeln!(w, "CSI\t{}", join_values(rec.csi()))?;
    writeln!(w, "R\t{}", join_values(rec.control()))?;
    Ok(())
}

pub fn read_csi_table(path: impl AsRef<Path>) -> Result<Vec<CsiRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CsiError::io(path, e))?;
    let fail = |line: usize, reason: &str| CsiError::Table {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };

    let mut records: Vec<CsiRecord> = Vec::new();
    let mut columns: [Vec<f64>; 3] = Default::default();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CsiError::io(path, e))?;
        let mut tokens = line.split_whitespace();
        let tag = match tokens.next() {
            Some(t) => t,
            None => continue,
        };
        let values = tokens
            .map(|t| t.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| fail(i + 1, "non numeric value"))?;
        match tag {
            "ENERGY" => {
                if values.len() != 3 {
                    return Err(fail(i + 1, "ENERGY needs emin, emax and emean"));
                }
                records.push(CsiRecord {
                    emin: values[0],
                    emax: values[1],
                    emean: values[2],
                    bins: Vec::new(),
                });
            }
            "THETA" | "CSI" | "R" => {
                let rec = records
                    .last_mut()
                    .ok_or_else(|| fail(i + 1, "row before the first ENERGY line"))?;
                let slot = match tag {
                    "THETA" => 0,
                    "CSI" => 1,
                    _ => 2,
                };
                columns[slot] = values;
                if tag == "R" {
                    let [theta, csi, control] = std::mem::take(&mut columns);
                    if theta.len() != csi.len() || csi.len() != control.len() {
                        return Err(fail(i + 1, "THETA, CSI and R lengths differ"));
                    }
                    rec.bins = theta
                        .into_iter()
                        .zip(csi.into_iter().zip(control.into_iter()))
                        .map(|(theta, (csi, control))| CorrelationBin {
                            theta,
                            csi,
                            control,
                            npairs: 0,
                        })
                        .collect();
                }
            }
            other => return Err(fail(i + 1, &format!("unknown row tag `{}`", other))),
        }
    }
    Ok(records)
}

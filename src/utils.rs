use std::{
    fs::File
    , io::{
        BufRead
        , BufReader
    }
    , path::Path
};

use crate::error::{
    CsiError
    , Result
};

/// Whitespace separated numeric rows of a text table, with 1-based line
/// numbers. Blank lines and lines starting with `#` are skipped.
pub fn read_numeric_rows(path: impl AsRef<Path>) -> Result<Vec<(usize, Vec<f64>)>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CsiError::io(path, e))?;
    let mut rows = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CsiError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| CsiError::Table {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason: format!("`{}` is not a number", tok),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((i + 1, row));
    }
    Ok(rows)
}

pub fn join_values(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|x| format!("{:e}", x))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn geometric_mean(a: f64, b: f64) -> f64 {
    (a * b).sqrt()
}

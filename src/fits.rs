use std::path::Path;

use fitsio::{
    hdu::HduInfo
    , tables::{
        ColumnDataType
        , ColumnDescription
    }
    , FitsFile
};

use crate::{
    constants::UNSEEN
    , error::{
        CsiError
        , Result
    }
    , healpix::Grid
    , skymap::SkyMap
};

const COLUMN: &str = "TEMPERATURE";

/// Reads the first column of the first binary table of `path` as a RING map.
pub fn read_map(path: impl AsRef<Path>) -> Result<SkyMap> {
    let path = path.as_ref();
    let fail = |e| CsiError::fitsio(path, e);
    let bad = |reason: &str| CsiError::Fits {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut fptr = FitsFile::open(path).map_err(fail)?;
    let hdu = fptr.hdu(1).map_err(fail)?;
    let column = match &hdu.info {
        HduInfo::TableInfo {
            column_descriptions, ..
        } => column_descriptions.first().map(|c| c.name.clone()),
        _ => None,
    }
    .ok_or_else(|| bad("first extension is not a table"))?;

    let values: Vec<f64> = hdu.read_col(&mut fptr, &column).map_err(fail)?;
    let grid = Grid::from_npix(values.len())
        .map_err(|_| bad(&format!("{} values do not form a HEALPix map", values.len())))?;
    let ordering = hdu
        .read_key::<String>(&mut fptr, "ORDERING")
        .unwrap_or_else(|_| "RING".to_string());

    match ordering.trim() {
        "RING" => SkyMap::new(values),
        "NESTED" => {
            let mut ring = vec![0.0; values.len()];
            values
                .iter()
                .enumerate()
                .for_each(|(inest, &x)| ring[grid.nest2ring(inest)] = x);
            SkyMap::new(ring)
        }
        other => Err(bad(&format!("unknown ORDERING '{}'", other))),
    }
}

/// Writes `map` as a RING ordered HEALPix table, replacing `path`.
pub fn write_map(path: impl AsRef<Path>, map: &SkyMap, coord: Option<&str>) -> Result<()> {
    write_ordered(path.as_ref(), map.data(), map.nside(), "RING", coord)
}

fn write_ordered(
    path: &Path,
    values: &[f64],
    nside: usize,
    ordering: &str,
    coord: Option<&str>,
) -> Result<()> {
    let fail = |e| CsiError::fitsio(path, e);
    let mut fptr = FitsFile::create(path).overwrite().open().map_err(fail)?;
    let column = ColumnDescription::new(COLUMN)
        .with_type(ColumnDataType::Double)
        .create()
        .map_err(fail)?;
    let hdu = fptr.create_table("xtension", &[column]).map_err(fail)?;
    hdu.write_col(&mut fptr, COLUMN, values).map_err(fail)?;

    hdu.write_key(&mut fptr, "PIXTYPE", "HEALPIX").map_err(fail)?;
    hdu.write_key(&mut fptr, "ORDERING", ordering).map_err(fail)?;
    hdu.write_key(&mut fptr, "NSIDE", nside as i64).map_err(fail)?;
    hdu.write_key(&mut fptr, "FIRSTPIX", 0_i64).map_err(fail)?;
    hdu.write_key(&mut fptr, "LASTPIX", values.len() as i64 - 1).map_err(fail)?;
    hdu.write_key(&mut fptr, "INDXSCHM", "IMPLICIT").map_err(fail)?;
    hdu.write_key(&mut fptr, "OBJECT", "FULLSKY").map_err(fail)?;
    hdu.write_key(&mut fptr, "BAD_DATA", UNSEEN).map_err(fail)?;
    if let Some(c) = coord {
        hdu.write_key(&mut fptr, "COORDSYS", c).map_err(fail)?;
    }
    Ok(())
}

use anyhow::{
    Context
    , Result
};
use clap::{
    Arg
    , ArgMatches
    , Command
};

use gamma_csi::{
    coordinates::{
        SphCoord
        , Vec3d
    }
    , fits::write_map
    , Grid
    , SkyMap
    , UNSEEN
};

fn value<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let raw = matches.value_of(name).unwrap_or_default();
    raw.parse::<T>()
        .ok()
        .with_context(|| format!("invalid value `{}` for {}", raw, name))
}

fn main() -> Result<()> {
    let matches = Command::new("gaussian_map")
        .about("Synthetic flux map: Gaussian bump on a flat background")
        .arg(
            Arg::new("nside")
                .short('n')
                .long("nside")
                .takes_value(true)
                .value_name("nside")
                .required(true)
                .help("nside"),
        )
        .arg(
            Arg::new("sigma_deg")
                .short('s')
                .long("sigma")
                .takes_value(true)
                .value_name("sigma in deg")
                .required(true)
                .help("bump width"),
        )
        .arg(
            Arg::new("amplitude")
                .short('a')
                .long("amp")
                .takes_value(true)
                .value_name("amplitude")
                .default_value("5.0")
                .help("bump amplitude"),
        )
        .arg(
            Arg::new("background")
                .short('b')
                .long("bkg")
                .takes_value(true)
                .value_name("level")
                .default_value("0.0")
                .help("flat background level"),
        )
        .arg(
            Arg::new("lon")
                .long("lon")
                .takes_value(true)
                .value_name("deg")
                .default_value("0.0")
                .allow_hyphen_values(true)
                .help("bump longitude"),
        )
        .arg(
            Arg::new("lat")
                .long("lat")
                .takes_value(true)
                .value_name("deg")
                .default_value("45.0")
                .allow_hyphen_values(true)
                .help("bump latitude"),
        )
        .arg(
            Arg::new("mask_lat")
                .long("mask-lat")
                .takes_value(true)
                .value_name("deg")
                .required(false)
                .help("mask |latitude| below this value"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("output file name")
                .required(true)
                .help("output file name"),
        )
        .get_matches();

    let grid = Grid::new(value(&matches, "nside")?)?;
    let sigma = value::<f64>(&matches, "sigma_deg")?.to_radians();
    let amp: f64 = value(&matches, "amplitude")?;
    let bkg: f64 = value(&matches, "background")?;
    let centre = Vec3d::from_sph_coord(SphCoord::from_lonlat_deg(
        value(&matches, "lon")?,
        value(&matches, "lat")?,
    ));
    let mask_z = match matches.value_of("mask_lat") {
        Some(_) => Some(value::<f64>(&matches, "mask_lat")?.to_radians().sin()),
        None => None,
    };

    let hpmap = SkyMap::from_fn(grid, |i| {
        let v = grid.pix2vec(i);
        match mask_z {
            Some(z) if v.z.abs() < z => UNSEEN,
            _ => bkg + amp * (-v.angle_to(&centre).powi(2) / (2.0 * sigma.powi(2))).exp(),
        }
    });
    let outfile = matches.value_of("outfile").unwrap_or_default();
    write_map(outfile, &hpmap, Some("G"))?;
    Ok(())
}

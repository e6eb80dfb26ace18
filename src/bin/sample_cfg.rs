use std::{
    fs::File
    , path::PathBuf
};

use anyhow::{
    Context
    , Result
};
use clap::{
    Arg
    , Command
};
use serde_yaml::to_writer;

use gamma_csi::{
    ControlSource
    , CsiCfg
    , MeanSource
};

fn main() -> Result<()> {
    let matches = Command::new("sample_cfg")
        .about("Writes an example mkcsi configuration")
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("out")
                .takes_value(true)
                .value_name("yaml file")
                .required(true)
                .help("output file name"),
        )
        .get_matches();

    let cfg = CsiCfg {
        in_label: "P8_UCV_t56".to_string(),
        out_label: "P8_UCV_t56_csi".to_string(),
        binning_label: "13bins".to_string(),
        psf_ref_file: PathBuf::from("config/ascii/PSF_UCV_PSF1.txt"),
        out_dir: PathBuf::from("output"),
        theta_bins_deg: vec![0.0, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0],
        flux_dir: None,
        params_file: None,
        control: ControlSource::FluxMap,
        mean: MeanSource::ParamFile,
        seed: Some(1),
        min_order: 7,
        ncores: 6,
    };
    cfg.validate()?;

    let fname = matches.value_of("outfile").unwrap_or_default();
    let mut outfile = File::create(fname).with_context(|| format!("cannot create {}", fname))?;
    to_writer(&mut outfile, &cfg)?;
    Ok(())
}

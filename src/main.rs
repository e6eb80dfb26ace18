use anyhow::{
    Context
    , Result
};
use clap::{
    Arg
    , Command
};

use gamma_csi::{
    driver::build_pool
    , logging::init_logging
    , mk_csi
    , CsiCfg
};

fn main() -> Result<()> {
    let matches = Command::new("mkcsi")
        .about("Angular two-point correlation of gamma-ray flux maps")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .value_name("yaml file")
                .required(true)
                .help("the input configuration file"),
        )
        .arg(
            Arg::new("ncores")
                .short('n')
                .long("ncores")
                .takes_value(true)
                .value_name("n")
                .required(false)
                .help("number of worker threads, overrides the configuration"),
        )
        .get_matches();

    let _logger = init_logging("info")?;

    let cfg_name = matches.value_of("config").unwrap_or_default();
    let mut cfg = CsiCfg::from_file(cfg_name)?;
    if let Some(n) = matches.value_of("ncores") {
        cfg.ncores = n
            .parse()
            .with_context(|| format!("--ncores expects a number, got `{}`", n))?;
        cfg.validate()?;
    }

    let pool = build_pool(cfg.ncores)?;

    let out = mk_csi(&cfg, &pool).with_context(|| format!("Csi analysis of {} failed", cfg_name))?;
    println!("{}", out.display());
    Ok(())
}

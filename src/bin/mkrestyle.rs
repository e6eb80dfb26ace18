use anyhow::{
    Context
    , Result
};
use clap::{
    Arg
    , Command
};

use gamma_csi::{
    logging::init_logging
    , mk_restyle
    , RestyleCfg
};

fn main() -> Result<()> {
    let matches = Command::new("mkrestyle")
        .about("Flux, flux error and parameter table of macro energy bins")
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
            Arg::new("udgrade")
                .long("udgrade")
                .takes_value(true)
                .value_name("nside")
                .required(false)
                .help("nside of the output maps, overrides the configuration"),
        )
        .get_matches();

    let _logger = init_logging("info")?;
    let cfg_name = matches.value_of("config").unwrap_or_default();
    let mut cfg = RestyleCfg::from_file(cfg_name)?;
    if let Some(n) = matches.value_of("udgrade") {
        cfg.nside = n
            .parse()
            .with_context(|| format!("--udgrade expects a number, got `{}`", n))?;
        cfg.validate()?;
    }

    let rows = mk_restyle(&cfg).with_context(|| format!("flux analysis of {} failed", cfg_name))?;
    for b in &rows {
        println!(
            "{} {} {} {:e} {:e} {:e} {}",
            b.emin, b.emax, b.emean, b.flux_mean, b.flux_err_mean, b.cn, b.fsky
        );
    }
    Ok(())
}

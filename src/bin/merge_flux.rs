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
    , merge::mk_merge
    , MergeCfg
};

fn main() -> Result<()> {
    let matches = Command::new("merge_flux")
        .about("Sums per-period flux maps of every energy bin")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .value_name("yaml file")
                .required(true)
                .help("the merge configuration file"),
        )
        .get_matches();

    let _logger = init_logging("info")?;
    let cfg_name = matches.value_of("config").unwrap_or_default();
    let cfg = MergeCfg::from_file(cfg_name)?;
    let bins = mk_merge(&cfg).with_context(|| format!("merging flux maps of {} failed", cfg_name))?;
    for b in &bins {
        println!(
            "{} {} {} {:e} {:e} {:e} {}",
            b.emin, b.emax, b.emean, b.flux_mean, b.flux_err_mean, b.cn, b.fsky
        );
    }
    Ok(())
}

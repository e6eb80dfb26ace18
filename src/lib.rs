#![allow(non_snake_case)]

pub mod binning;
pub mod cfg;
pub mod constants;
pub mod coordinates;
pub mod csi;
pub mod driver;
pub mod error;
pub mod fits;
pub mod fluctuation;
pub mod healpix;
pub mod logging;
pub mod merge;
pub mod output;
pub mod params;
pub mod psf;
pub mod resolution;
pub mod restyle;
pub mod skymap;
pub mod utils;

pub use crate::{
    binning::AngularBinning
    , cfg::{
        ControlSource
        , CsiCfg
        , MeanSource
        , MergeBinCfg
        , MergeCfg
        , RestyleCfg
    }
    , constants::{
        is_unseen
        , UNSEEN
    }
    , csi::{
        estimate_csi
        , CorrelationBin
        , CsiTask
        , PixelPairAccumulator
    }
    , driver::{
        estimate_bin
        , mk_csi
    }
    , error::{
        CsiError
        , Result
    }
    , healpix::Grid
    , output::{
        read_csi_table
        , CsiRecord
    }
    , restyle::mk_restyle
    , skymap::{
        Mask
        , SkyMap
    }
};

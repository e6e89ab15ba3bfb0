// src/processing/indices/mod.rs
pub mod optical;
pub mod radar;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::model::{Band, BandMeans, Satellite};

/// Every index the evaluator knows, radar first. Parameterised families
/// (RENDVI, EOMI, CI, NDRE) get one variant per parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    // Sentinel-1
    Ave,
    Dif,
    Rat1,
    Rat2,
    Ndi,
    Rvi,
    // Sentinel-2
    Ndvi,
    Nsndvi,
    Gndvi,
    Rendvi1,
    Rendvi2,
    Rendvi3,
    Grndvi,
    Gbndvi,
    Savi,
    Osavi,
    Msavi,
    Tsavi,
    Atsavi,
    RatioVi,
    Dvi,
    Evi,
    Wdrvi,
    Eomi1,
    Eomi2,
    Eomi3,
    Eomi4,
    Nbr,
    Nbr2,
    Ci1,
    Ci2,
    Ci3,
    Gci,
    Sci,
    Ndre1,
    Ndre2,
    Ndre3,
    Bsi,
    Gli,
}

pub const RADAR_INDICES: &[IndexKind] = &[
    IndexKind::Ave,
    IndexKind::Dif,
    IndexKind::Rat1,
    IndexKind::Rat2,
    IndexKind::Ndi,
    IndexKind::Rvi,
];

pub const OPTICAL_INDICES: &[IndexKind] = &[
    IndexKind::Ndvi,
    IndexKind::Nsndvi,
    IndexKind::Gndvi,
    IndexKind::Rendvi1,
    IndexKind::Rendvi2,
    IndexKind::Rendvi3,
    IndexKind::Grndvi,
    IndexKind::Gbndvi,
    IndexKind::Savi,
    IndexKind::Osavi,
    IndexKind::Msavi,
    IndexKind::Tsavi,
    IndexKind::Atsavi,
    IndexKind::RatioVi,
    IndexKind::Dvi,
    IndexKind::Evi,
    IndexKind::Wdrvi,
    IndexKind::Eomi1,
    IndexKind::Eomi2,
    IndexKind::Eomi3,
    IndexKind::Eomi4,
    IndexKind::Nbr,
    IndexKind::Nbr2,
    IndexKind::Ci1,
    IndexKind::Ci2,
    IndexKind::Ci3,
    IndexKind::Gci,
    IndexKind::Sci,
    IndexKind::Ndre1,
    IndexKind::Ndre2,
    IndexKind::Ndre3,
    IndexKind::Bsi,
    IndexKind::Gli,
];

impl IndexKind {
    /// Column name in the result table.
    pub fn name(&self) -> &'static str {
        use IndexKind::*;
        match self {
            Ave => "AVE",
            Dif => "DIF",
            Rat1 => "RAT1",
            Rat2 => "RAT2",
            Ndi => "NDI",
            Rvi => "RVI",
            Ndvi => "NDVI",
            Nsndvi => "NSNDVI",
            Gndvi => "GNDVI",
            Rendvi1 => "RENDVI1",
            Rendvi2 => "RENDVI2",
            Rendvi3 => "RENDVI3",
            Grndvi => "GRNDVI",
            Gbndvi => "GBNDVI",
            Savi => "SAVI",
            Osavi => "OSAVI",
            Msavi => "MSAVI",
            Tsavi => "TSAVI",
            Atsavi => "ATSAVI",
            RatioVi => "RVI",
            Dvi => "DVI",
            Evi => "EVI",
            Wdrvi => "WDRVI",
            Eomi1 => "EOMI1",
            Eomi2 => "EOMI2",
            Eomi3 => "EOMI3",
            Eomi4 => "EOMI4",
            Nbr => "NBR",
            Nbr2 => "NBR2",
            Ci1 => "CI1",
            Ci2 => "CI2",
            Ci3 => "CI3",
            Gci => "GCI",
            Sci => "SCI",
            Ndre1 => "NDRE1",
            Ndre2 => "NDRE2",
            Ndre3 => "NDRE3",
            Bsi => "BSI",
            Gli => "GLI",
        }
    }

    pub fn satellite(&self) -> Satellite {
        if RADAR_INDICES.contains(self) {
            Satellite::Radar
        } else {
            Satellite::Optical
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Turns the band means of one acquisition into derived indices.
pub trait IndexEvaluator: Send + Sync {
    fn evaluate(&self, index: IndexKind, means: &BandMeans) -> Result<f64>;

    fn evaluate_all(
        &self,
        indices: &[IndexKind],
        means: &BandMeans,
    ) -> Result<BTreeMap<IndexKind, f64>> {
        indices
            .iter()
            .map(|&index| self.evaluate(index, means).map(|value| (index, value)))
            .collect()
    }
}

impl<E: IndexEvaluator + ?Sized> IndexEvaluator for &E {
    fn evaluate(&self, index: IndexKind, means: &BandMeans) -> Result<f64> {
        (**self).evaluate(index, means)
    }
}

/// Closed-form band arithmetic on scalar means.
///
/// Undefined results (zero denominators, negative radicands) come back as
/// `NaN` rather than an error, the same way a masked-out reduction would.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandMath;

impl IndexEvaluator for BandMath {
    fn evaluate(&self, index: IndexKind, means: &BandMeans) -> Result<f64> {
        use IndexKind::*;
        let b = |band: Band| band_mean(means, band);

        let value = match index {
            Ave => radar::average(b(Band::VV)?, b(Band::VH)?),
            Dif => radar::difference(b(Band::VV)?, b(Band::VH)?),
            Rat1 => ratio(b(Band::VV)?, b(Band::VH)?),
            Rat2 => ratio(b(Band::VH)?, b(Band::VV)?),
            Ndi => normalized_difference(b(Band::VV)?, b(Band::VH)?),
            Rvi => radar::radar_vegetation_index(b(Band::VV)?, b(Band::VH)?),

            Ndvi => normalized_difference(b(Band::B8)?, b(Band::B4)?),
            Nsndvi => normalized_difference(b(Band::B11)?, b(Band::B7)?),
            Gndvi => normalized_difference(b(Band::B8)?, b(Band::B3)?),
            Rendvi1 => normalized_difference(b(Band::B5)?, b(Band::B4)?),
            Rendvi2 => normalized_difference(b(Band::B6)?, b(Band::B4)?),
            Rendvi3 => normalized_difference(b(Band::B7)?, b(Band::B4)?),
            Grndvi => optical::pair_normalized_difference(b(Band::B8)?, b(Band::B3)?, b(Band::B4)?),
            Gbndvi => optical::pair_normalized_difference(b(Band::B8)?, b(Band::B3)?, b(Band::B2)?),
            Savi => optical::savi(b(Band::B8)?, b(Band::B4)?),
            Osavi => optical::osavi(b(Band::B8)?, b(Band::B4)?),
            Msavi => optical::msavi(b(Band::B8)?, b(Band::B4)?),
            Tsavi => optical::tsavi(b(Band::B8)?, b(Band::B4)?),
            Atsavi => optical::atsavi(b(Band::B8)?, b(Band::B4)?),
            RatioVi => ratio(b(Band::B8)?, b(Band::B4)?),
            Dvi => b(Band::B8)? - b(Band::B4)?,
            Evi => optical::evi(b(Band::B8)?, b(Band::B4)?, b(Band::B2)?),
            Wdrvi => optical::wdrvi(b(Band::B8)?, b(Band::B4)?),
            Eomi1 => normalized_difference(b(Band::B11)?, b(Band::B8A)?),
            Eomi2 => normalized_difference(b(Band::B12)?, b(Band::B4)?),
            Eomi3 => optical::eomi3(b(Band::B11)?, b(Band::B8A)?, b(Band::B12)?, b(Band::B4)?),
            Eomi4 => normalized_difference(b(Band::B11)?, b(Band::B4)?),
            Nbr => normalized_difference(b(Band::B8)?, b(Band::B12)?),
            Nbr2 => normalized_difference(b(Band::B11)?, b(Band::B12)?),
            Ci1 => optical::chlorophyll(b(Band::B8)?, b(Band::B5)?),
            Ci2 => optical::chlorophyll(b(Band::B8)?, b(Band::B6)?),
            Ci3 => optical::chlorophyll(b(Band::B8)?, b(Band::B7)?),
            Gci => optical::chlorophyll(b(Band::B9)?, b(Band::B3)?),
            Sci => normalized_difference(b(Band::B11)?, b(Band::B8)?),
            Ndre1 => normalized_difference(b(Band::B8)?, b(Band::B5)?),
            Ndre2 => normalized_difference(b(Band::B8)?, b(Band::B6)?),
            Ndre3 => normalized_difference(b(Band::B8)?, b(Band::B7)?),
            Bsi => optical::bsi(b(Band::B11)?, b(Band::B4)?, b(Band::B8)?, b(Band::B2)?),
            Gli => optical::gli(b(Band::B3)?, b(Band::B4)?, b(Band::B2)?),
        };

        Ok(value)
    }
}

fn band_mean(means: &BandMeans, band: Band) -> Result<f64> {
    means.get(&band).copied().ok_or(FeatureError::MissingBand(band))
}

/// `num / den`, or `NaN` when the denominator is zero.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// `(a - b) / (a + b)`
pub fn normalized_difference(a: f64, b: f64) -> f64 {
    ratio(a - b, a + b)
}

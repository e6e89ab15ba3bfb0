// src/processing/indices/optical.rs
//! Surface-reflectance vegetation and soil indices.

use super::ratio;

/// SAVI soil brightness correction factor
const SAVI_L: f64 = 0.428;
/// OSAVI soil adjustment
const OSAVI_Y: f64 = 0.16;

// TSAVI soil line parameters
const TSAVI_X: f64 = 0.114;
const TSAVI_A: f64 = 0.824;
const TSAVI_B: f64 = 0.421;

// ATSAVI soil line slope, intercept and adjustment
const ATSAVI_A: f64 = 1.22;
const ATSAVI_B: f64 = 0.03;
const ATSAVI_X: f64 = 0.08;

// EVI coefficients from MODIS documentation
const EVI_G: f64 = 2.5;
const EVI_L: f64 = 1.0;
const EVI_C1: f64 = 6.0;
const EVI_C2: f64 = 7.5;

/// WDRVI NIR weighting
const WDRVI_ALPHA: f64 = 0.1;

/// `(nir - (a + b)) / (nir + a + b)`, used by GRNDVI and GBNDVI.
pub fn pair_normalized_difference(nir: f64, a: f64, b: f64) -> f64 {
    ratio(nir - (a + b), nir + a + b)
}

/// Soil Adjusted Vegetation Index: ((NIR - RED) / (NIR + RED + L)) * (1 + L)
pub fn savi(nir: f64, red: f64) -> f64 {
    ratio(nir - red, nir + red + SAVI_L) * (1.0 + SAVI_L)
}

pub fn osavi(nir: f64, red: f64) -> f64 {
    ratio((nir - red) * (1.0 + OSAVI_Y), nir + red + OSAVI_Y)
}

/// Modified SAVI. A negative radicand gives `NaN`.
pub fn msavi(nir: f64, red: f64) -> f64 {
    let term = 2.0 * nir + 1.0;
    (term - (term.powi(2) - 8.0 * (nir - red)).sqrt()) / 2.0
}

pub fn tsavi(nir: f64, red: f64) -> f64 {
    ratio(
        (nir - (TSAVI_B * red - TSAVI_A)) * TSAVI_B,
        red + TSAVI_B * (nir - TSAVI_A) + TSAVI_X * (1.0 + TSAVI_B.powi(2)),
    )
}

pub fn atsavi(nir: f64, red: f64) -> f64 {
    ratio(
        nir - (ATSAVI_A * red - ATSAVI_B),
        nir + red - ATSAVI_A * ATSAVI_B + ATSAVI_X * (1.0 + ATSAVI_A.powi(2)),
    )
}

/// Enhanced Vegetation Index, 3-band form
pub fn evi(nir: f64, red: f64, blue: f64) -> f64 {
    ratio(
        EVI_G * (nir - red),
        nir + EVI_C1 * red - EVI_C2 * blue + EVI_L,
    )
}

/// Wide Dynamic Range Vegetation Index
pub fn wdrvi(nir: f64, red: f64) -> f64 {
    ratio(WDRVI_ALPHA * nir - red, WDRVI_ALPHA * nir + red)
}

/// Exogenous Organic Matter Index, third variant
pub fn eomi3(b11: f64, b8a: f64, b12: f64, b4: f64) -> f64 {
    ratio((b11 - b8a) + (b12 + b4), b11 + b8a + b12 + b4)
}

/// `nir / edge - 1`. Also the Green Coverage Index with (B9, B3).
pub fn chlorophyll(nir: f64, edge: f64) -> f64 {
    ratio(nir, edge) - 1.0
}

/// Bare Soil Index: ((SWIR+RED)-(NIR+BLUE))/((SWIR+RED)+(NIR+BLUE))
pub fn bsi(swir: f64, red: f64, nir: f64, blue: f64) -> f64 {
    ratio((swir + red) - (nir + blue), (swir + red) + (nir + blue))
}

/// Green Leaf Index
pub fn gli(green: f64, red: f64, blue: f64) -> f64 {
    ratio(2.0 * green - red - blue, 2.0 * green + red + blue)
}

// src/processing/indices/radar.rs
//! Dual-polarisation (VV/VH) backscatter indices.

use super::ratio;

/// AVE: mean of the two polarisations
pub fn average(vv: f64, vh: f64) -> f64 {
    (vv + vh) / 2.0
}

/// DIF: VV - VH
pub fn difference(vv: f64, vh: f64) -> f64 {
    vv - vh
}

/// Dual-pol Radar Vegetation Index: 4*VH / (VV + VH)
pub fn radar_vegetation_index(vv: f64, vh: f64) -> f64 {
    ratio(4.0 * vh, vv + vh)
}

//! Physical constants and unit conversions.
//!
//! Energy is expressed in kJ, power in kW, mass in kg, time in s and
//! temperature in K throughout the crate.

/// Offset between the Celsius and Kelvin scales.
pub const ZERO_CELSIUS_K: f64 = 273.15;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Thermophysical properties of a fluid at a fixed reference state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fluid {
    /// Density (kg/m³).
    pub rho: f64,
    /// Specific heat (kJ/(kg·K)).
    pub cp: f64,
    /// Thermal conductivity (W/(m·K)).
    pub k: f64,
}

/// Liquid water around 20 °C (conductivity at 40 °C).
pub const WATER: Fluid = Fluid {
    rho: 998.2,
    cp: 4.187,
    k: 0.62856,
};

/// Converts a Celsius temperature to Kelvin.
pub fn c_to_k(t: f64) -> f64 {
    t + ZERO_CELSIUS_K
}

/// Converts a Kelvin temperature to Celsius.
pub fn k_to_c(t: f64) -> f64 {
    t - ZERO_CELSIUS_K
}

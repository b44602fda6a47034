//! Conversion between the four quantity representations
//!
//! Counts are always held in conchitas. Manojos and mallas are fixed integer
//! multiples; kilograms go through a conchitas-per-kg factor supplied by
//! configuration. Conversions out of conchitas are continuous display values
//! and are never rounded.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::QuantityUnit;

pub const CONCHITAS_PER_MANOJO: u64 = 96;
pub const MANOJOS_PER_MALLA: u64 = 3;
pub const CONCHITAS_PER_MALLA: u64 = CONCHITAS_PER_MANOJO * MANOJOS_PER_MALLA;

/// Converter bound to a conchitas-per-kg factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    conchitas_per_kg: f64,
}

/// All four representations of the same count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Conversions {
    pub manojos: f64,
    pub conchas: u64,
    pub mallas: f64,
    pub kg: f64,
}

impl Conversions {
    /// Value of this count expressed in `unit`
    pub fn get(&self, unit: QuantityUnit) -> f64 {
        match unit {
            QuantityUnit::Conchitas => self.conchas as f64,
            QuantityUnit::Manojos => self.manojos,
            QuantityUnit::Mallas => self.mallas,
            QuantityUnit::Kg => self.kg,
        }
    }
}

impl UnitConverter {
    /// Create a converter; the factor must be positive and finite
    pub fn new(conchitas_per_kg: f64) -> CoreResult<Self> {
        if !conchitas_per_kg.is_finite() || conchitas_per_kg <= 0.0 {
            return Err(CoreError::invalid_quantity(
                "conchitas_per_kg",
                "must be a positive finite number",
            ));
        }
        Ok(Self { conchitas_per_kg })
    }

    pub fn conchitas_per_kg(&self) -> f64 {
        self.conchitas_per_kg
    }

    fn conchitas_per(&self, unit: QuantityUnit) -> f64 {
        match unit {
            QuantityUnit::Conchitas => 1.0,
            QuantityUnit::Manojos => CONCHITAS_PER_MANOJO as f64,
            QuantityUnit::Mallas => CONCHITAS_PER_MALLA as f64,
            QuantityUnit::Kg => self.conchitas_per_kg,
        }
    }

    /// Convert `value` in `from` to a whole number of conchitas.
    ///
    /// Zero, negative and non-finite inputs yield 0.
    pub fn to_conchitas(&self, value: f64, from: QuantityUnit) -> u64 {
        if !value.is_finite() || value <= 0.0 {
            return 0;
        }
        (value * self.conchitas_per(from)).round() as u64
    }

    /// Express a conchita count in `to`, unrounded
    pub fn from_conchitas(&self, conchitas: u64, to: QuantityUnit) -> f64 {
        conchitas as f64 / self.conchitas_per(to)
    }

    /// Convert between any two units through the conchita count
    pub fn convert(&self, value: f64, from: QuantityUnit, to: QuantityUnit) -> f64 {
        self.from_conchitas(self.to_conchitas(value, from), to)
    }

    /// All four representations, each derived from the same conchita count
    pub fn all_conversions(&self, value: f64, from: QuantityUnit) -> Conversions {
        let conchas = self.to_conchitas(value, from);
        Conversions {
            manojos: self.from_conchitas(conchas, QuantityUnit::Manojos),
            conchas,
            mallas: self.from_conchitas(conchas, QuantityUnit::Mallas),
            kg: self.from_conchitas(conchas, QuantityUnit::Kg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> UnitConverter {
        UnitConverter::new(111.0).unwrap()
    }

    #[test]
    fn test_manojos_and_mallas_are_exact() {
        let c = converter();
        assert_eq!(c.to_conchitas(1.0, QuantityUnit::Manojos), 96);
        assert_eq!(c.to_conchitas(1.0, QuantityUnit::Mallas), 288);
        assert_eq!(c.to_conchitas(7.0, QuantityUnit::Mallas), 7 * 288);
    }

    #[test]
    fn test_fractional_display_values_not_rounded() {
        let c = converter();
        let manojos = c.from_conchitas(50, QuantityUnit::Manojos);
        assert!((manojos - 50.0 / 96.0).abs() < 1e-12);
        assert!((manojos - 0.52).abs() < 0.01);
    }

    #[test]
    fn test_kg_rounds_to_nearest_conchita() {
        let c = UnitConverter::new(111.5).unwrap();
        assert_eq!(c.to_conchitas(1.0, QuantityUnit::Kg), 112);
        assert_eq!(c.to_conchitas(2.0, QuantityUnit::Kg), 223);
    }

    #[test]
    fn test_zero_negative_and_nan_yield_zero() {
        let c = converter();
        assert_eq!(c.all_conversions(0.0, QuantityUnit::Mallas), Conversions::default());
        assert_eq!(c.all_conversions(-3.0, QuantityUnit::Kg), Conversions::default());
        assert_eq!(c.all_conversions(f64::NAN, QuantityUnit::Manojos), Conversions::default());
        assert_eq!(c.to_conchitas(f64::INFINITY, QuantityUnit::Conchitas), 0);
    }

    #[test]
    fn test_all_conversions_from_manojos() {
        let c = converter();
        let all = c.all_conversions(3.0, QuantityUnit::Manojos);
        assert_eq!(all.conchas, 288);
        assert!((all.manojos - 3.0).abs() < 1e-12);
        assert!((all.mallas - 1.0).abs() < 1e-12);
        assert!((all.kg - 288.0 / 111.0).abs() < 1e-12);
    }

    #[test]
    fn test_convert_mallas_to_manojos() {
        let c = converter();
        assert!((c.convert(2.0, QuantityUnit::Mallas, QuantityUnit::Manojos) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_factor_rejected() {
        assert!(UnitConverter::new(0.0).is_err());
        assert!(UnitConverter::new(-111.0).is_err());
        assert!(UnitConverter::new(f64::NAN).is_err());
    }
}

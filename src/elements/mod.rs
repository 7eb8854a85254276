//! Orbital element representations
//!
//! Three interchangeable forms resolve to the same six classical elements:
//! classical elements directly, the two-line catalog text encoding, and the
//! JSON mean-elements message. Every form converts to the internal
//! propagator state (`satkit::TLE`) before first use.

mod classical;
mod omm;
mod tle;

pub use classical::{random_elements, ClassicalElements};
pub use omm::MeanElementsMessage;
pub use tle::{checksum, CatalogRecord, CATALOG_LINE_LEN};

use thiserror::Error;

/// Earth's mean radius in kilometers (also the render-unit scale divisor)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth's gravitational parameter in km³/s²
pub const MU_EARTH_KM3_S2: f64 = 398600.4418;

/// Errors from element conversion and validation
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("catalog line must be {expected} characters, found {found}")]
    BadLineLength { expected: usize, found: usize },
    #[error("catalog line must start with '{0}'")]
    BadLinePrefix(char),
    #[error("checksum mismatch: expected {expected}, found {found}")]
    BadChecksum { expected: u32, found: u32 },
    #[error("unparseable {0} field")]
    BadField(&'static str),
    #[error("propagator rejected elements: {0}")]
    PropagatorInit(String),
}

/// A tagged orbital-element record in one of its three source forms.
#[derive(Debug, Clone)]
pub enum ElementRecord {
    Classical(ClassicalElements),
    Catalog(CatalogRecord),
    MeanElements(MeanElementsMessage),
}

impl ElementRecord {
    /// Resolve the record to its classical-element form.
    pub fn to_classical(&self) -> Result<ClassicalElements, ElementError> {
        match self {
            Self::Classical(elements) => Ok(*elements),
            Self::Catalog(record) => record.decode(),
            Self::MeanElements(message) => message.to_classical(),
        }
    }

    /// Build the internal propagator state.
    ///
    /// All three forms funnel through the catalog text encoding, so the
    /// propagator always sees the same fixed-point precision regardless of
    /// the source form; converting twice yields an identical state.
    pub fn to_propagator_state(&self) -> Result<satkit::TLE, ElementError> {
        let record = match self {
            Self::Catalog(record) => {
                record.validate()?;
                record.clone()
            }
            Self::Classical(elements) => CatalogRecord::encode(elements, 0),
            Self::MeanElements(message) => {
                let elements = message.to_classical()?;
                CatalogRecord::encode(&elements, message.norad_cat_id.unwrap_or(0))
            }
        };

        satkit::TLE::load_2line(&record.line1, &record.line2)
            .map_err(|e| ElementError::PropagatorInit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satkit::Instant;

    fn sample() -> ClassicalElements {
        ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + 550.0,
            eccentricity: 0.001,
            inclination: 53.0_f64.to_radians(),
            raan: 120.0_f64.to_radians(),
            arg_perigee: 90.0_f64.to_radians(),
            mean_anomaly: 45.0_f64.to_radians(),
            epoch: Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap(),
        }
    }

    #[test]
    fn test_all_forms_produce_propagator_state() {
        let classical = ElementRecord::Classical(sample());
        assert!(classical.to_propagator_state().is_ok());

        let catalog = ElementRecord::Catalog(CatalogRecord::encode(&sample(), 42));
        assert!(catalog.to_propagator_state().is_ok());
    }

    #[test]
    fn test_conversion_idempotent() {
        let record = ElementRecord::Classical(sample());
        let a = record.to_propagator_state().unwrap();
        let b = record.to_propagator_state().unwrap();
        assert_eq!(a.mean_motion, b.mean_motion);
        assert_eq!(a.eccen, b.eccen);
        assert_eq!((a.epoch - b.epoch).as_seconds(), 0.0);
    }

    #[test]
    fn test_catalog_form_validated_before_use() {
        let mut record = CatalogRecord::encode(&sample(), 42);
        record.line2.truncate(40);
        let result = ElementRecord::Catalog(record).to_propagator_state();
        assert!(matches!(result, Err(ElementError::BadLineLength { .. })));
    }

    #[test]
    fn test_round_trip_preserves_propagated_elements() {
        // decode(encode(x)) feeds the propagator the same orbit as x
        let original = ElementRecord::Classical(sample());
        let encoded = CatalogRecord::encode(&sample(), 42);
        let reparsed = ElementRecord::Classical(encoded.decode().unwrap());

        let a = original.to_propagator_state().unwrap();
        let b = reparsed.to_propagator_state().unwrap();
        assert!((a.mean_motion - b.mean_motion).abs() < 1.0e-7);
        assert!((a.eccen - b.eccen).abs() < 1.0e-6);
    }
}

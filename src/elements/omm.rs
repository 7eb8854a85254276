//! Mean-elements message (OMM-style) records
//!
//! Catalog distributions increasingly ship general-perturbations data as
//! JSON messages instead of two-line text. The subset carried here is the
//! six mean elements plus epoch and naming fields.

use serde::{Deserialize, Serialize};

use super::{ClassicalElements, ElementError, MU_EARTH_KM3_S2};

/// A mean-elements message as deserialized from a catalog feed.
///
/// Angles arrive in degrees, mean motion in revolutions per day and the
/// epoch as an ISO-8601 UTC timestamp, matching the general-perturbations
/// JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanElementsMessage {
    #[serde(rename = "OBJECT_NAME")]
    pub object_name: Option<String>,
    #[serde(rename = "NORAD_CAT_ID")]
    pub norad_cat_id: Option<u32>,
    #[serde(rename = "EPOCH")]
    pub epoch: String,
    #[serde(rename = "MEAN_MOTION")]
    pub mean_motion: f64,
    #[serde(rename = "ECCENTRICITY")]
    pub eccentricity: f64,
    #[serde(rename = "INCLINATION")]
    pub inclination: f64,
    #[serde(rename = "RA_OF_ASC_NODE")]
    pub ra_of_asc_node: f64,
    #[serde(rename = "ARG_OF_PERICENTER")]
    pub arg_of_pericenter: f64,
    #[serde(rename = "MEAN_ANOMALY")]
    pub mean_anomaly: f64,
}

impl MeanElementsMessage {
    /// Resolve the message to classical elements.
    pub fn to_classical(&self) -> Result<ClassicalElements, ElementError> {
        if self.mean_motion <= 0.0 || !(0.0..1.0).contains(&self.eccentricity) {
            return Err(ElementError::BadField("mean elements"));
        }

        let epoch = parse_iso_epoch(&self.epoch)?;
        let n_rad_s = self.mean_motion * 2.0 * std::f64::consts::PI / 86_400.0;
        let semi_major_axis_km = (MU_EARTH_KM3_S2 / (n_rad_s * n_rad_s)).cbrt();

        Ok(ClassicalElements {
            semi_major_axis_km,
            eccentricity: self.eccentricity,
            inclination: self.inclination.to_radians(),
            raan: self.ra_of_asc_node.to_radians(),
            arg_perigee: self.arg_of_pericenter.to_radians(),
            mean_anomaly: self.mean_anomaly.to_radians(),
            epoch,
        })
    }
}

fn parse_iso_epoch(text: &str) -> Result<satkit::Instant, ElementError> {
    use chrono::{Datelike, Timelike};

    // Feeds write epochs both with and without a trailing Z
    let trimmed = text.trim().trim_end_matches('Z');
    let naive = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| ElementError::BadField("epoch"))?;

    let second =
        naive.second() as f64 + naive.nanosecond() as f64 / 1.0e9;
    satkit::Instant::from_datetime(
        naive.year(),
        naive.month() as i32,
        naive.day() as i32,
        naive.hour() as i32,
        naive.minute() as i32,
        second,
    )
    .map_err(|_| ElementError::BadField("epoch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_to_classical() {
        let json = r#"{
            "OBJECT_NAME": "ISS (ZARYA)",
            "NORAD_CAT_ID": 25544,
            "EPOCH": "2026-03-01T06:30:00.000000",
            "MEAN_MOTION": 15.49309239,
            "ECCENTRICITY": 0.0004763,
            "INCLINATION": 51.6431,
            "RA_OF_ASC_NODE": 247.4627,
            "ARG_OF_PERICENTER": 130.5360,
            "MEAN_ANOMALY": 325.0288
        }"#;

        let msg: MeanElementsMessage = serde_json::from_str(json).unwrap();
        let elements = msg.to_classical().unwrap();

        // ~15.5 rev/day is a ~400 km orbit
        let altitude = elements.semi_major_axis_km - super::super::EARTH_RADIUS_KM;
        assert!((380.0..460.0).contains(&altitude), "altitude {}", altitude);
        assert!((elements.inclination.to_degrees() - 51.6431).abs() < 1.0e-9);
        assert!((elements.eccentricity - 0.0004763).abs() < 1.0e-12);
    }

    #[test]
    fn test_degenerate_message_rejected() {
        let msg = MeanElementsMessage {
            object_name: None,
            norad_cat_id: None,
            epoch: "2026-03-01T00:00:00".into(),
            mean_motion: 0.0,
            eccentricity: 0.001,
            inclination: 45.0,
            ra_of_asc_node: 0.0,
            arg_of_pericenter: 0.0,
            mean_anomaly: 0.0,
        };
        assert!(msg.to_classical().is_err());
    }
}

//! Catalog text ingestion and synthetic constellations
//!
//! The orbital-data parser upstream is a black box; what arrives here is
//! display names paired with two 69-character catalog lines. Structural
//! length and the mod-10 checksum are checked before a record is accepted,
//! and malformed records are skipped and counted, never fatal.

use rand::Rng;
use satkit::Instant;
use std::ops::Range;

use crate::elements::{random_elements, CatalogRecord, ElementRecord, EARTH_RADIUS_KM};
use crate::registry::RenderAttrs;
use crate::renderer::altitude_to_color;

/// Result of ingesting a catalog text block.
#[derive(Debug, Default)]
pub struct CatalogIngest {
    /// Accepted records with their display names
    pub records: Vec<(String, CatalogRecord)>,
    /// Malformed records dropped along the way
    pub skipped: usize,
}

/// Parse catalog text: optional name line followed by the two element
/// lines, repeated. Records failing validation are logged and counted.
pub fn ingest_catalog(text: &str) -> CatalogIngest {
    let mut result = CatalogIngest::default();
    let mut pending_name: Option<String> = None;
    let mut pending_line1: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with("1 ") {
            if pending_line1.is_some() {
                // Dangling first line without its pair
                result.skipped += 1;
            }
            pending_line1 = Some(line.to_string());
        } else if line.starts_with("2 ") {
            let Some(line1) = pending_line1.take() else {
                log::warn!("catalog line 2 without a preceding line 1, skipping");
                result.skipped += 1;
                pending_name = None;
                continue;
            };

            let record = CatalogRecord {
                line1,
                line2: line.to_string(),
            };
            match record.validate() {
                Ok(()) => {
                    let name = pending_name.take().unwrap_or_else(|| {
                        record
                            .catalog_number()
                            .map(|n| format!("OBJECT {}", n))
                            .unwrap_or_else(|| "UNKNOWN".to_string())
                    });
                    result.records.push((name, record));
                }
                Err(e) => {
                    log::warn!("skipping malformed catalog record: {}", e);
                    result.skipped += 1;
                    pending_name = None;
                }
            }
        } else {
            if pending_line1.take().is_some() {
                result.skipped += 1;
            }
            pending_name = Some(line.trim().to_string());
        }
    }

    if pending_line1.is_some() {
        result.skipped += 1;
    }

    log::info!(
        "catalog ingest: {} accepted, {} skipped",
        result.records.len(),
        result.skipped
    );
    result
}

/// Generate a synthetic constellation for stress population: random
/// near-circular orbits in the altitude band, colored by altitude.
pub fn synthesize_constellation<R: Rng + ?Sized>(
    count: usize,
    altitude_range_km: Range<f64>,
    epoch: Instant,
    rng: &mut R,
) -> Vec<(ElementRecord, String, RenderAttrs)> {
    (0..count)
        .map(|i| {
            let elements = random_elements(altitude_range_km.clone(), epoch, rng);
            let altitude = elements.semi_major_axis_km - EARTH_RADIUS_KM;
            let attrs = RenderAttrs {
                color: altitude_to_color(altitude),
                ..RenderAttrs::default()
            };
            (
                ElementRecord::Classical(elements),
                format!("SWARM-{:06}", i),
                attrs,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ClassicalElements;

    fn sample_text() -> String {
        let epoch = Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap();
        let make = |ma_deg: f64, number: u32| {
            CatalogRecord::encode(
                &ClassicalElements {
                    semi_major_axis_km: EARTH_RADIUS_KM + 550.0,
                    eccentricity: 0.001,
                    inclination: 0.9,
                    raan: 0.3,
                    arg_perigee: 0.0,
                    mean_anomaly: ma_deg.to_radians(),
                    epoch,
                },
                number,
            )
        };

        let a = make(0.0, 10001);
        let b = make(120.0, 10002);
        format!(
            "ALPHA\n{}\n{}\nBETA\n{}\n{}\n",
            a.line1, a.line2, b.line1, b.line2
        )
    }

    #[test]
    fn test_ingest_accepts_valid_records() {
        let ingest = ingest_catalog(&sample_text());
        assert_eq!(ingest.records.len(), 2);
        assert_eq!(ingest.skipped, 0);
        assert_eq!(ingest.records[0].0, "ALPHA");
        assert_eq!(ingest.records[1].0, "BETA");
    }

    #[test]
    fn test_ingest_skips_bad_checksum() {
        let full = sample_text();
        // Corrupt a digit in the first record's line 2 (keeps length)
        let lines: Vec<&str> = full.lines().collect();
        let mut line2 = lines[2].to_string();
        let flipped = if line2.as_bytes()[20] == b'9' { '8' } else { '9' };
        line2.replace_range(20..21, &flipped.to_string());

        let text = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n",
            lines[0], lines[1], line2, lines[3], lines[4], lines[5]
        );

        let ingest = ingest_catalog(&text);
        assert_eq!(ingest.records.len(), 1);
        assert_eq!(ingest.skipped, 1);
        assert_eq!(ingest.records[0].0, "BETA");
    }

    #[test]
    fn test_ingest_skips_truncated_line() {
        let text = "GAMMA\n1 12345U too short\n2 12345 also short\n";
        let ingest = ingest_catalog(text);
        assert_eq!(ingest.records.len(), 0);
        assert_eq!(ingest.skipped, 1);
    }

    #[test]
    fn test_unnamed_record_gets_catalog_number_name() {
        let full = sample_text();
        let lines: Vec<&str> = full.lines().collect();
        let text = format!("{}\n{}\n", lines[1], lines[2]);
        let ingest = ingest_catalog(&text);
        assert_eq!(ingest.records.len(), 1);
        assert_eq!(ingest.records[0].0, "OBJECT 10001");
    }

    #[test]
    fn test_synthesize_constellation() {
        let epoch = Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap();
        let mut rng = rand::thread_rng();
        let batch = synthesize_constellation(50, 400.0..1200.0, epoch, &mut rng);
        assert_eq!(batch.len(), 50);
        for (record, name, _) in &batch {
            assert!(name.starts_with("SWARM-"));
            assert!(record.to_propagator_state().is_ok());
        }
    }
}

//! Two-line catalog record encoding and decoding
//!
//! The fixed-column two-line format carries the six classical elements plus
//! an epoch, with a mod-10 checksum digit terminating each 69-character
//! line. Encoded angles carry four decimal digits and the eccentricity
//! field carries seven digits with an implied leading decimal point.

use chrono::Datelike;
use satkit::Instant;

use super::{ClassicalElements, ElementError, MU_EARTH_KM3_S2};

/// Required length of each catalog line, checksum digit included
pub const CATALOG_LINE_LEN: usize = 69;

/// A two-line catalog record as exchanged with external parsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub line1: String,
    pub line2: String,
}

/// Mod-10 checksum over a line's characters: digits count as their value,
/// `-` counts as 1, everything else as 0.
pub fn checksum(line: &str) -> u32 {
    line.chars()
        .map(|c| match c {
            '0'..='9' => c.to_digit(10).unwrap(),
            '-' => 1,
            _ => 0,
        })
        .sum::<u32>()
        % 10
}

/// Validate one catalog line: length, line-number prefix and checksum.
fn validate_line(line: &str, expected_prefix: char) -> Result<(), ElementError> {
    if line.len() != CATALOG_LINE_LEN {
        return Err(ElementError::BadLineLength {
            expected: CATALOG_LINE_LEN,
            found: line.len(),
        });
    }
    if !line.starts_with(expected_prefix) {
        return Err(ElementError::BadLinePrefix(expected_prefix));
    }

    let (body, check) = line.split_at(CATALOG_LINE_LEN - 1);
    let expected = checksum(body);
    let found = check
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or(ElementError::BadChecksum { expected, found: 10 })?;
    if found != expected {
        return Err(ElementError::BadChecksum { expected, found });
    }
    Ok(())
}

impl CatalogRecord {
    /// Structural validation of both lines (length, prefixes, checksums).
    pub fn validate(&self) -> Result<(), ElementError> {
        validate_line(&self.line1, '1')?;
        validate_line(&self.line2, '2')
    }

    /// Encode classical elements into catalog text.
    ///
    /// The checksum digit is recomputed from the formatted body on every
    /// call, so edits to the element values can never leave a stale digit.
    pub fn encode(elements: &ClassicalElements, catalog_number: u32) -> Self {
        let (yy, day_of_year) = epoch_day_fraction(&elements.epoch);

        let line1_body = format!(
            "1 {:05}U 00000A   {:02}{:012.8}  .00000000  00000-0  00000-0 0  999",
            catalog_number % 100_000,
            yy,
            day_of_year,
        );
        let line1 = format!("{}{}", line1_body, checksum(&line1_body));

        let ecc_field = format!("{:07}", (elements.eccentricity * 1.0e7).round() as u32);
        let line2_body = format!(
            "2 {:05} {:8.4} {:8.4} {} {:8.4} {:8.4} {:11.8}{:05}",
            catalog_number % 100_000,
            elements.inclination.to_degrees(),
            norm_deg(elements.raan.to_degrees()),
            ecc_field,
            norm_deg(elements.arg_perigee.to_degrees()),
            norm_deg(elements.mean_anomaly.to_degrees()),
            elements.mean_motion_rev_day(),
            0,
        );
        let line2 = format!("{}{}", line2_body, checksum(&line2_body));

        Self { line1, line2 }
    }

    /// Decode the record back into classical elements.
    pub fn decode(&self) -> Result<ClassicalElements, ElementError> {
        self.validate()?;

        let epoch = parse_epoch(&self.line1)?;

        let inclination = parse_field(&self.line2, 8..16)?.to_radians();
        let raan = parse_field(&self.line2, 17..25)?.to_radians();
        let ecc_digits: f64 = self
            .line2
            .get(26..33)
            .and_then(|s| s.trim().parse().ok())
            .ok_or(ElementError::BadField("eccentricity"))?;
        let eccentricity = ecc_digits / 1.0e7;
        let arg_perigee = parse_field(&self.line2, 34..42)?.to_radians();
        let mean_anomaly = parse_field(&self.line2, 43..51)?.to_radians();
        let mean_motion_rev_day = parse_field(&self.line2, 52..63)?;

        if mean_motion_rev_day <= 0.0 {
            return Err(ElementError::BadField("mean motion"));
        }
        let n_rad_s = mean_motion_rev_day * 2.0 * std::f64::consts::PI / 86_400.0;
        let semi_major_axis_km = (MU_EARTH_KM3_S2 / (n_rad_s * n_rad_s)).cbrt();

        Ok(ClassicalElements {
            semi_major_axis_km,
            eccentricity,
            inclination,
            raan,
            arg_perigee,
            mean_anomaly,
            epoch,
        })
    }

    /// Catalog number from line 1 (the id field shared by both lines).
    pub fn catalog_number(&self) -> Option<u32> {
        self.line1.get(2..7)?.trim().parse().ok()
    }
}

fn norm_deg(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

fn parse_field(line: &str, range: std::ops::Range<usize>) -> Result<f64, ElementError> {
    line.get(range)
        .and_then(|s| s.trim().parse().ok())
        .ok_or(ElementError::BadField("line 2 element field"))
}

/// Two-digit year and fractional day-of-year for the line 1 epoch field.
fn epoch_day_fraction(epoch: &Instant) -> (u32, f64) {
    let (year, month, day, hour, minute, second) = epoch.as_datetime();
    let ordinal = chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .map(|d| d.ordinal())
        .unwrap_or(1);
    let day_of_year = ordinal as f64
        + hour as f64 / 24.0
        + minute as f64 / 1440.0
        + second / 86_400.0;
    ((year.rem_euclid(100)) as u32, day_of_year)
}

/// Parse the line 1 epoch field (columns 19-32) into an `Instant`.
fn parse_epoch(line1: &str) -> Result<Instant, ElementError> {
    let field = line1.get(18..32).ok_or(ElementError::BadField("epoch"))?;
    let mut parts = field.trim().split('.');
    let yyddd = parts.next().ok_or(ElementError::BadField("epoch"))?;
    let frac = parts.next().unwrap_or("0");
    if yyddd.len() < 3 {
        return Err(ElementError::BadField("epoch"));
    }

    let (yy_str, ddd_str) = yyddd.split_at(2);
    let yy: i32 = yy_str.parse().map_err(|_| ElementError::BadField("epoch"))?;
    let ddd: u32 = ddd_str.parse().map_err(|_| ElementError::BadField("epoch"))?;
    // Catalog convention: years 57-99 are 19xx, 00-56 are 20xx
    let year = if yy >= 57 { 1900 + yy } else { 2000 + yy };

    let date = chrono::NaiveDate::from_yo_opt(year, ddd.max(1))
        .ok_or(ElementError::BadField("epoch"))?;
    let frac_seconds: f64 = format!("0.{}", frac)
        .parse::<f64>()
        .map_err(|_| ElementError::BadField("epoch"))?
        * 86_400.0;

    let hour = (frac_seconds / 3600.0) as i32;
    let minute = ((frac_seconds - hour as f64 * 3600.0) / 60.0) as i32;
    let second = frac_seconds - hour as f64 * 3600.0 - minute as f64 * 60.0;

    Instant::from_datetime(
        date.year(),
        date.month() as i32,
        date.day() as i32,
        hour,
        minute,
        second,
    )
    .map_err(|_| ElementError::BadField("epoch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_elements() -> ClassicalElements {
        ClassicalElements {
            semi_major_axis_km: 7078.0,
            eccentricity: 0.0012345,
            inclination: 51.6_f64.to_radians(),
            raan: 247.4627_f64.to_radians(),
            arg_perigee: 130.536_f64.to_radians(),
            mean_anomaly: 325.0288_f64.to_radians(),
            epoch: Instant::from_datetime(2026, 3, 1, 6, 30, 0.0).unwrap(),
        }
    }

    #[test]
    fn test_encode_line_lengths() {
        let record = CatalogRecord::encode(&sample_elements(), 25544);
        assert_eq!(record.line1.len(), CATALOG_LINE_LEN);
        assert_eq!(record.line2.len(), CATALOG_LINE_LEN);
    }

    #[test]
    fn test_checksum_matches_digit_sum() {
        let record = CatalogRecord::encode(&sample_elements(), 25544);
        for line in [&record.line1, &record.line2] {
            let (body, check) = line.split_at(CATALOG_LINE_LEN - 1);
            let digit = check.chars().next().unwrap().to_digit(10).unwrap();
            assert_eq!(digit, checksum(body));
        }
    }

    #[test]
    fn test_minus_counts_as_one() {
        assert_eq!(checksum("---"), 3);
        assert_eq!(checksum("12-"), 4);
        assert_eq!(checksum("abc xyz"), 0);
    }

    #[test]
    fn test_validate_accepts_encoded() {
        let record = CatalogRecord::encode(&sample_elements(), 7);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_corruption() {
        let record = CatalogRecord::encode(&sample_elements(), 7);

        // Truncated line
        let truncated = CatalogRecord {
            line1: record.line1[..60].to_string(),
            line2: record.line2.clone(),
        };
        assert!(matches!(
            truncated.validate(),
            Err(ElementError::BadLineLength { .. })
        ));

        // Flip one digit of line 2 without fixing the checksum
        let mut chars: Vec<char> = record.line2.chars().collect();
        chars[20] = if chars[20] == '9' { '8' } else { '9' };
        let corrupted = CatalogRecord {
            line1: record.line1.clone(),
            line2: chars.into_iter().collect(),
        };
        assert!(matches!(
            corrupted.validate(),
            Err(ElementError::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_round_trip_within_encoding_precision() {
        let elements = sample_elements();
        let record = CatalogRecord::encode(&elements, 25544);
        let decoded = record.decode().unwrap();

        // Angles are encoded with 4 decimal digits of a degree
        let angle_tol = 1.0e-4_f64.to_radians() * 0.51;
        assert!((decoded.inclination - elements.inclination).abs() < angle_tol);
        assert!((decoded.raan - elements.raan).abs() < angle_tol);
        assert!((decoded.arg_perigee - elements.arg_perigee).abs() < angle_tol);
        assert!((decoded.mean_anomaly - elements.mean_anomaly).abs() < angle_tol);

        // Eccentricity carries 7 digits
        assert!((decoded.eccentricity - elements.eccentricity).abs() < 1.0e-7);

        // Semi-major axis survives the mean-motion round trip to meters
        assert!((decoded.semi_major_axis_km - elements.semi_major_axis_km).abs() < 1.0e-3);
    }

    #[test]
    fn test_epoch_round_trip() {
        let elements = sample_elements();
        let record = CatalogRecord::encode(&elements, 1);
        let decoded = record.decode().unwrap();
        let delta_s = (decoded.epoch - elements.epoch).as_seconds().abs();
        // Line 1 carries the day fraction with 8 decimal digits (~1 ms)
        assert!(delta_s < 0.01, "epoch drifted by {} s", delta_s);
    }

    #[test]
    fn test_catalog_number_field() {
        let record = CatalogRecord::encode(&sample_elements(), 43013);
        assert_eq!(record.catalog_number(), Some(43013));
    }
}

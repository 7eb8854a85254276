//! Analytic perturbation propagation (SGP4)

use nalgebra::Vector3;
use satkit::sgp4::sgp4;
use satkit::Instant;

use super::StateKm;

/// Propagate a catalog-seeded state to the given time.
///
/// Degenerate results (non-finite components, which SGP4 produces for
/// decayed or malformed element sets) return `None` so the caller keeps the
/// entity's last good state instead of corrupting it.
pub fn propagate(tle: &satkit::TLE, time: &Instant) -> Option<StateKm> {
    let mut tle = tle.clone();
    let result = sgp4(&mut tle, &[*time]).ok()?;

    // Output is TEME meters / meters-per-second
    let pos = result.pos.column(0);
    let vel = result.vel.column(0);

    let position = Vector3::new(pos[0], pos[1], pos[2]) / 1000.0;
    let velocity = Vector3::new(vel[0], vel[1], vel[2]) / 1000.0;

    if !position.iter().all(|v| v.is_finite()) || !velocity.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some(StateKm { position, velocity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ClassicalElements, ElementRecord, EARTH_RADIUS_KM};

    fn leo_state() -> satkit::TLE {
        let elements = ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + 550.0,
            eccentricity: 0.001,
            inclination: 53.0_f64.to_radians(),
            raan: 10.0_f64.to_radians(),
            arg_perigee: 0.0,
            mean_anomaly: 0.0,
            epoch: Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap(),
        };
        ElementRecord::Classical(elements)
            .to_propagator_state()
            .unwrap()
    }

    #[test]
    fn test_propagate_near_epoch_altitude() {
        let tle = leo_state();
        let state = propagate(&tle, &Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap())
            .expect("propagation should succeed at epoch");

        let radius = state.position.norm();
        let altitude = radius - EARTH_RADIUS_KM;
        // SGP4 mean-to-osculating conversion shifts altitude by a few km
        assert!(
            (500.0..620.0).contains(&altitude),
            "unexpected altitude {}",
            altitude
        );

        let speed = state.velocity.norm();
        assert!((7.0..8.2).contains(&speed), "unexpected speed {}", speed);
    }

    #[test]
    fn test_propagate_is_time_deterministic() {
        let tle = leo_state();
        let t = Instant::from_datetime(2026, 3, 1, 3, 0, 0.0).unwrap();
        let a = propagate(&tle, &t).unwrap();
        let b = propagate(&tle, &t).unwrap();
        assert_eq!(a.position, b.position);
        assert_eq!(a.velocity, b.velocity);
    }
}

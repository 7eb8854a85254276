//! Orbit path tessellation
//!
//! Shared by the CPU polyline strategy and by anything that needs an
//! orbit's geometry on the CPU side. Sweeps the conic-section
//! parametrization r(nu) = a(1-e^2) / (1 + e cos nu) over a full
//! revolution and rotates the perifocal points into the inertial frame:
//! argument of perigee about Z, inclination about X, RAAN about Z.

use glam::Vec3;
use nalgebra::{Rotation3, Vector3};

use crate::elements::ClassicalElements;
use crate::renderer::render_units_from_km;

/// Perifocal-to-inertial rotation for the given elements.
pub fn perifocal_rotation(elements: &ClassicalElements) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), elements.raan)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), elements.inclination)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), elements.arg_perigee)
}

/// Tessellate one orbit into a closed ring of render-unit points.
///
/// Returns `segments + 1` points with the last equal to the first, ready
/// for a line-strip draw.
pub fn orbit_ring(elements: &ClassicalElements, segments: u32) -> Vec<Vec3> {
    let segments = segments.max(3);
    let rotation = perifocal_rotation(elements);
    let semi_latus = elements.semi_major_axis_km * (1.0 - elements.eccentricity.powi(2));

    let mut points = Vec::with_capacity(segments as usize + 1);
    for i in 0..=segments {
        let nu = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
        let radius = semi_latus / (1.0 + elements.eccentricity * nu.cos());
        let perifocal = Vector3::new(radius * nu.cos(), radius * nu.sin(), 0.0);
        points.push(render_units_from_km(rotation * perifocal));
    }
    points
}

/// Ellipse center in render units (the focus sits at the globe center, so
/// the geometric center is offset by a*e toward apoapsis).
pub fn orbit_center(elements: &ClassicalElements) -> Vec3 {
    let rotation = perifocal_rotation(elements);
    let offset = rotation
        * Vector3::new(
            -elements.semi_major_axis_km * elements.eccentricity,
            0.0,
            0.0,
        );
    render_units_from_km(offset)
}

/// In-plane ellipse basis in render units: (center, semi-major axis
/// vector, semi-minor axis vector). `center + a_vec*cos(t) + b_vec*sin(t)`
/// traces the orbit.
pub fn orbit_basis(elements: &ClassicalElements) -> (Vec3, Vec3, Vec3) {
    let rotation = perifocal_rotation(elements);
    let a = elements.semi_major_axis_km;
    let b = a * (1.0 - elements.eccentricity.powi(2)).sqrt();

    let a_vec = rotation * Vector3::new(a, 0.0, 0.0);
    let b_vec = rotation * Vector3::new(0.0, b, 0.0);

    (
        orbit_center(elements),
        render_units_from_km(a_vec),
        render_units_from_km(b_vec),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::EARTH_RADIUS_KM;
    use satkit::Instant;

    fn elements(e: f64, inc_deg: f64) -> ClassicalElements {
        ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + 1000.0,
            eccentricity: e,
            inclination: inc_deg.to_radians(),
            raan: 40.0_f64.to_radians(),
            arg_perigee: 70.0_f64.to_radians(),
            mean_anomaly: 0.0,
            epoch: Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap(),
        }
    }

    #[test]
    fn test_ring_closes() {
        let points = orbit_ring(&elements(0.1, 51.0), 90);
        assert_eq!(points.len(), 91);
        assert!((points[0] - points[90]).length() < 1.0e-5);
    }

    #[test]
    fn test_radius_bounds() {
        let elems = elements(0.2, 30.0);
        let a_ru = (elems.semi_major_axis_km / EARTH_RADIUS_KM) as f32;
        let r_min = a_ru * (1.0 - elems.eccentricity as f32);
        let r_max = a_ru * (1.0 + elems.eccentricity as f32);

        for point in orbit_ring(&elems, 360) {
            let radius = point.length();
            assert!(radius >= r_min - 1.0e-4 && radius <= r_max + 1.0e-4);
        }
    }

    #[test]
    fn test_circular_equatorial_stays_in_plane() {
        let elems = ClassicalElements {
            inclination: 0.0,
            eccentricity: 0.0,
            ..elements(0.0, 0.0)
        };
        // ECI equatorial plane maps to the render XZ plane
        for point in orbit_ring(&elems, 64) {
            assert!(point.y.abs() < 1.0e-6);
        }
    }

    #[test]
    fn test_basis_traces_ring() {
        let elems = elements(0.15, 63.0);
        let (center, a_vec, b_vec) = orbit_basis(&elems);
        let ring = orbit_ring(&elems, 4);

        // nu = 0 is periapsis: center + a_vec is apoapsis-opposite point
        let periapsis = center + a_vec;
        assert!((periapsis - ring[0]).length() < 1.0e-4);

        // Quarter points lie on the ellipse parametrization
        let quarter = center + b_vec;
        let ru = quarter.length();
        let a_ru = (elems.semi_major_axis_km / EARTH_RADIUS_KM) as f32;
        assert!(ru > 0.5 * a_ru && ru < 1.5 * a_ru);
    }
}

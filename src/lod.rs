//! Per-frame visibility and level-of-detail classification
//!
//! Every tick each entity is classified against the camera: distance bucket
//! into a detail tier, frustum containment, and a globe-occlusion test.
//! The visible survivors are ordered nearest-first and truncated to the
//! frame budget, so when the swarm is over budget the entities that matter
//! most on screen win the slots.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::registry::{EntityId, EntityRegistry};
use crate::renderer::{render_units_from_km, GLOBE_RADIUS_RU};

/// Discrete rendering fidelity, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailTier {
    Detailed,
    Standard,
    Reduced,
    Minimal,
}

impl DetailTier {
    /// Larger is better; used to check monotonicity against distance.
    pub fn quality(&self) -> u8 {
        match self {
            Self::Detailed => 3,
            Self::Standard => 2,
            Self::Reduced => 1,
            Self::Minimal => 0,
        }
    }
}

/// Classification tuning shared by all frames.
#[derive(Debug, Clone)]
pub struct LodConfig {
    /// Ascending distance thresholds (render units) for the first three
    /// tiers; anything beyond the last is `Minimal`.
    pub tier_thresholds: [f32; 3],
    /// Hard cap on entities handed to the renderer per frame
    pub max_visible: usize,
    /// Global occlusion-culling toggle
    pub occlusion_culling: bool,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            tier_thresholds: [3.0, 8.0, 20.0],
            max_visible: 2_000_000,
            occlusion_culling: true,
        }
    }
}

impl LodConfig {
    /// First threshold the distance does not exceed wins; past the table,
    /// the coarsest tier.
    pub fn tier_for_distance(&self, distance: f32) -> DetailTier {
        let [near, mid, far] = self.tier_thresholds;
        if distance <= near {
            DetailTier::Detailed
        } else if distance <= mid {
            DetailTier::Standard
        } else if distance <= far {
            DetailTier::Reduced
        } else {
            DetailTier::Minimal
        }
    }
}

/// Read-only camera state supplied by the controls layer each frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// View-frustum volume as six inward-facing planes.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix (row combinations of
    /// the transpose, normalized).
    pub fn from_view_proj(view_proj: Mat4) -> Self {
        let m = view_proj.transpose();
        let rows = [m.x_axis, m.y_axis, m.z_axis, m.w_axis];

        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[2],           // near (wgpu depth 0..1)
            rows[3] - rows[2], // far
        ];
        for plane in &mut planes {
            let len = plane.xyz().length();
            if len > 1.0e-6 {
                *plane /= len;
            }
        }
        Self { planes }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(point) + plane.w >= 0.0)
    }
}

/// Segment-projection occlusion test against the globe at the origin.
///
/// The entity is occluded when the closest point of the camera-to-entity
/// segment to the globe center falls strictly inside the segment and within
/// the globe radius.
pub fn occluded_by_globe(camera: Vec3, point: Vec3) -> bool {
    let segment = point - camera;
    let len_sq = segment.length_squared();
    if len_sq <= 1.0e-12 {
        return false;
    }

    let t = (-camera).dot(segment) / len_sq;
    if t <= 0.0 || t >= 1.0 {
        return false;
    }

    let closest = camera + segment * t;
    closest.length() < GLOBE_RADIUS_RU
}

/// One entity's classification for one frame. Recomputed every tick, never
/// persisted.
#[derive(Debug, Clone, Copy)]
pub struct LodRecord {
    pub id: EntityId,
    pub distance: f32,
    pub tier: DetailTier,
    pub in_frustum: bool,
    pub occluded: bool,
}

impl LodRecord {
    pub fn visible(&self) -> bool {
        self.in_frustum && !self.occluded
    }
}

/// A visible entity ready for instance building, in nearest-first order.
#[derive(Debug, Clone, Copy)]
pub struct VisibleEntity {
    pub slot: usize,
    pub id: EntityId,
    pub position: Vec3,
    pub distance: f32,
    pub tier: DetailTier,
}

/// Full classification output for one frame.
#[derive(Debug, Default)]
pub struct FrameClassification {
    pub records: Vec<LodRecord>,
    pub visible: Vec<VisibleEntity>,
    /// Visible entities dropped by the `max_visible` budget
    pub over_budget: usize,
}

/// Classify every entity against the camera.
pub fn classify_frame(
    registry: &EntityRegistry,
    camera: &CameraFrame,
    config: &LodConfig,
) -> FrameClassification {
    let frustum = Frustum::from_view_proj(camera.view_proj);

    let mut records = Vec::with_capacity(registry.len());
    let mut visible = Vec::new();

    for (slot, entity) in registry.iter().enumerate() {
        let position = render_units_from_km(entity.position_km());
        let distance = camera.position.distance(position);
        let tier = config.tier_for_distance(distance);
        let in_frustum = frustum.contains(position);
        let occluded = config.occlusion_culling && occluded_by_globe(camera.position, position);

        let record = LodRecord {
            id: entity.id(),
            distance,
            tier,
            in_frustum,
            occluded,
        };
        records.push(record);

        if record.visible() && entity.attrs.visible {
            visible.push(VisibleEntity {
                slot,
                id: entity.id(),
                position,
                distance,
                tier,
            });
        }
    }

    visible.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let over_budget = visible.len().saturating_sub(config.max_visible);
    visible.truncate(config.max_visible);

    FrameClassification {
        records,
        visible,
        over_budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_at_origin(from: Vec3) -> CameraFrame {
        let view = Mat4::look_at_rh(from, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), 16.0 / 9.0, 0.01, 100.0);
        CameraFrame {
            view_proj: proj * view,
            position: from,
        }
    }

    #[test]
    fn test_tier_table_ascending() {
        let config = LodConfig::default();
        assert_eq!(config.tier_for_distance(1.0), DetailTier::Detailed);
        assert_eq!(config.tier_for_distance(5.0), DetailTier::Standard);
        assert_eq!(config.tier_for_distance(15.0), DetailTier::Reduced);
        assert_eq!(config.tier_for_distance(50.0), DetailTier::Minimal);
    }

    #[test]
    fn test_tier_quality_monotonic_with_distance() {
        let config = LodConfig::default();
        let mut last_quality = u8::MAX;
        for step in 0..100 {
            let distance = 0.5 + step as f32 * 0.4;
            let quality = config.tier_for_distance(distance).quality();
            assert!(quality <= last_quality, "quality rose with distance");
            last_quality = quality;
        }
    }

    #[test]
    fn test_frustum_contains_look_target() {
        let camera = looking_at_origin(Vec3::new(0.0, 0.0, 6.0));
        let frustum = Frustum::from_view_proj(camera.view_proj);
        assert!(frustum.contains(Vec3::ZERO));
        assert!(frustum.contains(Vec3::new(0.1, 0.1, 2.0)));
        // Behind the camera
        assert!(!frustum.contains(Vec3::new(0.0, 0.0, 8.0)));
        // Far off to the side
        assert!(!frustum.contains(Vec3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn test_occlusion_behind_globe() {
        let camera = Vec3::new(0.0, 0.0, 5.0);
        // Directly behind the globe center, farther than the radius
        assert!(occluded_by_globe(camera, Vec3::new(0.0, 0.0, -3.0)));
        // Same range but laterally outside the silhouette
        assert!(!occluded_by_globe(camera, Vec3::new(4.0, 0.0, -3.0)));
        // Between camera and globe
        assert!(!occluded_by_globe(camera, Vec3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn test_occlusion_requires_interior_projection() {
        // Entity farther than the camera on the same side: projection
        // parameter falls outside (0,1)
        let camera = Vec3::new(0.0, 0.0, 5.0);
        assert!(!occluded_by_globe(camera, Vec3::new(0.0, 0.0, 20.0)));
    }

    #[test]
    fn test_visible_sorted_and_truncated() {
        use crate::elements::{ClassicalElements, ElementRecord, EARTH_RADIUS_KM};
        use crate::propagation::PropagationMethod;
        use crate::registry::{EntityRegistry, RenderAttrs};
        use satkit::Instant;

        let epoch = Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap();
        let mut registry = EntityRegistry::new(8);
        for i in 0..6 {
            registry
                .add(
                    ElementRecord::Classical(ClassicalElements {
                        semi_major_axis_km: EARTH_RADIUS_KM + 500.0 + i as f64 * 400.0,
                        eccentricity: 0.0005,
                        inclination: 0.4,
                        raan: 0.0,
                        arg_perigee: 0.0,
                        mean_anomaly: 0.1 * i as f64,
                        epoch,
                    }),
                    format!("sat-{}", i),
                    PropagationMethod::Analytic,
                    RenderAttrs::default(),
                )
                .unwrap();
        }
        registry.set_time(epoch);

        let camera = looking_at_origin(Vec3::new(0.0, 0.0, 8.0));
        let config = LodConfig {
            max_visible: 3,
            ..LodConfig::default()
        };
        let frame = classify_frame(&registry, &camera, &config);

        assert!(frame.visible.len() <= 3);
        for pair in frame.visible.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(frame.records.len(), 6);
    }
}

//! Entity registry
//!
//! Owns the set of live orbiting entities: a bounded, insertion-ordered
//! store that hands ordered snapshots to the classifier and renderers. Ids
//! are generated here and never reused within a session. The secondary
//! id-to-slot index is rebuilt once per batch insertion rather than per
//! entity.

use std::collections::HashMap;

use nalgebra::Vector3;
use satkit::Instant;
use thiserror::Error;

use crate::elements::{ElementError, ElementRecord};
use crate::propagation::{analytic, PropagationMethod, TwoBodyState, STALE_THRESHOLD_S};

/// Opaque entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-entity render attributes, mutated only through explicit setters.
#[derive(Debug, Clone, Copy)]
pub struct RenderAttrs {
    pub color: [f32; 4],
    pub point_size: f32,
    pub trail: bool,
    pub selected: bool,
    pub visible: bool,
}

impl Default for RenderAttrs {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            point_size: 1.0,
            trail: false,
            selected: false,
            visible: true,
        }
    }
}

/// Outcome of advancing one entity for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Updated,
    /// Elapsed simulated time below the staleness threshold
    Skipped,
    /// Propagator produced a degenerate state; last good state kept
    Degenerate,
}

/// A live orbiting entity.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    pub name: String,
    pub record: ElementRecord,
    propagator_state: satkit::TLE,
    pub method: PropagationMethod,
    pub attrs: RenderAttrs,
    position_km: Vector3<f64>,
    velocity_km_s: Vector3<f64>,
    last_update: Option<Instant>,
    integrator: Option<TwoBodyState>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current ECI position in kilometers.
    pub fn position_km(&self) -> Vector3<f64> {
        self.position_km
    }

    /// Current ECI velocity in km/s.
    pub fn velocity_km_s(&self) -> Vector3<f64> {
        self.velocity_km_s
    }

    pub fn propagator_state(&self) -> &satkit::TLE {
        &self.propagator_state
    }

    /// Advance this entity to the given simulated time.
    ///
    /// Updates within [`STALE_THRESHOLD_S`] of the last one are skipped in
    /// either time direction; the staleness this trades away is bounded and
    /// invisible at render scale.
    pub fn advance_to(&mut self, time: &Instant) -> AdvanceOutcome {
        if let Some(last) = self.last_update {
            if (*time - last).as_seconds().abs() < STALE_THRESHOLD_S {
                return AdvanceOutcome::Skipped;
            }
        }

        match self.method {
            PropagationMethod::Analytic => match analytic::propagate(&self.propagator_state, time)
            {
                Some(state) => {
                    self.position_km = state.position;
                    self.velocity_km_s = state.velocity;
                    self.last_update = Some(*time);
                    AdvanceOutcome::Updated
                }
                None => AdvanceOutcome::Degenerate,
            },
            PropagationMethod::Numerical => {
                if self.integrator.is_none() {
                    // Seed from the analytic strategy so both methods agree
                    // at the handoff point
                    match analytic::propagate(&self.propagator_state, time) {
                        Some(state) => {
                            self.integrator =
                                Some(TwoBodyState::new(state.position, state.velocity, *time));
                        }
                        None => return AdvanceOutcome::Degenerate,
                    }
                }

                let Some(integrator) = self.integrator.as_mut() else {
                    return AdvanceOutcome::Degenerate;
                };
                integrator.advance_to(time);
                self.position_km = integrator.position_km;
                self.velocity_km_s = integrator.velocity_km_s;
                self.last_update = Some(*time);
                AdvanceOutcome::Updated
            }
        }
    }
}

/// Why an insertion was declined.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry full ({capacity} entities)")]
    Full { capacity: usize },
    #[error(transparent)]
    Elements(#[from] ElementError),
}

/// Result of a batch insertion.
#[derive(Debug, Default)]
pub struct BatchInsert {
    pub ids: Vec<EntityId>,
    /// Records declined for capacity or conversion failures
    pub rejected: usize,
}

/// Totals from one full propagation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropagationPass {
    pub updated: usize,
    pub skipped: usize,
    pub degenerate: usize,
}

/// Bounded, insertion-ordered entity store.
pub struct EntityRegistry {
    capacity: usize,
    next_id: u64,
    entries: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    buffer_generation: u64,
    last_time: Option<Instant>,
}

impl EntityRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 0,
            entries: Vec::new(),
            index: HashMap::new(),
            buffer_generation: 0,
            last_time: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Generation counter for GPU buffers sized to this registry's
    /// capacity; bumped whenever those buffers must be rebuilt.
    pub fn buffer_generation(&self) -> u64 {
        self.buffer_generation
    }

    /// Insert one entity. A full registry declines rather than evicting.
    pub fn add(
        &mut self,
        record: ElementRecord,
        name: impl Into<String>,
        method: PropagationMethod,
        attrs: RenderAttrs,
    ) -> Result<EntityId, RegistryError> {
        if self.is_full() {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }

        let propagator_state = record.to_propagator_state()?;
        let id = self.fresh_id();
        self.entries.push(Entity {
            id,
            name: name.into(),
            record,
            propagator_state,
            method,
            attrs,
            position_km: Vector3::zeros(),
            velocity_km_s: Vector3::zeros(),
            last_update: None,
            integrator: None,
        });
        self.index.insert(id, self.entries.len() - 1);
        Ok(id)
    }

    /// Insert many entities with a single index rebuild at the end.
    pub fn add_batch<I>(&mut self, records: I, method: PropagationMethod) -> BatchInsert
    where
        I: IntoIterator<Item = (ElementRecord, String, RenderAttrs)>,
    {
        let mut result = BatchInsert::default();

        for (record, name, attrs) in records {
            if self.is_full() {
                result.rejected += 1;
                continue;
            }
            let propagator_state = match record.to_propagator_state() {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("batch insert skipped a record: {}", e);
                    result.rejected += 1;
                    continue;
                }
            };
            let id = self.fresh_id();
            self.entries.push(Entity {
                id,
                name,
                record,
                propagator_state,
                method,
                attrs,
                position_km: Vector3::zeros(),
                velocity_km_s: Vector3::zeros(),
                last_update: None,
                integrator: None,
            });
            result.ids.push(id);
        }

        self.rebuild_index();
        result
    }

    /// Remove an entity; returns whether it existed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.index.remove(&id) {
            Some(slot) => {
                self.entries.remove(slot);
                self.rebuild_index();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(&id)?;
        Some(&mut self.entries[slot])
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.last_time = None;
    }

    /// Change capacity. Excess newest entities are dropped and GPU buffers
    /// sized by capacity are invalidated via the generation counter.
    pub fn reconfigure_capacity(&mut self, capacity: usize) {
        if capacity == self.capacity {
            return;
        }
        self.capacity = capacity;
        if self.entries.len() > capacity {
            self.entries.truncate(capacity);
            self.rebuild_index();
        }
        self.buffer_generation += 1;
    }

    /// Propagate every entity to the given simulated time.
    ///
    /// Repeating the same timestamp is a no-op pass (every entity reports
    /// `Skipped`), and jumps backward propagate like any other move.
    pub fn set_time(&mut self, time: Instant) -> PropagationPass {
        let mut pass = PropagationPass::default();
        for entity in &mut self.entries {
            match entity.advance_to(&time) {
                AdvanceOutcome::Updated => pass.updated += 1,
                AdvanceOutcome::Skipped => pass.skipped += 1,
                AdvanceOutcome::Degenerate => pass.degenerate += 1,
            }
        }
        self.last_time = Some(time);
        pass
    }

    fn fresh_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entity)| (entity.id, slot))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ClassicalElements, EARTH_RADIUS_KM};

    fn record(altitude_km: f64, mean_anomaly_deg: f64) -> ElementRecord {
        ElementRecord::Classical(ClassicalElements {
            semi_major_axis_km: EARTH_RADIUS_KM + altitude_km,
            eccentricity: 0.001,
            inclination: 51.6_f64.to_radians(),
            raan: 0.0,
            arg_perigee: 0.0,
            mean_anomaly: mean_anomaly_deg.to_radians(),
            epoch: Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap(),
        })
    }

    fn sim_time(minutes: f64) -> Instant {
        Instant::from_datetime(2026, 3, 1, 0, 0, 0.0).unwrap()
            + satkit::Duration::from_seconds(minutes * 60.0)
    }

    #[test]
    fn test_capacity_two_rejects_third() {
        let mut registry = EntityRegistry::new(2);
        let a = registry
            .add(record(500.0, 0.0), "a", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();
        let b = registry
            .add(record(600.0, 10.0), "b", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();

        let third = registry.add(
            record(700.0, 20.0),
            "c",
            PropagationMethod::Analytic,
            RenderAttrs::default(),
        );
        assert!(matches!(third, Err(RegistryError::Full { capacity: 2 })));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(a).is_some());
        assert!(registry.get(b).is_some());
    }

    #[test]
    fn test_batch_insert_counts_rejections() {
        let mut registry = EntityRegistry::new(3);
        let batch = registry.add_batch(
            (0..5).map(|i| {
                (
                    record(500.0 + i as f64 * 10.0, i as f64),
                    format!("sat-{}", i),
                    RenderAttrs::default(),
                )
            }),
            PropagationMethod::Analytic,
        );
        assert_eq!(batch.ids.len(), 3);
        assert_eq!(batch.rejected, 2);
        assert_eq!(registry.len(), 3);
        // Index usable after the deferred rebuild
        for id in &batch.ids {
            assert!(registry.get(*id).is_some());
        }
    }

    #[test]
    fn test_ids_unique_and_ordered() {
        let mut registry = EntityRegistry::new(10);
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                registry
                    .add(
                        record(500.0, i as f64),
                        format!("sat-{}", i),
                        PropagationMethod::Analytic,
                        RenderAttrs::default(),
                    )
                    .unwrap(),
            );
        }
        let iterated: Vec<EntityId> = registry.iter().map(|e| e.id()).collect();
        assert_eq!(iterated, ids);
    }

    #[test]
    fn test_set_time_idempotent() {
        let mut registry = EntityRegistry::new(4);
        registry
            .add(record(550.0, 30.0), "a", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();
        registry
            .add(record(800.0, 60.0), "b", PropagationMethod::Numerical, RenderAttrs::default())
            .unwrap();

        registry.set_time(sim_time(30.0));
        let first: Vec<_> = registry.iter().map(|e| e.position_km()).collect();

        let pass = registry.set_time(sim_time(30.0));
        let second: Vec<_> = registry.iter().map(|e| e.position_km()).collect();

        assert_eq!(first, second);
        assert_eq!(pass.updated, 0);
        assert_eq!(pass.skipped, 2);
    }

    #[test]
    fn test_sub_threshold_update_skipped() {
        let mut registry = EntityRegistry::new(1);
        registry
            .add(record(550.0, 0.0), "a", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();

        registry.set_time(sim_time(10.0));
        let before = registry.iter().next().unwrap().position_km();
        registry.set_time(sim_time(10.0) + satkit::Duration::from_seconds(0.02));
        let after = registry.iter().next().unwrap().position_km();
        assert_eq!(before, after);
    }

    #[test]
    fn test_time_moves_backward() {
        let mut registry = EntityRegistry::new(1);
        registry
            .add(record(550.0, 0.0), "a", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();

        registry.set_time(sim_time(0.0));
        let at_epoch = registry.iter().next().unwrap().position_km();

        registry.set_time(sim_time(45.0));
        registry.set_time(sim_time(0.0));
        let back = registry.iter().next().unwrap().position_km();

        assert!((at_epoch - back).norm() < 1.0e-6);
    }

    #[test]
    fn test_numerical_seeded_from_analytic() {
        let mut registry = EntityRegistry::new(2);
        let analytic = registry
            .add(record(550.0, 30.0), "a", PropagationMethod::Analytic, RenderAttrs::default())
            .unwrap();
        let numerical = registry
            .add(record(550.0, 30.0), "n", PropagationMethod::Numerical, RenderAttrs::default())
            .unwrap();

        // First pass seeds the integrator from the analytic output, so the
        // two methods coincide at the handoff time
        registry.set_time(sim_time(15.0));
        let a = registry.get(analytic).unwrap().position_km();
        let n = registry.get(numerical).unwrap().position_km();
        assert!((a - n).norm() < 1.0e-9);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut registry = EntityRegistry::new(5);
        let ids: Vec<_> = (0..4)
            .map(|i| {
                registry
                    .add(
                        record(500.0, i as f64),
                        format!("sat-{}", i),
                        PropagationMethod::Analytic,
                        RenderAttrs::default(),
                    )
                    .unwrap()
            })
            .collect();

        assert!(registry.remove(ids[1]));
        assert!(!registry.remove(ids[1]));

        let remaining: Vec<_> = registry.iter().map(|e| e.id()).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);
        assert!(registry.get(ids[2]).is_some());
    }

    #[test]
    fn test_reconfigure_capacity_bumps_generation() {
        let mut registry = EntityRegistry::new(4);
        let generation = registry.buffer_generation();
        registry.reconfigure_capacity(8);
        assert_eq!(registry.buffer_generation(), generation + 1);
        registry.reconfigure_capacity(8);
        assert_eq!(registry.buffer_generation(), generation + 1);
    }
}

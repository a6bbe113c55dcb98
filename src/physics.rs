// src/physics.rs

use std::collections::HashMap;
use std::sync::Mutex;

use rapier3d::prelude::*;
use tracing::{debug, info, warn};

use crate::aven_drift::{DriftTuning, HeldActions, WheelId};
use crate::spawn::{PlayerSpawnInfo, SpawnGrid};
use crate::state::VehicleSnapshot;
use crate::vehicle::{build_controller, RapierHost, Vehicle, VehicleConfig, GT86};

const GROUP_GROUND: Group  = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);
const GROUP_WALL: Group    = Group::from_bits_truncate(0b0100);

pub const ARENA_HALF_SIZE: f32 = 150.0;     // meters, inner face of the walls
const WALL_HALF_HEIGHT: f32 = 1.5;
const WALL_HALF_THICKNESS: f32 = 1.0;
const CONTACT_FORCE_THRESHOLD: f32 = 20_000.0; // N, below this nothing is reported
const OUT_OF_BOUNDS: f32 = 1_000.0;

// --------------------------------------------------
// contact-force events -> collision impulses
// --------------------------------------------------
#[derive(Default)]
struct ContactForceCollector {
    hits: Mutex<Vec<(ColliderHandle, ColliderHandle, f32)>>,
}

impl ContactForceCollector {
    fn drain(&self) -> Vec<(ColliderHandle, ColliderHandle, f32)> {
        match self.hits.lock() {
            Ok(mut hits) => std::mem::take(&mut *hits),
            Err(_) => Vec::new(),
        }
    }
}

impl EventHandler for ContactForceCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
    }

    fn handle_contact_force_event(
        &self,
        dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        contact_pair: &ContactPair,
        total_force_magnitude: Real,
    ) {
        if let Ok(mut hits) = self.hits.lock() {
            hits.push((contact_pair.collider1, contact_pair.collider2, total_force_magnitude * dt));
        }
    }
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>, // gravity vector
    pub pipeline: PhysicsPipeline, // physics pipeline
    pub island_manager: IslandManager, // manages islands of bodies
    pub broad_phase: DefaultBroadPhase, // broad-phase collision detection
    pub narrow_phase: NarrowPhase, // collision detection
    pub bodies: RigidBodySet, // for rigid bodies
    pub colliders: ColliderSet, // for collision shapes
    pub joints: ImpulseJointSet, // for constraints
    pub multibody_joints: MultibodyJointSet,// for articulated bodies
    pub ccd: CCDSolver, // continuous collision detection
    pub query_pipeline: QueryPipeline, // suspension ray casts
    pub vehicles: HashMap<String, Vehicle>, // playerId → vehicle
    pub body_to_player: HashMap<RigidBodyHandle, String>, // body handle → playerId
    pub spawn_grid: SpawnGrid,
    pub default_tuning: DriftTuning, // tuning every new vehicle starts from
    pub vehicle_config: VehicleConfig,
}

impl PhysicsWorld {
    pub fn new(default_tuning: DriftTuning) -> Self {
        let gravity = vector![0.0, -9.81, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // === 1. Big static ground box, top surface at y = 0 ===
        let ground_rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -1.0, 0.0])
            .build();
        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        // === 2. Arena walls ===
        let reach = ARENA_HALF_SIZE + WALL_HALF_THICKNESS;
        let walls = [
            (vector![0.0, WALL_HALF_HEIGHT, -reach], [reach, WALL_HALF_HEIGHT, WALL_HALF_THICKNESS]),
            (vector![0.0, WALL_HALF_HEIGHT, reach], [reach, WALL_HALF_HEIGHT, WALL_HALF_THICKNESS]),
            (vector![-reach, WALL_HALF_HEIGHT, 0.0], [WALL_HALF_THICKNESS, WALL_HALF_HEIGHT, reach]),
            (vector![reach, WALL_HALF_HEIGHT, 0.0], [WALL_HALF_THICKNESS, WALL_HALF_HEIGHT, reach]),
        ];
        for (center, [hx, hy, hz]) in walls {
            let wall = bodies.insert(RigidBodyBuilder::fixed().translation(center).build());
            let collider = ColliderBuilder::cuboid(hx, hy, hz)
                .collision_groups(InteractionGroups::new(GROUP_WALL, GROUP_CHASSIS))
                .friction(0.4)
                .restitution(0.1)
                .build();
            colliders.insert_with_parent(collider, wall, &mut bodies);
        }

        info!(bodies = bodies.len(), colliders = colliders.len(), "arena built");

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vehicles: HashMap::new(),
            body_to_player: HashMap::new(),
            spawn_grid: SpawnGrid::default(),
            default_tuning,
            vehicle_config: GT86,
        }
    }

    pub fn vehicle(&self, player_id: &str) -> Option<&Vehicle> {
        self.vehicles.get(player_id)
    }

    pub fn vehicle_mut(&mut self, player_id: &str) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(player_id)
    }

    /// Store the latest held actions; they are consumed in `step`.
    pub fn apply_player_input(&mut self, player_id: &str, input: HeldActions) -> bool {
        match self.vehicles.get_mut(player_id) {
            Some(v) => {
                v.input = input;
                true
            }
            None => false,
        }
    }

    /// Spawn a ray-cast car for this player on the next free grid slot.
    pub fn spawn_vehicle_for_player(&mut self, id: &str) -> PlayerSpawnInfo {
        let spawn = self.spawn_grid.allocate_spawn(id);
        let config = &self.vehicle_config;
        let [x, y, z] = spawn.position;

        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![x, y, z])
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            // the ray-cast controller pushes without waking the body
            .can_sleep(false)
            .build();

        let [hx, hy, hz] = config.chassis_half_extents;
        let [cx, cy, cz] = config.chassis_com_offset;
        let density = config.mass / (8.0 * hx * hy * hz); // ρ = m / V

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![cx, cy, cz])
            .collision_groups(InteractionGroups::new(
                GROUP_CHASSIS,
                GROUP_GROUND | GROUP_WALL | GROUP_CHASSIS,
            ))
            .active_events(ActiveEvents::CONTACT_FORCE_EVENTS)
            .contact_force_event_threshold(CONTACT_FORCE_THRESHOLD)
            .density(density)
            .friction(0.3)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.body_to_player.insert(handle, id.to_string());

        let mut controller = build_controller(handle, config);
        let wheel_speed = Default::default();
        let drift = {
            let host = RapierHost {
                body: &mut self.bodies[handle],
                controller: &mut controller,
                wheel_speed: &wheel_speed,
                dt: 0.0,
            };
            crate::aven_drift::VehicleOrchestrator::new(self.default_tuning.clone(), &host)
        };

        self.vehicles.insert(id.to_string(), Vehicle::new(handle, controller, drift, spawn.position));

        info!(player = id, slot = spawn.slot, position = ?spawn.position, "spawned vehicle");
        spawn
    }

    pub fn remove_vehicle(&mut self, id: &str) -> bool {
        let Some(vehicle) = self.vehicles.remove(id) else {
            return false;
        };
        self.body_to_player.remove(&vehicle.body);
        self.bodies.remove(
            vehicle.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            true,
        );
        self.spawn_grid.release(id);
        info!(player = id, "removed vehicle");
        true
    }

    /// Put a vehicle back on its grid slot, standing still, pipeline reset.
    pub fn reset_vehicle(&mut self, id: &str) -> bool {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return false;
        };
        if let Some(body) = self.bodies.get_mut(vehicle.body) {
            let [x, y, z] = vehicle.spawn_point;
            body.set_translation(vector![x, y, z], true);
            body.set_rotation(Rotation::identity(), true);
            body.set_linvel(vector![0.0, 0.0, 0.0], true);
            body.set_angvel(vector![0.0, 0.0, 0.0], true);
        }
        vehicle.input = HeldActions::default();
        vehicle.drift.reset();
        vehicle.reset_wheel_spin();
        debug!(player = id, "vehicle reset");
        true
    }

    pub fn vehicle_snapshots(&self) -> Vec<VehicleSnapshot> {
        let mut out: Vec<VehicleSnapshot> = self
            .vehicles
            .iter()
            .filter_map(|(id, v)| {
                let body = self.bodies.get(v.body)?;
                Some(VehicleSnapshot::capture(id, v, body))
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn step(&mut self, dt: Real) {
        // 1) Drift pipeline: wheel forces, steering, grip, yaw assist
        for (id, vehicle) in self.vehicles.iter_mut() {
            vehicle.status.events.clear();
            let Some(body) = self.bodies.get_mut(vehicle.body) else {
                continue;
            };
            let mut host = RapierHost {
                body,
                controller: &mut vehicle.controller,
                wheel_speed: &vehicle.wheel_speed,
                dt,
            };
            let report = vehicle.drift.tick(dt, &vehicle.input, &mut host, &mut vehicle.status);
            if let Some(change) = report.gear_change {
                debug!(player = %id, from = ?change.from, to = ?change.to, "auto shift");
            }

            // 2) Suspension + tire impulses from the ray-cast controller
            vehicle.controller.update_vehicle(
                dt,
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                QueryFilter::exclude_dynamic().exclude_rigid_body(vehicle.body),
            );
        }

        // 3) Step physics
        let hooks = ();
        let events = ContactForceCollector::default();
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &hooks,
            &events,
        );

        // 4) Hard hits end drifts
        for (c1, c2, impulse) in events.drain() {
            for collider in [c1, c2] {
                let Some(player) = self
                    .colliders
                    .get(collider)
                    .and_then(|c| c.parent())
                    .and_then(|b| self.body_to_player.get(&b))
                else {
                    continue;
                };
                if let Some(v) = self.vehicles.get_mut(player) {
                    v.drift.notify_collision(impulse);
                }
            }
        }

        // 5) Wheel spin for next tick's host reads
        for vehicle in self.vehicles.values_mut() {
            vehicle.measure_wheel_speed(dt);
        }

        // 6) Safety: vehicles that explode or leave the world go back to their slot
        let lost: Vec<String> = self
            .vehicles
            .iter()
            .filter(|(_, v)| {
                self.bodies.get(v.body).is_some_and(|b| {
                    let p = b.translation();
                    !p.iter().all(|c| c.is_finite()) || p.iter().any(|c| c.abs() > OUT_OF_BOUNDS)
                })
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in lost {
            warn!(player = %id, "vehicle left the world, resetting");
            self.reset_vehicle(&id);
        }
    }

    /// Contact count as the ray casts saw it on the last step.
    pub fn wheels_in_contact(&self, player_id: &str) -> usize {
        self.vehicles.get(player_id).map_or(0, |v| {
            WheelId::ALL
                .iter()
                .filter(|&&w| v.controller.wheels()[crate::vehicle::wheel_index(w)].raycast_info().is_in_contact)
                .count()
        })
    }
}

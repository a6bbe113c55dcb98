use drift_server::aven_drift::testing::{RecordingSink, ScriptedHost};
use drift_server::aven_drift::{DriftTuning, HeldActions, NullSink, TickReport, VehicleOrchestrator};
use rapier3d::na::{UnitQuaternion, Vector3};

/// One recorded tick: what the player held and what the solver reported.
#[derive(Clone)]
struct Frame {
    dt: f32,
    held: HeldActions,
    velocity: Vector3<f32>,
    yaw: f32,
}

/// Launch, flick into a slide, handbrake, straighten out. dt jitters between
/// 1/60 and 1/240 like a loaded server.
fn recording() -> Vec<Frame> {
    let dts = [1.0 / 60.0, 1.0 / 120.0, 1.0 / 240.0, 1.0 / 90.0];
    (0..600)
        .map(|i| {
            let t = i as f32;
            let speed = (t * 0.05).min(18.0);
            let slip_deg = if (200..420).contains(&i) { 14.0 + (t * 0.1).sin() * 6.0 } else { 0.0 };
            let a = slip_deg.to_radians();
            Frame {
                dt: dts[i % dts.len()],
                held: HeldActions {
                    accelerate: i < 450,
                    brake: i >= 520,
                    steer_left: (150..260).contains(&i),
                    steer_right: (300..360).contains(&i),
                    handbrake: (190..205).contains(&i),
                },
                velocity: Vector3::new(a.sin(), 0.0, -a.cos()) * speed,
                yaw: (t * 0.004).sin(),
            }
        })
        .collect()
}

fn replay(frames: &[Frame]) -> (Vec<TickReport>, VehicleOrchestrator, ScriptedHost) {
    let mut host = ScriptedHost::default();
    let mut o = VehicleOrchestrator::new(DriftTuning::gt86(), &host);
    let mut reports = Vec::with_capacity(frames.len());
    for f in frames {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), f.yaw);
        host.rotation = rot;
        host.velocity = rot * f.velocity;
        host.begin_tick();
        reports.push(o.tick(f.dt, &f.held, &mut host, &mut NullSink));
    }
    (reports, o, host)
}

#[test]
fn identical_recordings_produce_identical_trajectories() {
    let frames = recording();
    let (reports_a, a, host_a) = replay(&frames);
    let (reports_b, b, host_b) = replay(&frames);

    assert_eq!(reports_a, reports_b);
    assert_eq!(a.car_state(), b.car_state());
    assert_eq!(a.intent(), b.intent());
    assert_eq!(a.rpm(), b.rpm());
    assert_eq!(a.gear(), b.gear());
    assert_eq!(a.drift().confidence(), b.drift().confidence());
    assert_eq!(host_a, host_b);
}

#[test]
fn recording_exercises_drift_and_shifting() {
    let (reports, _, _) = replay(&recording());
    let events: usize = reports.iter().map(|r| r.events.len()).sum();
    assert!(events >= 2, "expected at least one drift start and end");
    assert!(reports.iter().any(|r| r.gear_change.is_some()));
}

#[test]
fn sink_choice_does_not_change_state() {
    let frames = recording();
    let (reports_null, _, _) = replay(&frames);

    let mut host = ScriptedHost::default();
    let mut o = VehicleOrchestrator::new(DriftTuning::gt86(), &host);
    let mut sink = RecordingSink::default();
    let mut reports_recorded = Vec::new();
    for f in &frames {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), f.yaw);
        host.rotation = rot;
        host.velocity = rot * f.velocity;
        host.begin_tick();
        reports_recorded.push(o.tick(f.dt, &f.held, &mut host, &mut sink));
    }

    assert_eq!(reports_null, reports_recorded);
    assert_eq!(sink.engine.len(), frames.len());
    let pushed: usize = reports_recorded.iter().map(|r| r.events.len()).sum();
    assert_eq!(sink.events.len(), pushed);
}

#[test]
fn reset_then_replay_matches_a_fresh_run() {
    let frames = recording();
    let (fresh, _, _) = replay(&frames[..120]);

    let mut host = ScriptedHost::default();
    let mut o = VehicleOrchestrator::new(DriftTuning::gt86(), &host);
    for f in &frames[200..320] {
        host.velocity = f.velocity;
        o.tick(f.dt, &f.held, &mut host, &mut NullSink);
    }
    o.reset();

    let mut host = ScriptedHost::default();
    let mut again = Vec::new();
    for f in &frames[..120] {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), f.yaw);
        host.rotation = rot;
        host.velocity = rot * f.velocity;
        host.begin_tick();
        let mut r = o.tick(f.dt, &f.held, &mut host, &mut NullSink);
        // a drift cut short by reset() is reported on the first tick after it
        if again.is_empty() {
            r.events.clear();
        }
        again.push(r);
    }
    assert_eq!(fresh, again);
}

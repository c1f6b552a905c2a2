//! End-to-end scenarios for the measurement engine and fleet simulation.
//!
//! Draw sequences are scripted so each scenario takes an exact branch of
//! the decision procedure.

use approx::assert_relative_eq;
use fleetsim::{
    AnomalyRecord, Engine, FleetConfig, MeasurementState, Phase, RangeConfig, ScriptedSource,
    SensorState, Simulation, TimestampMs,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const NOW: TimestampMs = 1_706_745_600_000;

fn temperature() -> RangeConfig {
    RangeConfig::new(18.0, 25.0, 5.0)
}

#[test]
fn test_three_normal_ticks_stay_bounded() {
    let engine = Engine::new();
    let range = temperature();
    let mut state = MeasurementState::at_midpoint(&range);
    assert_eq!(state.normal, 21.5);

    // Each tick: trigger roll >= 0.10, then a walk draw.
    let mut rng = ScriptedSource::new([0.50, 0.99, 0.73, 0.0, 0.11, 0.62]);
    let mut previous = state.normal;

    for _ in 0..3 {
        let value = engine.update(&mut state, &range, NOW, &mut rng);
        assert!(range.contains(value));
        assert!((value - previous).abs() <= 0.35 + 1e-9);
        assert_eq!(state.normal, value);
        previous = value;
    }
    assert_eq!(rng.remaining(), 0);
}

#[test]
fn test_first_update_walks_from_midpoint() {
    let engine = Engine::new();
    let fleet = FleetConfig::default_fleet();
    let mut rng = StdRng::seed_from_u64(3);

    for id in fleet.sensor_ids() {
        let profile = fleet.get(id).unwrap();
        for (measurement, range) in profile.ranges() {
            let mut state = SensorState::init(profile);
            let mid = range.midpoint();
            let mut script = ScriptedSource::new([0.5]);
            script.extend([rand::Rng::gen::<f64>(&mut rng)]);

            let value = engine.update(state.get_mut(measurement), range, NOW, &mut script);
            assert!(range.contains(value));
            assert!((value - mid).abs() <= range.span() * 0.05 + 1e-9);
        }
    }
}

#[test]
fn test_persistent_anomaly_lifecycle() {
    let engine = Engine::new();
    let range = temperature();
    let mut state = MeasurementState::at_midpoint(&range);

    // Anomaly roll, below side, U = 0.3, persistence roll.
    let mut rng = ScriptedSource::new([0.05, 0.2, 0.3, 0.01]);
    let value = engine.update(&mut state, &range, NOW, &mut rng);
    assert_relative_eq!(value, 15.0);

    let record = state.anomaly.expect("persistent anomaly locked in");
    assert_relative_eq!(record.value, 15.0);
    assert!(record.is_below);
    assert_eq!(record.end_time, NOW + 3_600_000);

    // One second later the anomaly is still active: a single walk draw.
    rng.extend([0.9]);
    let step = engine.step(&mut state, &range, NOW + 1_000, &mut rng);
    assert_eq!(step.phase, Phase::PersistentAnomaly);
    assert!(step.value < range.min);
    assert_eq!(rng.remaining(), 0);
    assert_eq!(state.normal, 21.5);

    // At the end time it expires and the same call takes the normal branch.
    rng.extend([0.5, 0.5]);
    let step = engine.step(&mut state, &range, NOW + 3_600_000, &mut rng);
    assert!(step.anomaly_expired);
    assert_eq!(step.phase, Phase::Normal);
    assert!(state.anomaly.is_none());

    // Afterwards branch 1 is no longer taken.
    rng.extend([0.5, 0.5]);
    let step = engine.step(&mut state, &range, NOW + 3_601_000, &mut rng);
    assert!(!step.anomaly_expired);
    assert_eq!(step.phase, Phase::Normal);
}

#[test]
fn test_persistent_anomaly_stays_out_of_range() {
    let engine = Engine::new();
    let range = temperature();
    let mut rng = StdRng::seed_from_u64(11);

    for is_below in [true, false] {
        let mut state = MeasurementState {
            normal: 21.5,
            anomaly: Some(AnomalyRecord {
                value: if is_below { 17.0 } else { 26.0 },
                end_time: NOW + 3_600_000,
                is_below,
            }),
        };

        for second in 0..3_600 {
            let value = engine.update(&mut state, &range, NOW + second * 1_000, &mut rng);
            if is_below {
                assert!(value < range.min);
            } else {
                assert!(value > range.max);
            }
        }
        assert_eq!(state.normal, 21.5);
    }
}

#[test]
fn test_transient_anomalies_never_touch_normal() {
    let engine = Engine::new();
    let range = temperature();
    let mut state = MeasurementState::at_midpoint(&range);
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..500 {
        let side = rand::Rng::gen::<f64>(&mut rng);
        let u = rand::Rng::gen::<f64>(&mut rng);
        let mut script = ScriptedSource::new([0.0, side, u, 0.99]);
        let step = engine.step(&mut state, &range, NOW, &mut script);
        assert_eq!(step.phase, Phase::TransientExcursion);
        assert_eq!(state.normal, 21.5);
        assert!(state.anomaly.is_none());
    }
}

#[test]
fn test_is_below_matches_trigger_value() {
    let engine = Engine::new();
    let range = RangeConfig::new(50.0, 100.0, 20.0);

    for (side, expect_below) in [(0.1, true), (0.49, true), (0.5, false), (0.9, false)] {
        let mut state = MeasurementState {
            normal: 80.0,
            anomaly: None,
        };
        let mut rng = ScriptedSource::new([0.0, side, 0.5, 0.0]);
        let value = engine.update(&mut state, &range, NOW, &mut rng);
        let record = state.anomaly.unwrap();
        assert_eq!(record.is_below, expect_below);
        assert_eq!(record.is_below, value < state.normal);
    }
}

#[test]
fn test_long_run_keeps_normals_in_range() {
    let fleet = FleetConfig::default_fleet();
    let mut sim = Simulation::new(fleet.clone());
    let mut rng = StdRng::seed_from_u64(2025);
    let ids: Vec<String> = fleet.sensor_ids().map(str::to_string).collect();

    for i in 0..20_000i64 {
        let id = &ids[(i as usize) % ids.len()];
        sim.tick_sensor(id, NOW + i * 1_000, &mut rng).unwrap();

        let profile = fleet.get(id).unwrap();
        let state = sim.sensor_state(id).unwrap();
        for (measurement, range) in profile.ranges() {
            assert!(range.contains(state.get(measurement).normal));
        }
    }

    let stats = sim.stats();
    assert_eq!(stats.ticks, 20_000);
    assert!(stats.transient_readings > 0);
    assert!(stats.normal_readings > stats.transient_readings);
}

#[test]
fn test_fleet_file_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    std::fs::write(&path, FleetConfig::default_fleet().to_json().unwrap()).unwrap();

    let fleet = FleetConfig::from_json_file(&path).unwrap();
    assert_eq!(fleet, FleetConfig::default_fleet());

    let missing = FleetConfig::from_json_file(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(fleetsim::SimError::Io(_))));
}

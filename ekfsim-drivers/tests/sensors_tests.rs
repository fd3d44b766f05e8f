//! Integration tests for the sensor synthesizer

mod common;

use common::{run_to_completion, FakeVehicle};
use ekfsim_core::mavlink::ardupilotmega::{MavCmd, MavMessage};
use ekfsim_core::motion::{self, Pose, ORIGIN, PERIOD};
use ekfsim_core::{Driver, Readiness, SessionError};
use ekfsim_drivers::{SensorConfig, SensorSynthesizer, SourceEdge, SourceSwitch};
use std::time::Duration;

fn config(duration_s: f64, switch_sources: bool) -> SensorConfig {
    SensorConfig {
        duration_s,
        switch_sources,
        seed: Some(7),
        ..Default::default()
    }
}

fn is_heartbeat(message: &MavMessage) -> bool {
    matches!(message, MavMessage::HEARTBEAT(_))
}

fn is_gps(message: &MavMessage) -> bool {
    matches!(message, MavMessage::GPS_INPUT(_))
}

fn is_position_delta(message: &MavMessage) -> bool {
    matches!(message, MavMessage::VISION_POSITION_DELTA(_))
}

#[test]
fn test_sensors_name() {
    let synth = SensorSynthesizer::new(SensorConfig::default());
    assert_eq!(synth.name(), "sensors");
}

#[test]
fn test_sensors_stop_after_duration() {
    let mut synth = SensorSynthesizer::new(config(10.0, false));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    let sleeps = vehicle.clock.sleeps();
    assert_eq!(sleeps.len(), 50, "one fast tick every 0.2s for 10s");
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(200)));
    assert_eq!(vehicle.count(is_heartbeat), 10, "slow loop runs every 5th tick");
    assert_eq!(vehicle.count(is_gps), 10);
}

#[test]
fn test_sensors_speed_multiplier_shortens_wall_sleeps() {
    let mut synth = SensorSynthesizer::new(config(10.0, false));
    let mut vehicle = FakeVehicle::new(4.0);

    run_to_completion(&mut synth, &mut vehicle);

    let sleeps = vehicle.clock.sleeps();
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(50)));
    assert!(
        vehicle.clock.sleeps().iter().sum::<Duration>() <= Duration::from_millis(2600),
        "10 simulated seconds at 4x should take about 2.5 wall seconds"
    );
}

#[test]
fn test_sensors_arm_once_after_ready() {
    let mut synth = SensorSynthesizer::new(config(10.0, false));
    let mut vehicle = FakeVehicle::new(1.0).ready_at(Duration::from_secs(3));

    run_to_completion(&mut synth, &mut vehicle);

    let arms = vehicle.commands(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM);
    assert_eq!(arms.len(), 1, "arm must be sent exactly once");
    assert!(arms[0].0 >= Duration::from_secs(3), "arm must follow readiness");
    assert_eq!(arms[0].1, 1.0);
    assert_eq!(vehicle.readiness, Readiness::Armed);
}

#[test]
fn test_sensors_never_arm_without_ready() {
    let mut synth = SensorSynthesizer::new(config(5.0, false));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    assert!(vehicle
        .commands(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM)
        .is_empty());
    assert_eq!(vehicle.readiness, Readiness::NotReady);
}

#[test]
fn test_sensors_drain_inbound_every_fast_tick() {
    let mut synth = SensorSynthesizer::new(config(2.0, false));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    assert_eq!(vehicle.drains, 10);
}

#[test]
fn test_sensors_position_deltas_only_in_second_half() {
    let mut synth = SensorSynthesizer::new(config(60.0, false));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    assert_eq!(
        vehicle.count(is_position_delta),
        0,
        "secondary sensor is off for the first half revolution"
    );
}

#[test]
fn test_sensors_switch_commands_follow_edges() {
    let mut synth = SensorSynthesizer::new(config(130.0, true));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    let switches = vehicle.commands(MavCmd::MAV_CMD_SET_EKF_SOURCE_SET);
    let sets: Vec<f32> = switches.iter().map(|(_, set)| *set).collect();
    assert_eq!(sets, vec![2.0, 1.0], "on at half revolution, off at full");

    let on_at = switches[0].0.as_secs_f64();
    assert!((on_at - PERIOD / 2.0).abs() < 0.5, "switched on at {}", on_at);
    assert!(vehicle.count(is_position_delta) > 0);
}

#[test]
fn test_sensors_no_switch_commands_when_disabled() {
    let mut synth = SensorSynthesizer::new(config(130.0, false));
    let mut vehicle = FakeVehicle::new(1.0);

    run_to_completion(&mut synth, &mut vehicle);

    assert!(vehicle
        .commands(MavCmd::MAV_CMD_SET_EKF_SOURCE_SET)
        .is_empty());
    assert!(
        vehicle.count(is_position_delta) > 0,
        "deltas still flow without switching"
    );
}

#[test]
fn test_source_switch_toggles_once_per_half_revolution() {
    for dt in [0.05, 0.2, 1.0, 7.3] {
        let mut switch = SourceSwitch::default();
        let mut pose = Pose::start();
        let mut edges = Vec::new();
        let mut elapsed = 0.0;

        while elapsed < 3.0 * PERIOD + PERIOD / 4.0 {
            pose = motion::advance(&pose, dt);
            elapsed += dt;
            if let Some(edge) = switch.update(&pose) {
                edges.push(edge);
            }
        }

        assert_eq!(edges.len(), 6, "dt {} gave edges {:?}", dt, edges);
        for pair in edges.chunks(2) {
            assert_eq!(pair, [SourceEdge::On, SourceEdge::Off]);
        }
    }
}

#[test]
fn test_gps_seeded_runs_match() {
    let run = |seed| {
        let mut synth = SensorSynthesizer::new(SensorConfig {
            duration_s: 3.0,
            seed: Some(seed),
            ..Default::default()
        });
        let mut vehicle = FakeVehicle::new(1.0);
        run_to_completion(&mut synth, &mut vehicle);
        vehicle
            .sent
            .into_iter()
            .filter_map(|(_, message)| match message {
                MavMessage::GPS_INPUT(data) => Some((data.lat, data.lon)),
                _ => None,
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(42), run(42));
    assert_ne!(run(42), run(43));
}

#[test]
fn test_sensor_messages_carry_the_pose() {
    let mut synth = SensorSynthesizer::new(SensorConfig {
        duration_s: 130.0,
        gps_noise_m: 0.0,
        seed: Some(1),
        ..Default::default()
    });
    let mut vehicle = FakeVehicle::new(1.0);

    let ticks = run_to_completion(&mut synth, &mut vehicle) - 1;
    assert_eq!(ticks, 650);

    let mut poses = vec![Pose::start()];
    for k in 0..ticks {
        poses.push(motion::advance(&poses[k], 0.2));
    }

    let (mut gps, mut deltas) = (0, 0);
    for (at, message) in &vehicle.sent {
        let k = (at.as_secs_f64() / 0.2).round() as usize;
        match message {
            // The slow loop reports the pose before this tick's advance
            MavMessage::GPS_INPUT(data) => {
                let expected = ORIGIN.offset(poses[k].x, poses[k].y).to_e7();
                assert_eq!((data.lat, data.lon), (expected.lat, expected.lon), "tick {}", k);
                gps += 1;
            }
            MavMessage::VISION_POSITION_DELTA(data) => {
                let pose = &poses[k + 1];
                assert_eq!(data.angle_delta, pose.angle_delta_f32(), "tick {}", k);
                assert_eq!(data.position_delta, pose.position_delta_f32(), "tick {}", k);
                assert_eq!(data.time_delta_usec, 200_000);
                assert_eq!(data.confidence, 99.8);
                deltas += 1;
            }
            _ => {}
        }
    }
    assert_eq!(gps, 130);
    assert!(deltas > 0);

    assert_eq!(synth.pose(), &poses[ticks]);
    assert!(!synth.secondary_active(), "130s is back in the first half");
}

#[test]
fn test_sensors_reject_non_positive_speed() {
    let mut synth = SensorSynthesizer::new(config(10.0, false));
    let mut vehicle = FakeVehicle::new(0.0);

    let result = synth.tick(&mut vehicle);

    assert!(matches!(result, Err(SessionError::InvalidSpeedMultiplier(_))));
    assert!(vehicle.sent.is_empty(), "nothing is sent before the check");
}

use super::*;
use serde_json::json;

#[test]
fn add_drone_defaults_model_and_display_options() {
    let msg = Inbound::parse(r#"{"channel":"addDrone","data":{"id":"d1","origin":[0,0,0]}}"#)
        .unwrap();
    let Inbound::AddDrone(add) = msg else {
        panic!("expected addDrone, got {msg:?}");
    };
    assert_eq!(add.id, "d1");
    assert_eq!(add.origin, [0.0, 0.0, 0.0]);
    assert!(add.model.is_none());
    assert_eq!(add.display_options.unwrap_or_default(), DisplayOptions::default());
}

#[test]
fn display_options_use_wire_names_and_fill_missing_flags() {
    let msg = Inbound::parse(
        r#"{"channel":"addDrone","data":{"id":"d2","origin":[1,2,3],
            "display_options":{"displayGlobalCoordinateSystem":false,"displayIMUCoordinateSystem":false}}}"#,
    )
    .unwrap();
    let Inbound::AddDrone(add) = msg else {
        panic!("expected addDrone");
    };
    let opts = add.display_options.unwrap();
    assert!(!opts.display_global_coordinate_system);
    assert!(!opts.display_imu_coordinate_system);
    assert!(opts.display_actions);
}

#[test]
fn set_drone_state_keeps_blob_verbatim() {
    let msg = Inbound::parse(
        r#"{"channel":"setDroneState","data":{"id":"d1","data":{"x":1,"y":0,"z":0,"extra":[1,2]}}}"#,
    )
    .unwrap();
    assert_eq!(
        msg,
        Inbound::SetDroneState(SetDroneState {
            id: "d1".to_string(),
            data: json!({"x":1,"y":0,"z":0,"extra":[1,2]}),
        })
    );
}

#[test]
fn status_and_evaluation_stopped_decode() {
    let status = Inbound::parse(r#"{"channel":"status","data":{"progress":0.5,"time":12.5}}"#)
        .unwrap();
    assert_eq!(
        status,
        Inbound::Status(Status {
            progress: 0.5,
            finished: false,
            time: Some(12.5),
        })
    );
    let stopped = Inbound::parse(r#"{"channel":"evaluationStopped"}"#).unwrap();
    assert_eq!(stopped, Inbound::EvaluationStopped);
    assert_eq!(stopped.channel(), channels::EVALUATION_STOPPED);
}

#[test]
fn unknown_channel_is_not_an_error() {
    let msg = Inbound::parse(r#"{"channel":"telemetryV2","data":{"whatever":true}}"#).unwrap();
    assert_eq!(
        msg,
        Inbound::Unknown {
            channel: "telemetryV2".to_string()
        }
    );
}

#[test]
fn malformed_payload_names_the_channel() {
    let err = Inbound::parse(r#"{"channel":"removeDrone","data":{"nope":1}}"#).unwrap_err();
    match err {
        DecodeError::Payload { channel, .. } => assert_eq!(channel, "removeDrone"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        Inbound::parse("not json").unwrap_err(),
        DecodeError::Envelope(_)
    ));
}

#[test]
fn outbound_commands_use_envelope_shape() {
    let start: Value =
        serde_json::from_str(&Outbound::start_training(7, TrainingMode::PositionToPosition).to_text().unwrap())
            .unwrap();
    assert_eq!(
        start,
        json!({"channel":"startTraining","data":{"seed":7,"mode":"position-to-position"}})
    );

    let restart: Value =
        serde_json::from_str(&Outbound::restart_evaluation("actors/a.h5").to_text().unwrap()).unwrap();
    assert_eq!(
        restart,
        json!({"channel":"evaluateActor","data":{"actorPath":"actors/a.h5","action":"restart"}})
    );

    let stop: Value = serde_json::from_str(&Outbound::stop_evaluation().to_text().unwrap()).unwrap();
    assert_eq!(stop, json!({"channel":"evaluateActor","data":{"action":"stop"}}));
    assert_eq!(Outbound::stop_evaluation().channel(), channels::EVALUATE_ACTOR);
}

#[test]
fn server_config_without_obstacles_is_valid() {
    let cfg: ServerConfig =
        serde_json::from_str(r#"{"targetPosition":{"x":0.0,"y":0.4,"z":0.0}}"#).unwrap();
    assert_eq!(cfg.target_position, Vec3::new(0.0, 0.4, 0.0));
    assert!(cfg.obstacles.is_empty());
}

#[test]
fn server_config_skips_unknown_obstacle_kinds() {
    let cfg: ServerConfig = serde_json::from_value(json!({
        "targetPosition": {"x": 1.0, "y": 0.0, "z": 1.0},
        "obstacles": [
            {"type": "cylinder", "x": 0.5, "y": 0.5, "zMin": 0.0, "zMax": 2.0, "radius": 0.1},
            {"type": "box", "w": 1.0},
            {"type": "cylinder", "x": -0.5, "y": 0.0, "zMin": 0.2, "zMax": 1.0, "radius": 0.05}
        ]
    }))
    .unwrap();
    assert_eq!(cfg.obstacles.len(), 2);
    let Obstacle::Cylinder(first) = cfg.obstacles[0];
    assert_eq!(first.z_max, 2.0);
}

#[test]
fn fallback_config_is_origin_without_obstacles() {
    let cfg = ServerConfig::fallback();
    assert_eq!(cfg.target_position.to_array(), [0.0, 0.0, 0.0]);
    assert!(cfg.obstacles.is_empty());
}

#[test]
fn null_display_flag_turns_it_off() {
    let msg = Inbound::parse(
        r#"{"channel":"addDrone","data":{"id":"d1",
            "display_options":{"displayActions":null,"displayGlobalCoordinateSystem":null}}}"#,
    )
    .unwrap();
    let Inbound::AddDrone(add) = msg else {
        panic!("expected addDrone, got {msg:?}");
    };
    let opts = add.display_options.unwrap();
    assert!(!opts.display_actions);
    assert!(!opts.display_global_coordinate_system);
    assert!(opts.display_imu_coordinate_system);
}

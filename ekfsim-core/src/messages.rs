//! Builders for every message ekfsim sends to the vehicle

use crate::params::Param;
use mavlink::ardupilotmega::*;

pub const TARGET_SYSTEM: u8 = 1;
pub const TARGET_COMPONENT: u8 = 1;

/// EKF source set the vehicle should use while the secondary sensor is off.
/// Parameter files are expected to configure SRC1 for this case.
pub const SOURCE_SET_SECONDARY_OFF: u8 = 1;
/// EKF source set for when the secondary (position delta) sensor is on.
pub const SOURCE_SET_SECONDARY_ON: u8 = 2;

/// Confidence reported with every position delta, in percent
pub const POSITION_DELTA_CONFIDENCE: f32 = 99.8;

pub const MSG_ID_GPS_RAW_INT: u32 = 24;
pub const MSG_ID_LOCAL_POSITION_NED: u32 = 32;
pub const MSG_ID_GLOBAL_POSITION_INT: u32 = 33;
pub const MSG_ID_SIMSTATE: u32 = 164;

/// Telemetry requested from the vehicle at startup
pub const INTERESTING_MESSAGE_IDS: [u32; 4] = [
    MSG_ID_GLOBAL_POSITION_INT,
    MSG_ID_GPS_RAW_INT,
    MSG_ID_LOCAL_POSITION_NED,
    MSG_ID_SIMSTATE,
];

/// Rate requested for each of [`INTERESTING_MESSAGE_IDS`]
pub const INTERESTING_MESSAGE_HZ: f32 = 3.0;

/// We present ourselves as a camera so the autopilot does not treat us as a GCS
/// with control authority. `mavlink_version` is the XML format version, not
/// the wire protocol version.
pub fn heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_CAMERA,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_UNINIT,
        mavlink_version: 3,
    })
}

pub fn param_set(param: &Param) -> MavMessage {
    MavMessage::PARAM_SET(PARAM_SET_DATA {
        param_value: param.value,
        target_system: TARGET_SYSTEM,
        target_component: TARGET_COMPONENT,
        param_id: param.id_bytes(),
        param_type: param.mav_type(),
    })
}

fn command_long(command: MavCmd, param1: f32, param2: f32) -> MavMessage {
    MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
        param1,
        param2,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command,
        target_system: TARGET_SYSTEM,
        target_component: TARGET_COMPONENT,
        confirmation: 0,
    })
}

/// Interval in whole microseconds for a rate in Hz
pub fn interval_usec(hz: f32) -> f32 {
    (1.0e6 / hz).floor()
}

/// Ask the vehicle to stream `message_id` at `hz`.
pub fn request_message_interval(message_id: u32, hz: f32) -> MavMessage {
    command_long(
        MavCmd::MAV_CMD_SET_MESSAGE_INTERVAL,
        message_id as f32,
        interval_usec(hz),
    )
}

pub fn arm() -> MavMessage {
    command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, 1.0, 0.0)
}

pub fn set_ekf_source_set(source_set: u8) -> MavMessage {
    command_long(MavCmd::MAV_CMD_SET_EKF_SOURCE_SET, source_set as f32, 0.0)
}

pub fn vision_position_delta(
    time_delta_usec: u64,
    angle_delta: [f32; 3],
    position_delta: [f32; 3],
) -> MavMessage {
    MavMessage::VISION_POSITION_DELTA(VISION_POSITION_DELTA_DATA {
        time_usec: 0,
        time_delta_usec,
        angle_delta,
        position_delta,
        confidence: POSITION_DELTA_CONFIDENCE,
    })
}

/// Fields the estimator must not trust in our synthetic fixes
pub fn gps_ignore_flags() -> GpsInputIgnoreFlags {
    GpsInputIgnoreFlags::GPS_INPUT_IGNORE_FLAG_ALT
        | GpsInputIgnoreFlags::GPS_INPUT_IGNORE_FLAG_VEL_HORIZ
        | GpsInputIgnoreFlags::GPS_INPUT_IGNORE_FLAG_VEL_VERT
        | GpsInputIgnoreFlags::GPS_INPUT_IGNORE_FLAG_SPEED_ACCURACY
        | GpsInputIgnoreFlags::GPS_INPUT_IGNORE_FLAG_VERTICAL_ACCURACY
}

/// A horizontal-only fix. hdop must stay at or below 2.5 or the EKF refuses
/// to align on it.
pub fn gps_input(lat_e7: i32, lon_e7: i32) -> MavMessage {
    MavMessage::GPS_INPUT(GPS_INPUT_DATA {
        time_usec: 0,
        time_week_ms: 0,
        lat: lat_e7,
        lon: lon_e7,
        alt: 0.0,
        hdop: 1.0,
        vdop: 4.0,
        vn: 0.0,
        ve: 0.0,
        vd: 0.0,
        speed_accuracy: 0.0,
        horiz_accuracy: 0.0,
        vert_accuracy: 0.0,
        ignore_flags: gps_ignore_flags(),
        time_week: 0,
        gps_id: 0,
        fix_type: 3,
        satellites_visible: 10,
    })
}

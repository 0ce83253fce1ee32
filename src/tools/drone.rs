//! 无人机控制操作目录（静态编写）
//!
//! 模型只负责把自然语言指令映射到下列操作之一；无法完成或含糊的请求一律走 reject_request。

use serde_json::{json, Value};

use crate::core::PilotError;
use crate::tools::{OperationSchema, SchemaRegistry};

/// 兜底操作名：不支持或含糊的请求
pub const REJECT_REQUEST: &str = "reject_request";

pub const DRONE_SYSTEM_PROMPT: &str = "You are an intelligent AI that controls a drone. Given a command or request from the user,
call one of your functions to complete the request. If the request cannot be completed by your available functions, call the reject_request function.
If the request is ambiguous or unclear, reject the request.";

/// 演示用的指令
pub const SAMPLE_PROMPTS: [&str; 4] = [
    "Land the drone at the home base",
    "Take off the drone to 50 meters",
    "change speed to 15 kilometers per hour",
    "turn into an elephant!",
];

fn object(properties: Value, required: &[&str]) -> Value {
    if required.is_empty() {
        json!({"type": "object", "properties": properties})
    } else {
        json!({"type": "object", "properties": properties, "required": required})
    }
}

fn on_off(description: &str) -> Value {
    json!({"type": "string", "enum": ["on", "off"], "description": description})
}

/// 构建无人机操作目录；reject_request 恒为最后一项
pub fn drone_registry() -> Result<SchemaRegistry, PilotError> {
    let ops = [
        (
            "takeoff_drone",
            "Initiate the drone's takeoff sequence.",
            object(
                json!({"altitude": {
                    "type": "integer",
                    "description": "Specifies the altitude in meters to which the drone should ascend."
                }}),
                &["altitude"],
            ),
        ),
        (
            "land_drone",
            "Land the drone at its current location or a specified landing point.",
            object(
                json!({
                    "location": {
                        "type": "string",
                        "enum": ["current", "home_base", "custom"],
                        "description": "Specifies the landing location for the drone."
                    },
                    "coordinates": {
                        "type": "object",
                        "description": "GPS coordinates for custom landing location. Required if location is 'custom'."
                    }
                }),
                &["location"],
            ),
        ),
        (
            "control_drone_movement",
            "Direct the drone's movement in a specific direction.",
            object(
                json!({
                    "direction": {
                        "type": "string",
                        "enum": ["forward", "backward", "left", "right", "up", "down"],
                        "description": "Direction in which the drone should move."
                    },
                    "distance": {
                        "type": "integer",
                        "description": "Distance in meters the drone should travel in the specified direction."
                    }
                }),
                &["direction", "distance"],
            ),
        ),
        (
            "set_drone_speed",
            "Adjust the speed of the drone.",
            object(
                json!({"speed": {"type": "integer", "description": "Specifies the speed in km/h."}}),
                &["speed"],
            ),
        ),
        (
            "control_camera",
            "Control the drone's camera to capture images or videos.",
            object(
                json!({
                    "mode": {
                        "type": "string",
                        "enum": ["photo", "video", "panorama"],
                        "description": "Camera mode to capture content."
                    },
                    "duration": {
                        "type": "integer",
                        "description": "Duration in seconds for video capture. Required if mode is 'video'."
                    }
                }),
                &["mode"],
            ),
        ),
        (
            "control_gimbal",
            "Adjust the drone's gimbal for camera stabilization and direction.",
            object(
                json!({
                    "tilt": {"type": "integer", "description": "Tilt angle for the gimbal in degrees."},
                    "pan": {"type": "integer", "description": "Pan angle for the gimbal in degrees."}
                }),
                &["tilt", "pan"],
            ),
        ),
        (
            "set_drone_lighting",
            "Control the drone's lighting for visibility and signaling.",
            object(
                json!({"mode": {
                    "type": "string",
                    "enum": ["on", "off", "blink", "sos"],
                    "description": "Lighting mode for the drone."
                }}),
                &["mode"],
            ),
        ),
        (
            "return_to_home",
            "Command the drone to return to its home or launch location.",
            object(json!({}), &[]),
        ),
        (
            "set_battery_saver_mode",
            "Toggle battery saver mode.",
            object(json!({"status": on_off("Toggle battery saver mode.")}), &["status"]),
        ),
        (
            "set_obstacle_avoidance",
            "Configure obstacle avoidance settings.",
            object(json!({"mode": on_off("Toggle obstacle avoidance.")}), &["mode"]),
        ),
        (
            "set_follow_me_mode",
            "Enable or disable 'follow me' mode.",
            object(json!({"status": on_off("Toggle 'follow me' mode.")}), &["status"]),
        ),
        (
            "calibrate_sensors",
            "Initiate calibration sequence for drone's sensors.",
            object(json!({}), &[]),
        ),
        (
            "set_autopilot",
            "Enable or disable autopilot mode.",
            object(json!({"status": on_off("Toggle autopilot mode.")}), &["status"]),
        ),
        (
            "configure_led_display",
            "Configure the drone's LED display pattern and colors.",
            object(
                json!({
                    "pattern": {
                        "type": "string",
                        "enum": ["solid", "blink", "pulse", "rainbow"],
                        "description": "Pattern for the LED display."
                    },
                    "color": {
                        "type": "string",
                        "enum": ["red", "blue", "green", "yellow", "white"],
                        "description": "Color for the LED display. Not required if pattern is 'rainbow'."
                    }
                }),
                &["pattern"],
            ),
        ),
        (
            "set_home_location",
            "Set or change the home location for the drone.",
            object(
                json!({"coordinates": {
                    "type": "object",
                    "description": "GPS coordinates for the home location."
                }}),
                &["coordinates"],
            ),
        ),
        (
            REJECT_REQUEST,
            "Use this function if the request is not possible.",
            object(json!({}), &[]),
        ),
    ];

    let mut registry = SchemaRegistry::new();
    for (name, description, parameters) in ops {
        registry.register(OperationSchema::new(name, description, parameters)?)?;
    }
    Ok(registry)
}

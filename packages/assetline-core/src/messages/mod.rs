//! Wire-compatible message schemas for the asset RPC protocol.
//!
//! Every request and response payload is a JSON object flattened next to the
//! envelope's `kind` field. All structs use `#[serde(rename_all = "camelCase")]`
//! so field names match what existing requesters put on the bus.

pub mod alarm;
pub mod camera;

pub use alarm::{
    AllAlarmRequest, AllAlarmResponse, Alarm, AlarmInput, CreateAlarmRequest,
    CreateAlarmResponse, DeleteAlarmRequest, DeleteAlarmResponse, GetAlarmRequest,
    GetAlarmResponse, UpdateAlarmRequest, UpdateAlarmResponse,
};
pub use camera::{
    AllCameraRequest, AllCameraResponse, Camera, CameraInput, CreateCameraRequest,
    CreateCameraResponse, DeleteCameraRequest, DeleteCameraResponse, GetCameraRequest,
    GetCameraResponse, UpdateCameraRequest, UpdateCameraResponse,
};

/// Operation kinds understood by the asset service.
///
/// The set is closed: a dispatcher serving the asset service registers exactly
/// these tags, and a response always echoes the tag of its request.
pub mod kinds {
    pub const CREATE_ALARM: &str = "createAlarm";
    pub const ALL_ALARM: &str = "allAlarm";
    pub const GET_ALARM: &str = "getAlarm";
    pub const UPDATE_ALARM: &str = "updateAlarm";
    pub const DELETE_ALARM: &str = "deleteAlarm";

    pub const CREATE_CAMERA: &str = "createCamera";
    pub const ALL_CAMERA: &str = "allCamera";
    pub const GET_CAMERA: &str = "getCamera";
    pub const UPDATE_CAMERA: &str = "updateCamera";
    pub const DELETE_CAMERA: &str = "deleteCamera";

    /// Every kind, alarms first.
    pub const ALL: [&str; 10] = [
        CREATE_ALARM,
        ALL_ALARM,
        GET_ALARM,
        UPDATE_ALARM,
        DELETE_ALARM,
        CREATE_CAMERA,
        ALL_CAMERA,
        GET_CAMERA,
        UPDATE_CAMERA,
        DELETE_CAMERA,
    ];
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::kinds;

    #[test]
    fn kinds_are_unique() {
        let unique: HashSet<&str> = kinds::ALL.iter().copied().collect();
        assert_eq!(unique.len(), kinds::ALL.len());
    }
}

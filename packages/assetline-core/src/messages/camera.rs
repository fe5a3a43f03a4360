//! Camera payloads.

use serde::{Deserialize, Serialize};

/// A surveillance camera installed at a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub id: String,
    pub site_id: String,
    pub serial_no: String,
    /// Horizontal resolution in pixels.
    pub resolution: u32,
}

/// Mutable fields of a camera, used by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInput {
    pub site_id: String,
    pub serial_no: String,
    pub resolution: u32,
}

impl CameraInput {
    #[must_use]
    pub fn into_camera(self, id: String) -> Camera {
        Camera {
            id,
            site_id: self.site_id,
            serial_no: self.serial_no,
            resolution: self.resolution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCameraRequest {
    pub input: CameraInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCameraResponse {
    pub camera: Camera,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllCameraRequest {
    pub site_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllCameraResponse {
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCameraRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCameraResponse {
    pub camera: Camera,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCameraRequest {
    pub id: String,
    pub input: CameraInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCameraResponse {
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCameraRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCameraResponse {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn all_camera_response_wraps_list() {
        let resp = AllCameraResponse {
            cameras: vec![Camera {
                id: "c1".to_string(),
                site_id: "s1".to_string(),
                serial_no: "3001".to_string(),
                resolution: 1080,
            }],
        };

        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["cameras"][0]["siteId"], "s1");
        assert_eq!(value["cameras"][0]["resolution"], 1080);
    }

    #[test]
    fn create_request_rejects_missing_input() {
        let result = serde_json::from_value::<CreateCameraRequest>(json!({ "siteId": "s" }));
        assert!(result.is_err());
    }
}

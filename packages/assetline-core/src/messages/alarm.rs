//! Alarm payloads.

use serde::{Deserialize, Serialize};

/// A smoke/CO alarm installed at a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub site_id: String,
    pub serial_no: String,
    pub material: String,
}

/// Mutable fields of an alarm, used by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmInput {
    pub site_id: String,
    pub serial_no: String,
    pub material: String,
}

impl AlarmInput {
    /// Builds the stored alarm for a freshly assigned id.
    #[must_use]
    pub fn into_alarm(self, id: String) -> Alarm {
        Alarm {
            id,
            site_id: self.site_id,
            serial_no: self.serial_no,
            material: self.material,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlarmRequest {
    pub input: AlarmInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlarmResponse {
    pub alarm: Alarm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllAlarmRequest {
    pub site_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllAlarmResponse {
    pub alarms: Vec<Alarm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAlarmRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAlarmResponse {
    pub alarm: Alarm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlarmRequest {
    pub id: String,
    pub input: AlarmInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlarmResponse {
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAlarmRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAlarmResponse {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn alarm_uses_camel_case_fields() {
        let alarm = Alarm {
            id: "aaaa-aaaa".to_string(),
            site_id: "1111-1111".to_string(),
            serial_no: "1001".to_string(),
            material: "co".to_string(),
        };

        let value = serde_json::to_value(&alarm).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "aaaa-aaaa",
                "siteId": "1111-1111",
                "serialNo": "1001",
                "material": "co",
            })
        );
    }

    #[test]
    fn update_request_reads_nested_input() {
        let req: UpdateAlarmRequest = serde_json::from_value(json!({
            "id": "x",
            "input": { "siteId": "s", "serialNo": "1", "material": "smoke" },
        }))
        .unwrap();

        assert_eq!(req.id, "x");
        assert_eq!(req.input.material, "smoke");
    }

    #[test]
    fn into_alarm_keeps_input_fields() {
        let input = AlarmInput {
            site_id: "s".to_string(),
            serial_no: "7".to_string(),
            material: "co".to_string(),
        };
        let alarm = input.into_alarm("id-1".to_string());
        assert_eq!(alarm.id, "id-1");
        assert_eq!(alarm.serial_no, "7");
    }
}

//! In-memory asset store.

use assetline_core::messages::{Alarm, AlarmInput, Camera, CameraInput};
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::Context;
use uuid::Uuid;

use super::{AlarmService, CameraService, DomainError};

/// Alarms and cameras kept in concurrent maps, keyed by UUID v4 ids.
#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    alarms: DashMap<String, Alarm>,
    cameras: DashMap<String, Camera>,
}

impl InMemoryAssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn require_site(site_id: &str) -> Result<(), DomainError> {
    if site_id.is_empty() {
        return Err(DomainError::Invalid("siteId must not be empty".to_string()));
    }
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl AlarmService for InMemoryAssetStore {
    async fn create(&self, _cx: &Context, input: AlarmInput) -> Result<Alarm, DomainError> {
        require_site(&input.site_id)?;
        let alarm = input.into_alarm(new_id());
        self.alarms.insert(alarm.id.clone(), alarm.clone());
        Ok(alarm)
    }

    async fn all(&self, _cx: &Context, site_id: &str) -> Result<Vec<Alarm>, DomainError> {
        let mut alarms: Vec<Alarm> = self
            .alarms
            .iter()
            .filter(|entry| entry.site_id == site_id)
            .map(|entry| entry.value().clone())
            .collect();
        alarms.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(alarms)
    }

    async fn get(&self, _cx: &Context, id: &str) -> Result<Alarm, DomainError> {
        self.alarms
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DomainError::NotFound {
                entity: "alarm",
                id: id.to_string(),
            })
    }

    async fn update(
        &self,
        _cx: &Context,
        id: &str,
        input: AlarmInput,
    ) -> Result<bool, DomainError> {
        require_site(&input.site_id)?;
        match self.alarms.get_mut(id) {
            Some(mut entry) => {
                *entry = input.into_alarm(id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, _cx: &Context, id: &str) -> Result<bool, DomainError> {
        Ok(self.alarms.remove(id).is_some())
    }
}

#[async_trait]
impl CameraService for InMemoryAssetStore {
    async fn create(&self, _cx: &Context, input: CameraInput) -> Result<Camera, DomainError> {
        require_site(&input.site_id)?;
        let camera = input.into_camera(new_id());
        self.cameras.insert(camera.id.clone(), camera.clone());
        Ok(camera)
    }

    async fn all(&self, _cx: &Context, site_id: &str) -> Result<Vec<Camera>, DomainError> {
        let mut cameras: Vec<Camera> = self
            .cameras
            .iter()
            .filter(|entry| entry.site_id == site_id)
            .map(|entry| entry.value().clone())
            .collect();
        cameras.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cameras)
    }

    async fn get(&self, _cx: &Context, id: &str) -> Result<Camera, DomainError> {
        self.cameras
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DomainError::NotFound {
                entity: "camera",
                id: id.to_string(),
            })
    }

    async fn update(
        &self,
        _cx: &Context,
        id: &str,
        input: CameraInput,
    ) -> Result<bool, DomainError> {
        require_site(&input.site_id)?;
        match self.cameras.get_mut(id) {
            Some(mut entry) => {
                *entry = input.into_camera(id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, _cx: &Context, id: &str) -> Result<bool, DomainError> {
        Ok(self.cameras.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm_input(site: &str) -> AlarmInput {
        AlarmInput {
            site_id: site.to_string(),
            serial_no: "SN-1".to_string(),
            material: "steel".to_string(),
        }
    }

    fn camera_input(site: &str) -> CameraInput {
        CameraInput {
            site_id: site.to_string(),
            serial_no: "CAM-1".to_string(),
            resolution: 1080,
        }
    }

    #[tokio::test]
    async fn alarm_crud() {
        let store = InMemoryAssetStore::new();
        let cx = Context::new();

        let created = AlarmService::create(&store, &cx, alarm_input("s1"))
            .await
            .unwrap();
        assert_eq!(Uuid::parse_str(&created.id).unwrap().get_version_num(), 4);

        let fetched = AlarmService::get(&store, &cx, &created.id).await.unwrap();
        assert_eq!(fetched, created);

        let mut changed = alarm_input("s1");
        changed.material = "copper".to_string();
        assert!(AlarmService::update(&store, &cx, &created.id, changed)
            .await
            .unwrap());
        let fetched = AlarmService::get(&store, &cx, &created.id).await.unwrap();
        assert_eq!(fetched.material, "copper");

        assert!(AlarmService::delete(&store, &cx, &created.id).await.unwrap());
        assert!(!AlarmService::delete(&store, &cx, &created.id).await.unwrap());
    }

    #[tokio::test]
    async fn missing_alarm_is_not_found() {
        let store = InMemoryAssetStore::new();
        let err = AlarmService::get(&store, &Context::new(), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "alarm not found: nope");
    }

    #[tokio::test]
    async fn update_unknown_alarm_reports_false() {
        let store = InMemoryAssetStore::new();
        let updated = AlarmService::update(&store, &Context::new(), "nope", alarm_input("s1"))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn all_filters_by_site() {
        let store = InMemoryAssetStore::new();
        let cx = Context::new();
        CameraService::create(&store, &cx, camera_input("s1")).await.unwrap();
        CameraService::create(&store, &cx, camera_input("s1")).await.unwrap();
        CameraService::create(&store, &cx, camera_input("s2")).await.unwrap();

        assert_eq!(CameraService::all(&store, &cx, "s1").await.unwrap().len(), 2);
        assert_eq!(CameraService::all(&store, &cx, "s2").await.unwrap().len(), 1);
        assert!(CameraService::all(&store, &cx, "s3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_site_is_invalid() {
        let store = InMemoryAssetStore::new();
        let err = CameraService::create(&store, &Context::new(), camera_input(""))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Invalid(_)));
    }
}

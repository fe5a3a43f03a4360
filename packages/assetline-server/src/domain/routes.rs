//! Dispatch table for the asset service's ten operation kinds.

use std::sync::Arc;

use assetline_core::kinds;
use assetline_core::messages::{
    AllAlarmRequest, AllAlarmResponse, AllCameraRequest, AllCameraResponse, CreateAlarmRequest,
    CreateAlarmResponse, CreateCameraRequest, CreateCameraResponse, DeleteAlarmRequest,
    DeleteAlarmResponse, DeleteCameraRequest, DeleteCameraResponse, GetAlarmRequest,
    GetAlarmResponse, GetCameraRequest, GetCameraResponse, UpdateAlarmRequest,
    UpdateAlarmResponse, UpdateCameraRequest, UpdateCameraResponse,
};
use opentelemetry::Context;

use super::{AlarmService, CameraService, DomainError};
use crate::rpc::{DispatchTable, DispatchTableBuilder};

/// Builds the dispatch table routing every asset kind to `alarms` or
/// `cameras`.
#[must_use]
pub fn asset_routes(
    alarms: Arc<dyn AlarmService>,
    cameras: Arc<dyn CameraService>,
) -> DispatchTable {
    let builder = alarm_routes(DispatchTable::builder(), &alarms);
    camera_routes(builder, &cameras).build()
}

fn alarm_routes(
    builder: DispatchTableBuilder,
    svc: &Arc<dyn AlarmService>,
) -> DispatchTableBuilder {
    let (create, all, get, update, delete) = (
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
    );

    builder
        .route(kinds::CREATE_ALARM, move |cx: Context, req: CreateAlarmRequest| {
            let svc = Arc::clone(&create);
            async move {
                let alarm = svc.create(&cx, req.input).await?;
                Ok::<_, DomainError>(CreateAlarmResponse { alarm })
            }
        })
        .route(kinds::ALL_ALARM, move |cx: Context, req: AllAlarmRequest| {
            let svc = Arc::clone(&all);
            async move {
                let alarms = svc.all(&cx, &req.site_id).await?;
                Ok::<_, DomainError>(AllAlarmResponse { alarms })
            }
        })
        .route(kinds::GET_ALARM, move |cx: Context, req: GetAlarmRequest| {
            let svc = Arc::clone(&get);
            async move {
                let alarm = svc.get(&cx, &req.id).await?;
                Ok::<_, DomainError>(GetAlarmResponse { alarm })
            }
        })
        .route(kinds::UPDATE_ALARM, move |cx: Context, req: UpdateAlarmRequest| {
            let svc = Arc::clone(&update);
            async move {
                let updated = svc.update(&cx, &req.id, req.input).await?;
                Ok::<_, DomainError>(UpdateAlarmResponse { updated })
            }
        })
        .route(kinds::DELETE_ALARM, move |cx: Context, req: DeleteAlarmRequest| {
            let svc = Arc::clone(&delete);
            async move {
                let deleted = svc.delete(&cx, &req.id).await?;
                Ok::<_, DomainError>(DeleteAlarmResponse { deleted })
            }
        })
}

fn camera_routes(
    builder: DispatchTableBuilder,
    svc: &Arc<dyn CameraService>,
) -> DispatchTableBuilder {
    let (create, all, get, update, delete) = (
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
        Arc::clone(svc),
    );

    builder
        .route(kinds::CREATE_CAMERA, move |cx: Context, req: CreateCameraRequest| {
            let svc = Arc::clone(&create);
            async move {
                let camera = svc.create(&cx, req.input).await?;
                Ok::<_, DomainError>(CreateCameraResponse { camera })
            }
        })
        .route(kinds::ALL_CAMERA, move |cx: Context, req: AllCameraRequest| {
            let svc = Arc::clone(&all);
            async move {
                let cameras = svc.all(&cx, &req.site_id).await?;
                Ok::<_, DomainError>(AllCameraResponse { cameras })
            }
        })
        .route(kinds::GET_CAMERA, move |cx: Context, req: GetCameraRequest| {
            let svc = Arc::clone(&get);
            async move {
                let camera = svc.get(&cx, &req.id).await?;
                Ok::<_, DomainError>(GetCameraResponse { camera })
            }
        })
        .route(kinds::UPDATE_CAMERA, move |cx: Context, req: UpdateCameraRequest| {
            let svc = Arc::clone(&update);
            async move {
                let updated = svc.update(&cx, &req.id, req.input).await?;
                Ok::<_, DomainError>(UpdateCameraResponse { updated })
            }
        })
        .route(kinds::DELETE_CAMERA, move |cx: Context, req: DeleteCameraRequest| {
            let svc = Arc::clone(&delete);
            async move {
                let deleted = svc.delete(&cx, &req.id).await?;
                Ok::<_, DomainError>(DeleteCameraResponse { deleted })
            }
        })
}

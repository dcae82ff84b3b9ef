//! WebSocket endpoint: authenticates the connection, registers it with the
//! presence registry and relays client events.
//!
//! The socket is split into a send half (drains the per-connection channel the
//! registry writes into) and a receive half (parses client frames). Location
//! relays are best-effort and lossy; only the REST side effects are durable.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::socket::events::{ClientEvent, ServerEvent};
use crate::socket::registry::{booking_room, DRIVERS_ROOM, RIDERS_ROOM};
use crate::utils::geo::valid_coordinates;
use crate::utils::jwt::verify_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// `GET /ws?token=...`. The token is verified before the upgrade completes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let claims = verify_token(&query.token, &state.config.jwt_secret)?;
    let user_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.sockets.register(conn_id, user_id, tx).await;
    tracing::info!(%user_id, %conn_id, "socket connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch(&recv_state, conn_id, user_id, event).await,
                    Err(e) => {
                        tracing::warn!(%user_id, error = %e, "malformed client event dropped");
                    }
                },
                Message::Close(_) => break,
                // pings are answered by axum; binary frames are not part of the contract
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.sockets.remove(conn_id).await;
    tracing::info!(%user_id, %conn_id, "socket disconnected");
}

async fn dispatch(state: &AppState, conn_id: Uuid, user_id: Uuid, event: ClientEvent) {
    let sockets = &state.sockets;

    match event {
        ClientEvent::DriverJoin => {
            sockets.join_room(conn_id, DRIVERS_ROOM).await;
            tracing::debug!(%user_id, "driver joined drivers room");
        }
        ClientEvent::RiderJoin => {
            sockets.join_room(conn_id, RIDERS_ROOM).await;
            tracing::debug!(%user_id, "rider joined riders room");
        }
        ClientEvent::JoinBooking { booking_id } => {
            sockets.join_room(conn_id, &booking_room(booking_id)).await;
        }
        ClientEvent::LeaveBooking { booking_id } => {
            sockets.leave_room(conn_id, &booking_room(booking_id)).await;
        }
        ClientEvent::DriverLocation { lng, lat, booking_id } => {
            if !valid_coordinates(lng, lat) {
                return;
            }
            let event = ServerEvent::DriverLocation { driver_id: user_id, lng, lat };
            match booking_id {
                Some(id) => sockets.emit_to_room(&booking_room(id), &event).await,
                None => sockets.emit_to_room(RIDERS_ROOM, &event).await,
            }
        }
        ClientEvent::RiderLocation { lng, lat, booking_id } => {
            if !valid_coordinates(lng, lat) {
                return;
            }
            let event = ServerEvent::RiderLocation { rider_id: user_id, lng, lat };
            match booking_id {
                Some(id) => sockets.emit_to_room(&booking_room(id), &event).await,
                None => sockets.emit_to_room(DRIVERS_ROOM, &event).await,
            }
        }
        // Cash-path clients may broadcast their own request to online drivers.
        ClientEvent::RideRequest(payload) => {
            tracing::debug!(booking_id = %payload.booking_id, "client ride request broadcast");
            sockets
                .emit_to_room(DRIVERS_ROOM, &ServerEvent::RideRequest(payload))
                .await;
        }
        // Socket-level acceptance relay. The authoritative assignment happens
        // through the REST accept endpoint; this only mirrors it to the UIs.
        ClientEvent::RideAccept { rider_id, driver_id, booking_id, driver_info } => {
            let room = booking_room(booking_id);
            sockets.join_room(conn_id, &room).await;
            sockets
                .emit_to_user(
                    rider_id,
                    &ServerEvent::RideAccepted {
                        booking_id,
                        driver_id,
                        driver_info: driver_info.clone(),
                        fare: None,
                        payment_method: None,
                        distance_km: None,
                        estimated_time_min: None,
                        otp: None,
                    },
                )
                .await;
            sockets
                .emit_to_room(
                    &room,
                    &ServerEvent::RideConfirmed {
                        booking_id,
                        driver_id,
                        fare: None,
                        payment_method: None,
                    },
                )
                .await;
        }
    }
}

//! Payment endpoints: opaque pass-through to the gateway, plus the callback
//! that releases a `pending_payment` booking into matching.

use axum::{extract::State, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entities::{booking, payment};
use crate::error::{AppError, AppResult};
use crate::lifecycle;
use crate::services::payments;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub booking_id: Uuid,
    /// Rupees; converted to paise for the gateway.
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: payments::ProviderOrder,
    pub payment: payment::Model,
}

/// Create a payable order with the gateway and record it locally.
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    if payload.amount <= 0.0 {
        return Err(AppError::BadRequest("Missing fields".to_string()));
    }

    let booking = booking::Entity::find_by_id(payload.booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let amount_paise = (payload.amount * 100.0).round() as i64;
    let receipt = format!("rcpt_{}", booking.id);
    let order = payments::create_order(&state.config, amount_paise, &receipt).await?;

    let record = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        provider_order_id: Set(order.id.clone()),
        provider_payment_id: Set(None),
        amount: Set(order.amount),
        currency: Set(order.currency.clone()),
        status: Set(payment::PaymentStatus::Created),
        created_at: Set(Utc::now().fixed_offset()),
    };
    let record = record.insert(&state.db).await?;

    Ok(Json(CreateOrderResponse { order, payment: record }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// Gateway callback proof. A valid signature marks the payment paid and moves
/// the booking out of the payment gate; an invalid one changes nothing.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<Value>> {
    let ok = payments::verify_signature(
        &state.config,
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
    )?;
    if !ok {
        return Err(AppError::BadRequest("Invalid signature".to_string()));
    }

    let record = payment::Entity::find()
        .filter(payment::Column::ProviderOrderId.eq(&payload.razorpay_order_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let booking_id = record.booking_id;
    let payment_id = record.id;

    let mut active: payment::ActiveModel = record.into();
    active.provider_payment_id = Set(Some(payload.razorpay_payment_id.clone()));
    active.status = Set(payment::PaymentStatus::Paid);
    let record = active.update(&state.db).await?;

    lifecycle::confirm_payment(&state, booking_id, payment_id).await?;

    Ok(Json(json!({ "ok": true, "payment": record })))
}

use crate::engine::AnswerOutcome;
use crate::error::{AppError, ErrorDetail};
use crate::gateway::display_name_or_fallback;
use crate::models::{Category, ChannelId, InboundMessage, UserId};
use crate::player_stats::PlayerLookupError;
use crate::reports::{leaderboard_report, CategoryStatsReport, LeaderboardReport, LeaderboardScope, PlayerReport, StatsReport};
use crate::state::AppState;
use crate::ws_protocol::{ChatMessagePayload, WsEnvelope, INBOUND_MESSAGE_EVENT};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn validation_error(errors: &ValidationErrors, req_id: String) -> AppError {
    let mut details: Vec<ErrorDetail> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ErrorDetail {
                field: field.to_string(),
                issue: e.code.to_string(),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "invalid request", req_id).with_details(details)
}

fn parse_category(raw: &str, req_id: &str) -> Result<Category, AppError> {
    raw.parse().map_err(|err: crate::models::UnknownCategory| {
        AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string(), req_id)
    })
}

async fn dispatch_chat_message(state: &AppState, channel: ChannelId, payload: ChatMessagePayload) -> Option<AnswerOutcome> {
    let author = UserId::new(payload.author_id.trim());
    if let Some(name) = payload.author_name.as_deref() {
        state.gateway.remember_name(&author, name);
    }
    let message = InboundMessage::new(channel, author, payload.text);
    state.engine.handle_message(&message).await
}

#[derive(Debug, Serialize)]
pub struct MessageOut {
    pub outcome: Option<AnswerOutcome>,
}

pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    Json(payload): Json<ChatMessagePayload>,
) -> Result<Json<MessageOut>, AppError> {
    let req_id = request_id_from_headers(&headers);
    payload.validate().map_err(|e| validation_error(&e, req_id))?;
    let outcome = dispatch_chat_message(&state, ChannelId::new(channel_id), payload).await;
    Ok(Json(MessageOut { outcome }))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub category: Option<String>,
}

pub async fn user_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsReport>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let user = UserId::new(user_id);
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| parse_category(c, &req_id))
        .transpose()?;

    let rows = match category {
        Some(category) => state
            .stats
            .stats(&user, category)
            .await
            .map_err(|e| AppError::internal(e, req_id.clone()))?
            .into_iter()
            .collect::<Vec<_>>(),
        None => state
            .stats
            .all_stats(&user)
            .await
            .map_err(|e| AppError::internal(e, req_id.clone()))?,
    };
    if rows.is_empty() {
        let message = match category {
            Some(category) => format!("no {} quiz stats for this user yet", category.display_name()),
            None => "no quiz stats for this user yet".to_string(),
        };
        return Err(AppError::new(StatusCode::NOT_FOUND, "NO_STATS", message, req_id));
    }

    let mut categories = Vec::with_capacity(rows.len());
    for row in &rows {
        let rank = state
            .stats
            .rank(&user, row.category)
            .await
            .map_err(|e| AppError::internal(e, req_id.clone()))?;
        categories.push(CategoryStatsReport::new(row, rank));
    }
    let overall_rank = if categories.len() > 1 {
        state
            .stats
            .overall_rank(&user)
            .await
            .map_err(|e| AppError::internal(e, req_id.clone()))?
    } else {
        None
    };

    let display_name = display_name_or_fallback(state.gateway.as_ref(), &user).await;
    Ok(Json(StatsReport::new(user, display_name, categories, overall_rank)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
    #[validate(range(min = 5, max = 25))]
    pub limit: Option<u32>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardReport>, AppError> {
    let req_id = request_id_from_headers(&headers);
    query.validate().map_err(|e| validation_error(&e, req_id.clone()))?;
    let scope = match query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(raw) => raw.parse::<LeaderboardScope>().map_err(|err| {
            AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string(), req_id.clone())
        })?,
        None => LeaderboardScope::Overall,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);

    let entries = match scope {
        LeaderboardScope::Overall => state.stats.overall_leaderboard(limit).await,
        LeaderboardScope::Category(category) => state.stats.leaderboard(category, limit).await,
    }
    .map_err(|e| AppError::internal(e, req_id.clone()))?;

    Ok(Json(leaderboard_report(scope, entries, state.gateway.as_ref()).await))
}

pub async fn player_lookup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<PlayerReport>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "username is required", req_id));
    }
    match state.players.lookup(&username).await {
        Ok(rating) => {
            info!(username = %username, elo = rating.elo, "player lookup succeeded");
            Ok(Json(PlayerReport::new(&username, rating)))
        }
        Err(PlayerLookupError::NotFound(_)) => Err(AppError::new(
            StatusCode::NOT_FOUND,
            "PLAYER_NOT_FOUND",
            format!("player {} not found", username),
            req_id,
        )),
        Err(err) => {
            warn!(username = %username, "player lookup failed: {}", err);
            Err(AppError::new(
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "player stats service is unavailable",
                req_id,
            ))
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
) -> Result<Response, AppError> {
    let channel = ChannelId::new(channel_id);
    if !state.engine.is_quiz_channel(&channel) {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            "CHANNEL_NOT_FOUND",
            format!("channel {} is not a quiz channel", channel),
            request_id_from_headers(&headers),
        ));
    }
    // Subscribe before the handshake completes so no presentation is missed.
    let receiver = state.gateway.subscribe(&channel);
    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, channel, receiver)))
}

async fn ws_session(
    stream: WebSocket,
    state: AppState,
    channel: ChannelId,
    mut receiver: broadcast::Receiver<WsEnvelope>,
) {
    let (mut sender_ws, mut receiver_ws) = stream.split();
    debug!(channel = %channel, "websocket subscriber joined");

    let send_task = tokio::spawn(async move {
        while let Ok(msg) = receiver.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender_ws.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(Ok(message)) = receiver_ws.next().await {
        let Message::Text(txt) = message else { continue };
        let Ok(env) = serde_json::from_str::<WsEnvelope>(&txt) else { continue };
        if env.event != INBOUND_MESSAGE_EVENT {
            continue;
        }
        let payload: ChatMessagePayload = match serde_json::from_value(env.payload) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(channel = %channel, "ignoring malformed chat message: {}", err);
                continue;
            }
        };
        if payload.validate().is_err() {
            continue;
        }
        dispatch_chat_message(&state, channel.clone(), payload).await;
    }

    send_task.abort();
    debug!(channel = %channel, "websocket subscriber left");
}

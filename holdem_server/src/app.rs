use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures_util::{SinkExt, stream::StreamExt};
use holdem_core::{
    ClientMessage, Game, GameError, PlayerId, ServerMessage, Table, TurnCoordinator, TurnResponse,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::lobby::{Lobby, LobbyError};

// 服务器全局状态
// 重要‼️：不要在持有 lobby 锁时 await 任何发送，广播一律放在锁外
pub struct AppState {
    pub coordinator: Arc<TurnCoordinator>,
    pub lobby: Mutex<Lobby>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<SharedState, GameError> {
        let coordinator = Arc::new(TurnCoordinator::new(config.turn_timeout));
        let game = Game::builder()
            .table(Table::new())
            .handler(coordinator.clone())
            .settings(config.game.clone())
            .build()?;
        Ok(Arc::new(AppState {
            coordinator,
            lobby: Mutex::new(Lobby::new(game, config.starting_balance)),
        }))
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ws/{client_id}", get(websocket_handler))
        .route("/player-ready/{client_id}", post(player_ready_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct JoinQuery {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadyBody {
    is_player_ready: bool,
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<PlayerId>,
    Query(query): Query<JoinQuery>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let name = query.name.unwrap_or_else(|| format!("玩家{client_id}"));
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id, name))
}

async fn player_ready_handler(
    Path(client_id): Path<PlayerId>,
    State(state): State<SharedState>,
    Json(body): Json<ReadyBody>,
) -> impl IntoResponse {
    match set_ready(&state, client_id, body.is_player_ready).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "player_id": client_id, "is_ready": body.is_player_ready })),
        ),
        Err(e) => {
            let status = match e {
                LobbyError::UnknownPlayer(_) => StatusCode::NOT_FOUND,
                LobbyError::HandInProgress => StatusCode::CONFLICT,
                LobbyError::Seat(_) => StatusCode::BAD_REQUEST,
            };
            (status, Json(json!({ "error": e.to_string() })))
        }
    }
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState, player_id: PlayerId, name: String) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化 {} 消息失败: {}", msg.phase().as_str(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    if let Err(e) = player_joined(&state, player_id, &name, tx.clone()).await {
        warn!("玩家 {} 入座失败: {}", player_id, e);
        let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
        return;
    }

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_text(&state, player_id, text.as_str(), &tx).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 客户端断开连接，执行清理工作
    player_left(&state, player_id, &name).await;
    info!("玩家 {} 的连接关闭", player_id);
}

/// 解析一条文本消息。无法解析时，该玩家待回应的行动按弃牌处理，牌局继续
async fn handle_text(state: &SharedState, player_id: PlayerId, text: &str, tx: &mpsc::Sender<ServerMessage>) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => handle_client_message(state, player_id, client_msg, tx).await,
        Err(e) => {
            warn!("解析玩家 {} 的消息失败: {}", player_id, e);
            if state.coordinator.process_turn_response(player_id, TurnResponse::fold()) {
                warn!("玩家 {} 的回应无法解析，按弃牌处理", player_id);
            }
            let _ = tx.send(ServerMessage::Error { message: format!("无法解析的消息: {e}") }).await;
        }
    }
}

async fn handle_client_message(
    state: &SharedState,
    player_id: PlayerId,
    msg: ClientMessage,
    tx: &mpsc::Sender<ServerMessage>,
) {
    let rejected = match msg {
        ClientMessage::TurnResponse(response) => {
            if state.coordinator.process_turn_response(player_id, response) {
                None
            } else {
                debug!(player = player_id, ?response, "没有待回应的行动请求");
                Some("现在不是你的回合".to_string())
            }
        }
        ClientMessage::Ready { is_ready } => set_ready(state, player_id, is_ready).await.err().map(|e| e.to_string()),
    };
    if let Some(message) = rejected {
        let _ = tx.send(ServerMessage::Error { message }).await;
    }
}

/// 新连接入座：先给新玩家补发已在座的玩家，再向所有人广播新玩家
pub async fn player_joined(
    state: &SharedState,
    player_id: PlayerId,
    name: &str,
    sender: mpsc::Sender<ServerMessage>,
) -> Result<(), LobbyError> {
    let (player, others) = {
        let mut lobby = state.lobby.lock().await;
        let player = lobby.join(player_id, name)?;
        let others: Vec<_> = lobby.seated().into_iter().filter(|p| p.id != player_id).collect();
        (player, others)
    };

    state.coordinator.connect(player_id, sender);
    for other in others {
        state
            .coordinator
            .send_personal(player_id, ServerMessage::NewPlayer { player: other })
            .await;
    }
    let name = player.name.clone();
    state.coordinator.broadcast(ServerMessage::NewPlayer { player }).await;
    state.coordinator.log(format!("{name} 加入了牌桌")).await;
    info!(player = player_id, "玩家 {} 入座", name);
    Ok(())
}

/// 断开连接：待回应的行动按弃牌处理，牌局进行中时离座推迟到本局结束
pub async fn player_left(state: &SharedState, player_id: PlayerId, name: &str) {
    state.coordinator.disconnect(player_id);
    let deferred = state.lobby.lock().await.leave(player_id);
    if deferred {
        debug!(player = player_id, "牌局进行中，离座推迟到本局结束");
    }

    state.coordinator.broadcast(ServerMessage::PlayerLeft { player_id }).await;
    state.coordinator.log(format!("{name} 离开了牌桌")).await;
    // 剩下的人可能都已准备好了
    try_start_hand(state).await;
}

pub async fn set_ready(state: &SharedState, player_id: PlayerId, is_ready: bool) -> Result<(), LobbyError> {
    state.lobby.lock().await.set_ready(player_id, is_ready)?;

    state
        .coordinator
        .broadcast(ServerMessage::IsReady { player_id, is_ready })
        .await;
    let status = if is_ready { "已准备 ✅" } else { "未准备 ❌" };
    state.coordinator.log(format!("玩家 {player_id} {status}")).await;
    info!(player = player_id, is_ready, "准备状态变更");

    try_start_hand(state).await;
    Ok(())
}

/// 所有人都准备好时，把牌局交给一个新任务去打
async fn try_start_hand(state: &SharedState) {
    let Some(game) = state.lobby.lock().await.take_ready_game() else {
        return;
    };
    info!(players = game.table().players().len(), "所有玩家已准备，开始新一局");
    tokio::spawn(run_hand(state.clone(), game));
}

async fn run_hand(state: SharedState, mut game: Game) {
    let result = game.play_hand().await;
    state.lobby.lock().await.restore(game);

    match result {
        Ok(summary) => info!(
            hand_id = %summary.hand_id,
            pot = summary.pot,
            winners = summary.winners.len(),
            "牌局结束"
        ),
        Err(e) => {
            error!("牌局异常中止: {}", e);
            state
                .coordinator
                .broadcast(ServerMessage::Error { message: e.to_string() })
                .await;
        }
    }
}

// --- 单元测试 ---

use crate::message::{ServerMessage, TurnRequest, TurnResponse};
use crate::table::{Player, PlayerId};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::Shared;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// 牌局与外界交互的唯一通道
#[async_trait]
pub trait GameHandler: Send + Sync {
    /// 发给所有人
    async fn broadcast(&self, message: ServerMessage);
    /// 只发给一个人
    async fn send_personal(&self, player_id: PlayerId, message: ServerMessage);
    /// 请求玩家做出决定并等待回应。无法获得回应时应返回弃牌。
    async fn turn(&self, player: &Player, request: TurnRequest) -> TurnResponse;
}

/// 一个玩家尚未完成的决定请求
struct TurnSlot {
    ticket: u64,
    resolver: Option<oneshot::Sender<TurnResponse>>,
    response: Shared<oneshot::Receiver<TurnResponse>>,
}

impl TurnSlot {
    fn new(ticket: u64) -> Self {
        let (tx, rx) = oneshot::channel();
        TurnSlot { ticket, resolver: Some(tx), response: rx.shared() }
    }

    fn is_resolved(&self) -> bool {
        self.resolver.is_none()
    }
}

/// 管理所有连接，以及每个玩家至多一个的待回应请求。
///
/// 牌局任务在 [`TurnCoordinator::request_turn`] 处挂起；连接任务调用
/// [`TurnCoordinator::process_turn_response`] 或 [`TurnCoordinator::disconnect`] 将其唤醒。
pub struct TurnCoordinator {
    connections: DashMap<PlayerId, mpsc::Sender<ServerMessage>>,
    slots: DashMap<PlayerId, TurnSlot>,
    next_ticket: AtomicU64,
    turn_timeout: Option<Duration>,
}

impl Default for TurnCoordinator {
    fn default() -> Self {
        TurnCoordinator::new(None)
    }
}

impl TurnCoordinator {
    /// `turn_timeout` 为 None 时无限等待
    pub fn new(turn_timeout: Option<Duration>) -> Self {
        TurnCoordinator {
            connections: DashMap::new(),
            slots: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            turn_timeout,
        }
    }

    pub fn connect(&self, player_id: PlayerId, sender: mpsc::Sender<ServerMessage>) {
        if self.connections.insert(player_id, sender).is_some() {
            warn!("玩家 {} 的旧连接被替换", player_id);
        }
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.connections.contains_key(&player_id)
    }

    pub fn connected_ids(&self) -> Vec<PlayerId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// 断开连接：待回应的请求以弃牌结束，牌局不会因此卡住
    pub fn disconnect(&self, player_id: PlayerId) {
        self.resolve(player_id, TurnResponse::fold());
        self.connections.remove(&player_id);
        // 移除连接之前刚刚创建的请求
        self.resolve(player_id, TurnResponse::fold());
        debug!("玩家 {} 的连接已移除", player_id);
    }

    pub async fn send_personal(&self, player_id: PlayerId, message: ServerMessage) {
        // 先克隆发送端，不在 await 期间持有 DashMap 的引用
        let sender = match self.connections.get(&player_id) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!("玩家 {} 不在线，丢弃 {} 消息", player_id, message.phase().as_str());
                return;
            }
        };
        if sender.send(message).await.is_err() {
            warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
        }
    }

    pub async fn broadcast(&self, message: ServerMessage) {
        let targets: Vec<_> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (player_id, sender) in targets {
            if sender.send(message.clone()).await.is_err() {
                warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
            }
        }
    }

    pub async fn log(&self, text: impl Into<String>) {
        self.broadcast(ServerMessage::Log(text.into())).await;
    }

    /// 向玩家发送 TURN_REQUEST 并等待回应
    ///
    /// 玩家不在线时立即返回弃牌且不发送任何消息。同一玩家已有未完成的请求时复用它。
    pub async fn request_turn(&self, player_id: PlayerId, request: TurnRequest) -> TurnResponse {
        if !self.is_connected(player_id) {
            debug!("玩家 {} 不在线，自动弃牌", player_id);
            return TurnResponse::fold();
        }

        // 先登记请求再发送，回应不会早于登记到达
        let (ticket, response) = {
            let mut slot = self
                .slots
                .entry(player_id)
                .or_insert_with(|| TurnSlot::new(self.ticket()));
            if slot.is_resolved() {
                *slot = TurnSlot::new(self.ticket());
            }
            (slot.ticket, slot.response.clone())
        };

        self.send_personal(player_id, ServerMessage::TurnRequest(request)).await;
        if !self.is_connected(player_id) {
            self.resolve(player_id, TurnResponse::fold());
        }

        let outcome = match self.turn_timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("玩家 {} 超过 {:?} 未行动，自动弃牌", player_id, limit);
                    self.resolve(player_id, TurnResponse::fold());
                    Ok(TurnResponse::fold())
                }
            },
            None => response.await,
        };

        self.slots.remove_if(&player_id, |_, slot| slot.ticket == ticket);
        outcome.unwrap_or_else(|_| TurnResponse::fold())
    }

    /// 处理玩家的回应。没有待回应的请求时返回 false。
    pub fn process_turn_response(&self, player_id: PlayerId, response: TurnResponse) -> bool {
        let accepted = self.resolve(player_id, response);
        if !accepted {
            debug!("玩家 {} 的回应没有对应的请求，已忽略", player_id);
        }
        accepted
    }

    fn resolve(&self, player_id: PlayerId, response: TurnResponse) -> bool {
        let Some(mut slot) = self.slots.get_mut(&player_id) else {
            return false;
        };
        match slot.resolver.take() {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl GameHandler for TurnCoordinator {
    async fn broadcast(&self, message: ServerMessage) {
        TurnCoordinator::broadcast(self, message).await;
    }

    async fn send_personal(&self, player_id: PlayerId, message: ServerMessage) {
        TurnCoordinator::send_personal(self, player_id, message).await;
    }

    async fn turn(&self, player: &Player, request: TurnRequest) -> TurnResponse {
        self.request_turn(player.id, request).await
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PlayerAction;
    use std::sync::Arc;

    fn request() -> TurnRequest {
        TurnRequest {
            player_bet: 0,
            prev_bet: 10,
            prev_raise: 10,
            options: vec![PlayerAction::Call, PlayerAction::Fold, PlayerAction::Raise],
        }
    }

    fn raise(amount: i64) -> TurnResponse {
        TurnResponse { action: PlayerAction::Raise, amount }
    }

    #[tokio::test]
    async fn test_unconnected_player_folds_immediately() {
        let coordinator = TurnCoordinator::default();
        let (tx, mut rx) = mpsc::channel(32);
        coordinator.connect(2, tx);

        assert_eq!(coordinator.request_turn(1, request()).await, TurnResponse::fold());
        // 其他人也没有收到任何消息
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_response_resolves_pending_turn() {
        let coordinator = Arc::new(TurnCoordinator::default());
        let (tx, mut rx) = mpsc::channel(32);
        coordinator.connect(1, tx);

        let waiting = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request_turn(1, request()).await }
        });

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent, ServerMessage::TurnRequest(request()));

        assert!(coordinator.process_turn_response(1, raise(20)));
        assert_eq!(waiting.await.unwrap(), raise(20));
        // 请求已完成，再次回应会被忽略
        assert!(!coordinator.process_turn_response(1, raise(30)));
    }

    #[tokio::test]
    async fn test_disconnect_resolves_pending_turn_as_fold() {
        let coordinator = Arc::new(TurnCoordinator::default());
        let (tx, mut rx) = mpsc::channel(32);
        coordinator.connect(1, tx);

        let waiting = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request_turn(1, request()).await }
        });
        rx.recv().await.unwrap();

        coordinator.disconnect(1);
        assert_eq!(waiting.await.unwrap(), TurnResponse::fold());
        assert!(!coordinator.is_connected(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_as_fold() {
        let coordinator = TurnCoordinator::new(Some(Duration::from_secs(30)));
        let (tx, mut rx) = mpsc::channel(32);
        coordinator.connect(1, tx);

        let response = coordinator.request_turn(1, request()).await;
        assert_eq!(response, TurnResponse::fold());
        assert!(matches!(rx.recv().await, Some(ServerMessage::TurnRequest(_))));
        // 超时后请求被清理
        assert!(!coordinator.process_turn_response(1, raise(10)));
    }

    #[tokio::test]
    async fn test_response_without_request_is_rejected() {
        let coordinator = TurnCoordinator::default();
        let (tx, _rx) = mpsc::channel(32);
        coordinator.connect(1, tx);
        assert!(!coordinator.process_turn_response(1, raise(10)));
    }

    #[tokio::test]
    async fn test_duplicate_request_shares_the_pending_slot() {
        let coordinator = Arc::new(TurnCoordinator::default());
        let (tx, mut rx) = mpsc::channel(32);
        coordinator.connect(1, tx);

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request_turn(1, request()).await }
        });
        rx.recv().await.unwrap();
        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request_turn(1, request()).await }
        });
        rx.recv().await.unwrap();

        assert!(coordinator.process_turn_response(1, raise(15)));
        assert_eq!(first.await.unwrap(), raise(15));
        assert_eq!(second.await.unwrap(), raise(15));
    }

    #[tokio::test]
    async fn test_broadcast_and_personal_delivery() {
        let coordinator = TurnCoordinator::default();
        let (tx1, mut rx1) = mpsc::channel(32);
        let (tx2, mut rx2) = mpsc::channel(32);
        coordinator.connect(1, tx1);
        coordinator.connect(2, tx2);

        coordinator.log("开局").await;
        assert_eq!(rx1.recv().await, Some(ServerMessage::Log("开局".into())));
        assert_eq!(rx2.recv().await, Some(ServerMessage::Log("开局".into())));

        coordinator.send_personal(2, ServerMessage::Pot { pot: 15 }).await;
        assert_eq!(rx2.recv().await, Some(ServerMessage::Pot { pot: 15 }));
        assert!(rx1.try_recv().is_err());

        let mut ids = coordinator.connected_ids();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }
}

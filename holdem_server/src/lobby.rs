//! 大厅：在座玩家、准备状态以及牌局进行中的入座/离座排队。
//!
//! 牌局进行时 [`Game`] 被移交给牌局任务，大厅只保留开局时的座位快照；
//! 期间到达的入座和离座请求在牌局结束、[`Lobby::restore`] 归还 `Game` 时生效。

use holdem_core::{Chips, Game, GameError, Player, PlayerId, PublicPlayer};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("牌局进行中，请等待本局结束")]
    HandInProgress,
    #[error("玩家 {0} 不在座")]
    UnknownPlayer(PlayerId),
    #[error(transparent)]
    Seat(#[from] GameError),
}

pub struct Lobby {
    /// 牌局进行中时为 None
    game: Option<Game>,
    snapshot: Vec<PublicPlayer>,
    pending_joins: Vec<Player>,
    pending_leaves: Vec<PlayerId>,
    starting_balance: Chips,
}

impl Lobby {
    pub fn new(game: Game, starting_balance: Chips) -> Self {
        Lobby {
            game: Some(game),
            snapshot: Vec::new(),
            pending_joins: Vec::new(),
            pending_leaves: Vec::new(),
            starting_balance,
        }
    }

    pub fn is_hand_running(&self) -> bool {
        self.game.is_none()
    }

    /// 当前在座的玩家 (包括排队等待入座的)
    pub fn seated(&self) -> Vec<PublicPlayer> {
        match &self.game {
            Some(game) => game.table().public_players(),
            None => self
                .snapshot
                .iter()
                .filter(|p| !self.pending_leaves.contains(&p.id))
                .cloned()
                .chain(self.pending_joins.iter().map(Player::public))
                .collect(),
        }
    }

    /// 新玩家入座；牌局进行中时排队到本局结束
    pub fn join(&mut self, id: PlayerId, name: &str) -> Result<PublicPlayer, LobbyError> {
        let player = Player::new(id, name.trim(), self.starting_balance);
        let public = player.public();
        match &mut self.game {
            Some(game) => game.table_mut().add_player(player)?,
            None => {
                // 本局中途断线又重连的玩家，取消排队中的离座即可
                if let Some(pos) = self.pending_leaves.iter().position(|&left| left == id) {
                    self.pending_leaves.remove(pos);
                    if let Some(existing) = self.snapshot.iter().find(|p| p.id == id) {
                        return Ok(existing.clone());
                    }
                }
                let taken = self.snapshot.iter().any(|p| p.id == id)
                    || self.pending_joins.iter().any(|p| p.id == id);
                if taken {
                    return Err(GameError::DuplicatePlayer(id).into());
                }
                // 提前校验，避免归还牌局时才发现入座失败
                player.validate()?;
                self.pending_joins.push(player);
            }
        }
        Ok(public)
    }

    /// 玩家离座。返回 true 表示要等本局结束才真正离开。
    pub fn leave(&mut self, id: PlayerId) -> bool {
        match &mut self.game {
            Some(game) => {
                game.table_mut().remove_player(id);
                false
            }
            None => {
                if let Some(pos) = self.pending_joins.iter().position(|p| p.id == id) {
                    self.pending_joins.remove(pos);
                    return false;
                }
                if !self.pending_leaves.contains(&id) {
                    self.pending_leaves.push(id);
                }
                true
            }
        }
    }

    pub fn set_ready(&mut self, id: PlayerId, is_ready: bool) -> Result<(), LobbyError> {
        let game = self.game.as_mut().ok_or(LobbyError::HandInProgress)?;
        if game.table_mut().set_ready(id, is_ready) {
            Ok(())
        } else {
            Err(LobbyError::UnknownPlayer(id))
        }
    }

    /// 所有在座玩家 (至少两人) 都已准备时取出 `Game` 交给牌局任务
    pub fn take_ready_game(&mut self) -> Option<Game> {
        if !self.game.as_ref().is_some_and(|game| game.table().all_ready()) {
            return None;
        }
        let game = self.game.take()?;
        self.snapshot = game.table().public_players();
        Some(game)
    }

    /// 归还牌局，执行排队中的离座和入座
    pub fn restore(&mut self, mut game: Game) {
        for id in self.pending_leaves.drain(..) {
            if game.table_mut().remove_player(id).is_some() {
                info!(player = id, "本局结束，玩家离座");
            }
        }
        for player in self.pending_joins.drain(..) {
            let id = player.id;
            match game.table_mut().add_player(player) {
                Ok(()) => info!(player = id, "本局结束，玩家入座"),
                Err(e) => warn!(player = id, "排队入座失败: {}", e),
            }
        }
        self.snapshot.clear();
        self.game = Some(game);
    }
}

// --- 单元测试 ---

use crate::table::PlayerId;
use thiserror::Error;

/// 核心库中所有可向上传播的错误。
///
/// 玩家的非法输入、断线等情况在本地被恢复为弃牌，不会出现在这里；
/// 这里只包含配置错误和会破坏牌局完整性的致命错误。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("配置无效: {reason}")]
    InvalidConfig { reason: String },
    #[error("玩家无效: {reason}")]
    InvalidPlayer { reason: String },
    #[error("玩家 {0} 已经在座")]
    DuplicatePlayer(PlayerId),
    #[error("至少需要 2 名玩家才能开局, 当前 {seated} 名")]
    NotEnoughPlayers { seated: usize },
    #[error("牌堆不足: 需要 {requested} 张, 剩余 {remaining} 张")]
    DeckExhausted { requested: usize, remaining: usize },
}

impl GameError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        GameError::InvalidConfig { reason: reason.into() }
    }

    pub(crate) fn player(reason: impl Into<String>) -> Self {
        GameError::InvalidPlayer { reason: reason.into() }
    }
}

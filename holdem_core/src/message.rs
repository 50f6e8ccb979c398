use crate::card::Card;
use crate::hand::HandCategory;
use crate::table::{Chips, PlayerId, PublicPlayer};
use serde::{Deserialize, Serialize};

// 线上格式为单键对象 `{"PHASE": payload}`，键名即 GamePhase。

/// 玩家可以选择的动作
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerAction {
    Call,
    Check,
    Raise,
    Fold,
}

/// 服务器消息的阶段名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    NewPlayer,
    PlayerLeft,
    Log,
    IsReady,
    PreStart,
    PocketCards,
    PreFlopSb,
    PreFlopBb,
    CommunityCards,
    TurnRequest,
    TurnHighlight,
    TurnResult,
    Pot,
    ShowdownWinners,
    ShowdownLosers,
    PlayAgain,
    Error,
}

impl GamePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            GamePhase::NewPlayer => "NEW_PLAYER",
            GamePhase::PlayerLeft => "PLAYER_LEFT",
            GamePhase::Log => "LOG",
            GamePhase::IsReady => "IS_READY",
            GamePhase::PreStart => "PRE_START",
            GamePhase::PocketCards => "POCKET_CARDS",
            GamePhase::PreFlopSb => "PRE_FLOP_SB",
            GamePhase::PreFlopBb => "PRE_FLOP_BB",
            GamePhase::CommunityCards => "COMMUNITY_CARDS",
            GamePhase::TurnRequest => "TURN_REQUEST",
            GamePhase::TurnHighlight => "TURN_HIGHLIGHT",
            GamePhase::TurnResult => "TURN_RESULT",
            GamePhase::Pot => "POT",
            GamePhase::ShowdownWinners => "SHOWDOWN_WINNERS",
            GamePhase::ShowdownLosers => "SHOWDOWN_LOSERS",
            GamePhase::PlayAgain => "PLAY_AGAIN",
            GamePhase::Error => "ERROR",
        }
    }
}

/// 请求玩家做出决定
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub player_bet: Chips, // 该玩家本轮已下注
    pub prev_bet: Chips, // 本轮当前最高注
    pub prev_raise: Chips, // 上一次加注的幅度
    pub options: Vec<PlayerAction>,
}

/// 玩家的回应。`amount` 对跟注是申报的投入额，对加注是加注幅度。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnResponse {
    pub action: PlayerAction,
    pub amount: Chips,
}

impl TurnResponse {
    pub const fn fold() -> Self {
        TurnResponse { action: PlayerAction::Fold, amount: 0 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShowdownWinner {
    pub winner: PublicPlayer,
    pub won_pot: Chips,
    /// 其他人全部弃牌时无需比牌，为 None
    pub hand: Option<HandCategory>,
    /// 无需比牌时不公开底牌，为空
    pub pocket_cards: Vec<Card>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShowdownLoser {
    pub player: PublicPlayer,
    pub hand: HandCategory,
    pub pocket_cards: Vec<Card>,
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    // --- 大厅消息 ---
    /// 有玩家入座；新连接也会收到每个已在座玩家的此消息
    NewPlayer { player: PublicPlayer },
    PlayerLeft { player_id: PlayerId },
    /// 给人看的文字日志
    Log(String),
    IsReady { player_id: PlayerId, is_ready: bool },

    // --- 牌局消息 ---
    /// 新一局开始。第一局没有上一任庄家。
    PreStart {
        prev_dealer: Option<PublicPlayer>,
        curr_dealer: PublicPlayer,
        ordered_player_ids: Vec<PlayerId>,
    },
    /// 只发给本人
    PocketCards { pocket_cards: Vec<Card> },
    PreFlopSb { sb_amount: Chips, player: PublicPlayer },
    PreFlopBb { bb_amount: Chips, player: PublicPlayer },
    /// 当前全部公共牌
    CommunityCards { cards: Vec<Card> },
    /// 只发给轮到的玩家
    TurnRequest(TurnRequest),
    /// 行动权转移；下注轮结束时 `curr_player` 为空
    TurnHighlight {
        prev_player: PublicPlayer,
        curr_player: Option<PublicPlayer>,
    },
    /// `amount` 为该玩家本轮的总下注额
    TurnResult {
        player: PublicPlayer,
        action: PlayerAction,
        amount: Chips,
    },
    Pot { pot: Chips },
    ShowdownWinners { winners: Vec<ShowdownWinner> },
    ShowdownLosers { losers: Vec<ShowdownLoser> },
    /// 一局结束，所有人的准备状态已清空
    PlayAgain { players: Vec<PublicPlayer> },

    Error { message: String },
}

impl ServerMessage {
    pub fn phase(&self) -> GamePhase {
        match self {
            ServerMessage::NewPlayer { .. } => GamePhase::NewPlayer,
            ServerMessage::PlayerLeft { .. } => GamePhase::PlayerLeft,
            ServerMessage::Log(_) => GamePhase::Log,
            ServerMessage::IsReady { .. } => GamePhase::IsReady,
            ServerMessage::PreStart { .. } => GamePhase::PreStart,
            ServerMessage::PocketCards { .. } => GamePhase::PocketCards,
            ServerMessage::PreFlopSb { .. } => GamePhase::PreFlopSb,
            ServerMessage::PreFlopBb { .. } => GamePhase::PreFlopBb,
            ServerMessage::CommunityCards { .. } => GamePhase::CommunityCards,
            ServerMessage::TurnRequest(_) => GamePhase::TurnRequest,
            ServerMessage::TurnHighlight { .. } => GamePhase::TurnHighlight,
            ServerMessage::TurnResult { .. } => GamePhase::TurnResult,
            ServerMessage::Pot { .. } => GamePhase::Pot,
            ServerMessage::ShowdownWinners { .. } => GamePhase::ShowdownWinners,
            ServerMessage::ShowdownLosers { .. } => GamePhase::ShowdownLosers,
            ServerMessage::PlayAgain { .. } => GamePhase::PlayAgain,
            ServerMessage::Error { .. } => GamePhase::Error,
        }
    }
}

// --- 客户端 -> 服务器 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// 回应 TURN_REQUEST
    TurnResponse(TurnResponse),
    /// 切换准备状态 (与 HTTP 接口等价)
    Ready { is_ready: bool },
}

impl From<TurnResponse> for ClientMessage {
    fn from(response: TurnResponse) -> Self {
        ClientMessage::TurnResponse(response)
    }
}

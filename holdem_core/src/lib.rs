//! # 德州扑克核心逻辑库
//!
//! 这个 `core` crate 包含牌与牌堆、牌桌、牌力评估、下注轮状态机、
//! 玩家行动处理、回合协调以及客户端-服务器通信消息的定义。
//! 牌局只通过 [`GameHandler`] 与外界交互 (广播、私发、请求行动)，
//! 可以被任何网络层或测试替身驱动。

mod action;
mod card;
mod coordinator;
mod error;
mod game;
mod hand;
mod message;
mod round;
mod settings;
mod table;

#[cfg(test)]
mod testing;

pub use action::ProcessedTurn;

pub use card::*;

pub use coordinator::{GameHandler, TurnCoordinator};

pub use error::GameError;

pub use game::{Game, GameBuilder, HandSummary};

pub use hand::{EvaluatedHand, HandCategory, evaluate_hand};

pub use message::*;

pub use round::BettingPhase;

pub use settings::{ContributionPolicy, GameSettings};

pub use table::*;

use crate::error::GameError;
use crate::table::Chips;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 跟注时实际投入的金额如何确定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionPolicy {
    /// 信任客户端申报的金额
    #[default]
    Declared,
    /// 忽略申报金额，按 `当前最高注 - 已下注` 计算
    ToCall,
}

impl FromStr for ContributionPolicy {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "declared" => Ok(ContributionPolicy::Declared),
            "to-call" | "to_call" => Ok(ContributionPolicy::ToCall),
            other => Err(GameError::config(format!("未知的跟注策略: {other}"))),
        }
    }
}

/// 一张牌桌的下注规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_raise: Chips,
    pub contribution_policy: ContributionPolicy,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            small_blind: 5,
            big_blind: 10,
            min_raise: 10,
            contribution_policy: ContributionPolicy::Declared,
        }
    }
}

impl GameSettings {
    /// 检查盲注和最小加注，非法值直接报错而不是修正
    pub fn validate(&self) -> Result<(), GameError> {
        if self.small_blind <= 0 {
            return Err(GameError::config(format!("小盲注必须为正数, 收到 {}", self.small_blind)));
        }
        if self.big_blind <= self.small_blind {
            return Err(GameError::config(format!(
                "大盲注 ({}) 必须大于小盲注 ({})",
                self.big_blind, self.small_blind
            )));
        }
        if self.min_raise <= 0 {
            return Err(GameError::config(format!("最小加注必须为正数, 收到 {}", self.min_raise)));
        }
        Ok(())
    }
}

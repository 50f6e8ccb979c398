//! 服务器配置：命令行参数优先，其次是环境变量 (可由 `.env` 提供)，最后是默认值。

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use holdem_core::{Chips, ContributionPolicy, GameError, GameSettings};
use pico_args::Arguments;
use thiserror::Error;

pub const HELP: &str = "\
运行德州扑克牌桌服务器

用法:
  holdem_server [选项]

选项:
  --bind             IP:PORT   监听地址              [默认: env HOLDEM_BIND 或 127.0.0.1:8000]
  --small-blind      N         小盲注                [默认: env HOLDEM_SMALL_BLIND 或 5]
  --big-blind        N         大盲注                [默认: env HOLDEM_BIG_BLIND 或 10]
  --min-raise        N         最小加注              [默认: env HOLDEM_MIN_RAISE 或大盲注]
  --starting-balance N         入座筹码              [默认: env HOLDEM_STARTING_BALANCE 或 1000]
  --turn-timeout     SECS      每次行动的等待秒数，0 表示不限时
                                                     [默认: env HOLDEM_TURN_TIMEOUT_SECS 或 60]
  --call-policy      POLICY    跟注金额: declared | to-call
                                                     [默认: env HOLDEM_CALL_POLICY 或 declared]

标志:
  -h, --help                   打印帮助信息

环境变量:
  RUST_LOG                     日志级别过滤 (默认 info)
";

const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8000);
const DEFAULT_STARTING_BALANCE: Chips = 1000;
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var}={value:?} 无效: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("命令行参数无效: {0}")]
    Args(#[from] pico_args::Error),
    #[error("未知的命令行参数: {0:?}")]
    UnknownArgs(Vec<String>),
    #[error("入座筹码必须为正数, 收到 {0}")]
    StartingBalance(Chips),
    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub game: GameSettings,
    pub starting_balance: Chips,
    /// None 表示无限等待玩家行动
    pub turn_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: SocketAddr::from(DEFAULT_BIND),
            game: GameSettings::default(),
            starting_balance: DEFAULT_STARTING_BALANCE,
            turn_timeout: Some(Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS)),
        }
    }
}

impl ServerConfig {
    /// 从命令行参数和环境变量解析配置
    ///
    /// `env` 按名字查找环境变量，测试里可以换成固定的表。
    /// 多余的命令行参数视为错误。
    pub fn from_sources(
        mut args: Arguments,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let bind = layered(&mut args, "--bind", "HOLDEM_BIND", &env)?.unwrap_or(defaults.bind);
        let small_blind = layered(&mut args, "--small-blind", "HOLDEM_SMALL_BLIND", &env)?
            .unwrap_or(defaults.game.small_blind);
        let big_blind = layered(&mut args, "--big-blind", "HOLDEM_BIG_BLIND", &env)?
            .unwrap_or(defaults.game.big_blind);
        let min_raise =
            layered(&mut args, "--min-raise", "HOLDEM_MIN_RAISE", &env)?.unwrap_or(big_blind);
        let starting_balance = layered(&mut args, "--starting-balance", "HOLDEM_STARTING_BALANCE", &env)?
            .unwrap_or(defaults.starting_balance);
        let timeout_secs: u64 = layered(&mut args, "--turn-timeout", "HOLDEM_TURN_TIMEOUT_SECS", &env)?
            .unwrap_or(DEFAULT_TURN_TIMEOUT_SECS);
        let contribution_policy: ContributionPolicy =
            layered(&mut args, "--call-policy", "HOLDEM_CALL_POLICY", &env)?.unwrap_or_default();

        let rest = args.finish();
        if !rest.is_empty() {
            let rest = rest.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
            return Err(ConfigError::UnknownArgs(rest));
        }

        let game = GameSettings { small_blind, big_blind, min_raise, contribution_policy };
        game.validate()?;
        if starting_balance <= 0 {
            return Err(ConfigError::StartingBalance(starting_balance));
        }

        Ok(ServerConfig {
            bind,
            game,
            starting_balance,
            turn_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }
}

/// 先看命令行参数，再看环境变量
fn layered<T>(
    args: &mut Arguments,
    flag: &'static str,
    var: &'static str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(value) = args.opt_value_from_str(flag)? {
        return Ok(Some(value));
    }
    let Some(raw) = env(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidEnv { var, value: raw.clone(), reason: e.to_string() })
}

// --- 单元测试 ---

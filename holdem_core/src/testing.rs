//! 单元测试共用的脚本化消息处理器

use crate::coordinator::GameHandler;
use crate::game::Game;
use crate::message::{PlayerAction, ServerMessage, TurnRequest, TurnResponse};
use crate::settings::GameSettings;
use crate::table::{Chips, Player, PlayerId, Table};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// 按预先写好的脚本回应；脚本用完后能过牌就过牌，否则按需跟注
#[derive(Default)]
pub(crate) struct ScriptedHandler {
    scripts: Mutex<HashMap<PlayerId, VecDeque<TurnResponse>>>,
    broadcasts: Mutex<Vec<ServerMessage>>,
    personal: Mutex<Vec<(PlayerId, ServerMessage)>>,
    requests: Mutex<Vec<(PlayerId, TurnRequest)>>,
}

impl ScriptedHandler {
    pub(crate) fn script(&self, player_id: PlayerId, responses: impl IntoIterator<Item = TurnResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(player_id)
            .or_default()
            .extend(responses);
    }

    pub(crate) fn broadcasts(&self) -> Vec<ServerMessage> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn personal(&self) -> Vec<(PlayerId, ServerMessage)> {
        self.personal.lock().unwrap().clone()
    }

    pub(crate) fn requests(&self) -> Vec<(PlayerId, TurnRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

pub(crate) fn passive_response(request: &TurnRequest) -> TurnResponse {
    if request.options.contains(&PlayerAction::Check) {
        TurnResponse { action: PlayerAction::Check, amount: 0 }
    } else {
        call(request.prev_bet - request.player_bet)
    }
}

#[async_trait]
impl GameHandler for ScriptedHandler {
    async fn broadcast(&self, message: ServerMessage) {
        self.broadcasts.lock().unwrap().push(message);
    }

    async fn send_personal(&self, player_id: PlayerId, message: ServerMessage) {
        self.personal.lock().unwrap().push((player_id, message));
    }

    async fn turn(&self, player: &Player, request: TurnRequest) -> TurnResponse {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&player.id)
            .and_then(VecDeque::pop_front);
        let response = scripted.unwrap_or_else(|| passive_response(&request));
        self.requests.lock().unwrap().push((player.id, request));
        response
    }
}

pub(crate) fn call(amount: Chips) -> TurnResponse {
    TurnResponse { action: PlayerAction::Call, amount }
}

pub(crate) fn raise(amount: Chips) -> TurnResponse {
    TurnResponse { action: PlayerAction::Raise, amount }
}

/// 玩家 ID 依次为 1..=n，名字为 p1..pn
pub(crate) fn seated_game_with(balances: &[Chips], settings: GameSettings) -> (Game, Arc<ScriptedHandler>) {
    let mut table = Table::with_seed(7);
    for (i, &balance) in balances.iter().enumerate() {
        let id = i as PlayerId + 1;
        table.add_player(Player::new(id, format!("p{id}"), balance)).unwrap();
    }
    let handler = Arc::new(ScriptedHandler::default());
    let game = Game::builder()
        .table(table)
        .handler(handler.clone())
        .settings(settings)
        .build()
        .unwrap();
    (game, handler)
}

pub(crate) fn seated_game(balances: &[Chips]) -> (Game, Arc<ScriptedHandler>) {
    seated_game_with(balances, GameSettings::default())
}

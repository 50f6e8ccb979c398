use futures_util::{SinkExt, StreamExt};
use pico_args::Arguments;
use rand::Rng;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use holdem_core::{ClientMessage, PlayerAction, PlayerId, ServerMessage, TurnResponse};

const HELP: &str = "\
德州扑克终端客户端

用法:
  holdem_client [--url URL] [--id N] [--name NAME]

选项:
  --url   URL    服务器地址  [默认: ws://127.0.0.1:8000]
  --id    N      玩家 ID     [默认: 随机]
  --name  NAME   玩家名称    [默认: 玩家<ID>]
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }
    let base: String = args
        .opt_value_from_str("--url")?
        .unwrap_or_else(|| "ws://127.0.0.1:8000".to_string());
    let id: PlayerId = match args.opt_value_from_str("--id")? {
        Some(id) => id,
        None => rand::rng().random_range(1..=1_000_000),
    };
    let name: String = args.opt_value_from_str("--name")?.unwrap_or_else(|| format!("玩家{id}"));

    let mut url = Url::parse(&base)?;
    url.set_path(&format!("/ws/{id}"));
    url.query_pairs_mut().append_pair("name", &name);

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功! 你的 ID 是 {}", id);

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(server_msg) => {
                        print_server_message(&server_msg);
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(Message::Close(_)) => {
                    println!("\n服务器关闭了连接");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 德州扑克客户端 ---");
    println!("可用命令:");
    println!("  ready                     - 准备");
    println!("  unready                   - 取消准备");
    println!("  call <金额>               - 跟注 (补齐到当前最高注所需的金额)");
    println!("  check                     - 过牌");
    println!("  raise <金额>              - 在跟注之外再加注的金额");
    println!("  fold                      - 弃牌");
    println!("  exit                      - 退出");

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let client_msg = match parse_command(&line) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                println!("正在断开连接...");
                break;
            }
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };

        let payload = serde_json::to_string(&client_msg)?;
        write.send(Message::Text(payload.into())).await?;
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}

/// 把一行输入解析成要发送的消息；`exit` 返回 None，无法识别时返回提示文字
fn parse_command(line: &str) -> Result<Option<ClientMessage>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let amount = |usage: &str| -> Result<i64, String> {
        parts
            .get(1)
            .and_then(|raw| raw.parse().ok())
            .filter(|amount| *amount >= 0)
            .ok_or_else(|| format!("用法: {usage} <金额>"))
    };
    let turn = |action: PlayerAction, amount: i64| -> Result<Option<ClientMessage>, String> {
        Ok(Some(TurnResponse { action, amount }.into()))
    };

    match parts.first().copied() {
        Some("ready") => Ok(Some(ClientMessage::Ready { is_ready: true })),
        Some("unready") => Ok(Some(ClientMessage::Ready { is_ready: false })),
        Some("call") => turn(PlayerAction::Call, amount("call")?),
        Some("raise") => turn(PlayerAction::Raise, amount("raise")?),
        Some("check") => turn(PlayerAction::Check, 0),
        Some("fold") => turn(PlayerAction::Fold, 0),
        Some("exit") => Ok(None),
        _ => Err(format!("未知命令: {}", line.trim())),
    }
}

fn print_server_message(msg: &ServerMessage) {
    match msg {
        ServerMessage::Log(text) => println!("\n[日志] {}", text),
        ServerMessage::TurnRequest(request) => {
            let to_call = request.prev_bet - request.player_bet;
            println!(
                "\n==> 轮到你了: 已下注 {}, 当前最高注 {}, 需跟注 {}, 最小加注 {}, 可选 {:?}",
                request.player_bet, request.prev_bet, to_call, request.prev_raise, request.options
            );
        }
        ServerMessage::Error { message } => println!("\n[错误] {}", message),
        // 其余消息直接打印结构
        other => println!("\n<-- [服务器消息]:\n{:#?}\n", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("ready"), Ok(Some(ClientMessage::Ready { is_ready: true })));
        assert_eq!(
            parse_command("  call 15 "),
            Ok(Some(ClientMessage::TurnResponse(TurnResponse { action: PlayerAction::Call, amount: 15 })))
        );
        assert_eq!(
            parse_command("check"),
            Ok(Some(ClientMessage::TurnResponse(TurnResponse { action: PlayerAction::Check, amount: 0 })))
        );
        assert_eq!(parse_command("exit"), Ok(None));
        assert!(parse_command("raise").is_err());
        assert!(parse_command("raise -5").is_err());
        assert!(parse_command("dance").is_err());
    }
}

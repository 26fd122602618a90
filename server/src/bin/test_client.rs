//! Scripted bot player for manual testing.
//!
//! Joins a running match and answers every question with a random choice
//! after a random delay, printing what the server reports back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use shared::packets::{JoinMatch, SubmitAnswer};
use shared::{decode_outbound, encode_inbound, GameState, Inbound, Outbound};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,
    /// Join code of the match
    #[clap(short, long)]
    code: String,
    /// Display name
    #[clap(short, long, default_value = "bot")]
    name: String,
    /// Upper bound for the thinking delay, in seconds
    #[clap(long, default_value = "5")]
    max_delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (stream, _) = connect_async(args.url.as_str()).await?;
    let (mut sink, mut stream) = stream.split();

    let join = Inbound::JoinMatch(JoinMatch {
        code: args.code.clone(),
        name: args.name.clone(),
    });
    sink.send(Message::Binary(encode_inbound(&join)?)).await?;
    println!("Joining match {} as {}", args.code, args.name);

    while let Some(message) = stream.next().await {
        let bytes = match message? {
            Message::Binary(bytes) => bytes,
            Message::Close(_) => break,
            _ => continue,
        };
        let packet = match decode_outbound(&bytes) {
            Ok(packet) => packet,
            Err(e) => {
                eprintln!("Undecodable frame: {}", e);
                continue;
            }
        };

        match packet {
            Outbound::PlayerJoined(joined) => {
                println!("Joined as {} ({})", joined.player.name, joined.player.id);
            }
            Outbound::QuestionShown(shown) => {
                let choices = shown.question.choices.len();
                if choices == 0 {
                    continue;
                }
                let budget = u64::from(shown.question.time_budget().saturating_sub(1));
                let (choice, delay) = {
                    let mut rng = rand::thread_rng();
                    let delay = rng.gen_range(0..=args.max_delay.min(budget));
                    (rng.gen_range(0..choices), delay)
                };

                println!(
                    "Question {}: {} (answering {} in {}s)",
                    shown.question_index + 1,
                    shown.question.name,
                    choice,
                    delay
                );
                sleep(Duration::from_secs(delay)).await;

                let answer = Inbound::SubmitAnswer(SubmitAnswer {
                    question: shown.question_index,
                    choice,
                });
                sink.send(Message::Binary(encode_inbound(&answer)?)).await?;
            }
            Outbound::AnswerFeedback(feedback) => {
                let verdict = if feedback.is_correct { "correct" } else { "wrong" };
                println!(
                    "Answer was {} (streak bonus {}, best streak {})",
                    verdict, feedback.streak_bonus, feedback.max_streak
                );
            }
            Outbound::ScoreUpdate(score) => {
                println!("+{} points, {} total", score.awarded, score.points);
            }
            Outbound::PlayerRank(rank) => {
                println!("Finished in place {}", rank.rank);
            }
            Outbound::StateChanged(changed) if changed.state == GameState::GameEnded => {
                println!("Match ended by host");
                break;
            }
            Outbound::MatchEnded(_) => break,
            _ => {}
        }
    }

    println!("Disconnected");
    Ok(())
}

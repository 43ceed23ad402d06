//! Round simulator
//!
//! Plays fast rounds against an in-memory engine with a few scripted
//! players. Useful for eyeballing round pacing, cash-outs, and settlement
//! without starting the HTTP server.

use clap::Parser;
use crashiq::game::types::{ItemSnapshot, Rarity};
use crashiq::{CrashiqConfig, GameEngine, GameEvent};
use rand::Rng;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "simulate_rounds")]
#[command(about = "Play fast rounds against an in-memory engine", long_about = None)]
struct Args {
    /// Number of rounds to play
    #[arg(long, default_value = "5")]
    rounds: usize,

    /// Number of simulated players
    #[arg(long, default_value = "3")]
    players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let engine = Arc::new(GameEngine::in_memory(CrashiqConfig::fast_rounds()).await?);

    // Seed each player with one item per round so nobody runs dry.
    let players: Vec<String> = (1..=args.players)
        .map(|i| format!("player-{}", i))
        .collect();
    for (i, player) in players.iter().enumerate() {
        for _ in 0..args.rounds {
            let item = ItemSnapshot::new(
                format!("Falchion Doppler #{}", i + 1),
                "https://img.example/falchion.png",
                Rarity::Rare,
                8.0 + i as f64,
            );
            engine.credit_item(player, item).await?;
        }
    }

    let mut events = engine.subscribe();
    engine.start();

    println!(
        "🎮 Simulating {} rounds with {} players",
        args.rounds, args.players
    );

    // (user_id, bet_id, cash-out target) for bets still riding the round
    let mut live_bets: Vec<(String, String, f64)> = Vec::new();
    let mut crashes = 0usize;

    while crashes < args.rounds {
        match events.recv().await? {
            GameEvent::RoundWaiting {
                round_id,
                countdown_ms,
            } => {
                println!("⏳ Round {} open for bets ({}ms)", &round_id[..8], countdown_ms);
                live_bets.clear();
                for player in &players {
                    let Some(item) = engine.inventory(player).await?.into_iter().next() else {
                        continue;
                    };
                    let bet = engine.place_bet(&round_id, player, player, &item.id).await?;
                    let target = rand::thread_rng().gen_range(1.2..2.5);
                    println!(
                        "   💰 {} staked {} (${:.2}), aiming for {:.2}x",
                        player, bet.item.name, bet.amount, target
                    );
                    live_bets.push((player.clone(), bet.id, target));
                }
            }
            GameEvent::MultiplierChanged { multiplier, .. } => {
                let mut i = 0;
                while i < live_bets.len() {
                    if multiplier < live_bets[i].2 {
                        i += 1;
                        continue;
                    }
                    let (player, bet_id, _) = live_bets.swap_remove(i);
                    match engine.cash_out(&bet_id, &player).await {
                        Ok(bet) => println!(
                            "   🏃 {} cashed out at {:.2}x for ${:.2}",
                            player,
                            bet.cashout_multiplier.unwrap_or(multiplier),
                            bet.winnings.unwrap_or_default(),
                        ),
                        Err(e) => println!("   ⚠️  {} missed the window: {}", player, e),
                    }
                }
            }
            GameEvent::RoundCrashed { crash_point, .. } => {
                crashes += 1;
                println!(
                    "💥 Crashed at {:.2}x ({} bets went down with it)",
                    crash_point,
                    live_bets.len()
                );
                live_bets.clear();
            }
            _ => {}
        }
    }

    engine.stop();

    println!("\n📜 Crash history (newest first): {:?}", engine.history());
    for player in &players {
        let items = engine.inventory(player).await?;
        let value: f64 = items.iter().map(|item| item.price).sum();
        println!(
            "🎒 {} holds {} items worth ${:.2}",
            player,
            items.len(),
            value
        );
    }

    Ok(())
}

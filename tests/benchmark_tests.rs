//! Performance benchmarks for the hot paths of the card server

use server::combination::Combination;
use server::game::GameState;
use shared::{encode, read_frame, Card, MessageType};
use std::time::Instant;

/// Benchmarks frame encoding
#[test]
fn benchmark_frame_encoding() {
    let payload = "AHAH2H3H4H5H6H7H8H9HXHJHQHKH|AC||TURN|14";
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = encode(MessageType::State, payload).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Frame encoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks decoding a long stream of frames
#[tokio::test]
async fn benchmark_frame_decoding() {
    let frames = 10_000;
    let mut stream = Vec::new();
    for i in 0..frames {
        stream.extend(encode(MessageType::Discard, if i % 2 == 0 { "KS" } else { "YY" }).unwrap());
    }

    let start = Instant::now();
    let mut reader = stream.as_slice();
    for _ in 0..frames {
        let frame = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame.msg_type, MessageType::Discard);
    }
    let duration = start.elapsed();

    println!(
        "Frame decoding: {} frames in {:?} ({:.2} μs/frame)",
        frames,
        duration,
        duration.as_micros() as f64 / frames as f64
    );

    assert!(reader.is_empty());
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks combination validation over sets, runs and jokers
#[test]
fn benchmark_combination_validation() {
    let candidates: Vec<Vec<Card>> = [
        "AH2H3H4H5H",
        "XHJHQHKHAH",
        "7C7D7S",
        "5DYY7D",
        "YYYYYY",
        "2S4S6S",
        "QHKHAH2H",
    ]
    .iter()
    .map(|codes| Card::parse_list(codes).unwrap())
    .collect();

    let iterations = 10_000;
    let start = Instant::now();
    let mut valid = 0;

    for _ in 0..iterations {
        for cards in &candidates {
            if Combination::new(0, cards).is_some() {
                valid += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Combination validation: {} checks in {:?} ({:.2} ns/check)",
        iterations * candidates.len(),
        duration,
        duration.as_nanos() as f64 / (iterations * candidates.len()) as f64
    );

    assert_eq!(valid, iterations * 5);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks dealing and playing opening turns
#[test]
fn benchmark_deal_and_turns() {
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut game = GameState::new(0, &[0, 1], true);
        game.start();
        let opener = game.players[0].hand[0].code();
        game.process_move(0, MessageType::Discard, &opener).unwrap();
        game.process_move(1, MessageType::TakeFromDeck, "").unwrap();
        assert_eq!(game.total_cards(), server::game::DECK_SIZE);
    }

    let duration = start.elapsed();
    println!(
        "Deal and turns: {} games in {:?} ({:.2} μs/game)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

//! End-to-end log round trip: a recorded match, re-driven from its log,
//! reproduces the original run exactly.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use blastgrid_core::{GameEvent, PlayerAction, PlayerId, Recorder};
use blastgrid_recorder::{format_event, parse_line, read_log, FileRecorder};
use blastgrid_world::{Game, Rules};

/// Test recorder that keeps events in memory behind a shared handle.
#[derive(Clone, Default)]
struct MemoryRecorder {
    events: Arc<Mutex<Vec<(u64, GameEvent)>>>,
}

impl Recorder for MemoryRecorder {
    fn record(&mut self, tick: u64, event: &GameEvent) {
        self.events.lock().unwrap().push((tick, event.clone()));
    }
}

const SEED: u64 = 2_026;
const TICKS: u64 = 80;

fn scripted_action(pid: PlayerId, tick: u64) -> PlayerAction {
    const CYCLE: [PlayerAction; 5] = [
        PlayerAction::Up,
        PlayerAction::Right,
        PlayerAction::PlaceBomb,
        PlayerAction::Down,
        PlayerAction::Left,
    ];
    CYCLE[((tick + u64::from(pid.get())) % 5) as usize]
}

fn recorded_match() -> (Game, Vec<(u64, GameEvent)>) {
    let recorder = MemoryRecorder::default();
    let events = Arc::clone(&recorder.events);
    let mut game = Game::with_recorder(12, 10, Rules::default(), Box::new(recorder));
    let first = game.add_player(None);
    let second = game.add_player(None);
    game.generate_map(SEED).unwrap();
    for tick in 0..TICKS {
        game.enqueue_action(first, scripted_action(first, tick));
        game.enqueue_action(second, scripted_action(second, tick));
        game.tick();
    }
    let events = events.lock().unwrap().clone();
    (game, events)
}

#[test]
fn replaying_recorded_moves_reproduces_the_match() {
    let (original, events) = recorded_match();

    let seed = events
        .iter()
        .find_map(|(_, event)| match event {
            GameEvent::MapGenerated { seed, .. } => Some(*seed),
            _ => None,
        })
        .expect("log starts with a map event");
    assert_eq!(seed, SEED);

    let mut moves: BTreeMap<u64, Vec<(PlayerId, PlayerAction)>> = BTreeMap::new();
    for (tick, event) in &events {
        if let GameEvent::Move { pid, action } = event {
            moves.entry(*tick).or_default().push((*pid, *action));
        }
    }

    let mut replay = Game::new(12, 10, Rules::default());
    let _ = replay.add_player(None);
    let _ = replay.add_player(None);
    replay.generate_map(seed).unwrap();
    for tick in 0..TICKS {
        for (pid, action) in moves.get(&tick).map(Vec::as_slice).unwrap_or(&[]) {
            replay.enqueue_action(*pid, *action);
        }
        replay.tick();
    }

    assert_eq!(replay.game_state(), original.game_state());
    assert_eq!(replay.stats(), original.stats());
    assert_eq!(replay.winner(), original.winner());
}

#[test]
fn log_file_round_trips_every_recorded_event() {
    let (_, events) = recorded_match();
    let path = std::env::temp_dir().join(format!(
        "blastgrid-replay-{}-{:?}.log",
        std::process::id(),
        std::thread::current().id()
    ));
    {
        let mut file = FileRecorder::create(&path).unwrap();
        for (tick, event) in &events {
            file.record(*tick, event);
        }
    }
    let parsed = read_log(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(parsed, events);
}

#[test]
fn formatted_events_parse_back_unchanged() {
    let (_, events) = recorded_match();
    assert!(events.iter().any(|(_, event)| matches!(event, GameEvent::Move { .. })));
    for (tick, event) in events {
        let line = format_event(tick, &event).unwrap();
        assert_eq!(parse_line(&line).unwrap(), (tick, event));
    }
}

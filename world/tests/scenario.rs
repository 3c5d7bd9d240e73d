//! Full-match scenarios on an empty grid: blast timing, damage delivery,
//! and both termination paths.

use blastgrid_core::{CellCoord, PlayerAction, PlayerId};
use blastgrid_world::{query, Game, Rules};

fn two_player_game(rules: Rules) -> (Game, PlayerId, PlayerId) {
    let mut game = Game::new(12, 10, rules);
    let bomber = game.add_player(Some("bomber"));
    let bystander = game.add_player(Some("bystander"));
    game.place_player(bomber, CellCoord::new(2, 2)).unwrap();
    game.place_player(bystander, CellCoord::new(2, 4)).unwrap();
    (game, bomber, bystander)
}

#[test]
fn bomb_fuse_runs_for_the_configured_ticks() {
    let (mut game, bomber, _) = two_player_game(Rules::default());
    game.enqueue_action(bomber, PlayerAction::PlaceBomb);
    // The placement tick already ages the fuse once.
    game.tick();
    for _ in 1..Rules::default().bomb_ttl - 1 {
        game.tick();
        assert!(query::fire_cells(&game).is_empty());
        assert_eq!(query::bomb_cells(&game).len(), 1);
    }
    game.tick();
    assert!(query::bomb_cells(&game).is_empty());
    let cells = query::fire_cells(&game);
    assert!(cells.contains(&CellCoord::new(2, 2)));
    // Power two on an open grid: centre plus two tiles per direction.
    assert_eq!(cells.len(), 9);
}

#[test]
fn blast_damage_lands_on_the_tick_after_ignition() {
    let (mut game, bomber, bystander) = two_player_game(Rules::default());
    game.enqueue_action(bomber, PlayerAction::PlaceBomb);
    for _ in 0..Rules::default().bomb_ttl {
        game.tick();
    }
    // Fire is up but nobody has been hurt yet.
    assert!(!query::fire_cells(&game).is_empty());
    assert_eq!(
        game.player_state(bystander).unwrap().hp,
        Rules::default().player_start_hp
    );
    game.tick();
    let victim = game.player_state(bystander).unwrap();
    assert_eq!(victim.hp, Rules::default().player_start_hp - 1);
    // Both players stood in the blast; only the opponent hit pays out.
    let owner = game.player_state(bomber).unwrap();
    assert_eq!(owner.hp, Rules::default().player_start_hp - 1);
    assert_eq!(owner.reward, Rules::default().fire_reward);
    assert!(query::fire_cells(&game).is_empty());
}

#[test]
fn fire_penalty_charges_players_caught_in_the_blast() {
    let rules = Rules {
        fire_penalty: 7,
        ..Rules::default()
    };
    let (mut game, bomber, bystander) = two_player_game(rules);
    game.enqueue_action(bomber, PlayerAction::PlaceBomb);
    for _ in 0..=rules.bomb_ttl {
        game.tick();
    }
    // One hit each: the bystander only pays, the owner pays but also earns.
    assert_eq!(
        game.player_state(bystander).unwrap().reward,
        -rules.fire_penalty
    );
    assert_eq!(
        game.player_state(bomber).unwrap().reward,
        rules.fire_reward - rules.fire_penalty
    );
}

#[test]
fn last_player_standing_wins() {
    let rules = Rules {
        player_start_hp: 1,
        ..Rules::default()
    };
    let (mut game, bomber, bystander) = two_player_game(rules);
    game.enqueue_action(bomber, PlayerAction::PlaceBomb);
    // Step clear of the blast cross before the fuse runs out.
    game.enqueue_action(bomber, PlayerAction::Right);
    game.enqueue_action(bomber, PlayerAction::Up);
    let mut guard = 0_u32;
    let mut living = query::living_players(&game);
    while !game.is_over() {
        game.tick();
        let now = query::living_players(&game);
        assert!(now <= living, "a death reversed");
        living = now;
        guard += 1;
        assert!(guard < 100, "match never terminated");
    }
    assert_eq!(game.winner(), Some(bomber));
    assert_eq!(query::living_players(&game), 1);
    assert_eq!(query::dead_bodies(&game), vec![(bystander, CellCoord::new(2, 4))]);
    let stats = game.stats();
    assert!(stats.is_over);
    assert_eq!(stats.winner, Some(bomber));
    assert_eq!(stats.players[&bystander].hp, 0);
}

#[test]
fn iteration_cap_ends_the_match_on_score() {
    let rules = Rules {
        max_iterations: Some(60),
        ..Rules::default()
    };
    let (mut game, bomber, bystander) = two_player_game(rules);
    game.enqueue_action(bomber, PlayerAction::PlaceBomb);
    game.enqueue_action(bomber, PlayerAction::Right);
    game.enqueue_action(bomber, PlayerAction::Up);
    let mut guard = 0_u32;
    while !game.is_over() {
        game.tick();
        guard += 1;
        assert!(guard < 200, "match never terminated");
    }
    // Both survived the blast; the fire reward decides the match.
    assert_eq!(query::living_players(&game), 2);
    assert!(game.player_state(bomber).unwrap().reward > 0);
    assert_eq!(game.winner(), Some(bomber));
    assert_eq!(game.player_state(bystander).unwrap().hp, rules.player_start_hp - 1);
}

#[test]
fn iteration_cap_tie_goes_to_the_highest_id() {
    let rules = Rules {
        max_iterations: Some(10),
        ..Rules::default()
    };
    let (mut game, _, bystander) = two_player_game(rules);
    while !game.is_over() {
        game.tick();
    }
    // Nobody scored; the tie resolves to the later registration.
    assert_eq!(game.winner(), Some(bystander));
}

#[test]
fn ticks_keep_counting_after_the_match_ends() {
    let rules = Rules {
        max_iterations: Some(5),
        ..Rules::default()
    };
    let (mut game, bomber, _) = two_player_game(rules);
    while !game.is_over() {
        game.tick();
    }
    let at_end = game.tick_counter();
    game.enqueue_action(bomber, PlayerAction::Up);
    game.tick();
    game.tick();
    // Post-match ticks age the world but admit no actions.
    assert_eq!(game.tick_counter(), at_end + 2);
    assert_eq!(
        query::player_position(&game, bomber),
        Some(CellCoord::new(2, 2))
    );
}

use std::collections::BTreeSet;

use kurve_sync::{
    ClientTickMessage, ClientTickState, PlayerId, PlayoutDelay, Roster, ServerTickMessage,
    ServerTickState, SnakeInput, Stall, Steer, TickRecord,
};

fn roster() -> Roster {
    Roster::new(vec![PlayerId(20), PlayerId(10)]).unwrap()
}

fn input(steer: Steer, ability: bool) -> SnakeInput {
    SnakeInput::new(steer, ability)
}

#[test]
fn two_players_stall_then_catch_up_over_the_wire() {
    let a = PlayerId(10);
    let b = PlayerId(20);
    let inputs = [
        (input(Steer::Left, false), input(Steer::Right, false)),
        (input(Steer::Straight, true), input(Steer::Left, false)),
        (input(Steer::Right, false), input(Steer::Right, true)),
    ];

    let mut server = ServerTickState::<SnakeInput>::new(roster());
    let mut wire = Vec::new();
    for (input_a, input_b) in inputs {
        server.receive_input(a, input_a).unwrap();
        server.receive_input(b, input_b).unwrap();
        let outputs = server.tick().unwrap();
        let to_a = outputs.iter().find(|o| o.player_id == a).unwrap();
        wire.push(to_a.message.encode(2).unwrap());
    }

    let mut client = ClientTickState::<SnakeInput>::new(roster(), PlayoutDelay::new(2));
    for _ in 0..3 {
        client.advance_tick();
    }
    let drained = client.drain();
    assert!(drained.ticks.is_empty());
    assert_eq!(drained.stall, Some(Stall { tick: 0, horizon: 0 }));
    assert_eq!(client.next_tick_to_consume(), 0);

    // every message resends the unacknowledged ticks, deliver them all
    for bytes in &wire {
        client.handle_server_bytes(bytes).unwrap();
    }
    client.advance_tick();
    client.advance_tick();

    let drained = client.drain();
    assert!(drained.stall.is_none());
    let ticks: Vec<_> = drained.ticks.iter().map(|t| t.tick).collect();
    assert_eq!(ticks, vec![0, 1, 2]);
    assert_eq!(client.next_tick_to_consume(), 3);
    for (resolved, (input_a, input_b)) in drained.ticks.iter().zip(inputs) {
        assert_eq!(resolved.inputs[&a], input_a);
        assert_eq!(resolved.inputs[&b], input_b);
    }
}

#[test]
fn acknowledgements_over_the_wire() {
    let a = PlayerId(10);
    let mut server = ServerTickState::<SnakeInput>::new(roster());
    for _ in 0..3 {
        server.tick().unwrap();
    }
    assert_eq!(server.pending(a).unwrap(), &BTreeSet::from([0, 1, 2]));

    let bytes = ClientTickMessage::new(input(Steer::Left, false), vec![0, 1])
        .encode()
        .unwrap();
    server.handle_client_bytes(a, &bytes).unwrap();
    assert_eq!(server.pending(a).unwrap(), &BTreeSet::from([2]));
}

#[test]
fn reordered_duplicated_records_drain_once_in_order() {
    let mut client = ClientTickState::<SnakeInput>::new(roster(), PlayoutDelay::new(0));
    let block = vec![input(Steer::Left, false), input(Steer::Right, false)];
    let message = |ticks: &[u32]| {
        ServerTickMessage::new(
            ticks
                .iter()
                .map(|&tick| TickRecord {
                    tick,
                    block: block.clone(),
                })
                .collect(),
        )
        .encode(2)
        .unwrap()
    };

    for tick in 0..5 {
        client.handle_server_bytes(&message(&[tick])).unwrap();
    }
    client.handle_server_bytes(&message(&[7])).unwrap();
    client.handle_server_bytes(&message(&[7, 5])).unwrap();
    client.handle_server_bytes(&message(&[5, 6, 7])).unwrap();

    let mut drained = Vec::new();
    for _ in 0..12 {
        client.advance_tick();
        drained.extend(client.drain().ticks.into_iter().map(|t| t.tick));
    }
    assert_eq!(drained, (0..8).collect::<Vec<_>>());
}

#[test]
fn silent_player_replays_last_input_to_clients() {
    let a = PlayerId(10);
    let b = PlayerId(20);
    let mut server = ServerTickState::<SnakeInput>::new(roster());
    let mut client = ClientTickState::<SnakeInput>::new(roster(), PlayoutDelay::new(0));

    server.receive_input(b, input(Steer::Right, true)).unwrap();
    for tick in 0..5 {
        server.receive_input(a, input(Steer::Left, tick % 2 == 0)).unwrap();
        for output in server.tick().unwrap() {
            if output.player_id == a {
                client.receive(output.message);
            }
        }
    }

    for _ in 0..6 {
        client.advance_tick();
    }
    let drained = client.drain();
    assert_eq!(drained.ticks.len(), 5);
    for resolved in &drained.ticks {
        assert_eq!(resolved.inputs[&b], input(Steer::Right, true));
    }
}

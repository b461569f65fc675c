//! Property-based invariant tests for the protocol layer.
//!
//! Generates random tile sequences and raw byte frames and checks that
//! hand tracking conserves tiles, tile codes survive every platform
//! encoding, and no bridge panics on garbage input.

use proptest::prelude::*;

use kawa_core::bridge::{
    new_bridge, AmatsukiBridge, Platform, PrivateHand, RiichiCityBridge, TenhouBridge,
};
use kawa_core::codec::protobuf::{read_varint, write_varint};
use kawa_core::codec::riichi_city::RcFrame;
use kawa_core::codec::StompFrame;
use kawa_core::Bridge;
use serde_json::{json, Value};
use kawa_core::shanten::calc_shanten;
use kawa_core::tile::{tiles_to_counts, NUM_TILE_TYPES, UNKNOWN};
use kawa_core::Tile;

/// Any concrete tile, red fives included.
fn arb_tile() -> impl Strategy<Value = Tile> {
    (0u8..UNKNOWN).prop_map(|id| Tile::new(id).unwrap())
}

/// A hand of `n` tiles that never holds more than four of a kind.
fn arb_hand(n: usize) -> impl Strategy<Value = Vec<Tile>> {
    Just((0..136i64).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_map(move |wall| wall[..n].iter().map(|&i| Tile::from_136(i).unwrap()).collect())
}

fn tenhou_in_round() -> TenhouBridge {
    let mut b = TenhouBridge::new();
    for frame in [
        json!({"tag": "UN", "n0": "a", "n1": "b", "n2": "c", "n3": "d"}),
        json!({"tag": "TAIKYOKU", "oya": "0"}),
        json!({"tag": "INIT", "seed": "0,0,0,3,2,52", "ten": "250,250,250,250", "oya": "0",
               "hai": "0,4,8,12,36,40,44,72,76,80,108,112,116"}),
    ] {
        b.parse(frame.to_string().as_bytes());
    }
    b
}

fn csv(values: &[i64]) -> String {
    values.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

fn rc_frame(cmd: &str, data: Value) -> Vec<u8> {
    RcFrame { msg_id: 1, msg_type: 2, data: json!({"cmd": cmd, "data": data}) }.encode()
}

fn rc_in_room() -> RiichiCityBridge {
    let mut b = RiichiCityBridge::new();
    b.parse(&RcFrame { msg_id: 0, msg_type: 1, data: json!({"uid": 9}) }.encode());
    b.parse(&rc_frame(
        "cmd_enter_room",
        json!({"players": [{"user": {"user_id": 9}}, {"user": {"user_id": 8}},
                           {"user": {"user_id": 7}}, {"user": {"user_id": 6}}],
               "options": {"classify_id": 1, "player_count": 4}}),
    ));
    b
}

fn amatsuki_joined() -> AmatsukiBridge {
    let mut b = AmatsukiBridge::new();
    b.parse(
        &StompFrame::message(
            "/user/topic/callback/joinDesk",
            &json!({"status": 0, "errorCode": 0, "gameType": 0, "gameMode": 0, "deskId": 5}),
        )
        .encode(),
    );
    b
}

fn stomp(dest: &str, body: Value) -> Vec<u8> {
    StompFrame::message(dest, &body).encode()
}

/// One step of our own turn: draw `tile`, then cut either the draw or the
/// hand tile at `pick`.
#[derive(Debug, Clone)]
struct Turn {
    draw: Tile,
    tsumogiri: bool,
    pick: usize,
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (arb_tile(), any::<bool>(), 0usize..13).prop_map(|(draw, tsumogiri, pick)| Turn {
        draw,
        tsumogiri,
        pick,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn draw_discard_cycles_keep_thirteen_tiles(
        hand in arb_hand(13),
        turns in prop::collection::vec(arb_turn(), 1..40),
    ) {
        let mut tracked = PrivateHand::new();
        tracked.deal(hand, None);
        for turn in turns {
            tracked.draw(turn.draw);
            let cut = if turn.tsumogiri {
                turn.draw
            } else {
                tracked.tiles()[turn.pick % tracked.len()]
            };
            prop_assert!(tracked.discard(cut, turn.tsumogiri));
            prop_assert!(tracked.tsumo().is_none());
            prop_assert_eq!(tracked.effective_len(), 13);
        }
    }

    #[test]
    fn tracked_hand_stays_sorted(
        hand in arb_hand(13),
        turns in prop::collection::vec(arb_turn(), 1..20),
    ) {
        let mut tracked = PrivateHand::new();
        tracked.deal(hand, None);
        for turn in turns {
            tracked.draw(turn.draw);
            let cut = tracked.tiles()[turn.pick % tracked.len()];
            tracked.discard(cut, false);
            let keys: Vec<u8> = tracked.tiles().iter().map(|t| t.sort_key()).collect();
            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]), "unsorted: {:?}", tracked.tiles());
        }
    }

    #[test]
    fn dealer_split_takes_the_last_sorted_tile(hand in arb_hand(14)) {
        let mut tracked = PrivateHand::new();
        let tsumo = tracked.deal_split(hand.clone()).unwrap();
        let max = hand.iter().map(|t| t.sort_key()).max().unwrap();
        prop_assert_eq!(tsumo.sort_key(), max);
        prop_assert_eq!(tracked.len(), 13);
    }

    #[test]
    fn pon_then_discard_restores_thirteen(hand in arb_hand(13), extra in arb_tile()) {
        // find a pair to call on; skip hands without one
        let counts = tiles_to_counts(&hand);
        let Some(ty) = (0..NUM_TILE_TYPES).find(|&i| counts[i] >= 2) else {
            return Ok(());
        };
        let pair: Vec<Tile> = hand
            .iter()
            .copied()
            .filter(|t| t.tile_type() == Some(ty))
            .take(2)
            .collect();
        let mut tracked = PrivateHand::new();
        tracked.deal(hand, None);
        tracked.draw(extra);
        tracked.discard(extra, true);
        prop_assert!(tracked.call(&pair));
        let cut = tracked.tiles()[0];
        prop_assert!(tracked.discard(cut, false));
        prop_assert_eq!(tracked.effective_len(), 13);
        prop_assert_eq!(tracked.melds(), 1);
    }

    #[test]
    fn tile_codes_survive_every_platform_encoding(tile in arb_tile()) {
        prop_assert_eq!(Tile::from_majsoul(&tile.to_majsoul()), Some(tile));
        prop_assert_eq!(Tile::from_riichi_city(tile.to_riichi_city()), tile);
        prop_assert_eq!(tile.as_str().parse::<Tile>().unwrap(), tile);
    }

    #[test]
    fn every_136_index_maps_to_its_kind(index in 0i64..136) {
        let tile = Tile::from_136(index).unwrap();
        prop_assert_eq!(tile.tile_type(), Some((index / 4) as usize));
    }

    #[test]
    fn varint_decodes_what_it_encodes(
        value in any::<u64>(),
        prefix in prop::collection::vec(any::<u8>(), 0..4),
    ) {
        let mut buf = prefix.clone();
        write_varint(&mut buf, value);
        let mut pos = prefix.len();
        prop_assert_eq!(read_varint(&buf, &mut pos).unwrap(), value);
        prop_assert_eq!(pos, buf.len());
    }

    #[test]
    fn shanten_stays_in_range(hand in arb_hand(13)) {
        let s = calc_shanten(&tiles_to_counts(&hand), 4, false);
        prop_assert!((0..=6).contains(&s), "shanten {} for {:?}", s, hand);
    }

    #[test]
    fn bridges_never_panic_on_garbage(raw in prop::collection::vec(any::<u8>(), 0..256)) {
        for platform in Platform::ALL {
            let mut bridge = new_bridge(platform).unwrap();
            let _ = bridge.parse(&raw);
            // a second frame after garbage must still be handled
            let _ = bridge.parse(&raw);
        }
    }

    #[test]
    fn bridges_never_panic_on_arbitrary_fields(
        m in any::<u32>(),
        who in any::<i64>(),
        seed in prop::collection::vec(any::<i64>(), 0..8),
        index in any::<i64>(),
        card in any::<i64>(),
        group in prop::collection::vec(any::<i64>(), 0..4),
        action in 0u32..16,
        dealer_pos in any::<u64>(),
        oya in any::<u8>(),
        position in any::<u8>(),
    ) {
        let mut tenhou = tenhou_in_round();
        for frame in [
            json!({"tag": "N", "who": who.to_string(), "m": m.to_string()}),
            json!({"tag": "INIT", "seed": csv(&seed), "ten": csv(&seed), "oya": who.to_string(),
                   "hai": csv(&[index; 13])}),
            json!({"tag": "DORA", "hai": index.to_string()}),
            json!({"tag": format!("T{m}")}),
            json!({"tag": "D", "p": index.to_string()}),
            json!({"tag": "RYUUKYOKU", "sc": csv(&seed)}),
            json!({"tag": "REACH", "who": who.to_string(), "step": "2", "ten": csv(&seed)}),
        ] {
            let _ = tenhou.parse(frame.to_string().as_bytes());
        }

        let mut rc = rc_in_room();
        let hand: Vec<i64> = std::iter::repeat(card).take(14).collect();
        let _ = rc.parse(&rc_frame(
            "cmd_game_start",
            json!({"quan_feng": card, "bao_pai_card": card, "dealer_pos": dealer_pos,
                   "user_info_list": [], "hand_cards": hand}),
        ));
        let _ = rc.parse(&rc_frame("cmd_in_card_brc", json!({"user_id": 9, "card": card})));
        let _ = rc.parse(&rc_frame(
            "cmd_game_action_brc",
            json!({"action_info": [{"action": action, "user_id": 9, "card": card,
                                    "group_cards": group, "move_cards_pos": [position]}]}),
        ));
        let _ = rc.parse(&rc_frame("cmd_gang_bao_brc", json!({"cards": group})));

        let mut ama = amatsuki_joined();
        let ids: Vec<Value> = (0..13).map(|i| json!({"id": index.wrapping_add(i)})).collect();
        let hidden = json!({"tehai": {"hand": vec![json!({"id": -1}); 13]}});
        let _ = ama.parse(&stomp(
            "/user/topic/desk/roundStart/5",
            json!({
                "bakaze": position, "honba": 0, "oya": oya,
                "playerPoints": [25000, 25000, 25000, 25000],
                "playerTiles": [{"tehai": {"hand": ids}}, hidden.clone(), hidden.clone(), hidden],
            }),
        ));
        let sync_dora = json!({"dora": [{"id": index}], "reachCount": position});
        let _ = ama.parse(&stomp("/topic/desk/syncDora/5", sync_dora));
        let draw = json!({"hai": {"id": card}, "position": position});
        let _ = ama.parse(&stomp("/user/topic/desk/draw/5", draw));
        let kan: Vec<Value> = group.iter().map(|&id| json!({"id": id})).collect();
        let _ = ama.parse(&stomp(
            "/topic/desk/tehaiAction/5",
            json!({"action": "ANNKAN", "haiList": kan, "position": position}),
        ));
        let _ = ama.parse(&stomp(
            "/topic/desk/riverAction/5",
            json!({
                "action": "PON",
                "menzu": {"menzuList": [{"id": card}, {"id": index}]},
                "position": position,
            }),
        ));
    }
}

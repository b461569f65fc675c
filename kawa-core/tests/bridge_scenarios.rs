//! End-to-end bridge scenarios: raw platform frames in, canonical events out.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use kawa_core::bridge::{AmatsukiBridge, MajsoulBridge, RiichiCityBridge, TenhouBridge};
use kawa_core::codec::riichi_city::RcFrame;
use kawa_core::codec::{LiqiCodec, SchemaRegistry, StompFrame};
use kawa_core::{Bridge, Event, EventBody, Tile};

const AUTH: &str = ".lq.FastTest.authGame";
const SYNC: &str = ".lq.FastTest.syncGame";
const ENTER: &str = ".lq.FastTest.enterGame";

fn t(code: &str) -> Tile {
    code.parse().unwrap()
}

fn kinds(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::kind).collect()
}

// ---------------------------------------------------------------------------
// Majsoul
// ---------------------------------------------------------------------------

struct Majsoul {
    bridge: MajsoulBridge,
    enc: LiqiCodec,
    step: u32,
}

impl Majsoul {
    /// A bridge seated at `seat` of a four-player table.
    fn seated(seat: usize) -> Self {
        let mut m = Majsoul {
            bridge: MajsoulBridge::new().unwrap(),
            enc: LiqiCodec::new(SchemaRegistry::bundled().unwrap()),
            step: 0,
        };
        let mut seats = vec![11u64, 22, 33, 44];
        seats[seat] = 4242;
        let req = m.enc.encode_request(1, AUTH, &json!({"account_id": 4242})).unwrap();
        assert_eq!(m.bridge.parse(&req), Some(vec![]));
        let res = m.enc.encode_response(1, AUTH, &json!({"seat_list": seats})).unwrap();
        let out = m.bridge.parse(&res).unwrap();
        assert_eq!(out[0].body, EventBody::StartGame { id: seat as u8 });
        m
    }

    fn act(&mut self, name: &str, data: Value) -> Vec<Event> {
        self.step += 1;
        let frame = self.enc.encode_action(self.step, name, &data).unwrap();
        self.bridge.parse(&frame).unwrap()
    }

    fn new_round(&mut self, ju: u32, tiles: &[&str]) -> Vec<Event> {
        self.act(
            "ActionNewRound",
            json!({
                "chang": 0, "ju": ju, "ben": 0, "liqibang": 0,
                "tiles": tiles,
                "doras": ["1z"],
                "scores": [25000, 25000, 25000, 25000],
            }),
        )
    }

    /// Wraps actions the way a restore backlog carries them: plain, not XORed.
    fn backlog(&self, actions: &[(&str, Value)]) -> Vec<Value> {
        let registry = self.enc.registry();
        actions
            .iter()
            .enumerate()
            .map(|(i, (name, data))| {
                let inner = registry.encode(name, data).unwrap();
                json!({"step": i, "name": name, "data": BASE64.encode(inner)})
            })
            .collect()
    }

    fn respond(&mut self, id: u16, method: &str, body: Value) -> Vec<Event> {
        let req_body = if method == SYNC { json!({"round_id": "r", "step": 0}) } else { json!({}) };
        let req = self.enc.encode_request(id, method, &req_body).unwrap();
        self.bridge.parse(&req).unwrap();
        let res = self.enc.encode_response(id, method, &body).unwrap();
        self.bridge.parse(&res).unwrap()
    }
}

const HAND_13: [&str; 13] = [
    "1m", "2m", "3m", "4p", "5p", "6p", "7s", "8s", "9s", "1z", "1z", "5z", "6z",
];

#[test]
fn first_round_start_is_east_one_with_sorted_hand() {
    let mut m = Majsoul::seated(1);
    let shuffled = ["6z", "1m", "9s", "4p", "1z", "3m", "7s", "5p", "2m", "8s", "1z", "6p", "5z"];
    let out = m.new_round(0, &shuffled);
    assert_eq!(kinds(&out), ["start_kyoku"]);
    let EventBody::StartKyoku { bakaze, kyoku, oya, dora_marker, tehais, scores, .. } = &out[0].body
    else {
        panic!("expected start_kyoku");
    };
    assert_eq!(*bakaze, t("E"));
    assert_eq!(*kyoku, 1);
    assert_eq!(*oya, 0);
    assert_eq!(*dora_marker, t("E"));
    assert_eq!(*scores, [25000; 4]);
    let names: Vec<_> = tehais[1].iter().map(|t| t.as_str()).collect();
    assert_eq!(
        names,
        ["1m", "2m", "3m", "4p", "5p", "6p", "7s", "8s", "9s", "E", "E", "P", "F"]
    );
    assert!(tehais[0].iter().all(|t| t.is_unknown()));
}

#[test]
fn dealer_fourteenth_tile_is_last_in_sort_order() {
    // Known limitation kept as-is: the split takes whatever sorts last.
    let mut m = Majsoul::seated(0);
    let mut tiles = HAND_13.to_vec();
    tiles.insert(3, "4z");
    let out = m.new_round(0, &tiles);
    assert_eq!(kinds(&out), ["start_kyoku", "tsumo"]);
    assert_eq!(out[1].body, EventBody::Tsumo { actor: 0, pai: t("F") });
    let EventBody::StartKyoku { tehais, .. } = &out[0].body else {
        panic!("expected start_kyoku");
    };
    assert!(tehais[0].contains(&t("N")));
    assert_eq!(tehais[0].len(), 13);
}

#[test]
fn tracked_hand_is_conserved_through_draws_discards_and_calls() {
    let mut m = Majsoul::seated(2);
    m.new_round(0, &HAND_13);
    assert_eq!(m.bridge.hand().effective_len(), 13);

    m.act("ActionDealTile", json!({"seat": 2, "tile": "9m"}));
    assert_eq!(m.bridge.hand().tsumo(), Some(t("9m")));
    m.act("ActionDiscardTile", json!({"seat": 2, "tile": "9m", "moqie": true}));
    assert_eq!(m.bridge.hand().effective_len(), 13);

    // pon of East off seat 1, then a discard from hand
    let out = m.act(
        "ActionChiPengGang",
        json!({"seat": 2, "type": 1, "tiles": ["1z", "1z", "1z"], "froms": [2, 2, 1]}),
    );
    assert_eq!(
        out[0].body,
        EventBody::Pon { actor: 2, target: 1, pai: t("E"), consumed: vec![t("E"), t("E")] }
    );
    assert_eq!(m.bridge.hand().len(), 11);
    m.act("ActionDiscardTile", json!({"seat": 2, "tile": "6z"}));
    assert_eq!(m.bridge.hand().effective_len(), 13);

    // other seats never touch our hand
    m.act("ActionDealTile", json!({"seat": 3, "tile": ""}));
    m.act("ActionDiscardTile", json!({"seat": 3, "tile": "2p", "moqie": true}));
    assert_eq!(m.bridge.hand().effective_len(), 13);
}

#[test]
fn concealed_kan_with_unrelated_draw_keeps_the_draw() {
    let mut m = Majsoul::seated(0);
    let hand = ["1m", "1m", "1m", "1m", "2p", "3p", "4p", "5s", "6s", "7s", "1z", "1z", "7z"];
    m.new_round(1, &hand);
    m.act("ActionDealTile", json!({"seat": 0, "tile": "9s"}));
    let out = m.act("ActionAnGangAddGang", json!({"seat": 0, "type": 3, "tiles": "1m"}));
    assert_eq!(
        out[0].body,
        EventBody::Ankan { actor: 0, consumed: vec![t("1m"); 4] }
    );
    let h = m.bridge.hand();
    assert_eq!(h.len(), 10);
    assert!(h.tiles().contains(&t("9s")));
    assert!(!h.tiles().contains(&t("1m")));
}

#[test]
fn kan_dora_is_emitted_before_the_action() {
    let mut m = Majsoul::seated(0);
    m.new_round(0, &HAND_13);
    let out = m.act("ActionDealTile", json!({"seat": 3, "tile": "", "doras": ["1z", "3m"]}));
    assert_eq!(kinds(&out), ["dora", "tsumo"]);
    assert_eq!(out[0].body, EventBody::Dora { dora_marker: t("3m") });
}

#[test]
fn sync_game_backlog_is_synthetic_except_the_last_action() {
    let mut m = Majsoul::seated(0);
    let actions = m.backlog(&[
        (
            "ActionNewRound",
            json!({
                "chang": 1,
                "ju": 2,
                "ben": 1,
                "tiles": HAND_13,
                "doras": ["2p"],
                "scores": [25000, 25000, 25000, 25000],
            }),
        ),
        ("ActionDealTile", json!({"seat": 2, "tile": ""})),
        ("ActionDiscardTile", json!({"seat": 2, "tile": "4s", "moqie": true})),
    ]);
    let out = m.respond(9, SYNC, json!({"game_restore": {"actions": actions}}));
    assert_eq!(kinds(&out), ["system_event", "start_kyoku", "tsumo", "dahai"]);
    assert_eq!(
        out[0].body,
        EventBody::SystemEvent { code: "game_syncing".into(), message: None }
    );
    let flags: Vec<bool> = out[1..].iter().map(Event::is_sync).collect();
    assert_eq!(flags, [true, true, false]);
    let EventBody::StartKyoku { bakaze, kyoku, honba, .. } = &out[1].body else {
        panic!("expected start_kyoku");
    };
    assert_eq!((*bakaze, *kyoku, *honba), (t("S"), 3, 1));
}

#[test]
fn sync_game_without_round_start_uses_snapshot() {
    let mut m = Majsoul::seated(1);
    let actions = m.backlog(&[("ActionDealTile", json!({"seat": 2, "tile": ""}))]);
    let mut hand = HAND_13.to_vec();
    hand.push("7p");
    let body = json!({"game_restore": {
        "snapshot": {
            "chang": 0, "ju": 1, "ben": 0, "liqibang": 2,
            "hands": hand, "doras": ["3s"],
            "players": [{"score": 24000}, {"score": 26000}, {"score": 25000}, {"score": 25000}],
        },
        "actions": actions,
    }});
    let out = m.respond(4, SYNC, body);
    assert_eq!(kinds(&out), ["system_event", "start_kyoku", "tsumo", "tsumo"]);
    assert!(out[1].is_sync() && out[2].is_sync());
    assert!(!out[3].is_sync());
    assert_eq!(out[2].body, EventBody::Tsumo { actor: 1, pai: t("7p") });
    let EventBody::StartKyoku { kyotaku, scores, oya, .. } = &out[1].body else {
        panic!("expected start_kyoku");
    };
    assert_eq!(*kyotaku, 2);
    assert_eq!(*oya, 1);
    assert_eq!(*scores, [24000, 26000, 25000, 25000]);
}

#[test]
fn enter_game_replay_is_entirely_synthetic() {
    let mut m = Majsoul::seated(0);
    let actions = m.backlog(&[
        (
            "ActionNewRound",
            json!({
                "chang": 0,
                "ju": 0,
                "tiles": HAND_13,
                "doras": ["2p"],
                "scores": [25000, 25000, 25000, 25000],
            }),
        ),
        ("ActionDiscardTile", json!({"seat": 0, "tile": "6z"})),
    ]);
    let out = m.respond(5, ENTER, json!({"game_restore": {"actions": actions}}));
    assert_eq!(kinds(&out), ["start_kyoku", "dahai"]);
    assert!(out.iter().all(Event::is_sync));
}

#[test]
fn pending_riichi_acceptance_survives_only_until_next_action() {
    let mut m = Majsoul::seated(0);
    m.new_round(0, &HAND_13);
    let out = m.act("ActionDiscardTile", json!({"seat": 1, "tile": "9p", "is_liqi": true}));
    assert_eq!(kinds(&out), ["reach", "dahai"]);
    let out = m.act(
        "ActionChiPengGang",
        json!({"seat": 2, "type": 1, "tiles": ["9p", "9p", "9p"], "froms": [2, 2, 1]}),
    );
    assert_eq!(kinds(&out), ["reach_accepted", "pon"]);
    let out = m.act("ActionDealTile", json!({"seat": 3, "tile": ""}));
    assert_eq!(kinds(&out), ["tsumo"]);
}

// ---------------------------------------------------------------------------
// Other platforms, raw bytes end to end
// ---------------------------------------------------------------------------

#[test]
fn tenhou_round_trip() {
    let mut b = TenhouBridge::new();
    let frames = [
        json!({"tag": "HELO", "uname": "x"}),
        json!({"tag": "UN", "n0": "a", "n1": "b", "n2": "c", "n3": "d"}),
        json!({"tag": "TAIKYOKU", "oya": "0"}),
        json!({"tag": "INIT", "seed": "4,0,1,3,2,100", "ten": "250,250,250,250", "oya": "1",
               "hai": "0,4,8,12,36,40,44,72,76,80,108,112,116"}),
        json!({"tag": "U"}),
        json!({"tag": "E120"}),
        json!({"tag": "T132"}),
        json!({"tag": "D132"}),
    ];
    let mut out = Vec::new();
    for f in &frames {
        out.extend(b.parse(f.to_string().as_bytes()).unwrap());
    }
    assert_eq!(kinds(&out), ["start_game", "start_kyoku", "tsumo", "dahai", "tsumo", "dahai"]);
    let EventBody::StartKyoku { bakaze, kyoku, oya, kyotaku, .. } = &out[1].body else {
        panic!("expected start_kyoku");
    };
    assert_eq!((*bakaze, *kyoku, *oya, *kyotaku), (t("S"), 1, 1, 1));
    assert_eq!(b.hand_indices().len(), 13);
}

#[test]
fn riichi_city_round_trip() {
    let mut b = RiichiCityBridge::new();
    let frame = |msg_type: u16, data: Value| RcFrame { msg_id: 3, msg_type, data }.encode();
    assert_eq!(b.parse(&frame(1, json!({"uid": 9}))), Some(vec![]));
    b.parse(&frame(
        2,
        json!({"cmd": "cmd_enter_room", "data": {
            "players": [
                {"user": {"user_id": 9}},
                {"user": {"user_id": 8}},
                {"user": {"user_id": 7}},
            ],
            "options": {"classify_id": 1, "player_count": 3},
        }}),
    ))
    .unwrap();
    let hand: Vec<i64> = vec![
        0x11, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x19, 0x34, 0x34, 0x34,
    ];
    let out = b
        .parse(&frame(
            2,
            json!({"cmd": "cmd_game_start", "data": {
                "quan_feng": 0x31, "bao_pai_card": 0x21, "dealer_pos": 0,
                "ben_chang_num": 0, "li_zhi_bang_num": 0,
                "user_info_list": vec![json!({"hand_points": 35000}); 3],
                "hand_cards": hand,
            }}),
        ))
        .unwrap();
    assert_eq!(kinds(&out), ["start_game", "start_kyoku", "tsumo"]);
    assert_eq!(out[2].body, EventBody::Tsumo { actor: 0, pai: t("N") });
    let EventBody::StartKyoku { scores, is_3p, .. } = &out[1].body else {
        panic!("expected start_kyoku");
    };
    assert_eq!(*scores, [35000, 35000, 35000, 0]);
    assert!(is_3p);

    let out = b
        .parse(&frame(
            2,
            json!({"cmd": "cmd_game_action_brc", "data": {"action_info": [
                {"action": 10, "user_id": 9, "card": 0x34},
            ]}}),
        ))
        .unwrap();
    assert_eq!(out[0].body, EventBody::Nukidora { actor: 0, pai: t("N") });
    // the extracted North was the pending draw
    assert_eq!(b.hand().len(), 13);
    assert!(b.hand().tsumo().is_none());
    assert!(b.parse(b"\x00\x00\x00\x02").is_none());
}

#[test]
fn amatsuki_round_trip() {
    let mut b = AmatsukiBridge::new();
    let send = |b: &mut AmatsukiBridge, dest: &str, body: Value| {
        b.parse(&StompFrame::message(dest, &body).encode()).unwrap()
    };
    send(
        &mut b,
        "/user/topic/callback/joinDesk",
        json!({"status": 0, "errorCode": 0, "gameType": 0, "gameMode": 0, "deskId": 77}),
    );
    assert_eq!(b.desk_id(), Some("77"));
    let hidden = json!({"tehai": {"hand": vec![json!({"id": -1}); 13]}});
    let own = json!({
        "tehai": {"hand": (0..13).map(|i| json!({"id": i * 4 + 1})).collect::<Vec<_>>()},
    });
    let out = send(
        &mut b,
        "/user/topic/desk/roundStart/77",
        json!({"bakaze": 0, "honba": 0, "oya": 0, "playerPoints": [25000, 25000, 25000, 25000],
               "playerTiles": [own, hidden.clone(), hidden.clone(), hidden]}),
    );
    assert_eq!(kinds(&out), ["start_game"]);
    let out = send(
        &mut b,
        "/topic/desk/syncDora/77",
        json!({"dora": [{"id": 16}], "reachCount": 0}),
    );
    assert_eq!(kinds(&out), ["start_kyoku"]);
    let out = send(&mut b, "/user/topic/desk/gameEnd/77", json!({}));
    assert_eq!(kinds(&out), ["end_game"]);
    assert!(b.game_ended());
}

#[test]
fn riichi_city_hand_is_conserved_through_calls() {
    let mut b = RiichiCityBridge::new();
    let frame = |msg_type: u16, data: Value| RcFrame { msg_id: 1, msg_type, data }.encode();
    let cmd = |b: &mut RiichiCityBridge, name: &str, data: Value| {
        b.parse(&frame(2, json!({"cmd": name, "data": data}))).unwrap()
    };
    let act = |b: &mut RiichiCityBridge, info: Value| {
        cmd(b, "cmd_game_action_brc", json!({"action_info": [info]}))
    };
    // concealed tiles, one pending draw, three per called set
    let held = |b: &RiichiCityBridge| {
        b.hand().effective_len() + usize::from(b.hand().tsumo().is_some())
    };

    b.parse(&frame(1, json!({"uid": 9}))).unwrap();
    cmd(
        &mut b,
        "cmd_enter_room",
        json!({"players": [{"user": {"user_id": 9}}, {"user": {"user_id": 8}},
                           {"user": {"user_id": 7}}, {"user": {"user_id": 6}}],
               "options": {"classify_id": 2, "player_count": 4}}),
    );
    // dealer is user 8, so the seats are 8, 7, 6, us
    let hand: Vec<i64> = vec![
        0x01, 0x01, 0x02, 0x03, 0x14, 0x15, 0x16, 0x27, 0x28, 0x29, 0x31, 0x31, 0x33,
    ];
    cmd(
        &mut b,
        "cmd_game_start",
        json!({"quan_feng": 0x31, "bao_pai_card": 0x21, "dealer_pos": 1, "hand_cards": hand}),
    );
    assert_eq!(b.seat(), Some(3));
    assert_eq!(held(&b), 13);

    cmd(&mut b, "cmd_in_card_brc", json!({"user_id": 9, "card": 0x19}));
    assert_eq!(held(&b), 14);
    act(&mut b, json!({"action": 9, "user_id": 9, "card": 0x19, "move_cards_pos": [14]}));
    assert_eq!(held(&b), 13);

    act(&mut b, json!({"action": 9, "user_id": 8, "card": 0x31, "move_cards_pos": [3]}));
    let out = act(
        &mut b,
        json!({"action": 5, "user_id": 9, "card": 0x31, "group_cards": [0x31, 0x31]}),
    );
    assert_eq!(kinds(&out), ["pon"]);
    assert_eq!((b.hand().len(), b.hand().melds()), (11, 1));
    assert_eq!(held(&b), 14);
    act(&mut b, json!({"action": 9, "user_id": 9, "card": 0x33, "move_cards_pos": [10]}));
    assert_eq!(held(&b), 13);

    act(&mut b, json!({"action": 9, "user_id": 6, "card": 0x04, "move_cards_pos": [2]}));
    let out = act(
        &mut b,
        json!({"action": 2, "user_id": 9, "card": 0x04, "group_cards": [0x02, 0x03]}),
    );
    assert_eq!(
        out[0].body,
        EventBody::Chi { actor: 3, target: 2, pai: t("4m"), consumed: vec![t("2m"), t("3m")] }
    );
    assert_eq!(held(&b), 14);
    act(&mut b, json!({"action": 9, "user_id": 9, "card": 0x01, "move_cards_pos": [0]}));
    assert_eq!((b.hand().len(), b.hand().melds()), (7, 2));
    assert_eq!(held(&b), 13);

    // a draw that is not cut is folded back by the next discard from hand
    cmd(&mut b, "cmd_in_card_brc", json!({"user_id": 9, "card": 0x17}));
    act(&mut b, json!({"action": 9, "user_id": 9, "card": 0x01, "move_cards_pos": [0]}));
    assert_eq!(held(&b), 13);
    assert!(b.hand().tiles().contains(&t("7p")));
}

#[test]
fn amatsuki_hand_is_conserved_through_calls() {
    let mut b = AmatsukiBridge::new();
    let send = |b: &mut AmatsukiBridge, dest: &str, body: Value| {
        b.parse(&StompFrame::message(dest, &body).encode()).unwrap()
    };
    let kiri = |b: &mut AmatsukiBridge, position: u8, id: i64| {
        send(
            b,
            "/topic/desk/tehaiAction/3",
            json!({
                "action": "KIRI",
                "haiList": [{"id": id}],
                "isKiri": false,
                "position": position,
            }),
        )
    };
    let call = |b: &mut AmatsukiBridge, action: &str, ids: &[i64]| {
        let menzu: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        send(
            b,
            "/topic/desk/riverAction/3",
            json!({"action": action, "menzu": {"menzuList": menzu}, "position": 0}),
        )
    };
    let mut calls = 0;
    let held = |b: &AmatsukiBridge, calls: usize| b.hand_ids().len() + 3 * calls;

    send(
        &mut b,
        "/user/topic/callback/joinDesk",
        json!({"status": 0, "errorCode": 0, "gameType": 0, "gameMode": 0, "deskId": 3}),
    );
    // 1m 1m 2m 3m 4m 6m 7m 8m 9m E E S S, seat 0
    let ids = [0, 1, 4, 8, 12, 20, 24, 28, 32, 108, 109, 112, 113];
    let own = json!({"tehai": {"hand": ids.iter().map(|i| json!({"id": i})).collect::<Vec<_>>()}});
    let hidden = json!({"tehai": {"hand": vec![json!({"id": -1}); 13]}});
    send(
        &mut b,
        "/user/topic/desk/roundStart/3",
        json!({"bakaze": 0, "honba": 0, "oya": 0, "playerPoints": [25000, 25000, 25000, 25000],
               "playerTiles": [own, hidden.clone(), hidden.clone(), hidden]}),
    );
    send(&mut b, "/topic/desk/syncDora/3", json!({"dora": [{"id": 60}], "reachCount": 0}));
    assert_eq!(held(&b, calls), 13);

    send(&mut b, "/user/topic/desk/draw/3", json!({"hai": {"id": 100}, "position": 0}));
    assert_eq!(held(&b, calls), 14);
    kiri(&mut b, 0, 100);
    assert_eq!(held(&b, calls), 13);

    kiri(&mut b, 2, 110);
    let out = call(&mut b, "PON", &[110, 108, 109]);
    calls += 1;
    assert_eq!(
        out[0].body,
        EventBody::Pon { actor: 0, target: 2, pai: t("E"), consumed: vec![t("E"), t("E")] }
    );
    assert_eq!(held(&b, calls), 14);
    kiri(&mut b, 0, 112);
    assert_eq!(held(&b, calls), 13);

    kiri(&mut b, 3, 17);
    let out = call(&mut b, "CHII", &[17, 12, 20]);
    calls += 1;
    assert_eq!(kinds(&out), ["chi"]);
    assert_eq!(held(&b, calls), 14);
    kiri(&mut b, 0, 113);
    assert_eq!(held(&b, calls), 13);
    assert_eq!(b.hand_ids(), [0, 1, 4, 8, 24, 28, 32]);
}

//! Recommendation payload for the delivery side.
//!
//! The engine's scores for the legal actions are turned into confidences
//! with a tempered softmax, the top three are kept, and call actions are
//! expanded into one entry per concrete way to perform them.

use kawa_core::Tile;
use serde::Serialize;

use crate::action::{bits_to_mask, Variant};
use crate::engine::EngineKind;
use crate::response::{Meta, Response};
use crate::tracker::{CallOption, StateTracker};

const TOP_N: usize = 3;

/// Actions still worth showing once the seat is locked in riichi.
const AFTER_RIICHI: [&str; 5] = ["kan", "tsumo", "ron", "ryukyoku", "nukidora"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<Tile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed: Option<Vec<Tile>>,
}

impl Recommendation {
    fn new(action: &str, confidence: f32) -> Self {
        Self {
            action: action.to_owned(),
            confidence,
            tile: None,
            consumed: None,
        }
    }

    fn with_call(&self, option: CallOption) -> Self {
        Self {
            tile: Some(option.pai),
            consumed: Some(option.consumed),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationPayload {
    pub recommendations: Vec<Recommendation>,
    pub engine_type: EngineKind,
    pub is_fallback: bool,
    pub circuit_open: bool,
}

/// Numerically stable softmax of `q / temperature`.
pub fn softmax(q: &[f32], temperature: f32) -> Vec<f32> {
    if q.is_empty() {
        return Vec::new();
    }
    let t = if temperature > 0.0 { temperature } else { 1.0 };
    let scaled: Vec<f32> = q.iter().map(|&v| v / t).collect();
    let max = scaled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scaled.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Legal action labels with their confidence, best first.
///
/// `q_values` may cover the whole action space or only the legal actions
/// in index order; the mask bits tell which.
pub fn meta_to_recommend(
    meta: &Meta,
    variant: Variant,
    temperature: f32,
) -> Vec<(&'static str, f32)> {
    let labels = variant.labels();
    let mask = bits_to_mask(meta.mask_bits, labels.len());
    let probs = softmax(&meta.q_values, temperature);
    let full_space = meta.q_values.len() == labels.len();

    let mut compact = probs.iter().copied();
    let mut out: Vec<(&'static str, f32)> = labels
        .iter()
        .zip(mask)
        .enumerate()
        .filter(|(_, (_, legal))| *legal)
        .filter_map(|(i, (&label, _))| {
            let p = if full_space { probs.get(i).copied() } else { compact.next() };
            p.map(|p| (label, p))
        })
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out
}

/// Builds the payload for an action response. `None` when the response
/// carries no engine scores.
pub fn build_payload(response: &Response, tracker: &StateTracker) -> Option<RecommendationPayload> {
    let meta = response.meta.as_ref()?;
    let variant = tracker.variant();

    let mut recommendations = Vec::new();
    for (label, confidence) in meta_to_recommend(meta, variant, tracker.temperature())
        .into_iter()
        .take(TOP_N)
    {
        let label = if label == "kan_select" { "kan" } else { label };
        let name = if label.starts_with("chi_") { "chi" } else { label };
        let base = Recommendation::new(name, confidence);

        let details = call_details(label, variant, tracker);
        if !details.is_empty() {
            recommendations.extend(details.into_iter().map(|d| base.with_call(d)));
            continue;
        }
        recommendations.push(match label {
            "hora" => hora(base, tracker),
            "nukidora" => Recommendation {
                tile: Some(Tile::NORTH),
                ..base
            },
            "pon" => match tracker.last_kawa_tile() {
                Some(pai) => Recommendation {
                    tile: Some(pai),
                    consumed: Some(Vec::new()),
                    ..base
                },
                None => base,
            },
            _ => base,
        });
    }

    if tracker.self_riichi_accepted() {
        recommendations.retain(|r| AFTER_RIICHI.contains(&r.action.as_str()));
    }
    if !recommendations.is_empty() {
        log::debug!("recommendations: {recommendations:?}");
    }

    Some(RecommendationPayload {
        recommendations,
        engine_type: meta.engine_type,
        is_fallback: meta.is_fallback,
        circuit_open: meta.circuit_open,
    })
}

fn call_details(label: &str, variant: Variant, tracker: &StateTracker) -> Vec<CallOption> {
    match label {
        "chi_low" | "chi_mid" | "chi_high" => {
            let kind = variant
                .labels()
                .iter()
                .position(|&l| l == label)
                .and_then(|i| variant.kind_at(i));
            kind.map(|k| tracker.chi_options(k)).unwrap_or_default()
        }
        "pon" => tracker.pon_options().into_iter().take(1).collect(),
        "kan" => {
            let open = tracker.daiminkan_options();
            if !open.is_empty() {
                return open;
            }
            let mut out = tracker.ankan_options();
            out.extend(tracker.kakan_options());
            out
        }
        _ => Vec::new(),
    }
}

fn hora(base: Recommendation, tracker: &StateTracker) -> Recommendation {
    if tracker.can_tsumo_agari() {
        let tile = tracker
            .last_self_tsumo()
            .or_else(|| tracker.state().tehai_tiles().last().copied());
        Recommendation {
            action: "tsumo".to_owned(),
            tile,
            ..base
        }
    } else {
        Recommendation {
            action: "ron".to_owned(),
            tile: tracker.last_kawa_tile(),
            ..base
        }
    }
}

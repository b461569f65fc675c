//! Local decision engine backed by an ONNX model run through tract.
//!
//! Model contract: input `[1, C, 34]` f32 observation planes, output
//! `[1, A]` f32 q-values over the variant's action space. The action is
//! the argmax over legal entries.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tract_onnx::prelude::*;

use super::{argmax_legal, sync_result, Engine, EngineError, EngineKind, InferenceResult};
use crate::encoder::NUM_TILES;

type TypedRunnableModel<F> = SimplePlan<F, Box<dyn TypedOp>, Graph<F, Box<dyn TypedOp>>>;

pub struct OnnxEngine {
    model: Arc<TypedRunnableModel<TypedFact>>,
    obs_channels: usize,
    action_space: usize,
    sync: bool,
}

impl OnnxEngine {
    /// Loads and optimizes the model. Fails if the file is missing or the
    /// graph does not accept `[1, obs_channels, 34]`.
    pub fn load(onnx_path: &Path, obs_channels: usize, action_space: usize) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(onnx_path)
            .with_context(|| format!("failed to load ONNX model from {}", onnx_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec![
                        TDim::from(1),
                        TDim::from(obs_channels as i64),
                        TDim::from(NUM_TILES as i64),
                    ],
                ),
            )?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to make ONNX model runnable")?;

        log::info!(
            "loaded local model {} ({obs_channels}x34 -> {action_space})",
            onnx_path.display()
        );
        Ok(Self {
            model: Arc::new(model),
            obs_channels,
            action_space,
            sync: false,
        })
    }

    fn q_values(&self, obs: &[f32]) -> Result<Vec<f32>> {
        anyhow::ensure!(
            obs.len() == self.obs_channels * NUM_TILES,
            "expected {} observation values, got {}",
            self.obs_channels * NUM_TILES,
            obs.len(),
        );
        let shape = (1, self.obs_channels, NUM_TILES);
        let input = tract_ndarray::Array3::from_shape_vec(shape, obs.to_vec())
            .context("failed to create input tensor")?;
        let result = self
            .model
            .run(tvec![input.into_tvalue()])
            .context("inference failed")?;
        let output = result[0]
            .to_array_view::<f32>()
            .context("failed to extract q-values")?;
        let q: Vec<f32> = output.iter().copied().collect();
        anyhow::ensure!(
            q.len() == self.action_space,
            "model produced {} q-values, expected {}",
            q.len(),
            self.action_space,
        );
        Ok(q)
    }
}

impl Engine for OnnxEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Local
    }

    fn react_batch(
        &mut self,
        obs: &[Vec<f32>],
        masks: &[Vec<bool>],
    ) -> Result<InferenceResult, EngineError> {
        if obs.len() != masks.len() {
            return Err(EngineError::Shape(format!(
                "{} observations for {} masks",
                obs.len(),
                masks.len()
            )));
        }
        if self.sync {
            return Ok(sync_result(masks));
        }
        let mut out = InferenceResult::default();
        for (o, mask) in obs.iter().zip(masks) {
            let q = self.q_values(o).map_err(|e| EngineError::Inference(format!("{e:#}")))?;
            let action = argmax_legal(&q, mask)
                .ok_or_else(|| EngineError::Inference("no legal action in mask".to_owned()))?;
            out.actions.push(action);
            out.q_out.push(q);
            out.masks.push(mask.clone());
            out.is_greedy.push(true);
        }
        Ok(out)
    }

    fn set_sync_mode(&mut self, on: bool) {
        self.sync = on;
    }
}

//! Engine Provider: remote first, local fallback, breaker in between.

use anyhow::Result;
use serde::Serialize;

use super::breaker::CircuitBreaker;
use super::{
    sync_result, Engine, EngineError, EngineKind, InferenceResult, OnnxEngine, RemoteEngine,
};
use crate::action::Variant;
use crate::config::Settings;
use crate::encoder::NUM_CHANNELS;

/// Diagnostics raised since the last [`EngineProvider::take_flags`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineFlags {
    pub fallback_used: bool,
    pub circuit_open: bool,
    pub circuit_restored: bool,
}

impl EngineFlags {
    pub fn merge(&mut self, other: EngineFlags) {
        self.fallback_used |= other.fallback_used;
        self.circuit_open |= other.circuit_open;
        self.circuit_restored |= other.circuit_restored;
    }

    pub fn any(&self) -> bool {
        self.fallback_used || self.circuit_open || self.circuit_restored
    }
}

pub struct EngineProvider {
    variant: Variant,
    online: Option<Box<dyn Engine>>,
    local: Box<dyn Engine>,
    breaker: CircuitBreaker,
    active: EngineKind,
    flags: EngineFlags,
    sync: bool,
}

impl EngineProvider {
    pub fn new(
        variant: Variant,
        local: Box<dyn Engine>,
        online: Option<Box<dyn Engine>>,
        breaker: CircuitBreaker,
    ) -> Self {
        let active = if online.is_some() { EngineKind::Online } else { EngineKind::Local };
        Self {
            variant,
            online,
            local,
            breaker,
            active,
            flags: EngineFlags::default(),
            sync: false,
        }
    }

    pub fn local_only(variant: Variant, local: Box<dyn Engine>) -> Self {
        Self::new(variant, local, None, CircuitBreaker::with_defaults())
    }

    /// Serves one batch. Remote failures never surface here: they feed the
    /// breaker and the call falls through to the local engine.
    pub fn react_batch(
        &mut self,
        obs: &[Vec<f32>],
        masks: &[Vec<bool>],
    ) -> Result<InferenceResult, EngineError> {
        if self.sync {
            return Ok(sync_result(masks));
        }
        if let Some(online) = self.online.as_mut() {
            if self.breaker.allow() {
                match online.react_batch(obs, masks) {
                    Ok(result) => {
                        self.breaker.record_success();
                        self.flags.circuit_restored |= self.breaker.take_restored();
                        self.active = EngineKind::Online;
                        return Ok(result);
                    }
                    Err(e) => {
                        log::warn!("remote engine failed: {e}");
                        self.breaker.record_failure();
                    }
                }
            }
            self.flags.fallback_used = true;
            self.flags.circuit_open |= self.breaker.is_open();
        }
        self.active = EngineKind::Local;
        self.local.react_batch(obs, masks)
    }

    pub fn set_sync_mode(&mut self, on: bool) {
        self.sync = on;
        self.local.set_sync_mode(on);
        if let Some(online) = self.online.as_mut() {
            online.set_sync_mode(on);
        }
    }

    pub fn take_flags(&mut self) -> EngineFlags {
        std::mem::take(&mut self.flags)
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Engine that served the most recent call.
    pub fn active(&self) -> EngineKind {
        self.active
    }

    pub fn has_online(&self) -> bool {
        self.online.is_some()
    }

    pub fn is_fallback(&self) -> bool {
        self.online.is_some() && self.active == EngineKind::Local
    }

    pub fn circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// Builds a provider for a variant. The controller calls this on every
/// game start and variant switch.
pub trait EngineFactory: Send {
    fn build(&self, variant: Variant) -> Result<EngineProvider>;
}

/// Production factory: ONNX model from `model_config`, remote engine when
/// `ot.online` is set.
pub struct SettingsFactory {
    settings: Settings,
}

impl SettingsFactory {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for SettingsFactory {
    fn build(&self, variant: Variant) -> Result<EngineProvider> {
        let path = self.settings.model_config.model_path(variant.is_3p());
        let local = OnnxEngine::load(&path, NUM_CHANNELS, variant.action_space())?;
        let ot = &self.settings.ot;
        let online: Option<Box<dyn Engine>> = ot.enabled().then(|| {
            Box::new(RemoteEngine::new(&ot.server, &ot.api_key, variant)) as Box<dyn Engine>
        });
        let breaker = CircuitBreaker::with_defaults();
        Ok(EngineProvider::new(variant, Box::new(local), online, breaker))
    }
}

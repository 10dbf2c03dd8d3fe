//! Single-image inference on the `cnn_top` core
//!
//! [`InferenceEngine`] owns the register bus and sequences one run:
//!
//! ```text
//! image ─▶ image BRAM ─▶ ap_start ─▶ spin on ap_done ─▶ out_model ─▶ decode ─▶ round ─▶ label
//! ```
//!
//! Weights are staged once with [`InferenceEngine::load_weights`] before the
//! first image. Every method takes `&mut self`, so two runs can never
//! interleave on the same bus.

use crate::backend::RegisterBus;
use crate::config::EngineConfig;
use crate::controller::{AcceleratorController, ControllerState};
use crate::error::{HlsCnnError, Result};
use crate::fixed::Fixed;
use crate::staging::StagingBuffer;
use crate::vectors::{ImageVector, WeightVector};
use hlscnn_chip::layout::NUM_CLASSES;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Round a decoded score to the nearest class label (halves away from zero).
///
/// No clamping: a score outside the class range yields a label outside it.
/// Scores beyond `i32` saturate.
#[allow(clippy::cast_possible_truncation)]
pub fn label_from_output(output: f64) -> i32 {
    output.round() as i32
}

/// Outcome of one run with timing
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Predicted class label
    pub label: i32,

    /// Decoded `out_model`
    pub output: f64,

    /// `out_model` as read
    pub raw: Fixed,

    /// Control register reads until done
    pub polls: u64,

    /// Time spent staging the image
    pub image_transfer: Duration,

    /// Staging, start, poll and read together
    pub total_duration: Duration,
}

impl InferenceResult {
    /// Inferences per second at this latency
    pub fn throughput_ips(&self) -> f64 {
        if self.total_duration.as_secs_f64() == 0.0 {
            return 0.0;
        }
        1.0 / self.total_duration.as_secs_f64()
    }

    /// Latency in microseconds
    pub fn latency_us(&self) -> f64 {
        self.total_duration.as_secs_f64() * 1_000_000.0
    }

    /// Whether the label names one of the network's classes.
    pub fn in_class_range(&self) -> bool {
        usize::try_from(self.label).is_ok_and(|l| l < NUM_CLASSES)
    }
}

/// Classifier bound to one register bus
#[derive(Debug)]
pub struct InferenceEngine<B: RegisterBus> {
    bus: B,
    config: EngineConfig,
    controller: AcceleratorController,
    image_buffer: StagingBuffer,
    weight_buffer: StagingBuffer,
    weights_loaded: bool,
}

impl<B: RegisterBus> InferenceEngine<B> {
    /// Bind an engine to `bus`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the memory map is inconsistent.
    pub fn new(bus: B, config: EngineConfig) -> Result<Self> {
        config.memory_map.validate()?;
        let map = config.memory_map;
        info!(
            "Inference engine on {} bus (poll policy {:?})",
            bus.kind(),
            config.poll_policy
        );

        Ok(Self {
            controller: AcceleratorController::new(&map, config.poll_policy),
            image_buffer: StagingBuffer::image(&map),
            weight_buffer: StagingBuffer::weights(&map),
            weights_loaded: false,
            bus,
            config,
        })
    }

    /// Stage the network parameters. Allowed exactly once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if weights were already loaded; propagates bus
    /// errors (the engine then stays unloaded).
    pub fn load_weights(&mut self, weights: &WeightVector) -> Result<()> {
        if self.weights_loaded {
            return Err(HlsCnnError::invalid_state(
                "weights are already loaded and immutable for this session",
            ));
        }
        let start = Instant::now();
        self.weight_buffer.write_sequential(&mut self.bus, weights)?;
        self.weights_loaded = true;
        info!("Loaded {} weights in {:?}", weights.len(), start.elapsed());
        Ok(())
    }

    /// Run one image through the core.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` before weights are loaded or while a previous
    /// run was abandoned mid-flight, `AcceleratorNonResponsive` under a
    /// bounded poll policy, and propagates bus errors.
    pub fn infer(&mut self, image: &ImageVector) -> Result<InferenceResult> {
        if !self.weights_loaded {
            return Err(HlsCnnError::invalid_state("classify called before load_weights"));
        }

        let start = Instant::now();
        self.image_buffer.write_sequential(&mut self.bus, image)?;
        let image_transfer = start.elapsed();

        self.controller.start(&mut self.bus)?;
        let polls = match self.controller.poll_until_done(&mut self.bus) {
            Ok(polls) => polls,
            Err(e) => {
                // The next start is the caller's call; don't leave the engine wedged
                self.controller.abandon();
                return Err(e);
            }
        };
        let raw = self.controller.read_output(&mut self.bus)?;
        let total_duration = start.elapsed();

        let output = raw.to_f64();
        let result = InferenceResult {
            label: label_from_output(output),
            output,
            raw,
            polls,
            image_transfer,
            total_duration,
        };

        if !result.in_class_range() {
            warn!(
                "Label {} outside 0..{NUM_CLASSES} (output {output})",
                result.label
            );
        }
        debug!(
            "Inference: label {} (output {output:.5}, {polls} polls, {:?})",
            result.label, total_duration
        );
        Ok(result)
    }

    /// Classify one image and return only the label.
    ///
    /// # Errors
    ///
    /// Same as [`infer`](Self::infer).
    pub fn classify(&mut self, image: &ImageVector) -> Result<i32> {
        self.infer(image).map(|r| r.label)
    }

    /// Whether weights have been staged.
    pub const fn weights_loaded(&self) -> bool {
        self.weights_loaded
    }

    /// Controller handshake state.
    pub const fn controller_state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Active configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying bus.
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying bus, mutably. Writes made here bypass the engine's sequencing.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Release the bus.
    pub fn into_bus(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SimulatedCore;
    use crate::config::{MemoryMap, PollPolicy};

    fn weights() -> WeightVector {
        WeightVector::new(vec![Fixed::from_raw(1); 5738]).unwrap()
    }

    fn image() -> ImageVector {
        ImageVector::new(vec![Fixed::ONE; 784]).unwrap()
    }

    fn engine(core: SimulatedCore) -> InferenceEngine<SimulatedCore> {
        InferenceEngine::new(core, EngineConfig::new()).unwrap()
    }

    #[test]
    fn output_three_is_label_three() {
        let mut engine = engine(SimulatedCore::constant(3.0));
        engine.load_weights(&weights()).unwrap();
        assert_eq!(engine.classify(&image()).unwrap(), 3);
        assert_eq!(engine.controller_state(), ControllerState::Idle);
    }

    #[test]
    fn rounding_is_to_nearest() {
        assert_eq!(label_from_output(2.49), 2);
        assert_eq!(label_from_output(2.5), 3);
        assert_eq!(label_from_output(6.51), 7);
        assert_eq!(label_from_output(-0.4), 0);
        assert_eq!(label_from_output(-1.5), -2);
    }

    #[test]
    fn out_of_range_label_is_not_clamped() {
        let mut engine = engine(SimulatedCore::constant(12.2));
        engine.load_weights(&weights()).unwrap();
        let result = engine.infer(&image()).unwrap();
        assert_eq!(result.label, 12);
        assert!(!result.in_class_range());
    }

    #[test]
    fn classify_before_weights_is_rejected() {
        let mut engine = engine(SimulatedCore::constant(1.0));
        let err = engine.classify(&image()).unwrap_err();
        assert!(matches!(err, HlsCnnError::InvalidState { .. }));
        assert_eq!(engine.bus().runs(), 0);
    }

    #[test]
    fn weights_load_only_once() {
        let mut engine = engine(SimulatedCore::constant(1.0));
        engine.load_weights(&weights()).unwrap();
        assert!(engine.weights_loaded());
        assert!(engine.load_weights(&weights()).is_err());
    }

    #[test]
    fn staged_data_reaches_the_core() {
        let mut engine = engine(SimulatedCore::constant(0.0));
        engine.load_weights(&weights()).unwrap();
        engine.classify(&image()).unwrap();
        assert!(engine.bus().weights().iter().all(|w| w.raw() == 1));
        assert!(engine.bus().image().iter().all(|p| *p == Fixed::ONE));
    }

    #[test]
    fn result_carries_poll_count_and_raw_word() {
        let mut engine = engine(SimulatedCore::constant(4.0).with_done_after(3));
        engine.load_weights(&weights()).unwrap();
        let result = engine.infer(&image()).unwrap();
        assert_eq!(result.polls, 3);
        assert_eq!(result.raw, Fixed::from_raw(4 << 16));
        assert!(result.latency_us() >= 0.0);
    }

    #[test]
    fn non_responsive_core_leaves_engine_usable() {
        let config = EngineConfig::new().with_poll_policy(PollPolicy::MaxPolls(10));
        let mut engine = InferenceEngine::new(SimulatedCore::constant(0.0).never_done(), config).unwrap();
        engine.load_weights(&weights()).unwrap();

        let err = engine.classify(&image()).unwrap_err();
        assert!(matches!(err, HlsCnnError::AcceleratorNonResponsive { polls: 10, .. }));
        assert_eq!(engine.controller_state(), ControllerState::Idle);
    }

    /// Fails the first `out_model` read, then behaves normally.
    #[derive(Debug)]
    struct FlakyOutput {
        core: SimulatedCore,
        failures_left: u32,
    }

    impl RegisterBus for FlakyOutput {
        fn read_word(&mut self, address: u64) -> Result<u32> {
            if address == MemoryMap::default().output_register() && self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(HlsCnnError::out_of_bounds(address, "flaky output"));
            }
            self.core.read_word(address)
        }

        fn write_word(&mut self, address: u64, value: u32) -> Result<()> {
            self.core.write_word(address, value)
        }

        fn kind(&self) -> crate::backend::BusKind {
            self.core.kind()
        }
    }

    #[test]
    fn engine_recovers_after_failed_output_read() {
        let bus = FlakyOutput {
            core: SimulatedCore::constant(5.0),
            failures_left: 1,
        };
        let mut engine = InferenceEngine::new(bus, EngineConfig::new()).unwrap();
        engine.load_weights(&weights()).unwrap();

        let err = engine.classify(&image()).unwrap_err();
        assert!(matches!(err, HlsCnnError::OutOfBounds { .. }));
        assert_eq!(engine.controller_state(), ControllerState::Idle);

        assert_eq!(engine.classify(&image()).unwrap(), 5);
        assert_eq!(engine.classify(&image()).unwrap(), 5);
    }

    #[test]
    fn invalid_memory_map_is_rejected() {
        let mut config = EngineConfig::new();
        config.memory_map.element_stride = 0;
        assert!(InferenceEngine::new(SimulatedCore::constant(0.0), config).is_err());
    }
}

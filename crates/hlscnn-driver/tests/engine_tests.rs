//! End-to-end tests: engine and harness on the simulated core
//!
//! The hardware test at the bottom is ignored by default; run it on the
//! board as root with `--ignored`.

use hlscnn_driver::{
    DevMemBus, EngineConfig, EvaluationHarness, Fixed, HlsCnnError, ImageVector, InferenceEngine,
    MemoryMap, PollPolicy, SimulatedCore, TestCase, WeightVector,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hlscnn_driver=debug")
        .with_test_writer()
        .try_init();
}

fn weights() -> WeightVector {
    let reals: Vec<f64> = (0..WeightVector::LEN)
        .map(|i| (i % 17) as f64 * 0.0625 - 0.5)
        .collect();
    WeightVector::from_reals(&reals).unwrap()
}

/// Image whose first pixel carries `digit` and second pixel a "corrupt" flag.
fn image(digit: i32, corrupt: bool) -> ImageVector {
    let mut pixels = vec![Fixed::ZERO; ImageVector::LEN];
    pixels[0] = Fixed::from_f64(f64::from(digit));
    pixels[1] = if corrupt { Fixed::ONE } else { Fixed::ZERO };
    ImageVector::new(pixels).unwrap()
}

/// Core that reads the digit back out of the staged image, off by one when
/// the corrupt flag is set.
fn echo_core() -> SimulatedCore {
    SimulatedCore::new(
        MemoryMap::default(),
        Box::new(|_weights: &[Fixed], image: &[Fixed]| {
            let digit = image[0].to_f64();
            if image[1] == Fixed::ONE {
                digit + 1.0
            } else {
                digit
            }
        }),
    )
}

fn loaded(core: SimulatedCore, config: EngineConfig) -> InferenceEngine<SimulatedCore> {
    let mut engine = InferenceEngine::new(core, config).unwrap();
    engine.load_weights(&weights()).unwrap();
    engine
}

#[test]
fn full_size_vectors_classify_to_three() {
    init_logging();
    let mut engine = loaded(SimulatedCore::constant(3.0), EngineConfig::new());

    let label = engine.classify(&image(0, false)).unwrap();

    assert_eq!(label, 3);
    assert_eq!(engine.bus().runs(), 1);
    assert_eq!(engine.bus().control_reads(), 1);
}

#[test]
fn seven_correct_three_wrong_is_seventy_percent() {
    init_logging();
    let mut engine = loaded(echo_core(), EngineConfig::new());
    let cases: Vec<TestCase> = (0..10)
        .map(|i| TestCase::new(image(i, i >= 7), i))
        .collect();

    let report = EvaluationHarness::new(&mut engine).evaluate(&cases).unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.correct, 7);
    assert_eq!(report.accuracy_percent(), Some(70.0));
    let failed: Vec<usize> = report.failures().map(|o| o.index).collect();
    assert_eq!(failed, vec![7, 8, 9]);
    assert_eq!(report.outcomes[8].predicted, 9);
}

#[test]
fn evaluation_is_repeatable() {
    let mut engine = loaded(echo_core(), EngineConfig::new());
    let cases: Vec<TestCase> = (0..6)
        .map(|i| TestCase::new(image(i, i % 2 == 1), i))
        .collect();

    let mut harness = EvaluationHarness::new(&mut engine);
    let first = harness.evaluate(&cases).unwrap();
    let second = harness.evaluate(&cases).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.correct, 3);
}

#[test]
fn empty_test_set_reports_no_data() {
    let mut engine = loaded(echo_core(), EngineConfig::new());
    let report = EvaluationHarness::new(&mut engine).evaluate(&[]).unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.accuracy_percent(), None);
    assert_eq!(engine.bus().runs(), 0);
}

#[test]
fn bus_traffic_follows_the_load_start_sequence() {
    let map = MemoryMap::default();
    let mut engine = loaded(SimulatedCore::constant(1.0).with_write_log(), EngineConfig::new());

    let weight_writes: Vec<u64> = engine.bus().write_log().iter().map(|(a, _)| *a).collect();
    let expected: Vec<u64> = (0..WeightVector::LEN as u64)
        .map(|i| map.weights_base + i)
        .collect();
    assert_eq!(weight_writes, expected);

    engine.bus_mut().clear_write_log();
    engine.classify(&image(5, false)).unwrap();

    let log = engine.bus().write_log();
    assert_eq!(log.len(), ImageVector::LEN + 1);
    for (i, (address, _)) in log[..ImageVector::LEN].iter().enumerate() {
        assert_eq!(*address, map.image_base + i as u64);
    }
    // ap_start comes last, after every pixel
    assert_eq!(log[ImageVector::LEN], (map.control_register(), 0x1));
}

#[test]
fn weights_are_not_restaged_per_image() {
    let mut engine = loaded(SimulatedCore::constant(2.0).with_write_log(), EngineConfig::new());
    engine.bus_mut().clear_write_log();

    for _ in 0..3 {
        engine.classify(&image(2, false)).unwrap();
    }

    let map = MemoryMap::default();
    let touched_weights = engine
        .bus()
        .write_log()
        .iter()
        .any(|(a, _)| (map.weights_base..map.weights_base + 0x8000).contains(a));
    assert!(!touched_weights);
    assert_eq!(engine.bus().runs(), 3);
}

#[test]
fn word_stride_layout_runs_end_to_end() {
    let map = MemoryMap {
        element_stride: 4,
        ..MemoryMap::default()
    };
    let config = EngineConfig::new().with_memory_map(map);
    let core = echo_core().with_memory_map(map);
    let mut engine = loaded(core, config);

    assert_eq!(engine.classify(&image(6, false)).unwrap(), 6);
    assert_eq!(engine.bus().image()[0], Fixed::from_f64(6.0));
}

#[test]
fn slow_core_is_waited_for() {
    let mut engine = loaded(
        SimulatedCore::constant(8.0).with_done_after(1_000),
        EngineConfig::new(),
    );
    let result = engine.infer(&image(8, false)).unwrap();
    assert_eq!(result.label, 8);
    assert_eq!(result.polls, 1_000);
}

#[test]
fn bounded_poll_surfaces_non_responsive_core() {
    let config = EngineConfig::new().with_poll_policy(PollPolicy::MaxPolls(500));
    let mut engine = loaded(SimulatedCore::constant(0.0).never_done(), config);

    let cases = vec![TestCase::new(image(0, false), 0)];
    let err = EvaluationHarness::new(&mut engine)
        .evaluate(&cases)
        .unwrap_err();

    assert!(matches!(
        err,
        HlsCnnError::AcceleratorNonResponsive { polls: 500, .. }
    ));
}

#[test]
fn missing_device_is_unavailable() {
    let err = DevMemBus::open("/nonexistent/mem", &MemoryMap::default()).unwrap_err();
    assert!(err.is_device_unavailable());
}

#[test]
#[ignore] // Requires the KV260 with the cnn_top bitstream loaded, as root
fn test_devmem_single_inference() {
    init_logging();
    let config = EngineConfig::new()
        .with_poll_policy(PollPolicy::Timeout(std::time::Duration::from_secs(5)));
    let bus = DevMemBus::open(hlscnn_driver::DEFAULT_DEVICE, &config.memory_map)
        .expect("open /dev/mem");
    let mut engine = InferenceEngine::new(bus, config).expect("engine");

    engine.load_weights(&weights()).expect("load weights");
    let result = engine.infer(&image(0, false)).expect("inference");

    println!(
        "label {} (output {:.5}, {} polls, {:.1} µs)",
        result.label,
        result.output,
        result.polls,
        result.latency_us()
    );
}

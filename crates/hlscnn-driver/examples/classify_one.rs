//! Classify one image on the simulated core
//!
//! Walks the whole pipeline (weights, staging, handshake, decode) without a
//! board. Swap `SimulatedCore` for `DevMemBus::open` to run on hardware.

use hlscnn_driver::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("hlscnn_driver=debug")
        .init();

    let config = EngineConfig::new();

    // Scores the image by its mean brightness, spread over the ten classes
    let core = SimulatedCore::new(
        config.memory_map,
        Box::new(|_weights: &[Fixed], image: &[Fixed]| {
            let mean = image.iter().map(|p| p.to_f64()).sum::<f64>() / image.len() as f64;
            mean * 9.0
        }),
    )
    .with_done_after(4);

    let mut engine = InferenceEngine::new(core, config)?;
    engine.load_weights(&WeightVector::new(vec![Fixed::ZERO; WeightVector::LEN])?)?;

    let pixels: Vec<u8> = (0..ImageVector::LEN).map(|i| (i % 256) as u8).collect();
    let image = ImageVector::from_gray8(&pixels)?;

    let result = engine.infer(&image)?;
    println!("Predicted label : {}", result.label);
    println!("Decoded output  : {:.5} (raw {:#010x})", result.output, result.raw.to_bits());
    println!("Polls until done: {}", result.polls);
    println!("Latency         : {:.1} µs", result.latency_us());

    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Accuracy evaluation over a labelled test set
//!
//! Samples are classified strictly in input order and the per-sample
//! outcomes keep that order. Timing is deliberately left out of the report
//! so that two runs against a deterministic core compare equal.

use crate::backend::RegisterBus;
use crate::error::{HlsCnnError, Result};
use crate::inference::{InferenceEngine, InferenceResult};
use crate::vectors::ImageVector;
use std::fmt;
use tracing::{debug, info, warn};

/// One labelled input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Input image
    pub image: ImageVector,
    /// Ground-truth label
    pub expected: i32,
}

impl TestCase {
    /// Pair an image with its label.
    pub const fn new(image: ImageVector, expected: i32) -> Self {
        Self { image, expected }
    }
}

/// Result for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    /// Position in the test set
    pub index: usize,
    /// Label the core produced
    pub predicted: i32,
    /// Ground-truth label
    pub expected: i32,
    /// Decoded score before rounding
    pub output: f64,
}

impl SampleOutcome {
    /// Exact label match.
    pub const fn passed(&self) -> bool {
        self.predicted == self.expected
    }
}

impl fmt::Display for SampleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Image {}: {} - Predicted: {}, Expected: {}",
            self.index,
            if self.passed() { "PASS" } else { "FAIL" },
            self.predicted,
            self.expected
        )
    }
}

/// Aggregate accuracy with per-sample detail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Samples evaluated
    pub total: usize,
    /// Samples whose prediction matched
    pub correct: usize,
    /// Per-sample outcomes, in input order
    pub outcomes: Vec<SampleOutcome>,
}

impl EvaluationReport {
    /// Append one outcome.
    pub fn record(&mut self, outcome: SampleOutcome) {
        self.total += 1;
        if outcome.passed() {
            self.correct += 1;
        }
        self.outcomes.push(outcome);
    }

    /// `correct / total * 100`, or `None` when nothing was evaluated.
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy_percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 * 100.0 / self.total as f64)
    }

    /// At least one sample, and every sample matched.
    pub const fn all_passed(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }

    /// Outcomes that did not match.
    pub fn failures(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total images: {}", self.total)?;
        writeln!(f, "Correct:      {}", self.correct)?;
        match self.accuracy_percent() {
            Some(accuracy) => write!(f, "Accuracy:     {accuracy:.1}%"),
            None => write!(f, "Accuracy:     n/a (no samples)"),
        }
    }
}

/// Runs an engine over a test set
#[derive(Debug)]
pub struct EvaluationHarness<'e, B: RegisterBus> {
    engine: &'e mut InferenceEngine<B>,
}

impl<'e, B: RegisterBus> EvaluationHarness<'e, B> {
    /// Borrow `engine` for the duration of the evaluation.
    pub fn new(engine: &'e mut InferenceEngine<B>) -> Self {
        Self { engine }
    }

    /// Classify every case in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed inference and returns its error.
    pub fn evaluate(&mut self, cases: &[TestCase]) -> Result<EvaluationReport> {
        self.evaluate_with(cases, |_, _| {})
    }

    /// Like [`evaluate`](Self::evaluate), calling `observer` after each sample
    /// with its outcome and the full inference result.
    ///
    /// # Errors
    ///
    /// Stops at the first failed inference and returns its error. Use
    /// [`evaluate_partial`](Self::evaluate_partial) to keep the samples
    /// classified before the failure.
    pub fn evaluate_with<F>(&mut self, cases: &[TestCase], observer: F) -> Result<EvaluationReport>
    where
        F: FnMut(&SampleOutcome, &InferenceResult),
    {
        match self.evaluate_partial(cases, observer) {
            (report, None) => Ok(report),
            (_, Some(e)) => Err(e),
        }
    }

    /// Classify cases in order until one fails.
    ///
    /// Returns the report for every sample classified so far, plus the error
    /// that stopped the run, if any. The report is complete exactly when the
    /// error is `None`.
    pub fn evaluate_partial<F>(
        &mut self,
        cases: &[TestCase],
        mut observer: F,
    ) -> (EvaluationReport, Option<HlsCnnError>)
    where
        F: FnMut(&SampleOutcome, &InferenceResult),
    {
        info!("Evaluating {} samples", cases.len());
        let mut report = EvaluationReport::default();

        for (index, case) in cases.iter().enumerate() {
            let result = match self.engine.infer(&case.image) {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        "Evaluation stopped at sample {index} of {}: {e}",
                        cases.len()
                    );
                    return (report, Some(e));
                }
            };
            let outcome = SampleOutcome {
                index,
                predicted: result.label,
                expected: case.expected,
                output: result.output,
            };
            debug!("{outcome}");
            observer(&outcome, &result);
            report.record(outcome);
        }

        match report.accuracy_percent() {
            Some(accuracy) => info!(
                "Evaluation: {}/{} correct ({accuracy:.1}%)",
                report.correct, report.total
            ),
            None => info!("Evaluation: empty test set"),
        }
        (report, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SimulatedCore;
    use crate::config::{EngineConfig, MemoryMap, PollPolicy};
    use crate::fixed::Fixed;
    use crate::vectors::WeightVector;
    use hlscnn_chip::regs::ap_ctrl;

    fn loaded_engine(core: SimulatedCore) -> InferenceEngine<SimulatedCore> {
        let mut engine = InferenceEngine::new(core, EngineConfig::new()).unwrap();
        engine
            .load_weights(&WeightVector::new(vec![Fixed::ZERO; 5738]).unwrap())
            .unwrap();
        engine
    }

    fn cases(labels: &[i32]) -> Vec<TestCase> {
        labels
            .iter()
            .map(|&l| TestCase::new(ImageVector::new(vec![Fixed::ZERO; 784]).unwrap(), l))
            .collect()
    }

    #[test]
    fn seven_of_ten_is_seventy_percent() {
        let expected = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        // Last three predictions are wrong
        let predicted = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0, 1.0, 1.0];
        let mut engine = loaded_engine(SimulatedCore::scripted(predicted));

        let report = EvaluationHarness::new(&mut engine)
            .evaluate(&cases(&expected))
            .unwrap();

        assert_eq!(report.total, 10);
        assert_eq!(report.correct, 7);
        assert_eq!(report.accuracy_percent(), Some(70.0));
        assert!(!report.all_passed());
        assert_eq!(report.failures().count(), 3);
    }

    #[test]
    fn outcomes_keep_input_order() {
        let mut engine = loaded_engine(SimulatedCore::scripted(vec![5.0, 3.0, 9.0]));
        let report = EvaluationHarness::new(&mut engine)
            .evaluate(&cases(&[5, 4, 9]))
            .unwrap();
        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(report.outcomes[1].predicted, 3);
        assert!(!report.outcomes[1].passed());
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let mut engine = loaded_engine(SimulatedCore::constant(4.0));
        let set = cases(&[4, 4, 2]);
        let first = EvaluationHarness::new(&mut engine).evaluate(&set).unwrap();
        let second = EvaluationHarness::new(&mut engine).evaluate(&set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_set_has_no_accuracy() {
        let mut engine = loaded_engine(SimulatedCore::constant(0.0));
        let report = EvaluationHarness::new(&mut engine).evaluate(&[]).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.accuracy_percent(), None);
        assert!(!report.all_passed());
        assert!(report.to_string().contains("n/a"));
    }

    #[test]
    fn outcome_lines_match_console_format() {
        let pass = SampleOutcome {
            index: 0,
            predicted: 7,
            expected: 7,
            output: 7.0,
        };
        let fail = SampleOutcome {
            index: 3,
            predicted: 2,
            expected: 8,
            output: 2.1,
        };
        assert_eq!(pass.to_string(), "Image 0: PASS - Predicted: 7, Expected: 7");
        assert_eq!(fail.to_string(), "Image 3: FAIL - Predicted: 2, Expected: 8");
    }

    #[test]
    fn summary_uses_one_decimal() {
        let mut report = EvaluationReport::default();
        for (p, e) in [(1, 1), (2, 2), (0, 3)] {
            report.record(SampleOutcome {
                index: report.total,
                predicted: p,
                expected: e,
                output: f64::from(p),
            });
        }
        assert_eq!(
            report.to_string(),
            "Total images: 3\nCorrect:      2\nAccuracy:     66.7%"
        );
    }

    #[test]
    fn observer_sees_every_sample() {
        let mut engine = loaded_engine(SimulatedCore::constant(1.0));
        let mut seen = Vec::new();
        EvaluationHarness::new(&mut engine)
            .evaluate_with(&cases(&[1, 2]), |outcome, result| {
                seen.push((outcome.index, result.polls));
            })
            .unwrap();
        assert_eq!(seen, vec![(0, 1), (1, 1)]);
    }

    /// Stops reporting done once `limit` runs have completed.
    #[derive(Debug)]
    struct StallsAfter {
        core: SimulatedCore,
        limit: u64,
    }

    impl RegisterBus for StallsAfter {
        fn read_word(&mut self, address: u64) -> Result<u32> {
            if address == MemoryMap::default().control_register() && self.core.runs() >= self.limit {
                return Ok(ap_ctrl::START);
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
    fn failure_mid_run_keeps_earlier_outcomes() {
        let bus = StallsAfter {
            core: SimulatedCore::scripted(vec![2.0, 6.0]),
            limit: 2,
        };
        let config = EngineConfig::new().with_poll_policy(PollPolicy::MaxPolls(8));
        let mut engine = InferenceEngine::new(bus, config).unwrap();
        engine
            .load_weights(&WeightVector::new(vec![Fixed::ZERO; 5738]).unwrap())
            .unwrap();

        let (report, err) =
            EvaluationHarness::new(&mut engine).evaluate_partial(&cases(&[2, 5, 1, 0]), |_, _| {});

        assert_eq!(report.total, 2);
        assert_eq!(report.correct, 1);
        assert_eq!(report.outcomes[1].predicted, 6);
        assert!(matches!(
            err,
            Some(HlsCnnError::AcceleratorNonResponsive { polls: 8, .. })
        ));
    }

    #[test]
    fn complete_run_has_no_error() {
        let mut engine = loaded_engine(SimulatedCore::constant(3.0));
        let (report, err) =
            EvaluationHarness::new(&mut engine).evaluate_partial(&cases(&[3, 3]), |_, _| {});
        assert!(err.is_none());
        assert!(report.all_passed());
    }
}

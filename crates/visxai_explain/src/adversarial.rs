//! Fast gradient sign adversarial perturbation.
//!
//! Works in `[0, 1]` pixel space: the model's normalization is part of the
//! differentiated graph, so `epsilon` bounds the per-pixel change of the
//! decoded image.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use visxai_core::{tensor_values, PixelTensor};
use visxai_models::{InspectableModel, NoCapture};

use crate::error::{ExplainError, Result};
use crate::gradcam::argmax_first;

/// Default perturbation size.
pub const DEFAULT_EPSILON: f32 = 0.01;

/// FGSM parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FgsmConfig {
    /// Per-pixel perturbation bound.
    pub epsilon: f32,
    /// Class whose score is pushed; the predicted class when `None`.
    pub target_class: Option<usize>,
}

impl Default for FgsmConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            target_class: None,
        }
    }
}

impl FgsmConfig {
    /// Create a config with the given epsilon.
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            ..Default::default()
        }
    }

    /// Set the class whose score is pushed.
    #[must_use]
    pub fn with_target_class(mut self, target_class: Option<usize>) -> Self {
        self.target_class = target_class;
        self
    }

    /// Check the epsilon.
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ExplainError::InvalidParameter(format!(
                "epsilon must be a finite non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Output of an FGSM pass.
#[derive(Debug, Clone)]
pub struct AdversarialResult {
    /// Class predicted for the clean image.
    pub original_class: usize,
    /// Class predicted for the perturbed image.
    pub adversarial_class: usize,
    /// Softmax probability of `adversarial_class` on the perturbed image.
    pub confidence: f32,
    /// Epsilon used.
    pub epsilon: f32,
    /// Perturbed pixels, same shape as the input.
    pub adversarial: PixelTensor,
    /// Largest per-pixel change actually applied.
    pub max_perturbation: f32,
}

/// `clamp(x + epsilon * sign(gradient), 0, 1)`.
pub fn perturb<B: Backend>(
    pixels: Tensor<B, 4>,
    gradient: Tensor<B, 4>,
    epsilon: f32,
) -> Tensor<B, 4> {
    (pixels + gradient.sign() * epsilon).clamp(0.0, 1.0)
}

impl FgsmConfig {
    /// Perturb `pixels` against `model`.
    pub fn attack<B, M>(
        &self,
        model: &M,
        pixels: &PixelTensor,
        device: &B::Device,
    ) -> Result<AdversarialResult>
    where
        B: AutodiffBackend,
        M: InspectableModel<B>,
    {
        self.validate()?;
        if pixels.channels() != model.input_channels() {
            return Err(ExplainError::InvalidParameter(format!(
                "{} expects {} input channels, got {}",
                model.architecture(),
                model.input_channels(),
                pixels.channels()
            )));
        }
        if let Some(target) = self.target_class {
            if target >= model.n_classes() {
                return Err(ExplainError::ClassOutOfRange {
                    index: target,
                    n_classes: model.n_classes(),
                });
            }
        }

        let x = pixels.to_tensor::<B>(device).require_grad();
        let logits = model.forward_pixels_observed(x.clone(), &mut NoCapture);
        let original_class = argmax_first(logits.clone().detach())?;
        let target = self.target_class.unwrap_or(original_class);

        let score = logits.slice([0..1, target..target + 1]).sum();
        let grads = score.backward();
        let gradient = x
            .grad(&grads)
            .ok_or_else(|| {
                ExplainError::CaptureFailed("no gradient reached the input pixels".to_string())
            })?;

        let adversarial = perturb(x.inner(), gradient, self.epsilon);
        let adversarial = Tensor::<B, 4>::from_inner(adversarial);

        let probs = softmax(model.forward_pixels_observed(adversarial.clone(), &mut NoCapture), 1);
        let probs = tensor_values(probs.slice([0..1]))?;
        let adversarial_class = probs
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best });

        let adversarial = PixelTensor::from_tensor(adversarial)?;
        let max_perturbation = adversarial.max_abs_diff(pixels)?;
        tracing::debug!(
            original_class,
            adversarial_class = adversarial_class.0,
            max_perturbation,
            "adversarial example generated"
        );

        Ok(AdversarialResult {
            original_class,
            adversarial_class: adversarial_class.0,
            confidence: adversarial_class.1,
            epsilon: self.epsilon,
            adversarial,
            max_perturbation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use visxai_core::backend::{AutodiffNdArray, NdArray};
    use visxai_models::{DigitCnnConfig, ResNet50Config};

    fn random_pixels(channels: usize, side: usize, seed: u64) -> PixelTensor {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let data = (0..channels * side * side).map(|_| rng.gen::<f32>()).collect();
        PixelTensor::new(channels, side, side, data).unwrap()
    }

    #[test]
    fn test_validate_epsilon() {
        assert!(FgsmConfig::new(0.03).validate().is_ok());
        assert!(FgsmConfig::new(0.0).validate().is_ok());
        assert!(FgsmConfig::new(-0.1).validate().is_err());
        assert!(FgsmConfig::new(f32::NAN).validate().is_err());
        assert!(FgsmConfig::new(f32::INFINITY).validate().is_err());
    }

    #[test]
    fn test_perturb_clamps_to_unit_range() {
        let device = Default::default();
        let pixels = Tensor::<NdArray, 4>::from_floats([[[[0.0, 0.5, 1.0]]]], &device);
        let gradient = Tensor::<NdArray, 4>::from_floats([[[[-1.0, 2.0, 3.0]]]], &device);

        let values: Vec<f32> = perturb(pixels, gradient, 0.1).into_data().to_vec().unwrap();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.6).abs() < 1e-6);
        assert_eq!(values[2], 1.0);
    }

    #[test]
    fn test_digit_attack_bounded() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let pixels = random_pixels(1, 28, 3);

        let result = FgsmConfig::new(0.05).attack(&model, &pixels, &device).unwrap();
        assert_eq!(result.adversarial.height(), 28);
        assert_eq!(result.adversarial.channels(), 1);
        assert!(result.max_perturbation <= 0.05 + 1e-6);
        assert!(result.adversarial.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn test_resnet_attack_preserves_shape() {
        let device = Default::default();
        let model = ResNet50Config::new(10)
            .with_input_size(32)
            .with_width_divisor(16)
            .with_blocks([1, 1, 1, 1])
            .init::<AutodiffNdArray>(&device);
        let pixels = random_pixels(3, 32, 5);

        let result = FgsmConfig::default().attack(&model, &pixels, &device).unwrap();
        assert_eq!(
            (
                result.adversarial.channels(),
                result.adversarial.height(),
                result.adversarial.width()
            ),
            (3, 32, 32)
        );
        assert!(result.max_perturbation <= DEFAULT_EPSILON + 1e-6);
        assert_eq!(result.epsilon, DEFAULT_EPSILON);
    }

    #[test]
    fn test_zero_epsilon_keeps_image() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let pixels = random_pixels(1, 28, 9);

        let result = FgsmConfig::new(0.0).attack(&model, &pixels, &device).unwrap();
        assert_eq!(result.max_perturbation, 0.0);
        assert_eq!(result.adversarial_class, result.original_class);
    }

    fn score_step(
        model: &visxai_models::DigitCnn<AutodiffNdArray>,
        pixels: &PixelTensor,
        class: usize,
        epsilon: f32,
    ) -> Vec<f32> {
        let device = Default::default();
        let x = pixels.to_tensor::<AutodiffNdArray>(&device).require_grad();
        let logits = model.forward_pixels_observed(x.clone(), &mut NoCapture);
        let grads = logits.slice([0..1, class..class + 1]).sum().backward();
        let gradient = x.grad(&grads).unwrap();
        perturb(x.inner(), gradient, epsilon).into_data().to_vec().unwrap()
    }

    #[test]
    fn test_steps_along_class_score_gradient() {
        let device = Default::default();
        AutodiffNdArray::seed(11);
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let data = (0..28 * 28).map(|_| rng.gen_range(0.3..0.7)).collect();
        let pixels = PixelTensor::new(1, 28, 28, data).unwrap();

        let result = FgsmConfig::new(0.05).attack(&model, &pixels, &device).unwrap();
        let expected = score_step(&model, &pixels, result.original_class, 0.05);
        let mismatched = result
            .adversarial
            .values()
            .iter()
            .zip(&expected)
            .filter(|(a, e)| (*a - *e).abs() > 1e-5)
            .count();
        assert_eq!(mismatched, 0);
    }

    #[test]
    fn test_target_class_selects_score() {
        let device = Default::default();
        AutodiffNdArray::seed(11);
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let pixels = random_pixels(1, 28, 4);

        let result = FgsmConfig::new(0.02)
            .with_target_class(Some(3))
            .attack(&model, &pixels, &device)
            .unwrap();
        let expected = score_step(&model, &pixels, 3, 0.02);
        for (a, e) in result.adversarial.values().iter().zip(&expected) {
            assert!((a - e).abs() <= 1e-5);
        }
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let rgb = random_pixels(3, 28, 2);
        let result = FgsmConfig::default().attack(&model, &rgb, &device);
        assert!(matches!(result, Err(ExplainError::InvalidParameter(_))));
    }

    #[test]
    fn test_target_class_out_of_range() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<AutodiffNdArray>(&device);
        let pixels = random_pixels(1, 28, 1);
        let result = FgsmConfig::default()
            .with_target_class(Some(11))
            .attack(&model, &pixels, &device);
        assert!(matches!(result, Err(ExplainError::ClassOutOfRange { .. })));
    }
}

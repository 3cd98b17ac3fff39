//! Integration tests for the introspection pipeline.
//!
//! Networks are built at reduced width and input size so every test runs on
//! the CPU backend in seconds.

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{DynamicImage, Rgb, RgbImage};

use visxai::prelude::*;

type TestBackend = Autodiff<NdArray>;

fn synthetic_pixels(size: u32) -> PixelTensor {
    let image = RgbImage::from_fn(size + 10, size, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8])
    });
    PixelTensor::from_image_center_crop(&DynamicImage::ImageRgb8(image), size)
}

fn small_vgg(
    device: &<TestBackend as burn::tensor::backend::Backend>::Device,
) -> Vgg16<TestBackend> {
    Seed::new(7).apply::<TestBackend>();
    Vgg16Config::new(10)
        .with_input_size(32)
        .with_width_divisor(16)
        .with_pool_size(1)
        .init(device)
}

fn small_resnet(
    device: &<TestBackend as burn::tensor::backend::Backend>::Device,
) -> ResNet50<TestBackend> {
    Seed::new(7).apply::<TestBackend>();
    ResNet50Config::new(10)
        .with_input_size(32)
        .with_width_divisor(16)
        .with_blocks([1, 1, 1, 1])
        .init(device)
}

#[test]
fn test_capture_all_follows_layer_order() {
    let device = Default::default();
    let model = small_vgg(&device);
    let pixels = synthetic_pixels(32);

    let (logits, ctx) = capture_all(&model, pixels.to_tensor::<TestBackend>(&device));
    assert_eq!(logits.dims(), [1, 10]);

    let maps = FeatureMapAssembler::new(16)
        .assemble(ctx.activations(), Architecture::Vgg16.layer_order())
        .unwrap();
    assert_eq!(maps.layer_names(), Architecture::Vgg16.layer_order().to_vec());
    assert_eq!(maps.get("conv_13").unwrap().total, 32);
    assert_eq!(maps.get("fc_1").unwrap().maps.len(), 1);
}

#[test]
fn test_attached_capture_records_only_requested_stage() {
    let device = Default::default();
    let model = small_resnet(&device);
    let pixels = synthetic_pixels(32);

    let mut ctx = CaptureContext::new(Watch::Attached);
    let handle = ctx.attach("layer3");
    model.forward_pixels_observed(pixels.to_tensor::<TestBackend>(&device), &mut ctx);

    assert_eq!(ctx.activations().names(), vec!["layer3"]);
    assert!(ctx.activation("layer1").is_err());

    ctx.detach(handle);
    ctx.detach(handle);
    assert_eq!(ctx.attached_count(), 0);
}

#[test]
fn test_gradcam_resolution_independent_of_layer() {
    let device = Default::default();
    let model = small_resnet(&device);
    let pixels = synthetic_pixels(32);

    let early = GradCamConfig::new(0)
        .compute(&model, pixels.to_tensor::<TestBackend>(&device))
        .unwrap();
    let late = GradCamConfig::new(3)
        .compute(&model, pixels.to_tensor::<TestBackend>(&device))
        .unwrap();

    assert_eq!(early.layer_name, "layer1");
    assert_eq!(late.layer_name, "layer4");
    assert_eq!(early.map.dim(), (32, 32));
    assert_eq!(late.map.dim(), early.map.dim());
    for map in [&early.map, &late.map] {
        assert!(map.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn test_gradcam_explains_requested_class() {
    let device = Default::default();
    let model = small_vgg(&device);
    let pixels = synthetic_pixels(32);

    let result = GradCamConfig::new(12)
        .with_class(Some(3))
        .compute(&model, pixels.to_tensor::<TestBackend>(&device))
        .unwrap();
    assert_eq!(result.class_idx, 3);
    assert_eq!(result.available_layers.len(), 13);
    assert_eq!(result.heatmap().dimensions(), (32, 32));
}

#[test]
fn test_fgsm_stays_in_budget_and_range() {
    let device = Default::default();
    let model = small_vgg(&device);
    let pixels = synthetic_pixels(32);

    let result = FgsmConfig::new(0.05)
        .attack(&model, &pixels, &device)
        .unwrap();

    assert!(result.max_perturbation <= 0.05 + 1e-5);
    assert!(result.adversarial.values().iter().all(|v| (0.0..=1.0).contains(v)));
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(result.original_class < 10 && result.adversarial_class < 10);
}

#[test]
fn test_zero_epsilon_is_identity() {
    let device = Default::default();
    let model = small_vgg(&device);
    let pixels = synthetic_pixels(32);

    let result = FgsmConfig::new(0.0).attack(&model, &pixels, &device).unwrap();
    assert_eq!(result.max_perturbation, 0.0);
    assert_eq!(result.original_class, result.adversarial_class);
}

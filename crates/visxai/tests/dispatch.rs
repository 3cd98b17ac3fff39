//! End-to-end tests through the dispatcher.
//!
//! The registry is built from configuration exactly as the CLI builds it,
//! with both ImageNet networks shrunk to 32×32 input.

use std::sync::OnceLock;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

use visxai::api::PLACEHOLDER_MODELS;
use visxai::prelude::*;

type TestBackend = Autodiff<NdArray>;

fn dispatcher(debug: bool) -> Dispatcher {
    let config = AppConfig::default().with_small_networks(32, 16).with_debug(debug);
    let registry = build_registry::<TestBackend>(&config, &Default::default()).expect("registry");
    Dispatcher::new(registry, config)
}

fn shared() -> &'static Dispatcher {
    static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();
    DISPATCHER.get_or_init(|| dispatcher(false))
}

fn image_uri() -> String {
    let image = RgbImage::from_fn(48, 36, |x, y| {
        Rgb([(x * 5) as u8, (y * 7) as u8, ((x * y) % 256) as u8])
    });
    codec::rgb_png_data_uri(&image).unwrap()
}

fn digit_pixels(seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..28 * 28).map(|_| rng.gen::<f32>()).collect()
}

fn post(body: Value) -> Request {
    Request::post(body)
}

#[test]
fn test_predict_probabilities_sorted() {
    let response = shared().dispatch("vgg16", "predict", &post(json!({ "image": image_uri() })));
    assert_eq!(response.status, 200, "{:?}", response.body);

    let probabilities = response.body["probabilities"].as_array().unwrap();
    assert_eq!(probabilities.len(), 5);
    let scores: Vec<f64> = probabilities.iter().map(|p| p["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));

    let maps = response.body["feature_maps"].as_object().unwrap();
    assert_eq!(maps.len(), 16);
    assert!(maps.values().all(|layer| layer["maps"].as_array().unwrap().len() <= 16));
}

#[test]
fn test_resnet_predict_layers() {
    let response = shared().dispatch("ResNet50", "predict", &post(json!({ "image": image_uri() })));
    assert_eq!(response.status, 200, "{:?}", response.body);
    let keys: Vec<&str> = response.body["feature_maps"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["layer1", "layer2", "layer3", "layer4"]);
}

#[test]
fn test_gradcam_same_resolution_for_every_layer() {
    let dispatcher = shared();
    let mut shapes = Vec::new();
    for layer_index in [0, 12] {
        let request = post(json!({ "image": image_uri(), "layer_index": layer_index }));
        let response = dispatcher.dispatch("vgg16", "gradcam", &request);
        assert_eq!(response.status, 200, "{:?}", response.body);

        let rows = response.body["heatmap_data"].as_array().unwrap();
        shapes.push((rows.len(), rows[0].as_array().unwrap().len()));
    }
    assert_eq!(shapes[0], (32, 32));
    assert_eq!(shapes[0], shapes[1]);
}

#[test]
fn test_gradcam_is_deterministic() {
    let request = post(json!({ "image": image_uri(), "layer_index": 5, "class_idx": 2 }));
    let first = shared().dispatch("vgg16", "gradcam", &request);
    let second = shared().dispatch("vgg16", "gradcam", &request);
    assert_eq!(first.status, 200);
    assert_eq!(first.body, second.body);
}

#[test]
fn test_gradcam_out_of_range_layer() {
    let request = post(json!({ "image": image_uri(), "layer_index": 13 }));
    let response = shared().dispatch("vgg16", "gradcam", &request);
    assert_eq!(response.status, 400);
    assert!(response.error_message().unwrap().contains("13"));
}

#[test]
fn test_adversarial_respects_epsilon() {
    let request = post(json!({ "image": image_uri(), "epsilon": "0.02" }));
    let response = shared().dispatch("resnet50", "adversarial", &request);
    assert_eq!(response.status, 200, "{:?}", response.body);
    assert!(response.body["max_perturbation"].as_f64().unwrap() <= 0.02 + 1e-5);

    let image = codec::decode_image(response.body["adversarial_image"].as_str().unwrap()).unwrap();
    assert_eq!((image.width(), image.height()), (32, 32));
}

#[test]
fn test_placeholders_are_unsupported() {
    for name in PLACEHOLDER_MODELS {
        let response = shared().dispatch(name, "predict", &post(json!({ "image": image_uri() })));
        assert_eq!(response.status, 400, "{name}");
    }
}

#[test]
fn test_unknown_model_is_not_found() {
    let response = shared().dispatch("alexnet", "predict", &post(json!({})));
    assert_eq!(response.status, 404);
}

#[test]
fn test_method_rules() {
    let dispatcher = shared();
    assert_eq!(dispatcher.dispatch("vgg16", "predict", &Request::get()).status, 405);

    let catalog = dispatcher.dispatch("vgg16", "features", &Request::get());
    assert_eq!(catalog.status, 200);
    assert_eq!(catalog.body["layers"].as_array().unwrap().len(), 16);

    let unknown_layer = Request::get().with_query("layer_id", "nope");
    let filtered = dispatcher.dispatch("vgg16", "features", &unknown_layer);
    assert_eq!(filtered.status, 400);
}

#[test]
fn test_alias_and_case_insensitive_names() {
    let dispatcher = shared();
    let catalog = dispatcher.dispatch("VoxelStack", "features", &Request::get());
    assert_eq!(catalog.status, 200);
    assert_eq!(catalog.body["model"], "vgg16");
}

#[test]
fn test_debug_controls_traceback() {
    let request = post(json!({ "image": "not base64 !!" }));

    let quiet = shared().dispatch("vgg16", "predict", &request);
    assert_eq!(quiet.status, 400);
    assert!(quiet.body.get("traceback").is_none());

    let verbose = dispatcher(true).dispatch("vgg16", "predict", &request);
    assert_eq!(verbose.status, 400);
    assert!(verbose.body["traceback"].is_string());
}

#[test]
fn test_digit_predict_and_train() {
    let dispatcher = dispatcher(false);

    let predict =
        dispatcher.dispatch("mnist", "predict", &post(json!({ "pixels": digit_pixels(9) })));
    assert_eq!(predict.status, 200, "{:?}", predict.body);
    assert_eq!(predict.body["probabilities"].as_array().unwrap().len(), 10);

    let train = dispatcher.dispatch(
        "mnist",
        "train",
        &post(json!({ "pixels": digit_pixels(9), "label": 3 })),
    );
    assert_eq!(train.status, 200, "{:?}", train.body);
    assert!(train.body["loss"].as_f64().unwrap().is_finite());

    assert_eq!(dispatcher.dispatch("mnist", "gradcam", &post(json!({}))).status, 400);
    assert_eq!(dispatcher.dispatch("vgg16", "train", &post(json!({}))).status, 400);
}

#[test]
fn test_kernels_over_get() {
    let dispatcher = shared();

    let vgg = dispatcher.dispatch("vgg16", "kernels", &Request::get());
    assert_eq!(vgg.status, 200, "{:?}", vgg.body);
    let kernels = vgg.body["kernels"].as_object().unwrap();
    assert_eq!(kernels.len(), 13);
    assert!(kernels.values().all(|layer| layer["maps"].as_array().unwrap().len() <= 8));

    let conv2 = Request::get().with_query("layer_id", "conv2");
    let digits = dispatcher.dispatch("mnist", "kernels", &conv2);
    assert_eq!(digits.status, 200);
    assert_eq!(digits.body["kernels"]["conv2"]["maps"].as_array().unwrap().len(), 32);

    assert_eq!(dispatcher.dispatch("gridwalker", "kernels", &Request::get()).status, 400);
}

#[test]
fn test_trained_digit_weights_reload() {
    let trained = dispatcher(false);
    let sample = post(json!({ "pixels": digit_pixels(5), "label": 4, "lr": 0.05 }));
    assert_eq!(trained.dispatch("mnist", "train", &sample).status, 200);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mnist");
    trained.save_weights("mnist", &path).unwrap();

    let mut config = AppConfig::default();
    config.models.vgg16 = config.models.vgg16.disabled();
    config.models.resnet50 = config.models.resnet50.disabled();
    config.models.mnist = config.models.mnist.clone().with_weights(path.clone());
    let registry = build_registry::<TestBackend>(&config, &Default::default()).unwrap();
    let reloaded = Dispatcher::new(registry, config);

    let predict = post(json!({ "pixels": digit_pixels(6) }));
    let before = trained.dispatch("mnist", "predict", &predict);
    let after = reloaded.dispatch("mnist", "predict", &predict);
    let untrained = shared().dispatch("mnist", "predict", &predict);

    assert_eq!(before.body["probabilities"], after.body["probabilities"]);
    assert_ne!(before.body["probabilities"], untrained.body["probabilities"]);
}

#[test]
fn test_models_listing() {
    let models = shared().models();
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    for name in ["vgg16", "resnet50", "mnist"] {
        assert!(names.contains(&name));
    }
    let vgg = models.iter().find(|m| m.name == "vgg16").unwrap();
    assert!(vgg.capabilities.contains(&Capability::GradCam));
    assert_eq!(vgg.layers.len(), 16);
}

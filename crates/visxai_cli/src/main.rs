//! visxai CLI: list models and invoke introspection actions.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use visxai_api::{build_registry, AppConfig, Dispatcher, Method, Request};
use visxai_core::{codec, Seed};

/// Backend used for every pass; Grad-CAM, adversarial and training need
/// gradients.
type Backend = Autodiff<NdArray>;

/// Side length of `--synthetic` RGB images.
const SYNTHETIC_SIZE: usize = 224;

/// Response fields holding a PNG data URI worth saving.
const IMAGE_FIELDS: [&str; 2] = ["heatmap", "adversarial_image"];

#[derive(Parser)]
#[command(name = "visxai")]
#[command(author, version)]
#[command(about = "Explore the internals of image classification networks")]
#[command(long_about = "visxai: feature maps, kernels, Grad-CAM and adversarial examples for \
VGG16, ResNet50 and a digit classifier.

EXAMPLES:
  # List registered models and what they serve
  visxai models

  # Classify an image with VGG16
  visxai invoke vgg16 predict --image cat.jpg

  # Grad-CAM on the last convolution, saving the heatmap
  visxai invoke vgg16 gradcam --image cat.jpg --request '{\"layer_index\": 12}' --save-image cam.png

  # Try an action without an image
  visxai --small 64 invoke resnet50 adversarial --synthetic 7

  # Layer catalog (GET)
  visxai invoke resnet50 features --get

  # First 8 filters of every VGG16 convolution
  visxai invoke vgg16 kernels --get

  # One training step on the digit classifier, keeping the updated weights
  visxai invoke mnist train --request @sample.json --save-weights mnist.mpk")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Include error traces in error responses
    #[arg(long, global = true)]
    debug: bool,

    /// Shrink VGG16 and ResNet50 to the given input size (channel widths / 8)
    #[arg(long, global = true, value_name = "SIZE")]
    small: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models with their actions and layers
    Models,
    /// Run one action against a model
    Invoke {
        /// Model name (case-insensitive)
        model: String,

        /// Action: predict, features, gradcam, adversarial, train, kernels
        action: String,

        /// JSON request body, or @path to read it from a file
        #[arg(long, value_name = "JSON")]
        request: Option<String>,

        /// Image file sent as the `image` field
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,

        /// Send seeded noise instead of an image (`image` and `pixels` fields)
        #[arg(long, value_name = "SEED", conflicts_with = "image")]
        synthetic: Option<u64>,

        /// Restrict feature maps or kernels to one layer
        #[arg(long, value_name = "NAME")]
        layer_id: Option<String>,

        /// Send as a GET request
        #[arg(long)]
        get: bool,

        /// Write the returned heatmap or adversarial image to this PNG
        #[arg(long, value_name = "PATH")]
        save_image: Option<PathBuf>,

        /// After a successful action, write the model's weights here
        #[arg(long, value_name = "PATH")]
        save_weights: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = load_config(cli.config.as_deref(), cli.debug, cli.small)?;
    let device = Default::default();
    let registry =
        build_registry::<Backend>(&config, &device).context("Failed to build model registry")?;
    let dispatcher = Dispatcher::new(registry, config);

    match cli.command {
        Commands::Models => handle_models(&dispatcher),
        Commands::Invoke {
            model,
            action,
            request,
            image,
            synthetic,
            layer_id,
            get,
            save_image,
            save_weights,
        } => {
            let mut request = build_request(request.as_deref(), image.as_deref(), layer_id, get)?;
            if let Some(seed) = synthetic {
                add_synthetic_input(&mut request, Seed::new(seed))?;
            }
            handle_invoke(&dispatcher, &model, &action, &request, save_image.as_deref())?;
            if let Some(path) = save_weights {
                dispatcher
                    .save_weights(&model, &path)
                    .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, debug: bool, small: Option<usize>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => AppConfig::default(),
    };
    if debug {
        config = config.with_debug(true);
    }
    if let Some(size) = small {
        config = config.with_small_networks(size, 8);
    }
    Ok(config)
}

fn handle_models(dispatcher: &Dispatcher) -> Result<()> {
    println!("{:<14} {:<52} {}", "MODEL", "ACTIONS", "LAYERS");
    for summary in dispatcher.models() {
        let actions: Vec<&str> = summary.capabilities.iter().map(|c| c.action()).collect();
        let actions = if actions.is_empty() {
            "-".to_string()
        } else {
            actions.join(", ")
        };
        println!("{:<14} {:<52} {}", summary.name, actions, summary.layers.len());
    }
    Ok(())
}

fn build_request(
    body: Option<&str>,
    image: Option<&Path>,
    layer_id: Option<String>,
    get: bool,
) -> Result<Request> {
    let mut request = if get {
        if body.is_some() || image.is_some() {
            bail!("--get requests carry no body; drop --request and --image");
        }
        Request::get()
    } else {
        Request::post(read_body(body)?)
    };

    if let Some(path) = image {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image '{}'", path.display()))?;
        request.body["image"] = Value::String(STANDARD.encode(bytes));
    }
    if let Some(layer_id) = layer_id {
        request = request.with_query("layer_id", layer_id);
    }
    Ok(request)
}

/// Fill `image` with an RGB noise image and `pixels` with a noise digit.
fn add_synthetic_input(request: &mut Request, seed: Seed) -> Result<()> {
    if request.method == Method::Get {
        bail!("--synthetic cannot be combined with --get");
    }
    let image = seed.derive("image").pixels(3, SYNTHETIC_SIZE, SYNTHETIC_SIZE)?;
    let digit = seed.derive("digit").pixels(1, 28, 28)?;
    request.body["image"] = Value::String(codec::rgb_png_data_uri(&image.to_rgb_image())?);
    request.body["pixels"] = json!(digit.values());
    Ok(())
}

fn read_body(body: Option<&str>) -> Result<Value> {
    let text = match body {
        None => return Ok(json!({})),
        Some(arg) => match arg.strip_prefix('@') {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request file '{path}'"))?,
            None => arg.to_string(),
        },
    };
    let value: Value = serde_json::from_str(&text).context("Request body is not valid JSON")?;
    if !value.is_object() {
        bail!("Request body must be a JSON object");
    }
    Ok(value)
}

fn handle_invoke(
    dispatcher: &Dispatcher,
    model: &str,
    action: &str,
    request: &Request,
    save_image: Option<&Path>,
) -> Result<()> {
    let response = dispatcher.dispatch(model, action, request);
    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if !response.is_success() {
        bail!(
            "{} {}",
            response.status,
            response.error_message().unwrap_or("request failed")
        );
    }

    if let Some(path) = save_image {
        let uri = IMAGE_FIELDS
            .iter()
            .find_map(|field| response.body.get(*field).and_then(Value::as_str))
            .context("Response carries no image to save")?;
        let image = codec::decode_image(uri).context("Failed to decode returned image")?;
        image
            .save(path)
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        tracing::info!(path = %path.display(), "image saved");
    }
    Ok(())
}

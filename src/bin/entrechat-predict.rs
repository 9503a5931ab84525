//! Run the continuous pipeline over an exported per-frame feature dump.
//!
//! The dump stands in for the decoder and the feature backbone: a JSON
//! object with `frame_rate`, `duration_seconds`, and `embeddings` (one
//! vector per frame). The timeline is printed as JSON on stdout.

use std::path::PathBuf;

use serde::Deserialize;

use entrechat::features::{ClipFeatures, FrameEmbedding, PrecomputedExtractor};
use entrechat::service::AnticipationService;

#[derive(Deserialize)]
struct FeatureDump {
    frame_rate: f64,
    duration_seconds: f64,
    embeddings: Vec<Vec<f32>>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    entrechat::logging::init().map_err(|err| err.to_string())?;
    let (dump_path, model_id) = parse_args(std::env::args().skip(1).collect())?;

    let text = std::fs::read_to_string(&dump_path)
        .map_err(|err| format!("Failed to read {}: {err}", dump_path.display()))?;
    let dump: FeatureDump = serde_json::from_str(&text)
        .map_err(|err| format!("Failed to parse {}: {err}", dump_path.display()))?;
    let clip = ClipFeatures {
        frame_rate: dump.frame_rate,
        duration_seconds: dump.duration_seconds,
        embeddings: dump.embeddings.into_iter().map(FrameEmbedding::new).collect(),
    };

    let config = entrechat::config::load_or_default().map_err(|err| err.to_string())?;
    let service = AnticipationService::load(&config, Box::new(PrecomputedExtractor::new(clip)))
        .map_err(|err| err.to_string())?;
    let response = service
        .predict_continuous(&[], &model_id)
        .map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&response).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<(PathBuf, String), String> {
    let mut dump = None;
    let mut model = "gru".to_string();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--model" {
            model = iter
                .next()
                .ok_or_else(|| "--model requires a value".to_string())?;
        } else if arg == "--help" || arg == "-h" {
            return Err(usage());
        } else if dump.is_none() {
            dump = Some(PathBuf::from(arg));
        } else {
            return Err(format!("Unexpected argument '{arg}'\n{}", usage()));
        }
    }
    Ok((dump.ok_or_else(usage)?, model))
}

fn usage() -> String {
    "Usage: entrechat-predict <features.json> [--model gru|transformer]".to_string()
}

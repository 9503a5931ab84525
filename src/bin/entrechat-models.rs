//! Developer utility to list the configured models and their metadata.

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config = entrechat::config::load_or_default().map_err(|err| err.to_string())?;
    let models_dir = entrechat::app_dirs::models_dir().map_err(|err| err.to_string())?;
    println!("Models directory: {}", models_dir.display());

    for (label, paths) in [
        ("gru", &config.models.gru),
        ("transformer", &config.models.transformer),
    ] {
        let model_path = paths.model_path(&models_dir);
        let info_path = paths.info_path(&models_dir);
        println!();
        println!("{label}:");
        println!(
            "  artifact: {}{}",
            model_path.display(),
            if model_path.exists() { "" } else { " (missing)" }
        );
        println!(
            "  info:     {}{}",
            info_path.display(),
            if info_path.exists() { "" } else { " (missing)" }
        );
        if info_path.exists() {
            match entrechat::model::info::load(&info_path) {
                Ok(info) => println!(
                    "  classes={} | frames={} | features={} | accuracy={:.1}%",
                    info.num_classes,
                    info.frames_per_window(),
                    info.feature_dim(),
                    info.accuracy
                ),
                Err(err) => println!("  info unreadable: {err}"),
            }
        }
    }
    Ok(())
}

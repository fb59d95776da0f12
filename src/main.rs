use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use segment_viewer::{
    apply_gesture, scene, Config, HttpBackend, InputEvent, UploadController, UploadRequest, Viewer,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();

    ensure!(config.image.exists(), "Image path does not exist");

    let backend = HttpBackend::new(&config.server, config.request_timeout())?;
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} masks ({eta})",
        )?
        .progress_chars("#>-"),
    );
    let controller = UploadController::new(backend).with_progress(progress_bar);

    let mut viewer = match config.seed {
        Some(seed) => Viewer::with_seed(seed),
        None => Viewer::new(),
    };

    let request = UploadRequest::from_path(&config.image, config.model_path.clone())
        .await
        .with_context(|| format!("Failed to read image: {}", config.image.display()))?;
    controller
        .submit(&mut viewer, &request)
        .await
        .with_context(|| format!("Segmentation failed for {}", config.image.display()))?;

    for gesture in &config.drags {
        if !apply_gesture(&mut viewer, gesture) {
            log::warn!("no mask under {:?}", gesture.start);
        }
    }
    if config.reset {
        viewer.handle_event(&InputEvent::Key('r'));
    }

    let base = viewer.base().context("No base image loaded")?;
    let composite = viewer.composite().context("No base image loaded")?;
    let exported = scene::export(
        &config.output_dir,
        &config.format,
        base,
        &composite,
        viewer.masks(),
        config.export_layers,
    )
    .with_context(|| format!("Failed to export to {}", config.output_dir.display()))?;

    println!("{}", viewer.log().render());
    println!(
        "Wrote {} file(s) to {}",
        exported.paths.len(),
        config.output_dir.display()
    );
    Ok(())
}

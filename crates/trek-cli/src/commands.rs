use crate::settings::{Command, Settings};
use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::{Path, PathBuf};
use trek_lib::snapshot::{FileStorage, load_store};
use trek_lib::{RouteState, TrekId, TrekStore, aggregate, export};

/// Load the store named in `settings` and run its subcommand
pub fn run(settings: &Settings, out: &mut dyn Write) -> Result<()> {
    let backend = FileStorage::open(&settings.store)
        .with_context(|| format!("opening store {}", settings.store.display()))?;
    let store = load_store(&backend)
        .with_context(|| format!("loading store {}", settings.store.display()))?;

    match &settings.command {
        Command::List => list(&store, out),
        Command::Summary { trek } => summary(&store, find_trek(&store, trek)?, out),
        Command::Profile { trek, json } => {
            profile(&store, find_trek(&store, trek)?, settings.earth_radius, *json, out)
        }
        Command::Export { trek, output } => {
            let path = export_to(&store, find_trek(&store, trek)?, output)?;
            writeln!(out, "{}", path.display())?;
            Ok(())
        }
    }
}

fn find_trek(store: &TrekStore, name: &str) -> Result<TrekId> {
    store
        .trek_by_name(name)
        .map(|t| t.id)
        .ok_or_else(|| anyhow!("no trek named {name:?}"))
}

fn list(store: &TrekStore, out: &mut dyn Write) -> Result<()> {
    for trek in store.treks() {
        let owner = store
            .user(trek.owner)
            .map(|u| u.username.as_str())
            .unwrap_or("?");
        writeln!(out, "{}\t{}\t{} routes", trek.name, owner, trek.routes().len())?;
    }
    Ok(())
}

fn summary(store: &TrekStore, trek: TrekId, out: &mut dyn Write) -> Result<()> {
    let summary = aggregate::summarize(store, trek)?;
    writeln!(out, "routes:   {}", summary.route_count)?;
    writeln!(out, "markers:  {}", summary.marker_count)?;
    writeln!(out, "distance: {:.2} km", summary.total_distance / 1000.0)?;
    writeln!(out, "ascent:   {:.0} m", summary.total_ascent)?;
    writeln!(out, "descent:  {:.0} m", summary.total_descent)?;
    if let Some(bounds) = summary.bounds {
        writeln!(
            out,
            "bounds:   {:.5},{:.5} .. {:.5},{:.5}",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        )?;
    }

    for (position, route) in store.trek_routes(trek)?.into_iter().enumerate() {
        let state = match route.state() {
            RouteState::Empty => "empty",
            RouteState::Stale => "stale",
            RouteState::Computed => "computed",
        };
        let distance = route
            .distance()
            .map(|d| format!("{:.2} km", d / 1000.0))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{position}\t{}\t{}/{}\t{} markers\t{state}\t{distance}",
            route.name,
            route.mode.provider_profile(),
            route.preference.provider_name(),
            route.markers().len()
        )?;
    }
    Ok(())
}

fn profile(store: &TrekStore, trek: TrekId, radius_m: f64, json: bool, out: &mut dyn Write) -> Result<()> {
    let samples = aggregate::elevation_profile(store, trek, radius_m)?;
    if json {
        serde_json::to_writer(&mut *out, &samples)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "distance_km,elevation")?;
    for sample in &samples {
        writeln!(out, "{},{}", sample.distance_km, sample.elevation)?;
    }
    Ok(())
}

fn export_to(store: &TrekStore, trek: TrekId, dir: &Path) -> Result<PathBuf> {
    let document = export::export_trek(store, trek)?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(&document.file_name);
    std::fs::write(&path, &document.body).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Wrote {} ({})", path.display(), document.content_type);
    Ok(path)
}

use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use kitebook::config::AppConfig;
use kitebook::models::CalendarView;
use kitebook::services::backend::http::HttpBackend;
use kitebook::services::clock::SystemClock;
use kitebook::services::conflict::{describe_interval, find_overlaps};
use kitebook::services::coordinator::MutationCoordinator;
use kitebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let view = CalendarView::parse(&config.calendar_view);

    let backend = HttpBackend::from_config(&config)?;
    let me = backend.verify_connection().await?;
    tracing::info!(
        "connected to {} as {}",
        config.api_base_url,
        me.get("email").and_then(|v| v.as_str()).unwrap_or("unknown user")
    );

    let state = AppState::new(config, Arc::new(backend), Arc::new(SystemClock));
    let coordinator = MutationCoordinator::new(state.clone());

    match coordinator.load_instructors().await {
        Ok(count) => tracing::info!(count, "instructors loaded"),
        Err(e) => tracing::warn!(error = %e, "could not load instructors, using raw ids"),
    }

    let today = Local::now().date_naive();
    let bookings = coordinator.load_period(view, today).await?;
    let (start, end) = view.visible_period(today);
    tracing::info!(view = view.as_str(), %start, %end, count = bookings.len(), "bookings loaded");

    let overlaps = find_overlaps(&bookings);
    if overlaps.is_empty() {
        tracing::info!("no overlapping bookings");
        return Ok(());
    }

    for (a, b) in &overlaps {
        let instructor = a
            .instructor_id
            .as_deref()
            .map(|id| state.directory.label_for(id))
            .unwrap_or_default();
        tracing::warn!(
            date = %a.date,
            instructor = %instructor,
            "booking {} ({}) overlaps booking {} ({})",
            a.id,
            describe_interval(a),
            b.id,
            describe_interval(b)
        );
    }
    anyhow::bail!("{} overlapping booking pair(s) found", overlaps.len())
}

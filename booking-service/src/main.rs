use std::sync::Arc;

use anyhow::Context;
use booking_service::{
    api::HttpApiClient,
    config::{LogFormat, Settings},
    insurance::SimulatedVerifier,
    location::{LocationService, NominatimGeocoder},
    notifications::ToastBus,
    service::{AppState, build_router},
    wizard::BookingWizard,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "booking_service=debug,wizard_flow=debug,tower_http=debug".into()
    });

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    init_tracing(settings.log_format);

    let api = Arc::new(
        HttpApiClient::new(
            settings.booking_api_url.clone(),
            settings.booking_api_token.clone(),
            settings.http_timeout,
        )
        .context("failed to create booking API client")?,
    );
    let geocoder = Arc::new(
        NominatimGeocoder::new(settings.geocoder_url.clone())
            .context("failed to create geocoder client")?,
    );

    let wizard = BookingWizard::new(
        api.clone(),
        api,
        Arc::new(SimulatedVerifier::new(settings.insurance_verify_delay)),
        Arc::new(LocationService::new(geocoder)),
        ToastBus::new(),
    );
    let app = build_router(AppState { wizard });

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(
        bind_addr = %settings.bind_addr,
        booking_api = %settings.booking_api_url,
        "booking service listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

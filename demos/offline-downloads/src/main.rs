//! offline-downloads - Reusable download rows on compose-dispatch
//!
//! A list of identified rows, each hosting a download component: start a
//! download, watch progress stream in, cancel one mid-flight, and see the
//! row's effect die with it.

use std::time::Duration;

use compose_dispatch::prelude::*;
use tokio_stream::StreamExt;
use uuid::Uuid;

// ============================================================================
// Download component - reusable per-row feature
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Mode {
    NotDownloaded,
    InProgress { progress: f64 },
    Downloaded,
}

#[derive(Clone, Debug)]
struct CityMap {
    id: Uuid,
    title: String,
    url: String,
    mode: Mode,
}

impl Identifiable for CityMap {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Action, Clone, Debug)]
enum DownloadAction {
    ButtonTapped,
    Event(Result<DownloadEvent, DownloadError>),
}

struct DownloadComponent {
    client: DownloadClient,
}

impl Reducer for DownloadComponent {
    type State = CityMap;
    type Action = DownloadAction;

    fn reduce(&self, state: &mut CityMap, action: DownloadAction) -> Effect<DownloadAction> {
        match action {
            DownloadAction::ButtonTapped => match state.mode {
                Mode::NotDownloaded => {
                    state.mode = Mode::InProgress { progress: 0.0 };
                    let client = self.client.clone();
                    let url = state.url.clone();
                    Effect::run(move |send| async move {
                        let mut events = client.start(url);
                        while let Some(event) = events.next().await {
                            send.send(DownloadAction::Event(event));
                        }
                    })
                    .cancellable_in_flight(CancelId::new("download"))
                }
                Mode::InProgress { .. } => {
                    state.mode = Mode::NotDownloaded;
                    Effect::cancel(CancelId::new("download"))
                }
                Mode::Downloaded => {
                    state.mode = Mode::NotDownloaded;
                    Effect::none()
                }
            },
            DownloadAction::Event(Ok(DownloadEvent::Progress(progress))) => {
                if matches!(state.mode, Mode::InProgress { .. }) {
                    state.mode = Mode::InProgress { progress };
                }
                Effect::none()
            }
            DownloadAction::Event(Ok(DownloadEvent::Response(_))) => {
                state.mode = Mode::Downloaded;
                Effect::none()
            }
            DownloadAction::Event(Err(error)) => {
                tracing::warn!(%error, title = %state.title, "download failed");
                state.mode = Mode::NotDownloaded;
                Effect::none()
            }
        }
    }
}

// ============================================================================
// App - identified rows of download components
// ============================================================================

#[derive(Debug, Default)]
struct AppState {
    city_maps: IdentifiedVec<CityMap>,
}

#[derive(Action, Clone, Debug)]
enum AppAction {
    CityMaps(Uuid, DownloadAction),
}

fn app(client: DownloadClient) -> impl Reducer<State = AppState, Action = AppAction> {
    NoopReducer::new().for_each(
        "city_maps",
        |s: &mut AppState| &mut s.city_maps,
        CasePath::new(
            |a| match a {
                AppAction::CityMaps(id, action) => Ok((id, action)),
            },
            |(id, action)| AppAction::CityMaps(id, action),
        ),
        DownloadComponent { client },
    )
}

/// Ten progress steps, 150ms apart, then the payload.
fn simulated_client() -> DownloadClient {
    DownloadClient::new(|url| {
        tokio_stream::iter(1..=10u32).then(move |step| {
            let url = url.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                if step == 10 {
                    Ok(DownloadEvent::Response(url.into_bytes()))
                } else {
                    Ok(DownloadEvent::Progress(f64::from(step) / 10.0))
                }
            }
        })
    })
}

fn print_rows(store: &Store<AppState, AppAction>) {
    store.with_state(|s| {
        for row in s.city_maps.iter() {
            let status = match &row.mode {
                Mode::NotDownloaded => "not downloaded".to_string(),
                Mode::InProgress { progress } => format!("{:>3.0}%", progress * 100.0),
                Mode::Downloaded => "downloaded".to_string(),
            };
            println!("  {:<16} {status}", row.title);
        }
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let idgen = IdGen::random();
    let new_york = idgen.next();
    let paris = idgen.next();

    let mut state = AppState::default();
    for (id, title) in [(new_york, "New York, NY"), (paris, "Paris, France")] {
        state.city_maps.push(CityMap {
            id,
            title: title.to_string(),
            url: format!("https://example.com/{id}.zip"),
            mode: Mode::NotDownloaded,
        });
    }

    let store = Store::new(state, app(simulated_client()));

    println!("starting both downloads:");
    let new_york_download = store.send(AppAction::CityMaps(new_york, DownloadAction::ButtonTapped));
    store.send(AppAction::CityMaps(paris, DownloadAction::ButtonTapped));
    print_rows(&store);

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("\nhalfway there:");
    print_rows(&store);

    // Tap the in-flight Paris row again to cancel it.
    store.send(AppAction::CityMaps(paris, DownloadAction::ButtonTapped));
    println!("\ncancelled Paris mid-flight:");
    print_rows(&store);

    new_york_download.finish().await;
    println!("\nNew York finished:");
    print_rows(&store);
}

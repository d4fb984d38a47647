//! A reusable offline-download row composed into an identified list:
//! progress streaming, tap-to-cancel, and deletion mid-download.

use compose_dispatch::prelude::*;
use compose_dispatch::{assert_delivered, assert_not_delivered, ActionLog, Recorded};
use tokio_stream::StreamExt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
enum Mode {
    NotDownloaded,
    InProgress { progress: f64 },
    Downloaded,
}

#[derive(Clone, Debug, PartialEq)]
struct CityMap {
    id: Uuid,
    title: String,
    url: String,
    mode: Mode,
}

impl CityMap {
    fn new(id: Uuid, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            url: format!("https://example.com/{title}.zip"),
            mode: Mode::NotDownloaded,
        }
    }
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
                    // Tap again to cancel the active download.
                    state.mode = Mode::NotDownloaded;
                    Effect::cancel(CancelId::new("download"))
                }
                Mode::Downloaded => {
                    // Tap to delete the downloaded data.
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
            DownloadAction::Event(Err(_)) => {
                state.mode = Mode::NotDownloaded;
                Effect::none()
            }
        }
    }
}

#[derive(Debug, Default)]
struct CityMapsState {
    city_maps: IdentifiedVec<CityMap>,
}

#[derive(Action, Clone, Debug)]
enum CityMapsAction {
    CityMaps(Uuid, DownloadAction),
    DeleteRow(Uuid),
}

fn city_maps(client: DownloadClient) -> impl Reducer<State = CityMapsState, Action = CityMapsAction> {
    Reduce::new(|state: &mut CityMapsState, action| {
        if let CityMapsAction::DeleteRow(id) = action {
            state.city_maps.remove(&id);
        }
        Effect::none()
    })
    .for_each(
        "city_maps",
        |s| &mut s.city_maps,
        CasePath::new(
            |a| match a {
                CityMapsAction::CityMaps(id, action) => Ok((id, action)),
                other => Err(other),
            },
            |(id, action)| CityMapsAction::CityMaps(id, action),
        ),
        DownloadComponent { client },
    )
}

fn store_with(
    client: DownloadClient,
    ids: &[Uuid],
) -> (Store<CityMapsState, CityMapsAction>, ActionLog<CityMapsAction>) {
    let mut state = CityMapsState::default();
    for (i, id) in ids.iter().enumerate() {
        state.city_maps.push(CityMap::new(*id, &format!("city-{i}")));
    }
    let log = ActionLog::new();
    let store = Store::new(state, Recorded::new(city_maps(client), log.clone()));
    (store, log)
}

fn ids(n: usize) -> Vec<Uuid> {
    let idgen = IdGen::incrementing();
    (0..n).map(|_| idgen.next()).collect()
}

/// Emits some progress, then stays in flight forever.
fn stalling_client() -> DownloadClient {
    DownloadClient::new(|_url| {
        tokio_stream::iter(vec![Ok(DownloadEvent::Progress(0.2))]).chain(tokio_stream::pending())
    })
}

#[tokio::test]
async fn test_download_completes() {
    let ids = ids(1);
    let client = DownloadClient::scripted(vec![
        Ok(DownloadEvent::Progress(0.25)),
        Ok(DownloadEvent::Progress(0.75)),
        Ok(DownloadEvent::Response(vec![1, 2, 3])),
    ]);
    let (store, log) = store_with(client, &ids);

    store
        .send(CityMapsAction::CityMaps(ids[0], DownloadAction::ButtonTapped))
        .finish()
        .await;

    store.with_state(|s| {
        assert_eq!(s.city_maps.get(&ids[0]).map(|row| row.mode.clone()), Some(Mode::Downloaded));
    });
    let actions = log.drain();
    assert_delivered!(
        actions,
        CityMapsAction::CityMaps(_, DownloadAction::Event(Ok(DownloadEvent::Progress(_))))
    );
}

#[tokio::test]
async fn test_tapping_again_cancels_in_flight_download() {
    let ids = ids(1);
    let (store, log) = store_with(stalling_client(), &ids);

    let download = store.send(CityMapsAction::CityMaps(ids[0], DownloadAction::ButtonTapped));

    // Wait for the first progress event to land.
    for _ in 0..10 {
        tokio::task::yield_now().await;
        let in_progress = store.with_state(|s| {
            matches!(
                s.city_maps.get(&ids[0]).map(|row| &row.mode),
                Some(Mode::InProgress { progress }) if *progress > 0.0
            )
        });
        if in_progress {
            break;
        }
    }

    store.send(CityMapsAction::CityMaps(ids[0], DownloadAction::ButtonTapped));
    log.drain();

    download.finish().await;

    store.with_state(|s| {
        assert_eq!(
            s.city_maps.get(&ids[0]).map(|row| row.mode.clone()),
            Some(Mode::NotDownloaded)
        );
    });
    assert_not_delivered!(log.drain(), CityMapsAction::CityMaps(_, DownloadAction::Event(_)));
}

#[tokio::test]
async fn test_deleting_row_cancels_its_download() {
    let ids = ids(2);
    let (store, log) = store_with(stalling_client(), &ids);

    let download = store.send(CityMapsAction::CityMaps(ids[0], DownloadAction::ButtonTapped));
    store.send(CityMapsAction::DeleteRow(ids[0]));
    log.drain();

    download.finish().await;

    store.with_state(|s| {
        assert!(!s.city_maps.contains(&ids[0]));
        assert_eq!(s.city_maps.len(), 1);
    });
    assert_not_delivered!(log.drain(), CityMapsAction::CityMaps(_, DownloadAction::Event(_)));
}

#[tokio::test]
async fn test_download_failure_resets_row() {
    let ids = ids(1);
    let client = DownloadClient::scripted(vec![
        Ok(DownloadEvent::Progress(0.5)),
        Err(DownloadError::Failed("connection reset".into())),
    ]);
    let (store, log) = store_with(client, &ids);

    store
        .send(CityMapsAction::CityMaps(ids[0], DownloadAction::ButtonTapped))
        .finish()
        .await;

    store.with_state(|s| {
        assert_eq!(
            s.city_maps.get(&ids[0]).map(|row| row.mode.clone()),
            Some(Mode::NotDownloaded)
        );
    });
    assert_delivered!(log.drain(), CityMapsAction::CityMaps(_, DownloadAction::Event(Err(_))));
}

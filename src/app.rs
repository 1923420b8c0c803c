use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::contact::ContactLinks;
use crate::filter::{Criteria, filter_and_sort_resolved};
use crate::menu::{self, MenuEntry};
use crate::normalize::normalize;
use crate::record::{Record, ingest};
use crate::resolver::Field;
use crate::source::{CachedSource, Dataset, FileSource, RecordSource};

pub struct AppState<S = FileSource> {
    source: CachedSource<S>,
    settings: Settings,
}

impl<S: RecordSource> AppState<S> {
    pub fn new(source: S, settings: Settings) -> Self {
        AppState {
            source: CachedSource::new(source, settings.cache_ttl()),
            settings,
        }
    }
}

#[derive(Deserialize)]
struct PatientQuery {
    q: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize)]
struct MenuQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct PatientsResponse<'a> {
    total: usize,
    shown: usize,
    columns: Vec<Field>,
    records: Vec<&'a Record>,
}

#[derive(Serialize)]
struct MenuItem<'a> {
    #[serde(flatten)]
    entry: &'a MenuEntry,
    patients: Vec<&'a Record>,
}

#[derive(Serialize)]
struct ChoicesResponse {
    categories: Vec<String>,
    priorities: Vec<String>,
    sort: Vec<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

/// Build the JSON API router around `state`.
pub fn router<S: RecordSource + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/api/patients", get(list_patients::<S>))
        .route("/api/menu", get(list_menu::<S>))
        .route("/api/choices", get(list_choices::<S>))
        .route("/api/contact/:name", get(contact::<S>))
        .route("/api/refresh", post(refresh::<S>))
        .with_state(state)
}

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let bind = settings.bind.clone();
    let source = FileSource::new(&settings);
    log::info!("reading records from {}", source.describe());

    let app_state = Arc::new(AppState::new(source, settings));
    let app = router(app_state);

    let listener = TcpListener::bind(&bind).await?;
    log::info!("listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn load<S: RecordSource>(state: &AppState<S>) -> Result<Arc<Dataset>, Response> {
    state.source.get().map_err(|e| {
        log::error!("failed to load records: {}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(e.to_string()),
            }),
        )
            .into_response()
    })
}

async fn list_patients<S: RecordSource>(
    Query(params): Query<PatientQuery>,
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    let data = match load(&state) {
        Ok(data) => data,
        Err(resp) => return resp,
    };

    let mut criteria = Criteria::from_labels(
        params.q.as_deref(),
        params.category.as_deref(),
        params.priority.as_deref(),
        params.sort.as_deref(),
    );
    if params.sort.is_none() {
        criteria.sort = state.settings.default_sort;
    }

    let views = ingest(&data.patients.records);
    let shown = filter_and_sort_resolved(&views, &criteria);

    Json(PatientsResponse {
        total: views.len(),
        shown: shown.len(),
        columns: crate::downloader::display_fields(&shown),
        records: shown.iter().map(|v| v.record()).collect(),
    })
    .into_response()
}

async fn list_menu<S: RecordSource>(
    Query(params): Query<MenuQuery>,
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    let data = match load(&state) {
        Ok(data) => data,
        Err(resp) => return resp,
    };

    let entries = menu::menu_entries(&data.menu);
    let views = ingest(&data.patients.records);
    let items: Vec<MenuItem<'_>> = menu::search_menu(&entries, params.q.as_deref().unwrap_or(""))
        .into_iter()
        .map(|entry| MenuItem {
            entry,
            patients: menu::patients_for(&entry.pathology, &views)
                .into_iter()
                .map(|v| v.record())
                .collect(),
        })
        .collect();

    Json(items).into_response()
}

async fn list_choices<S: RecordSource>(State(state): State<Arc<AppState<S>>>) -> Response {
    let data = match load(&state) {
        Ok(data) => data,
        Err(resp) => return resp,
    };

    let entries = menu::menu_entries(&data.menu);
    let views = ingest(&data.patients.records);

    Json(ChoicesResponse {
        categories: menu::category_choices(&entries, &views),
        priorities: menu::priority_choices(&data.params),
        sort: ["recent_date", "priority", "name"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    })
    .into_response()
}

async fn contact<S: RecordSource>(
    Path(name): Path<String>,
    State(state): State<Arc<AppState<S>>>,
) -> Response {
    let data = match load(&state) {
        Ok(data) => data,
        Err(resp) => return resp,
    };

    let wanted = normalize(&name);
    let views = ingest(&data.patients.records);
    let found = views
        .iter()
        .find(|v| v.text(Field::Name).is_some_and(|n| normalize(&n) == wanted));

    match found.and_then(ContactLinks::for_record) {
        Some(links) => Json(links).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn refresh<S: RecordSource>(State(state): State<Arc<AppState<S>>>) -> Response {
    state.source.invalidate();
    Json(StatusResponse {
        status: "ok".to_string(),
        message: None,
    })
    .into_response()
}

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    analyzer::GarmentAnalyzer,
    config::Config,
    error::StudioError,
    gemini::{ImageProvider, InlineImage},
    models::{AnalyzeRequest, CreateShootRequest, GarmentAnalysis, GeneratedFrame, Progress, RefineRequest, Shoot, ShootStatus},
    presets,
    refiner::ImageRefiner,
    sequence::{SequenceGenerator, ShootBrief},
    store::ShootStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ShootStore>>,
    pub analyzer: Arc<GarmentAnalyzer>,
    pub generator: Arc<SequenceGenerator>,
    pub refiner: Arc<ImageRefiner>,
    /// Parent of every per-request cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(provider: Arc<dyn ImageProvider>, config: &Config) -> Self {
        Self::from_parts(
            GarmentAnalyzer::new(provider.clone(), config.analysis_model.clone()),
            SequenceGenerator::new(provider.clone(), config.image_model.clone()),
            ImageRefiner::new(provider, config.image_model.clone()),
            config.history_limit,
        )
    }

    pub fn from_parts(
        analyzer: GarmentAnalyzer,
        generator: SequenceGenerator,
        refiner: ImageRefiner,
        history_limit: usize,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(ShootStore::new(history_limit))),
            analyzer: Arc::new(analyzer),
            generator: Arc::new(generator),
            refiner: Arc::new(refiner),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Gemini accepts roughly 20 MB of inline image data; base64 and JSON framing add a third.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/presets", get(list_presets))
        .route("/api/garments/analyze", post(analyze_garment))
        .route("/api/shoots", post(create_shoot).get(list_shoots))
        .route("/api/shoots/:id", get(get_shoot))
        .route("/api/shoots/:id/cancel", post(cancel_shoot))
        .route("/api/shoots/:id/frames/:frame_id/refine", post(refine_frame))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_presets() -> Json<Value> {
    Json(json!({
        "scenes": presets::SCENES,
        "models": presets::MODELS,
        "pose_sets": presets::POSE_SETS,
    }))
}

pub async fn analyze_garment(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<GarmentAnalysis>, StudioError> {
    let garment = InlineImage::sniff(body.image_base64);
    let cancel = state.shutdown.child_token();
    let analysis = state.analyzer.analyze(&garment, &cancel).await?;
    Ok(Json(analysis))
}

fn resolve_poses(body: &CreateShootRequest) -> Result<Vec<String>, StudioError> {
    let explicit: Vec<String> = body
        .poses
        .iter()
        .flatten()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    let set = body.pose_set.as_deref().unwrap_or(presets::DEFAULT_POSE_SET);
    presets::pose_set(set).ok_or_else(|| StudioError::InvalidInput(format!("unknown pose set '{}'", set)))
}

pub async fn create_shoot(
    State(state): State<AppState>,
    Json(body): Json<CreateShootRequest>,
) -> Result<Json<Shoot>, StudioError> {
    if body.garment_image_base64.is_empty() {
        return Err(StudioError::InvalidInput("garment image is empty".into()));
    }
    let poses = resolve_poses(&body)?;
    let scene = presets::resolve_scene(&body.scene);
    let model = presets::resolve_model(&body.model);
    let garment = InlineImage::sniff(body.garment_image_base64);
    let cancel = state.shutdown.child_token();

    let analysis = match body.analysis {
        Some(analysis) => {
            analysis.validate().map_err(StudioError::InvalidInput)?;
            analysis
        }
        None => state.analyzer.analyze(&garment, &cancel).await?,
    };

    let id = Uuid::new_v4();
    tracing::info!(%id, poses = poses.len(), garment = %analysis.garment_type, "🚀 Starting photoshoot");

    let shoot = Shoot {
        id,
        analysis: analysis.clone(),
        scene: scene.clone(),
        model: model.clone(),
        poses: poses.clone(),
        frames: Vec::new(),
        status: ShootStatus::Running,
        progress: Progress { index: 0, total: poses.len(), is_retry: false },
        error: None,
        error_code: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        garment: Some(garment.clone()),
    };
    state.store.write().insert_running(shoot.clone(), cancel.clone());
    let running = RunningShoot { store: state.store.clone(), snapshot: shoot, cancel: cancel.clone(), finished: false };

    let progress_store = state.store.clone();
    let mut on_progress = move |p: Progress| {
        if let Some(shoot) = progress_store.write().get_mut(&id) {
            shoot.progress = p;
            shoot.updated_at = Utc::now();
        }
    };

    let brief = ShootBrief { garment: &garment, analysis: &analysis, scene: &scene, model: &model, poses: &poses };
    let result = state.generator.generate_sequence(brief, &mut on_progress, &cancel).await;
    running.finish(result).map(Json)
}

/// Bookkeeping for a shoot whose sequence runs inside the request future.
///
/// If the future is dropped before [`RunningShoot::finish`] (client went away),
/// the shoot is marked cancelled and its token untracked.
struct RunningShoot {
    store: Arc<RwLock<ShootStore>>,
    snapshot: Shoot,
    cancel: CancellationToken,
    finished: bool,
}

impl RunningShoot {
    fn finish(mut self, result: Result<Vec<GeneratedFrame>, StudioError>) -> Result<Shoot, StudioError> {
        self.finished = true;
        let id = self.snapshot.id;
        let mut store = self.store.write();
        let outcome = {
            let shoot = match store.get_mut(&id) {
                Some(shoot) => shoot,
                None => {
                    tracing::warn!(%id, "Shoot left the history while running, answering from snapshot");
                    &mut self.snapshot
                }
            };
            shoot.updated_at = Utc::now();
            match result {
                Ok(frames) => {
                    tracing::info!(%id, frames = frames.len(), "✅ Photoshoot completed");
                    shoot.frames = frames;
                    shoot.status = ShootStatus::Completed;
                    Ok(shoot.clone())
                }
                Err(e) => {
                    tracing::error!(%id, code = e.code(), "❌ Photoshoot failed: {}", e);
                    shoot.status = if matches!(e, StudioError::Cancelled) { ShootStatus::Cancelled } else { ShootStatus::Failed };
                    shoot.error = Some(e.to_string());
                    shoot.error_code = Some(e.code().to_string());
                    Err(e)
                }
            }
        };
        // untrack last: it may trim the history
        store.untrack(&id);
        outcome
    }
}

impl Drop for RunningShoot {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let id = self.snapshot.id;
        tracing::warn!(%id, "🛑 Request dropped before the photoshoot finished");
        self.cancel.cancel();
        let mut store = self.store.write();
        if let Some(shoot) = store.get_mut(&id) {
            let err = StudioError::Cancelled;
            shoot.status = ShootStatus::Cancelled;
            shoot.error = Some(format!("{} (client disconnected)", err));
            shoot.error_code = Some(err.code().to_string());
            shoot.updated_at = Utc::now();
        }
        store.untrack(&id);
    }
}

pub async fn list_shoots(State(state): State<AppState>) -> Json<Vec<Shoot>> {
    Json(state.store.read().history())
}

pub async fn get_shoot(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Shoot>, StudioError> {
    state
        .store
        .read()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| StudioError::NotFound(format!("shoot {}", id)))
}

pub async fn cancel_shoot(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, StudioError> {
    let store = state.store.read();
    if store.cancel(&id) {
        tracing::info!(%id, "🛑 Cancellation requested");
        Ok(StatusCode::ACCEPTED)
    } else if store.get(&id).is_some() {
        Err(StudioError::InvalidInput(format!("shoot {} is not running", id)))
    } else {
        Err(StudioError::NotFound(format!("shoot {}", id)))
    }
}

pub async fn refine_frame(
    Path((id, frame_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
    Json(body): Json<RefineRequest>,
) -> Result<Json<GeneratedFrame>, StudioError> {
    let source = {
        let store = state.store.read();
        let shoot = store.get(&id).ok_or_else(|| StudioError::NotFound(format!("shoot {}", id)))?;
        shoot
            .frames
            .iter()
            .find(|f| f.id == frame_id)
            .map(GeneratedFrame::image)
            .ok_or_else(|| StudioError::NotFound(format!("frame {}", frame_id)))?
    };

    // Refine outside the lock
    let cancel = state.shutdown.child_token();
    let refined = state.refiner.refine(&source, &body.instruction, &cancel).await?;
    let frame = GeneratedFrame::new(refined, body.instruction.trim());

    let mut store = state.store.write();
    if let Some(shoot) = store.get_mut(&id) {
        shoot.frames.push(frame.clone());
        shoot.updated_at = Utc::now();
    }
    tracing::info!(%id, frame = %frame.id, "✅ Frame refined");
    Ok(Json(frame))
}

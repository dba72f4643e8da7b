use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// Reports each dependency; a missing or unreachable database marks the service degraded.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db() {
        Ok(db) => match db.ping().await {
            Ok(()) => json!({ "engine": db.engine().as_str(), "ok": true }),
            Err(err) => json!({ "engine": db.engine().as_str(), "ok": false, "code": err.code() }),
        },
        Err(err) => json!({ "ok": false, "code": err.code() }),
    };
    let ok = database["ok"].as_bool().unwrap_or(false);
    Json(json!({
        "status": if ok { "ok" } else { "degraded" },
        "database": database,
        "mail": state.mailer.enabled(),
        "images": state.images.kind(),
    }))
}

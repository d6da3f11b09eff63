use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const CODE_MALFORMED: i64 = 1000;
pub const CODE_INVALID: i64 = 1001;
pub const CODE_CONFLICT: i64 = 1002;
pub const CODE_NOT_FOUND: i64 = 1003;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub replicas: u32,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub ports: Vec<Port>,
}

/// Lenient input shape: missing and null fields become validation failures
/// instead of JSON rejections. Port numbers outside `u16` are malformed.
#[derive(Deserialize)]
pub struct CreateDeployment {
    pub id: Option<Uuid>,
    pub replicas: Option<i64>,
    pub image: Option<String>,
    pub labels: Option<HashMap<String, String>>,
    pub ports: Option<Vec<Port>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub message: String,
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<HashMap<String, Vec<String>>>,
}

struct Stored {
    deployment: Deployment,
    created_at: DateTime<Utc>,
}

type Db = Arc<RwLock<HashMap<Uuid, Stored>>>;

type ApiError = (StatusCode, Json<Envelope>);

fn envelope(status: StatusCode, message: &str, code: i64) -> ApiError {
    (
        status,
        Json(Envelope {
            message: message.to_string(),
            code,
            extras: None,
        }),
    )
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/deployments", post(create_deployment))
        .route(
            "/deployments/{id}",
            get(get_deployment).delete(delete_deployment),
        )
        .with_state(db)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("deployment mock server listening on {addr}");
    }
    axum::serve(listener, app()).await
}

/// Field checks in reporting order: id, replicas, image, ports.
pub fn failed_fields(input: &CreateDeployment) -> Vec<String> {
    let mut failed = Vec::new();
    if input.id.map_or(true, |id| id.is_nil()) {
        failed.push("id".to_string());
    }
    if replicas(input).is_none() {
        failed.push("replicas".to_string());
    }
    if input.image.as_deref().map_or(true, str::is_empty) {
        failed.push("image".to_string());
    }
    if input.ports.as_ref().map_or(true, Vec::is_empty) {
        failed.push("ports".to_string());
    }
    failed
}

/// Replica count when it is positive and fits `u32`.
fn replicas(input: &CreateDeployment) -> Option<u32> {
    input
        .replicas
        .and_then(|r| u32::try_from(r).ok())
        .filter(|r| *r > 0)
}

async fn create_deployment(
    State(db): State<Db>,
    input: Result<Json<CreateDeployment>, JsonRejection>,
) -> Result<(StatusCode, Json<Deployment>), ApiError> {
    let Json(input) = input
        .map_err(|e| envelope(StatusCode::BAD_REQUEST, &e.body_text(), CODE_MALFORMED))?;

    let failed = failed_fields(&input);
    if !failed.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(Envelope {
                message: "invalid deployment".to_string(),
                code: CODE_INVALID,
                extras: Some(HashMap::from([("failed_fields".to_string(), failed)])),
            }),
        ));
    }

    let deployment = Deployment {
        id: input.id.unwrap_or_default(),
        replicas: replicas(&input).unwrap_or_default(),
        image: input.image.unwrap_or_default(),
        labels: input.labels.unwrap_or_default(),
        ports: input.ports.unwrap_or_default(),
    };

    let mut deployments = db.write().await;
    if deployments.contains_key(&deployment.id) {
        return Err(envelope(
            StatusCode::CONFLICT,
            "deployment already exists",
            CODE_CONFLICT,
        ));
    }
    deployments.insert(
        deployment.id,
        Stored {
            deployment: deployment.clone(),
            created_at: Utc::now(),
        },
    );
    Ok((StatusCode::CREATED, Json(deployment)))
}

async fn get_deployment(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deployment>, ApiError> {
    let deployments = db.read().await;
    let stored = deployments
        .get(&id)
        .ok_or_else(|| envelope(StatusCode::NOT_FOUND, "not found", CODE_NOT_FOUND))?;
    debug!("deployment {id} created at {}", stored.created_at);
    Ok(Json(stored.deployment.clone()))
}

async fn delete_deployment(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut deployments = db.write().await;
    deployments
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| envelope(StatusCode::NOT_FOUND, "not found", CODE_NOT_FOUND))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> CreateDeployment {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn empty_object_fails_every_field_in_order() {
        assert_eq!(
            failed_fields(&parse("{}")),
            vec!["id", "replicas", "image", "ports"]
        );
    }

    #[test]
    fn nil_id_and_null_ports_fail() {
        let input = parse(
            r#"{"id":"00000000-0000-0000-0000-000000000000","replicas":1,"image":"nginx","ports":null}"#,
        );
        assert_eq!(failed_fields(&input), vec!["id", "ports"]);
    }

    #[test]
    fn zero_replicas_fails() {
        let input = parse(&format!(
            r#"{{"id":"{}","replicas":0,"image":"nginx","ports":[{{"name":"http","port":80}}]}}"#,
            Uuid::new_v4()
        ));
        assert_eq!(failed_fields(&input), vec!["replicas"]);
    }

    #[test]
    fn replicas_beyond_u32_fail() {
        let input = parse(&format!(
            r#"{{"id":"{}","replicas":4294967296,"image":"nginx","ports":[{{"name":"http","port":80}}]}}"#,
            Uuid::new_v4()
        ));
        assert_eq!(failed_fields(&input), vec!["replicas"]);
    }

    #[test]
    fn out_of_range_port_is_malformed() {
        let raw = r#"{"id":null,"ports":[{"name":"http","port":70000}]}"#;
        assert!(serde_json::from_str::<CreateDeployment>(raw).is_err());
    }

    #[test]
    fn complete_input_passes() {
        let input = parse(&format!(
            r#"{{"id":"{}","replicas":2,"image":"nginx","labels":{{"app":"web"}},"ports":[{{"name":"http","port":80}}]}}"#,
            Uuid::new_v4()
        ));
        assert!(failed_fields(&input).is_empty());
    }

    #[test]
    fn envelope_omits_missing_extras() {
        let json = serde_json::to_value(Envelope {
            message: "not found".to_string(),
            code: CODE_NOT_FOUND,
            extras: None,
        })
        .unwrap();
        assert_eq!(json["message"], "not found");
        assert!(json.get("extras").is_none());
    }

    #[test]
    fn deployment_wire_shape_has_no_timestamp() {
        let deployment = Deployment {
            id: Uuid::nil(),
            replicas: 1,
            image: "nginx".to_string(),
            labels: HashMap::new(),
            ports: vec![Port {
                name: "http".to_string(),
                port: 80,
            }],
        };
        let json = serde_json::to_value(&deployment).unwrap();
        assert_eq!(json["ports"][0]["port"], 80);
        assert!(json.get("created_at").is_none());
    }
}

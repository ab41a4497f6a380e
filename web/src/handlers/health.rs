//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

/// Liveness body.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `ok`
    pub status: &'static str,
}

/// `GET /health`
///
/// Does not touch the database; load balancers use it to see the process is up.
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
    }
}

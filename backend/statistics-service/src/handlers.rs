//! HTTP surface: health probes, metrics and statistics reads

use actix_web::{web, HttpResponse, Responder};
use event_schema::EventKind;
use serde::Deserialize;

use crate::error::{Result, StatisticsError};
use crate::metrics;
use crate::services::{StatisticsQuery, UserRanking};

#[derive(Debug, Deserialize)]
pub struct TopPostsQuery {
    /// `likes` or `views`
    pub by: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopUsersQuery {
    /// `actors` or `owners`
    pub by: Option<String>,
    pub limit: Option<usize>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .route("/ready", web::get().to(|| async { "READY" }))
        .route("/metrics", web::get().to(metrics_handler))
        .service(
            web::scope("/api/v1/statistics")
                .route("/posts/{post_id}", web::get().to(post_statistics))
                .route("/top-posts", web::get().to(top_posts))
                .route("/top-users", web::get().to(top_users)),
        );
}

async fn metrics_handler() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::render())
}

async fn post_statistics(
    query: web::Data<StatisticsQuery>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let stats = query.post_statistics(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

async fn top_posts(
    query: web::Data<StatisticsQuery>,
    params: web::Query<TopPostsQuery>,
) -> Result<HttpResponse> {
    let by = params
        .by
        .as_deref()
        .ok_or_else(|| StatisticsError::Validation("Unknown sort type".to_string()))?;
    let kind: EventKind = by.parse()?;

    let posts = query.top_posts(kind, params.limit).await?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn top_users(
    query: web::Data<StatisticsQuery>,
    params: web::Query<TopUsersQuery>,
) -> Result<HttpResponse> {
    let ranking = match params.by.as_deref() {
        Some(by) => by.parse::<UserRanking>()?,
        None => UserRanking::default(),
    };

    let users = query.top_users(params.limit, ranking).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::store::{AggregateStore, MemoryAggregateStore};
    use actix_web::{http::StatusCode, test, App};
    use event_schema::InteractionEvent;
    use std::sync::Arc;

    async fn app_query() -> StatisticsQuery {
        let store = Arc::new(MemoryAggregateStore::new());
        for user in ["bob", "carol"] {
            store
                .insert(EventKind::Like, &InteractionEvent::new("42", "alice", user))
                .await
                .unwrap();
        }
        StatisticsQuery::new(store, QueryConfig::default())
    }

    #[actix_web::test]
    async fn test_post_statistics_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_query().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/statistics/posts/42")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["post_id"], "42");
        assert_eq!(body["likes"], 2);
        assert_eq!(body["views"], 0);
    }

    #[actix_web::test]
    async fn test_top_posts_requires_known_sort() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_query().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/statistics/top-posts?by=shares")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/statistics/top-posts?by=likes&limit=1")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["post_id"], "42");
        assert_eq!(body[0]["author"], "alice");
        assert_eq!(body[0]["count"], 2);
    }

    #[actix_web::test]
    async fn test_top_users_defaults_to_actors() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_query().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/statistics/top-users")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/v1/statistics/top-users?by=owners")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["username"], "alice");
        assert_eq!(body[0]["count"], 2);
    }

    #[actix_web::test]
    async fn test_health_probes() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_query().await))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/documents",
        document_routes(config.documents.max_upload_size),
    )
}

fn document_routes(max_upload_size: usize) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::document::upload_document))
        .routes(routes!(
            handlers::document::get_document,
            handlers::document::delete_document
        ))
        .routes(routes!(handlers::document::download_document))
        .routes(routes!(handlers::document::replace_document_file))
        .layer(handlers::document::document_body_limit(max_upload_size))
}

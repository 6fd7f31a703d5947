use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(schemas(axum_helpers::ErrorResponse)),
    info(
        title = "Chat Ingestion Gateway",
        version = "0.1.0",
        description = "Authenticated chat send/stream/file-extraction surface, backed by the primary job stream"
    ),
    servers((url = "/api", description = "API base path"))
)]
pub struct ApiDoc;

//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use codedrop_core::models;

/// Returns the OpenAPI spec served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Codedrop API",
        version = "0.1.0",
        description = "Ephemeral file exchange. Upload a file to receive a short retrieval code; anyone holding the code can fetch the file until it expires."
    ),
    paths(
        handlers::upload::upload_file,
        handlers::file_info::get_file_info,
        handlers::download::download_file,
        handlers::file_delete::delete_file,
        handlers::stats::get_stats,
    ),
    components(
        schemas(
            handlers::upload::UploadResponse,
            handlers::file_info::FileInfoResponse,
            handlers::file_delete::DeleteResponse,
            handlers::stats::StatsResponse,
            models::FileMetadata,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "files", description = "Upload, inspect, download and delete files by code"),
        (name = "system", description = "Service statistics")
    )
)]
pub struct ApiDoc;

use utoipa::OpenApi;

use super::handlers::{admin, health, resume};

/// `OpenAPI` document for everything the router serves.
///
/// New endpoints are registered here as well as in `api::router` so the
/// served routes and the generated spec stay in step.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        resume::send_link,
        resume::exchange,
        resume::get_draft,
        resume::save_draft,
        resume::presign_upload,
        resume::whoami,
        resume::logout,
        admin::request_magic_link,
        admin::verify_magic_link,
        admin::get_submission,
    ),
    components(schemas(
        health::Health,
        resume::types::SendLinkRequest,
        resume::types::SendLinkResponse,
        resume::types::SaveDraftRequest,
        resume::types::SaveDraftResponse,
        resume::types::PresignUploadRequest,
        resume::types::PresignUploadResponse,
        resume::types::WhoamiResponse,
        admin::types::MagicLinkRequest,
        admin::types::VerifyResponse,
        admin::types::SubmissionResponse,
    )),
    tags(
        (name = "resume", description = "Applicant draft and resume-link flow"),
        (name = "admin", description = "Staff magic-link login and review"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

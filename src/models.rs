use serde::Serialize;

// response for file upload endpoint
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub size: u64,
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

// response for health endpoint
#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub tracked_uploads: usize,
    pub timestamp: String,
}

//! API endpoint URL builders

/// Build the submission URL
pub fn submit_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

/// Build a job's coordinator URL
pub fn job_url(base_url: &str, job_id: &str, count: usize) -> String {
    format!("{}/jobs/{}?count={}", base_url.trim_end_matches('/'), job_id, count)
}

/// Build health check URL
pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}

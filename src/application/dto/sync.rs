use uuid::Uuid;

use crate::application::services::reconciler::ListingSummary;

#[derive(Debug, Clone)]
pub struct SiteSyncResultDto {
    pub site_id: Uuid,
    pub site_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub wp_version: Option<String>,
    pub listings: Vec<ListingSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct FleetReportDto {
    pub total_sites: usize,
    pub successful_sites: usize,
    pub failed_sites: usize,
    /// Sites never dispatched because the run was cancelled.
    pub skipped_sites: usize,
    pub cancelled: bool,
    pub site_results: Vec<SiteSyncResultDto>,
}

#[derive(Debug, Clone)]
pub struct ConnectionTestDto {
    pub site_id: Uuid,
    pub success: bool,
    pub message: Option<String>,
    pub wp_version: Option<String>,
}

//! Askama template definitions for the dashboard's one HTML page. Every
//! other response in [`crate::routes`] is JSON; this is the human-facing
//! landing page operators hit in a browser.

use askama::Template;

#[derive(Debug, Clone, Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub agent_count: usize,
    pub total_routed: u64,
    pub proposal_count: usize,
}

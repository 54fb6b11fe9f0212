use std::sync::Arc;

use crate::application::auth::TokenValidator;
use crate::application::events::IngestCoordinator;

#[derive(Clone)]
pub struct ApiState {
    pub events: Arc<IngestCoordinator>,
    /// `None` disables token checks.
    pub tokens: Option<Arc<dyn TokenValidator>>,
}

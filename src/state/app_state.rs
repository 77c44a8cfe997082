use std::sync::Arc;

use crate::repositories::LinkRepository;

/// Shared state handed to every handler.
pub struct AppState {
    pub repo: Arc<dyn LinkRepository>,
}

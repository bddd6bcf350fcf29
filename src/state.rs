use crate::session::Sessions;
use crate::storage::FeedbackStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<FeedbackStore>>,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(store: FeedbackStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            sessions: Sessions::default(),
        }
    }
}

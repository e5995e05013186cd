use std::path::PathBuf;
use std::sync::Arc;

use datasvc::DataService;

use crate::model::User;
use crate::session::SessionFile;
use crate::state::{AppState, Store};

/// The application engine: a data-service handle, the state store and the
/// persisted-session file. Everything the view layer needs comes out of
/// `store` snapshots.
pub struct App<S> {
    pub(crate) svc: Arc<S>,
    pub store: Store,
    pub(crate) session_file: SessionFile,
}

impl<S: DataService> App<S> {
    pub fn new(svc: Arc<S>, session_path: impl Into<PathBuf>) -> Self {
        Self {
            svc,
            store: Store::new(),
            session_file: SessionFile::new(session_path.into()),
        }
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    pub fn current_user(&self) -> Option<User> {
        self.store.snapshot().session.clone()
    }
}

//! Best-effort notification writes. The action that triggered one already
//! succeeded, so a failure here is logged and forgotten.

use datasvc::rows::NewNotification;
use datasvc::DataService;

pub async fn create<S: DataService>(svc: &S, new: NewNotification) {
    if let Err(err) = svc.insert_notification(new).await {
        tracing::warn!(%err, "failed to write notification");
    }
}

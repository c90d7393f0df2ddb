//! Per-request context handed to the matrix core.

use uuid::Uuid;

/// An externally validated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

/// Context threaded explicitly through every core entry point.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub session: Session,
}

impl RequestContext {
    pub fn new(session: Session) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }
}

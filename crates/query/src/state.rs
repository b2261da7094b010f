use crate::QueryError;

/// What a view needs to know about one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// Never requested, or disabled.
    Idle,
    /// First fetch outstanding; nothing to show yet.
    Loading,
    /// The last fetch failed.
    Error(QueryError),
    Success {
        data: T,
        /// Past the freshness window or invalidated; the next read refetches.
        is_stale: bool,
        /// A background refetch is outstanding.
        is_fetching: bool,
    },
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

//! Errors raised while evaluating queries.

/// Errors returned by [`Tracker::evaluate`](crate::Tracker::evaluate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A query was requested again while it was still being computed on the
    /// same worker.
    #[error("cyclic query: {query} depends on itself")]
    Cyclic {
        /// The re-entered query.
        query: String,
        /// Active queries from the first occurrence of `query` to the innermost.
        stack: Vec<String>,
    },
}

impl QueryError {
    /// Renders the cycle as `A -> B -> A`.
    pub fn cycle_path(&self) -> String {
        match self {
            QueryError::Cyclic { query, stack } => {
                let mut path = stack.clone();
                path.push(query.clone());
                path.join(" -> ")
            }
        }
    }
}

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every resource-client failure is normalized into one of these before it reaches the
/// orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name} already exists")]
    Conflict { kind: String, name: String },

    #[error("invalid endpoint: {0}")]
    Validation(String),

    /// Rendered with its full chain of causes.
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// The classification surfaced to callers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

// === impl Error ===

impl Error {
    pub fn not_found(kind: impl ToString, name: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn conflict(kind: impl ToString, name: impl ToString) -> Self {
        Self::Conflict {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn validation(msg: impl ToString) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(anyhow::anyhow!("{msg}"))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotFound { .. } => Status::NotFound,
            Self::Conflict { .. } => Status::Conflict,
            Self::Validation(_) => Status::Validation,
            Self::Internal(_) => Status::Internal,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status() == Status::NotFound
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        self.status() == Status::Conflict
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        for (error, status, msg) in [
            (
                Error::not_found("IngressRoute", "ns-0/node"),
                Status::NotFound,
                "IngressRoute ns-0/node not found",
            ),
            (
                Error::conflict("Middleware", "kotal/crossover-cache"),
                Status::Conflict,
                "Middleware kotal/crossover-cache already exists",
            ),
            (
                Error::validation("name must not be empty"),
                Status::Validation,
                "invalid endpoint: name must not be empty",
            ),
            (
                Error::internal("connection reset"),
                Status::Internal,
                "connection reset",
            ),
            (
                Error::Internal(
                    anyhow::anyhow!("connection reset").context("IngressRoute ns-0/node"),
                ),
                Status::Internal,
                "IngressRoute ns-0/node: connection reset",
            ),
        ] {
            assert_eq!(error.status(), status, "{msg}");
            assert_eq!(error.to_string(), msg);
        }
    }
}

/// Failure classification for page fetches
use std::fmt;

/// Why a retryable failure kept recurring until the attempt budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryCause {
    Transient,
    RateLimited,
}

/// Classified reason a page fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeout, connection failure or HTTP 5xx
    Transient,

    /// HTTP 429
    RateLimited,

    /// The body was not JSON or matched none of the known item-list shapes
    MalformedResponse,

    /// A 4xx other than 429; the request itself is wrong and will not improve on retry
    Rejected { status: u16 },

    /// A retryable failure that outlived the attempt budget
    ExhaustedRetries { last: RetryCause },
}

impl FailureKind {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }

    /// Converts a retryable kind into its exhausted form
    ///
    /// Non-retryable kinds are returned unchanged.
    pub fn exhausted(self) -> Self {
        match self {
            Self::Transient => Self::ExhaustedRetries {
                last: RetryCause::Transient,
            },
            Self::RateLimited => Self::ExhaustedRetries {
                last: RetryCause::RateLimited,
            },
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::MalformedResponse => "malformed_response",
            Self::Rejected { .. } => "rejected",
            Self::ExhaustedRetries { .. } => "exhausted_retries",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status } => write!(f, "rejected (HTTP {})", status),
            Self::ExhaustedRetries { last } => {
                let cause = match last {
                    RetryCause::Transient => "transient",
                    RetryCause::RateLimited => "rate_limited",
                };
                write!(f, "exhausted_retries ({})", cause)
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}

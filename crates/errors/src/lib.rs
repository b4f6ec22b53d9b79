use std::borrow::Cow;

use http::StatusCode;

mod metrics;

pub use crate::metrics::log_backend_error;

/// ErrorMetadata object can be attached to an anyhow error chain via
/// `.context(e /*ErrorMetadata*/)`. It is a generic object to be used
/// across the codebase to tag errors with information that is used to classify.
///
/// The msg is conveyed as a user facing error message if it makes it to the
/// caller of the expression layer.
///
/// The short_msg is used as a tag - available for tests and for metrics
/// logging - to have a message that is resilient to changes in copy.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    /// The error code associated with this ErrorMetadata
    pub code: ErrorCode,
    /// short ScreamingCamelCase. Usable in tests for string matching
    /// w/ a standard test helper.
    /// Eg PeriodParseError
    pub short_msg: Cow<'static, str>,
    /// human readable - developer facing. Should be longer and descriptive.
    /// Eg "Could not parse the period value"
    pub msg: Cow<'static, str>,
}

#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    Unauthenticated,
    Forbidden,
    NotFound,

    Overloaded,

    OperationalInternalServerError,
}

impl ErrorMetadata {
    /// Bad Request. Maps to 400 in HTTP.
    ///
    /// The short_msg should be a CapitalCamelCased describing the error.
    /// The msg should be a descriptive message targeted toward the developer.
    pub fn bad_request(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// Resource not found. Maps to 404 in HTTP.
    ///
    /// Used when a query is well formed but nothing in the backend matches it
    /// (eg NoMatchingSeries).
    pub fn not_found(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::NotFound,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// Not authenticated. Maps to 401 in HTTP.
    pub fn unauthenticated(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Unauthenticated,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// Forbidden. Maps to 403 in HTTP.
    pub fn forbidden(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Forbidden,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// A backend is throttling us, is unavailable, or didn't answer in time.
    /// Maps to 503 in HTTP.
    pub fn overloaded(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Overloaded,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    /// Operational Internal Server Error (maps to 500 in HTTP)
    pub fn operational_internal_server_error() -> Self {
        Self {
            code: ErrorCode::OperationalInternalServerError,
            short_msg: INTERNAL_SERVER_ERROR.into(),
            msg: INTERNAL_SERVER_ERROR_MSG.into(),
        }
    }

    pub fn is_bad_request(&self) -> bool {
        self.code == ErrorCode::BadRequest
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    pub fn is_forbidden(&self) -> bool {
        self.code == ErrorCode::Forbidden
    }

    pub fn is_overloaded(&self) -> bool {
        self.code == ErrorCode::Overloaded
    }

    fn metric_server_error_label_value(&self) -> Option<&'static str> {
        match self.code {
            ErrorCode::BadRequest
            | ErrorCode::NotFound
            | ErrorCode::Unauthenticated
            | ErrorCode::Forbidden => None,
            ErrorCode::Overloaded => Some("overloaded"),
            ErrorCode::OperationalInternalServerError => Some("operational"),
        }
    }
}

impl ErrorCode {
    pub fn http_status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            // HTTP has the unfortunate naming of 401 as unauthorized when it's
            // really about authentication.
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::OperationalInternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn from_http_status_code(code: StatusCode) -> Option<Self> {
        match code {
            StatusCode::UNAUTHORIZED => Some(ErrorCode::Unauthenticated),
            StatusCode::FORBIDDEN => Some(ErrorCode::Forbidden),
            StatusCode::NOT_FOUND => Some(ErrorCode::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Some(ErrorCode::Overloaded),
            // Tries to categorize in one of the above more specific 4xx codes first,
            // otherwise categorizes as a general 4xx via BadRequest
            v if v.is_client_error() => Some(ErrorCode::BadRequest),
            v if v.is_server_error() => Some(ErrorCode::Overloaded),
            _ => None,
        }
    }
}

/// An error returned by an external backend, carrying the HTTP status of the
/// failed call when the backend produced one.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{service} RequestError ({}): {message}", .status.map(|s| s.to_string()).unwrap_or_else(|| "no status".to_owned()))]
pub struct BackendError {
    pub service: &'static str,
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn new(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            service,
            status,
            message: message.into(),
        }
    }

    /// Convert into an anyhow error with `ErrorMetadata` derived from the
    /// status code attached, and count it.
    pub fn into_anyhow(self) -> anyhow::Error {
        log_backend_error(self.service, self.status);
        let metadata = self
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .and_then(ErrorCode::from_http_status_code)
            .map(|code| ErrorMetadata {
                code,
                short_msg: backend_short_msg(code).into(),
                msg: self.to_string().into(),
            });
        let err = anyhow::Error::new(self);
        match metadata {
            Some(metadata) => err.context(metadata),
            None => err,
        }
    }
}

fn backend_short_msg(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::BadRequest => "BackendBadRequest",
        ErrorCode::Unauthenticated => "BackendUnauthenticated",
        ErrorCode::Forbidden => "BackendForbidden",
        ErrorCode::NotFound => "BackendNotFound",
        ErrorCode::Overloaded => "BackendUnavailable",
        ErrorCode::OperationalInternalServerError => INTERNAL_SERVER_ERROR,
    }
}

pub trait ErrorMetadataAnyhowExt {
    fn is_bad_request(&self) -> bool;
    fn is_not_found(&self) -> bool;
    fn is_forbidden(&self) -> bool;
    fn is_overloaded(&self) -> bool;
    fn backend_status(&self) -> Option<u16>;
    fn short_msg(&self) -> &str;
    fn msg(&self) -> &str;
    fn metric_status_label_value(&self) -> &'static str;
    fn http_status(&self) -> StatusCode;
}

impl ErrorMetadataAnyhowExt for anyhow::Error {
    /// Returns true if error is tagged as BadRequest
    fn is_bad_request(&self) -> bool {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e.is_bad_request();
        }
        false
    }

    /// Returns true if error is tagged as NotFound
    fn is_not_found(&self) -> bool {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e.is_not_found();
        }
        false
    }

    fn is_forbidden(&self) -> bool {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e.is_forbidden();
        }
        false
    }

    /// Returns true if error is tagged as Overloaded
    fn is_overloaded(&self) -> bool {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e.is_overloaded();
        }
        false
    }

    /// The HTTP status of the backend call that produced this error, if any.
    fn backend_status(&self) -> Option<u16> {
        self.downcast_ref::<BackendError>()
            .and_then(|e| e.status)
    }

    /// Return the short_msg associated with this Error
    fn short_msg(&self) -> &str {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return &e.short_msg;
        }
        INTERNAL_SERVER_ERROR
    }

    /// Return the descriptive msg associated with this Error
    fn msg(&self) -> &str {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return &e.msg;
        }
        INTERNAL_SERVER_ERROR_MSG
    }

    /// Return the label value to use on a status metric
    fn metric_status_label_value(&self) -> &'static str {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e
                .metric_server_error_label_value()
                .unwrap_or("developer_error");
        }
        "error"
    }

    fn http_status(&self) -> StatusCode {
        if let Some(e) = self.downcast_ref::<ErrorMetadata>() {
            return e.code.http_status_code();
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Rebuild an owned error from a shared one, e.g. after it crossed a
/// broadcast channel as `Arc<anyhow::Error>`. The rendered message chain is
/// kept and the classification (`BackendError`, `ErrorMetadata`) is
/// re-attached so downcasts keep working.
pub fn recapture_error(e: &anyhow::Error) -> anyhow::Error {
    let mut recaptured = anyhow::anyhow!("{e:#}");
    if let Some(backend) = e.downcast_ref::<BackendError>() {
        recaptured = recaptured.context(backend.clone());
    }
    if let Some(metadata) = e.downcast_ref::<ErrorMetadata>() {
        recaptured = recaptured.context(metadata.clone());
    }
    recaptured
}

pub const INTERNAL_SERVER_ERROR_MSG: &str = "Your request couldn't be completed. Try again later.";
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";

#[cfg(any(test, feature = "testing"))]
mod proptest_impls {
    use proptest::prelude::*;

    use super::{
        ErrorCode,
        ErrorMetadata,
    };

    impl Arbitrary for ErrorMetadata {
        type Parameters = ();

        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            any::<ErrorCode>()
                .prop_map(|ec| match ec {
                    ErrorCode::BadRequest => ErrorMetadata::bad_request("bad", "request"),
                    ErrorCode::NotFound => ErrorMetadata::not_found("not", "found"),
                    ErrorCode::Unauthenticated => ErrorMetadata::unauthenticated("un", "auth"),
                    ErrorCode::Forbidden => ErrorMetadata::forbidden("for", "bidden"),
                    ErrorCode::Overloaded => ErrorMetadata::overloaded("overloaded", "error"),
                    ErrorCode::OperationalInternalServerError => {
                        ErrorMetadata::operational_internal_server_error()
                    },
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use proptest::prelude::*;

    use crate::{
        recapture_error,
        BackendError,
        ErrorCode,
        ErrorMetadata,
        ErrorMetadataAnyhowExt,
        INTERNAL_SERVER_ERROR,
    };

    #[test]
    fn test_backend_error_is_classified_by_status() {
        let err = BackendError::new("cloudwatch", Some(403), "AccessDenied").into_anyhow();
        assert!(err.is_forbidden());
        assert_eq!(err.backend_status(), Some(403));

        let err = BackendError::new("cloudwatch", Some(503), "ServiceUnavailable").into_anyhow();
        assert!(err.is_overloaded());
        assert_eq!(err.http_status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = BackendError::new("cloudwatch", None, "connection reset").into_anyhow();
        assert_eq!(err.backend_status(), None);
        assert_eq!(err.short_msg(), INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_backend_status_survives_context() {
        let err = BackendError::new("cloudwatch", Some(429), "Throttling")
            .into_anyhow()
            .context("retries exhausted");
        assert_eq!(err.backend_status(), Some(429));
        assert!(err.is_overloaded());
    }

    #[test]
    fn test_recapture_keeps_classification() {
        let original = BackendError::new("cloudwatch", Some(500), "InternalFailure").into_anyhow();
        let recaptured = recapture_error(&original);
        assert_eq!(recaptured.backend_status(), Some(500));
        assert!(recaptured.is_overloaded());
        assert!(format!("{recaptured:#}").contains("InternalFailure"));

        let parse = anyhow::anyhow!("bad period")
            .context(ErrorMetadata::bad_request("PeriodParseError", "Could not parse"));
        assert_eq!(recapture_error(&parse).short_msg(), "PeriodParseError");
    }

    #[test]
    fn test_from_http_status_code() {
        assert_eq!(
            ErrorCode::from_http_status_code(StatusCode::TOO_MANY_REQUESTS),
            Some(ErrorCode::Overloaded)
        );
        assert_eq!(
            ErrorCode::from_http_status_code(StatusCode::UNPROCESSABLE_ENTITY),
            Some(ErrorCode::BadRequest)
        );
        assert_eq!(ErrorCode::from_http_status_code(StatusCode::OK), None);
    }

    proptest! {
        #![proptest_config(
            ProptestConfig { failure_persistence: None, ..ProptestConfig::default() }
        )]

        #[test]
        fn test_http_status_round_trips_through_code(err in any::<ErrorMetadata>()) {
            let status = err.code.http_status_code();
            if err.code != ErrorCode::OperationalInternalServerError {
                prop_assert_eq!(ErrorCode::from_http_status_code(status), Some(err.code));
            }
            let as_anyhow = anyhow::Error::new(err.clone());
            prop_assert_eq!(as_anyhow.http_status(), status);
            prop_assert_eq!(as_anyhow.is_overloaded(), err.is_overloaded());
        }
    }
}

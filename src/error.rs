//! Bluefuzz errors

use num_enum::TryFromPrimitive;

/// The error type for controller and radio operations
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    message: String,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
        message: String,
    ) -> Self {
        Error { kind, source, message }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Configuration, None, message.into())
    }

    /// Returns the corresponding [ErrorKind] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.message.is_empty(), &self.source) {
            (true, None) => write!(f, "{}", &self.kind),
            (false, None) => write!(f, "{}: {}", &self.kind, &self.message),
            (true, Some(err)) => write!(f, "{}: {}", &self.kind, err),
            (false, Some(err)) => write!(f, "{}: {} ({})", &self.kind, &self.message, err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = &**x;
            x
        })
    }
}

/// A list of general categories of controller error.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// permission denied
    PermissionDenied,
    /// transmit start failed: {0}
    TransmitStartFailed(AdvertiseFailure),
    /// scan failed: ERR_{0}
    ScanFailed(i32),
    /// invalid configuration
    Configuration,
    /// the Bluetooth adapter is not available
    AdapterUnavailable,
    /// the Bluetooth operation is unsupported
    NotSupported,
    /// the session has shut down
    SessionClosed,
    /// error
    Other,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}

/// Platform-reported advertise start failure codes.
///
/// The discriminants match the codes delivered by the platform advertise callback.
#[repr(i32)]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
pub enum AdvertiseFailureCode {
    /// DATA_OVERFLOW
    DataTooLarge = 1,
    /// TOO_MANY_ADV
    TooManyAdvertisers = 2,
    /// ALREADY_ACTIVE
    AlreadyStarted = 3,
    /// INTERNAL_ERR
    InternalError = 4,
    /// UNSUPPORTED
    FeatureUnsupported = 5,
}

/// Reason an advertisement could not be started.
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdvertiseFailure {
    /// {0}
    Known(AdvertiseFailureCode),
    /// ERR_{0}
    Other(i32),
}

impl From<i32> for AdvertiseFailure {
    fn from(code: i32) -> Self {
        match AdvertiseFailureCode::try_from(code) {
            Ok(code) => AdvertiseFailure::Known(code),
            Err(_) => AdvertiseFailure::Other(code),
        }
    }
}

impl From<AdvertiseFailureCode> for AdvertiseFailure {
    fn from(code: AdvertiseFailureCode) -> Self {
        AdvertiseFailure::Known(code)
    }
}

impl From<AdvertiseFailureCode> for Error {
    fn from(code: AdvertiseFailureCode) -> Self {
        ErrorKind::TransmitStartFailed(code.into()).into()
    }
}

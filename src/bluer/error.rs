use crate::error::{AdvertiseFailureCode, ErrorKind};

impl From<bluer::Error> for crate::Error {
    fn from(err: bluer::Error) -> Self {
        crate::Error::new(kind_from_bluer(&err), Some(Box::new(err)), String::new())
    }
}

fn kind_from_bluer(err: &bluer::Error) -> ErrorKind {
    match err.kind {
        bluer::ErrorKind::NotAuthorized => ErrorKind::PermissionDenied,
        bluer::ErrorKind::NotPermitted => ErrorKind::PermissionDenied,
        bluer::ErrorKind::NotReady => ErrorKind::AdapterUnavailable,
        bluer::ErrorKind::NotSupported => ErrorKind::NotSupported,
        _ => ErrorKind::Other,
    }
}

/// Maps a failed advertisement registration onto the advertise failure codes.
pub(super) fn transmit_error(err: bluer::Error) -> crate::Error {
    let code = match err.kind {
        bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted => return err.into(),
        bluer::ErrorKind::AlreadyExists => AdvertiseFailureCode::AlreadyStarted,
        bluer::ErrorKind::InvalidLength => AdvertiseFailureCode::DataTooLarge,
        bluer::ErrorKind::NotSupported => AdvertiseFailureCode::FeatureUnsupported,
        // bluez rejects registration with Failed once every advertising instance is taken
        bluer::ErrorKind::Failed => AdvertiseFailureCode::TooManyAdvertisers,
        _ => AdvertiseFailureCode::InternalError,
    };
    crate::Error::new(
        ErrorKind::TransmitStartFailed(code.into()),
        Some(Box::new(err)),
        String::new(),
    )
}

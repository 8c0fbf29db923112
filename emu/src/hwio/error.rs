use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwioError {
    #[error("unsupported register type for field {field}: {ty}")]
    UnsupportedType {
        field: &'static str,
        ty: &'static str,
    },

    #[error("invalid {key} for field {field}: {value:?}")]
    Parse {
        field: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("cannot find method {method:?} for field {field}")]
    MissingMethod { field: &'static str, method: String },

    #[error("method {method:?} for field {field} is a {found} callback, expected {expected}")]
    CallbackSignature {
        field: &'static str,
        method: String,
        found: &'static str,
        expected: String,
    },

    #[error("missing offset for field {field}")]
    MissingOffset { field: &'static str },
}

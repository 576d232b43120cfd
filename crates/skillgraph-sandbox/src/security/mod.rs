//! Secret handling: which variables are secret, and keeping their values out of responses.

pub mod secrets;

pub use secrets::{
    default_classifier, mask_for_display, redact_from_text, redact_value, Classified,
    SecretClassifier, MASK_PLACEHOLDER, REDACTION_PLACEHOLDER,
};

//! Environment and home-directory expansion for path values.

use crate::ConfigError;

/// Expand `~`, `$VAR`, `${VAR}` and `${VAR:-default}` in a path value.
///
/// `field` names the configuration key for error messages.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

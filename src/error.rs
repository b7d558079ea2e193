pub type EffectResult<T> = Result<T, EffectError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("container element not found: {0}")]
    ContainerNotFound(String),

    #[error("missing required option `{0}`")]
    MissingField(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("host error: {0}")]
    Host(String),
}

impl EffectError {
    pub fn container_not_found(what: impl Into<String>) -> Self {
        Self::ContainerNotFound(what.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }
}

impl From<serde_json::Error> for EffectError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(EffectError::container_not_found("#count")
            .to_string()
            .contains("container element not found: #count"));
        assert!(EffectError::MissingField("text")
            .to_string()
            .contains("`text`"));
        assert!(EffectError::invalid_config("x")
            .to_string()
            .starts_with("invalid configuration:"));
        assert!(EffectError::host("x").to_string().starts_with("host error:"));
    }

    #[test]
    fn json_errors_become_invalid_config() {
        let err: EffectError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, EffectError::InvalidConfig(_)));
    }
}

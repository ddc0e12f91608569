use super::ParseError;
use super::context::EvaluationContext;
use super::interpolation::interpolate_value;
use super::serde_helpers::usize_from_number_or_string;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The config file exactly as written, after variable substitution.
///
/// Optional strings default to empty, and empty means "not set": the
/// resolver applies its fallbacks to both absent and blank values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFileConfig {
    #[serde(default)]
    pub aws_region: String,
    #[serde(default)]
    pub ec2_instance_id: String,
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
    #[serde(default)]
    pub log_priority: String,
    pub state_file: PathBuf,
    #[serde(default)]
    pub journal_dir: PathBuf,
    #[serde(default, deserialize_with = "usize_from_number_or_string")]
    pub buffer_size: usize,
}

impl RawFileConfig {
    pub fn from_file(path: &Path, context: &EvaluationContext) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_with_context(&content, context)
    }

    pub fn from_str_with_context(
        content: &str,
        context: &EvaluationContext,
    ) -> Result<Self, ParseError> {
        let document: toml::Table = toml::from_str(content).map_err(ParseError::Syntax)?;
        let document = interpolate_value(toml::Value::Table(document), context, "")?;
        let raw: RawFileConfig = document.try_into().map_err(ParseError::Decode)?;
        raw.check_required()?;
        Ok(raw)
    }

    fn check_required(&self) -> Result<(), ParseError> {
        if self.log_group.trim().is_empty() {
            return Err(ParseError::EmptyField("log_group"));
        }
        if self.state_file.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ParseError::EmptyField("state_file"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<RawFileConfig, ParseError> {
        let env = ["FOO=bar", "STATE_DIR=/var/lib/forwarder"];
        RawFileConfig::from_str_with_context(content, &EvaluationContext::from_environment(&env))
    }

    #[test]
    fn test_minimal_file() {
        let raw = parse(
            r#"
            log_group = "app"
            state_file = "/var/lib/state"
            "#,
        )
        .unwrap();

        assert_eq!(raw.log_group, "app");
        assert_eq!(raw.state_file, PathBuf::from("/var/lib/state"));
        assert_eq!(raw.aws_region, "");
        assert_eq!(raw.log_priority, "");
        assert_eq!(raw.buffer_size, 0);
        assert!(raw.journal_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_all_fields_with_interpolation() {
        let raw = parse(
            r#"
            aws_region = "us-east-1"
            ec2_instance_id = "i-0123"
            log_group = "${env.FOO}-suffix"
            log_stream = "stream"
            log_priority = "err"
            state_file = "${env.STATE_DIR}/state"
            journal_dir = "/run/log/journal"
            buffer_size = 250
            "#,
        )
        .unwrap();

        assert_eq!(raw.log_group, "bar-suffix");
        assert_eq!(raw.state_file, PathBuf::from("/var/lib/forwarder/state"));
        assert_eq!(raw.journal_dir, PathBuf::from("/run/log/journal"));
        assert_eq!(raw.buffer_size, 250);
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse(r#"log_group = "app""#).unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
        assert!(err.to_string().contains("state_file"));
    }

    #[test]
    fn test_blank_required_field() {
        let err = parse(
            r#"
            log_group = ""
            state_file = "/state"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::EmptyField("log_group")));
    }

    #[test]
    fn test_whitespace_required_fields_rejected() {
        for (content, field) in [
            ("log_group = \"   \"\nstate_file = \"/state\"", "log_group"),
            ("log_group = \"app\"\nstate_file = \"   \"", "state_file"),
        ] {
            match parse(content) {
                Err(ParseError::EmptyField(name)) => assert_eq!(name, field),
                other => panic!("expected {field} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_buffer_size_from_reference() {
        let env = ["BUF=250"];
        let raw = RawFileConfig::from_str_with_context(
            r#"
            log_group = "app"
            state_file = "/state"
            buffer_size = "${env.BUF}"
            "#,
            &EvaluationContext::from_environment(&env),
        )
        .unwrap();
        assert_eq!(raw.buffer_size, 250);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse(
            r#"
            log_group = "app"
            state_file = "/state"
            log_groop = "typo"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            parse("log_group = \"unterminated"),
            Err(ParseError::Syntax(_))
        ));
    }

    #[test]
    fn test_negative_buffer_size_rejected() {
        let err = parse(
            r#"
            log_group = "app"
            state_file = "/state"
            buffer_size = -5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Decode(_)));
    }
}

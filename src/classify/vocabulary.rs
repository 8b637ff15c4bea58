//! The text vocabulary the crawler speaks
//!
//! Every pattern is a regular expression with named capture groups. The
//! defaults match the crawler's own progress lines; a config file may replace
//! any of them when the upstream wording changes.

use crate::error::{CrawlwatchError, ErrorCode, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Announces the number of ids in the run; needs `total`
    pub total_announcement: String,
    /// Per-unit progress inside a batch; needs `index` and `total`
    pub group_progress: String,
    /// A unit begins; needs `id`
    pub unit_start: String,
    /// Prefix of a per-unit result line; needs `id`
    pub unit_result: String,
    /// Literal that marks a result line as a success
    pub success_token: String,
    /// Literal that marks a result line as a failure
    pub failure_token: String,
    /// A unit skipped because of its content type; needs `id`
    pub explicit_skip: String,
    /// Generic per-unit ignore marker; needs `id`
    pub ignore_marker: String,
    /// The crawler wrote its export file; needs `path`
    pub artifact_export: String,
    /// Error lines on stderr whose text is kept for the run record; needs `message`
    pub error_message: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            total_announcement: r"\[步骤1\]\s*开始爬取课程，共(?P<total>\d+)个课程ID".to_string(),
            group_progress: r"\[处理进度\]\s*正在处理第(?P<index>\d+)/(?P<total>\d+)个课程"
                .to_string(),
            unit_start: r"正在处理 id:(?P<id>\d+)".to_string(),
            unit_result: r"\[(?P<id>\d+)\]:.*?提取视频链接".to_string(),
            success_token: "成功".to_string(),
            failure_token: "失败".to_string(),
            explicit_skip: r"\[(?P<id>\d+)\]:类型:ppt语音".to_string(),
            ignore_marker: r"\[(?P<id>\d+)\]:忽略".to_string(),
            artifact_export: r"数据已导出到:\s*(?P<path>.+?)\s*$".to_string(),
            error_message: r"错误[\]:：\s]*(?P<message>.*)$".to_string(),
        }
    }
}

/// Compiled form of a [`Vocabulary`]
#[derive(Debug, Clone)]
pub struct CompiledVocabulary {
    pub total_announcement: Regex,
    pub group_progress: Regex,
    pub unit_start: Regex,
    pub unit_result: Regex,
    pub success_token: String,
    pub failure_token: String,
    pub explicit_skip: Regex,
    pub ignore_marker: Regex,
    pub artifact_export: Regex,
    pub error_message: Regex,
}

impl Vocabulary {
    /// Compile every pattern, checking that each exposes the groups its rule reads.
    pub fn compile(&self) -> Result<CompiledVocabulary> {
        if self.success_token.is_empty() || self.failure_token.is_empty() {
            return Err(CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_VALIDATION_FAILED,
                "outcome tokens must not be empty",
                Some("vocabulary.success_token".to_string()),
            ));
        }
        if self.success_token == self.failure_token {
            return Err(CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_VALIDATION_FAILED,
                "success and failure tokens must differ",
                Some("vocabulary.failure_token".to_string()),
            ));
        }

        Ok(CompiledVocabulary {
            total_announcement: vocabulary_pattern(
                "total_announcement",
                &self.total_announcement,
                &["total"],
            )?,
            group_progress: vocabulary_pattern(
                "group_progress",
                &self.group_progress,
                &["index", "total"],
            )?,
            unit_start: vocabulary_pattern("unit_start", &self.unit_start, &["id"])?,
            unit_result: vocabulary_pattern("unit_result", &self.unit_result, &["id"])?,
            success_token: self.success_token.clone(),
            failure_token: self.failure_token.clone(),
            explicit_skip: vocabulary_pattern("explicit_skip", &self.explicit_skip, &["id"])?,
            ignore_marker: vocabulary_pattern("ignore_marker", &self.ignore_marker, &["id"])?,
            artifact_export: vocabulary_pattern(
                "artifact_export",
                &self.artifact_export,
                &["path"],
            )?,
            error_message: vocabulary_pattern("error_message", &self.error_message, &["message"])?,
        })
    }
}

fn vocabulary_pattern(field: &str, pattern: &str, required: &[&str]) -> Result<Regex> {
    compile_pattern(&format!("vocabulary.{}", field), pattern, required)
}

/// Compile one pattern and require the named groups `required`; `field`
/// names the config key in errors
pub fn compile_pattern(field: &str, pattern: &str, required: &[&str]) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|e| {
        CrawlwatchError::config_with_code(
            ErrorCode::CONFIG_INVALID_PATTERN,
            format!("pattern does not compile: {}", pattern),
            Some(field.to_string()),
        )
        .with_source(e)
    })?;

    let names: Vec<&str> = regex.capture_names().flatten().collect();
    for group in required {
        if !names.contains(group) {
            return Err(CrawlwatchError::config_with_code(
                ErrorCode::CONFIG_INVALID_PATTERN,
                format!("pattern is missing the named group '{}'", group),
                Some(field.to_string()),
            ));
        }
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vocabulary_compiles() {
        let compiled = Vocabulary::default().compile().unwrap();
        assert!(compiled
            .total_announcement
            .is_match("[步骤1] 开始爬取课程，共10个课程ID"));
    }

    #[test]
    fn test_missing_group_is_rejected() {
        let vocabulary = Vocabulary {
            unit_start: r"processing (\d+)".to_string(),
            ..Vocabulary::default()
        };
        let err = vocabulary.compile().unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_PATTERN);
        assert!(err.user_message().contains("vocabulary.unit_start"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let vocabulary = Vocabulary {
            ignore_marker: r"\[(?P<id>\d+".to_string(),
            ..Vocabulary::default()
        };
        assert!(vocabulary.compile().is_err());
    }

    #[test]
    fn test_identical_tokens_are_rejected() {
        let vocabulary = Vocabulary {
            failure_token: "成功".to_string(),
            ..Vocabulary::default()
        };
        assert!(vocabulary.compile().is_err());
    }
}

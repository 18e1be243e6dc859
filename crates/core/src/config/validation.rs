use crate::{SchedulerError, SchedulerResult};

/// 配置验证接口
pub trait ConfigValidator {
    fn validate(&self) -> SchedulerResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> SchedulerResult<()> {
        if value.trim().is_empty() {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a duration setting is positive and bounded
    pub fn validate_seconds(value: u64, field_name: &str, max: u64) -> SchedulerResult<()> {
        if value == 0 {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if value > max {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a count is positive and bounded
    pub fn validate_count(count: usize, field_name: &str, max: usize) -> SchedulerResult<()> {
        if count == 0 {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL carries a scheme
    pub fn validate_url(url: &str, field_name: &str) -> SchedulerResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !url.contains("://") {
            return Err(SchedulerError::Configuration(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }
        Ok(())
    }

    /// Validate that a value is one of the accepted options
    pub fn validate_one_of(value: &str, options: &[&str], field_name: &str) -> SchedulerResult<()> {
        if !options.contains(&value) {
            return Err(SchedulerError::Configuration(format!(
                "Invalid {field_name}: {value}. Valid options: {options:?}"
            )));
        }
        Ok(())
    }
}

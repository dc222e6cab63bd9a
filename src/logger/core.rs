/// Filtering rules shared by all log entry points
use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Decide whether a message is printed.
///
/// 1. Errors always print.
/// 2. Anything above the minimum level is dropped.
/// 3. Debug needs `--debug-<tag>`.
/// 4. Verbose needs `--verbose` or `--verbose-<tag>`.
/// 5. A non-empty `enabled_tags` set restricts output to those tags.
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();
    if level > config.min_level {
        return false;
    }

    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag);
    }

    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose && config.verbose_tags.is_empty()
            || is_verbose_enabled_for_tag(tag);
    }

    if !config.enabled_tags.is_empty() && !config.enabled_tags.contains(&tag.to_debug_key()) {
        return false;
    }

    true
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    super::format::format_and_log(&tag, level, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};

    #[test]
    fn test_filtering_rules() {
        let mut config = LoggerConfig::default();
        config.debug_tags.insert("swap".to_string());
        config.min_level = LogLevel::Debug;
        set_logger_config(config);

        assert!(should_log(&LogTag::Pricing, LogLevel::Error));
        assert!(should_log(&LogTag::Pricing, LogLevel::Info));
        assert!(should_log(&LogTag::Swap, LogLevel::Debug));
        assert!(!should_log(&LogTag::Pricing, LogLevel::Debug));
        assert!(!should_log(&LogTag::Swap, LogLevel::Verbose));

        set_logger_config(LoggerConfig::default());
    }
}

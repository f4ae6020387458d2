//! Configuration merging functionality
//!
//! Sources are applied from lowest to highest priority; a value that is set
//! in a later source replaces the earlier one.

use crate::config::types::{ConfigValues, ProxyConfig, ValueSource};

impl ProxyConfig {
    /// Apply the values set in `other`, recording `source` for each of them
    pub fn apply(&mut self, other: ConfigValues, source: ValueSource) {
        fn merge_option<T>(
            name: &'static str,
            current: &mut Option<T>,
            other: Option<T>,
            source: ValueSource,
            sources: &mut std::collections::HashMap<&'static str, ValueSource>,
        ) {
            if let Some(value) = other {
                *current = Some(value);
                sources.insert(name, source);
            }
        }

        let values = &mut self.values;
        let sources = &mut self.sources;

        merge_option("listen", &mut values.listen, other.listen, source, sources);
        merge_option("target", &mut values.target, other.target, source, sources);
        merge_option("delimiter", &mut values.delimiter, other.delimiter, source, sources);
        merge_option("failure_policy", &mut values.failure_policy, other.failure_policy, source, sources);
        merge_option("client_handler", &mut values.client_handler, other.client_handler, source, sources);
        merge_option("remote_handler", &mut values.remote_handler, other.remote_handler, source, sources);
        merge_option("log_level", &mut values.log_level, other.log_level, source, sources);
        merge_option("admin_listen", &mut values.admin_listen, other.admin_listen, source, sources);
        merge_option("admin_token", &mut values.admin_token, other.admin_token, source, sources);
    }

    /// Builder-style variant of [`ProxyConfig::apply`]
    pub fn merged(mut self, other: ConfigValues, source: ValueSource) -> Self {
        self.apply(other, source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Delimiter;
    use crate::proxy::HandlerKind;

    #[test]
    fn test_later_source_wins() {
        let file = ConfigValues {
            listen: Some("127.0.0.1:7000".to_string()),
            target: Some("127.0.0.1:7001".to_string()),
            ..Default::default()
        };
        let cli = ConfigValues {
            listen: Some("127.0.0.1:8000".to_string()),
            client_handler: Some(HandlerKind::Uppercase),
            ..Default::default()
        };

        let config = ProxyConfig::default()
            .merged(file, ValueSource::File)
            .merged(cli, ValueSource::CommandLine);

        assert_eq!(config.listen(), "127.0.0.1:8000");
        assert_eq!(config.target(), "127.0.0.1:7001");
        assert_eq!(config.client_handler(), HandlerKind::Uppercase);
        assert_eq!(config.source("listen"), ValueSource::CommandLine);
        assert_eq!(config.source("target"), ValueSource::File);
        assert_eq!(config.source("delimiter"), ValueSource::Default);
    }

    #[test]
    fn test_unset_values_do_not_override() {
        let mut config = ProxyConfig::default();
        config.apply(
            ConfigValues {
                delimiter: Some(Delimiter(b';')),
                ..Default::default()
            },
            ValueSource::Environment,
        );
        config.apply(ConfigValues::default(), ValueSource::CommandLine);

        assert_eq!(config.delimiter(), b';');
        assert_eq!(config.source("delimiter"), ValueSource::Environment);
    }
}

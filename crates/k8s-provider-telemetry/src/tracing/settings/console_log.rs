//! Console Log Subscriber Settings.

use tracing::level_filters::LevelFilter;

use super::{Settings, SettingsToggle};

/// Configure specific settings for the Console Log subscriber.
///
/// Console logs are always written to stderr, stdout is reserved for command output.
#[derive(Debug, Default, PartialEq)]
pub enum ConsoleLogSettings {
    /// Console subscriber disabled.
    #[default]
    Disabled,

    /// Console subscriber enabled.
    Enabled {
        /// Common subscriber settings that apply to the Console Log Subscriber.
        common_settings: Settings,
    },
}

impl SettingsToggle for ConsoleLogSettings {
    fn is_enabled(&self) -> bool {
        match self {
            ConsoleLogSettings::Disabled => false,
            ConsoleLogSettings::Enabled { .. } => true,
        }
    }
}

impl From<Settings> for ConsoleLogSettings {
    fn from(common_settings: Settings) -> Self {
        ConsoleLogSettings::Enabled { common_settings }
    }
}

impl<T> From<Option<T>> for ConsoleLogSettings
where
    T: Into<ConsoleLogSettings>,
{
    fn from(settings: Option<T>) -> Self {
        match settings {
            Some(settings) => settings.into(),
            None => ConsoleLogSettings::default(),
        }
    }
}

impl From<(&'static str, LevelFilter)> for ConsoleLogSettings {
    fn from((environment_variable, default_level): (&'static str, LevelFilter)) -> Self {
        ConsoleLogSettings::Enabled {
            common_settings: Settings {
                environment_variable,
                default_level,
            },
        }
    }
}

impl From<(&'static str, LevelFilter, bool)> for ConsoleLogSettings {
    fn from(
        (environment_variable, default_level, enabled): (&'static str, LevelFilter, bool),
    ) -> Self {
        if enabled {
            (environment_variable, default_level).into()
        } else {
            ConsoleLogSettings::Disabled
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[test]
    fn builds_settings() {
        let expected = ConsoleLogSettings::Enabled {
            common_settings: Settings {
                environment_variable: "hello",
                default_level: LevelFilter::DEBUG,
            },
        };
        let result: ConsoleLogSettings = Settings::builder()
            .with_environment_variable("hello")
            .with_default_level(LevelFilter::DEBUG)
            .build()
            .into();

        assert_eq!(expected, result);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn triple_toggles(#[case] enabled: bool) {
        let settings = ConsoleLogSettings::from(("CONSOLE_LOG_LEVEL", LevelFilter::INFO, enabled));
        assert_eq!(settings.is_enabled(), enabled);
    }
}

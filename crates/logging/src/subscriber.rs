//! crates/logging/src/subscriber.rs
//! Global subscriber installation.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Environment variable consulted for filter directives.
pub const DEFAULT_ENV_VAR: &str = "DUPLUXY_LOG";

/// Directive used when the environment variable is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Subscriber configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogConfig {
    env_var: String,
    default_directive: String,
    ansi: bool,
    show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_ENV_VAR.to_owned(),
            default_directive: DEFAULT_DIRECTIVE.to_owned(),
            ansi: false,
            show_target: true,
        }
    }
}

impl LogConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads filter directives from `name` instead of [`DEFAULT_ENV_VAR`].
    #[must_use]
    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Directive applied when the environment provides none.
    #[must_use]
    pub fn default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Enables ANSI colours in the formatted output.
    #[must_use]
    pub const fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Prints the `dupluxy::<category>` target next to each event.
    #[must_use]
    pub const fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    /// Builds the filter described by this configuration.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(&self.env_var)
            .unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

/// Installs a formatting subscriber writing to stderr.
///
/// Returns an error when a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(config.show_target)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(config.filter())
        .with(format)
        .try_init()
}

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Client crates whose connection chatter is held back unless tracing.
const CHATTY_TARGETS: &[&str] = &["rumqttc", "reqwest", "hyper", "hyper_util"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    fn client_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Trace => LevelFilter::TRACE,
            _ => LevelFilter::WARN,
        }
    }
}

/// Gateway events at `level`; MQTT and HTTP client crates capped at warn.
pub fn gateway_filter(level: LogLevel) -> Targets {
    CHATTY_TARGETS
        .iter()
        .fold(Targets::new().with_default(level.as_filter()), |targets, target| {
            targets.with_target(*target, level.client_filter())
        })
}

/// Install the stderr subscriber. Repeated calls are ignored.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    let filter = gateway_filter(level);
    match format {
        LogFormat::Text => {
            let _ = builder.finish().with(filter).try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().finish().with(filter).try_init();
        }
    }
}

use clap::ValueEnum;
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt as _, registry::LookupSpan, util::SubscriberInitExt as _,
};

/// Shape of the log lines written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    fn layer<S>(self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        for<'a> S: Subscriber + LookupSpan<'a>,
    {
        let fmt = tracing_subscriber::fmt::layer();

        match self {
            Self::Json => Box::new(
                fmt.json()
                    .with_current_span(false)
                    .with_target(false),
            ),
            Self::Pretty => Box::new(fmt.pretty().with_target(true).with_file(false)),
        }
    }
}

/// Filter from `RUST_LOG`; without one, `info` for everything.
fn env_filter() -> EnvFilter {
    // invalid directives are skipped, not fatal
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

pub fn init_tracing(format: LogFormat) {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(format.layer())
        .init();
}

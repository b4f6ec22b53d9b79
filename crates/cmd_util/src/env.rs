use std::{
    env,
    fmt::Debug,
    fs::File,
    io,
    str::FromStr,
    sync::LazyLock,
};

use tracing::Level;
use tracing_subscriber::{
    fmt::{
        format::format,
        MakeWriter,
    },
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// Read a knob from the environment, falling back to `default` when the
/// variable is unset or doesn't parse.
pub fn env_config<T: Debug + FromStr>(name: &str, default: T) -> T
where
    <T as FromStr>::Err: Debug,
{
    let var_s = match env::var(name) {
        Ok(s) => s,
        Err(env::VarError::NotPresent) => return default,
        Err(env::VarError::NotUnicode(..)) => {
            tracing::warn!("Invalid value for {name}, falling back to {default:?}.");
            return default;
        },
    };
    match T::from_str(&var_s) {
        Ok(v) => {
            tracing::info!("Overriding {name} to {v:?} from environment");
            v
        },
        Err(e) => {
            tracing::warn!("Invalid value {var_s} for {name}, falling back to {default:?}: {e:?}");
            default
        },
    }
}

/// Optional knob: `None` when unset or empty.
pub fn env_config_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// Trace file named by `FEDERATION_TRACE_FILE`, if set.
pub static FEDERATION_TRACE_FILE: LazyLock<Option<File>> = LazyLock::new(|| {
    let path = env_config_opt("FEDERATION_TRACE_FILE")?;
    match create_trace_file(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Could not create trace file {path}: {e}");
            None
        },
    }
});

fn create_trace_file(path: &str) -> io::Result<File> {
    File::create(path.trim())
}

/// Guard object. Hold onto it for as long as you'd like to keep tracing to a
/// file specified by `FEDERATION_TRACE_FILE`
pub struct TracingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Call this from scripts at startup.
pub fn config_tool() -> TracingGuard {
    config_tracing(io::stderr, Level::ERROR)
}

/// Call this from services at startup.
pub fn config_service() -> TracingGuard {
    config_tracing(io::stdout, Level::INFO)
}

fn config_tracing<W>(writer: W, level: Level) -> TracingGuard
where
    W: Send + Sync + for<'writer> MakeWriter<'writer> + 'static,
{
    let mut layers = Vec::new();
    let color_disabled = env::var("NO_COLOR").is_ok();
    let format_layer = tracing_subscriber::fmt::layer()
        .with_ansi(!color_disabled)
        .with_writer(writer);
    let format_layer = match env::var("LOG_FORMAT") {
        Ok(s) if s == "json" => format_layer.event_format(format().json()).boxed(),
        Ok(s) if s == "pretty" => format_layer.event_format(format().pretty()).boxed(),
        _ => format_layer.event_format(format().compact()).boxed(),
    };
    let format_layer = format_layer
        .with_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(level.as_str())))
        .boxed();
    layers.push(format_layer);

    let guard = if let Some(ref file) = *FEDERATION_TRACE_FILE {
        let (file_writer, guard) = tracing_appender::non_blocking(file);
        let file_writer_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
            .boxed();
        layers.push(file_writer_layer);
        Some(guard)
    } else {
        None
    };
    tracing_subscriber::registry().with(layers).init();

    TracingGuard { _guard: guard }
}

pub fn config_test() {
    // Ok if this fails: some other test in the binary already installed a
    // subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .compact()
        .try_init();
}

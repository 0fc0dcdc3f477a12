use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cloudplay::config::{
    ConfigPolicyChain, DeviceProbe, DeviceProfile, HostProbe, LayerDocument, PolicyConfig,
    Priority,
};
use cloudplay::events::EventBus;
use cloudplay::EngineContext;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Resolve layered media configuration and print the result
#[derive(Parser, Debug)]
#[command(name = "cloudplay-config")]
#[command(version, about = "Resolve layered cloud-gaming media configuration", long_about = None)]
struct CliArgs {
    /// Layer file, optionally prefixed with a priority (e.g. `user=settings.json`).
    /// Without a prefix the file must carry a "priority" key.
    #[arg(short = 'L', long = "layer", value_name = "[PRIORITY=]FILE")]
    layers: Vec<String>,

    /// Device profile JSON used instead of probing the host
    #[arg(long, value_name = "FILE")]
    device_profile: Option<PathBuf>,

    /// Show which priority level owns each field
    #[arg(short = 'e', long)]
    explain: bool,

    /// Output format
    #[arg(short = 'f', long, value_name = "FORMAT", default_value = "text")]
    format: OutputFormat,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "warn")]
    log_level: LogLevel,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting cloudplay-config v{}", env!("CARGO_PKG_VERSION"));

    let profile = match &args.device_profile {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<DeviceProfile>(&text)?
        }
        None => HostProbe.probe(),
    };

    let ctx = EngineContext::new(&profile, Arc::new(EventBus::new()))?;

    for layer in &args.layers {
        let (priority, path) = parse_layer_arg(layer)?;
        let doc = LayerDocument::load(&path, priority).await?;
        tracing::info!("Loaded {} layer from {}", doc.priority, path.display());
        ctx.apply_sections(doc.priority, doc.sections)?;
    }

    let audio = ctx.with_audio_chain(|chain| describe(chain))?;
    let session = ctx.with_session_chain(|chain| describe(chain))?;
    let video = ctx.with_video_chain(|chain| describe(chain))?;
    let domains = [("audio", audio), ("session", session), ("video", video)];

    match args.format {
        OutputFormat::Json => {
            let mut out = Map::new();
            for (name, fields) in domains {
                let mut section = Map::new();
                for field in fields {
                    let entry = if args.explain {
                        json!({ "value": field.value, "source": field.source })
                    } else {
                        field.value
                    };
                    section.insert(field.name.to_string(), entry);
                }
                out.insert(name.to_string(), Value::Object(section));
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        }
        OutputFormat::Text => {
            for (name, fields) in domains {
                println!("[{}]", name);
                for field in fields {
                    if args.explain {
                        let source = field
                            .source
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!("{} = {}  ({})", field.name, field.value, source);
                    } else {
                        println!("{} = {}", field.name, field.value);
                    }
                }
                println!();
            }
        }
    }

    Ok(())
}

/// One resolved field for display
struct FieldView {
    name: &'static str,
    value: Value,
    source: Option<Priority>,
}

fn describe<T>(chain: &ConfigPolicyChain<T>) -> anyhow::Result<Vec<FieldView>>
where
    T: PolicyConfig + Serialize,
{
    let resolved = serde_json::to_value(chain.get_final())?;
    Ok(T::field_names()
        .iter()
        .map(|&name| FieldView {
            name,
            value: resolved.get(name).cloned().unwrap_or(Value::Null),
            source: chain.resolved_source(name),
        })
        .collect())
}

/// Split `priority=path` (or a bare path)
fn parse_layer_arg(arg: &str) -> anyhow::Result<(Option<Priority>, PathBuf)> {
    match arg.split_once('=') {
        Some((priority, path)) => Ok((Some(priority.parse()?), PathBuf::from(path))),
        None => Ok((None, PathBuf::from(arg))),
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = log_directives(effective_level);

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Filter directives for the library and this binary's own target
fn log_directives(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "cloudplay=error,cloudplay_config=error",
        LogLevel::Warn => "cloudplay=warn,cloudplay_config=warn",
        LogLevel::Info => "cloudplay=info,cloudplay_config=info",
        LogLevel::Debug => "cloudplay=debug,cloudplay_config=debug",
        LogLevel::Trace => "cloudplay=trace,cloudplay_config=trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directives_cover_binary_target() {
        for level in [LogLevel::Error, LogLevel::Info, LogLevel::Trace] {
            let directives = log_directives(level);
            let filter = tracing_subscriber::EnvFilter::try_new(directives).unwrap();
            assert!(filter.to_string().contains("cloudplay_config="));
            assert!(directives.starts_with("cloudplay="));
        }
    }

    #[test]
    fn test_parse_layer_arg() {
        let (priority, path) = parse_layer_arg("user=settings.json").unwrap();
        assert_eq!(priority, Some(Priority::User));
        assert_eq!(path, PathBuf::from("settings.json"));

        let (priority, _) = parse_layer_arg("layer.json").unwrap();
        assert_eq!(priority, None);
        assert!(parse_layer_arg("nope=layer.json").is_err());
    }
}

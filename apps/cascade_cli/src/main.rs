use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use cascade_core::{
    definition::Cascade, CascadeController, Field, HttpOptionsFetcher, PageContext,
};
use clap::Parser;
use shared::domain::FieldKey;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_definition, load_settings, parse_origin};

/// Binds a cascade against a live admin server, runs the initial sync, then
/// replays `--change` edits in order and prints the resulting fields.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "cascade.toml")]
    config: PathBuf,
    #[arg(long)]
    origin: Option<String>,
    #[arg(long)]
    page_path: Option<String>,
    #[arg(long)]
    preset: Option<String>,
    #[arg(long)]
    definition: Option<String>,
    /// Initial field value as rendered by the server, `field=value`.
    #[arg(long = "set", value_parser = parse_assignment)]
    initial: Vec<(String, String)>,
    /// `data-url` attribute of a field, `field=url`.
    #[arg(long = "data-url", value_parser = parse_assignment)]
    data_urls: Vec<(String, String)>,
    /// A user edit applied after the initial sync, `field=value`.
    #[arg(long = "change", value_parser = parse_assignment)]
    changes: Vec<(String, String)>,
    #[arg(long)]
    json: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    if field.trim().is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(origin) = args.origin {
        settings.origin = origin;
    }
    if let Some(page_path) = args.page_path {
        settings.page_path = page_path;
    }
    if let Some(preset) = args.preset {
        settings.preset = preset;
    }
    if let Some(definition) = args.definition {
        settings.definition_path = Some(definition);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let definition = load_definition(&settings)?;
    let origin = parse_origin(&settings.origin)?;
    let keys = Cascade::new(definition.clone())
        .context("invalid cascade definition")?
        .fields()
        .to_vec();

    let initial: HashMap<String, String> = args.initial.into_iter().collect();
    let data_urls: HashMap<String, String> = args.data_urls.into_iter().collect();
    let fields = keys
        .iter()
        .map(|key| build_field(key, &initial, &data_urls))
        .collect();

    info!(
        origin = %origin,
        page_path = %settings.page_path,
        cascade = %definition.name,
        session = settings.session_cookie.is_some(),
        "cascade_cli: binding"
    );

    let mut fetcher = HttpOptionsFetcher::new();
    if let Some(cookie) = &settings.session_cookie {
        fetcher = fetcher.with_session_cookie(cookie.clone());
    }

    let controller = CascadeController::bind(
        definition,
        PageContext::new(origin, settings.page_path.clone()),
        fields,
        Arc::new(fetcher),
    )
    .context("failed to bind cascade")?;

    controller.initial_sync().await;
    controller.settled().await;

    for (field, value) in args.changes {
        info!(field = %field, value = %value, "cascade_cli: applying change");
        controller
            .change(&FieldKey::new(field), value)
            .await
            .context("failed to apply change")?;
        controller.settled().await;
    }

    let snapshot = controller.snapshot().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for field in &snapshot {
            println!("{}", describe(field));
        }
    }

    Ok(())
}

fn build_field(
    key: &FieldKey,
    initial: &HashMap<String, String>,
    data_urls: &HashMap<String, String>,
) -> Field {
    let mut field = Field::new(key.clone());
    if let Some(value) = initial.get(key.as_str()) {
        field = field.with_value(value.clone());
    }
    if let Some(url) = data_urls.get(key.as_str()) {
        field = field.with_data_url(url.clone());
    }
    field
}

fn describe(field: &Field) -> String {
    let options = field
        .options
        .iter()
        .skip(1)
        .map(|option| format!("{}:{}", option.value, option.label))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} = '{}' ({:?}) [{}]",
        field.key, field.value, field.state, options
    )
}

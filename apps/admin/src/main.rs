use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{AdminClient, ControllerError};
use shared::{
    domain::{ResourceId, ResourceKind},
    protocol::{Query, SortOrder},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod body;
mod config;

use body::{build_body, parse_key_value};
use config::{load_settings, normalize_base_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "fitadmin", about = "Admin console for the fitness platform backend")]
struct Cli {
    /// Overrides the configured backend URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of a collection as JSON lines.
    List {
        resource: ResourceKind,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        /// `field` or `field:asc|desc`.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },
    Delete {
        resource: ResourceKind,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Create {
        resource: ResourceKind,
        #[command(flatten)]
        body: BodyArgs,
    },
    Update {
        resource: ResourceKind,
        id: String,
        #[command(flatten)]
        body: BodyArgs,
    },
}

#[derive(Args, Debug)]
struct BodyArgs {
    #[arg(long, conflicts_with_all = ["fields", "files"])]
    json: Option<String>,
    #[arg(long = "field", value_parser = parse_key_value)]
    fields: Vec<(String, String)>,
    /// `form_field=path`; switches the request to multipart.
    #[arg(long = "file", value_parser = parse_key_value)]
    files: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    let client = AdminClient::new(normalize_base_url(&settings.api_base_url)?);

    match cli.command {
        Command::List {
            resource,
            page,
            limit,
            sort,
            filters,
        } => {
            let query = initial_query(&settings, limit, sort.as_deref())?;
            list(&client, resource, query, page, filters).await
        }
        Command::Delete { resource, ids } => delete(&client, resource, ids).await,
        Command::Create { resource, body } => {
            let controller = client.records(resource, Query::default())?;
            let body = build_body(body.json.as_deref(), &body.fields, &body.files).await?;
            let created = controller.create(body).await?;
            println!("{}", serde_json::to_string(&created)?);
            Ok(())
        }
        Command::Update { resource, id, body } => {
            let controller = client.records(resource, Query::default())?;
            let body = build_body(body.json.as_deref(), &body.fields, &body.files).await?;
            let updated = controller.update(&ResourceId::new(id), body).await?;
            println!("{}", serde_json::to_string(&updated)?);
            Ok(())
        }
    }
}

fn initial_query(settings: &Settings, limit: Option<u32>, sort: Option<&str>) -> Result<Query> {
    let (sort_by, sort_order) = match sort {
        Some(raw) => parse_sort(raw)?,
        None => (settings.sort_by.clone(), SortOrder::default()),
    };
    Ok(Query {
        page: 1,
        limit: limit.filter(|n| *n > 0).unwrap_or(settings.page_limit),
        sort_by,
        sort_order,
        filters: BTreeMap::new(),
    })
}

fn parse_sort(raw: &str) -> Result<(String, SortOrder)> {
    let (field, order) = match raw.split_once(':') {
        Some((field, order)) => (field, order.parse::<SortOrder>().map_err(anyhow::Error::msg)?),
        None => (raw, SortOrder::default()),
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("--sort needs a field name");
    }
    Ok((field.to_string(), order))
}

async fn list(
    client: &AdminClient,
    resource: ResourceKind,
    query: Query,
    page: u32,
    filters: Vec<(String, String)>,
) -> Result<()> {
    let controller = client.records(resource, query)?;
    controller.set_filter(filters).await;
    controller.apply_filters().await?;
    if page > 1 {
        controller.set_page(page).await?;
    }

    let snapshot = controller.snapshot().await;
    if snapshot.query.page != page {
        warn!(
            requested = page,
            total_pages = snapshot.page.total_pages,
            "page out of range, showing page {}",
            snapshot.query.page
        );
    }
    for item in &snapshot.page.items {
        println!("{}", serde_json::to_string(item)?);
    }
    println!(
        "{resource}: page {}/{} ({} total)",
        snapshot.query.page, snapshot.page.total_pages, snapshot.page.total_count
    );
    Ok(())
}

async fn delete(client: &AdminClient, resource: ResourceKind, ids: Vec<String>) -> Result<()> {
    let controller = client.records(resource, Query::default())?;
    let ids: Vec<ResourceId> = ids.into_iter().map(ResourceId::new).collect();

    if let [id] = ids.as_slice() {
        controller
            .remove(id)
            .await
            .with_context(|| format!("could not delete {resource} {id}"))?;
        println!("deleted {id}");
        return Ok(());
    }

    match controller.remove_many(&ids).await {
        Ok(deleted) => {
            for id in deleted {
                println!("deleted {id}");
            }
            Ok(())
        }
        Err(ControllerError::BulkDelete {
            deleted, failures, ..
        }) => {
            for id in &deleted {
                println!("deleted {id}");
            }
            for failure in &failures {
                eprintln!("failed {}: {}", failure.id, failure.message);
            }
            bail!("{} of {} deletes failed", failures.len(), deleted.len() + failures.len())
        }
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_flag_accepts_field_and_optional_order() {
        assert_eq!(
            parse_sort("name:asc").expect("sort"),
            ("name".to_string(), SortOrder::Asc)
        );
        assert_eq!(
            parse_sort("calories").expect("sort"),
            ("calories".to_string(), SortOrder::Desc)
        );
        assert!(parse_sort("name:sideways").is_err());
        assert!(parse_sort(":asc").is_err());
    }

    #[test]
    fn initial_query_prefers_flags_over_settings() {
        let settings = Settings {
            page_limit: 25,
            ..Settings::default()
        };

        let from_settings = initial_query(&settings, None, None).expect("query");
        assert_eq!(from_settings.limit, 25);
        assert_eq!(from_settings.sort_by, "createdAt");

        let from_flags = initial_query(&settings, Some(5), Some("name:asc")).expect("query");
        assert_eq!(from_flags.limit, 5);
        assert_eq!(from_flags.sort_by, "name");
        assert_eq!(from_flags.sort_order, SortOrder::Asc);
    }

    #[test]
    fn cli_parses_filters_and_resource_aliases() {
        let cli = Cli::try_parse_from([
            "fitadmin",
            "list",
            "meal",
            "--filter",
            "search=oats",
            "--sort",
            "name:asc",
        ])
        .expect("parse");
        match cli.command {
            Command::List {
                resource, filters, ..
            } => {
                assert_eq!(resource, ResourceKind::Meals);
                assert_eq!(filters, vec![("search".to_string(), "oats".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

mod cli;

use crate::cli::{Command, CLI};
use anyhow::Context as _;
use clap::Parser;
use linkstore_core::{Context, OwnerId};
use linkstore_service::{LinkService, PipelineSettings, ServiceSettings, StorageConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();

    info!(
        storage_backend = %config.storage,
        code_prefix = %config.code_prefix,
        "opening linkstore"
    );

    let storage_config = StorageConfig::builder()
        .backend(config.storage.into())
        .file_path(config.file_storage_path.clone())
        .mysql_dsn(config.mysql_dsn.clone())
        .code_prefix(config.code_prefix.clone())
        .build();

    let storage = storage_config
        .open()
        .await
        .context("failed to open storage")?;

    let settings = ServiceSettings::builder()
        .base_url(config.base_url.clone())
        .op_timeout(Duration::from_millis(config.op_timeout_ms))
        .pipeline(
            PipelineSettings::builder()
                .batch_size(config.delete_batch_size)
                .workers(config.delete_workers)
                .build(),
        )
        .build();
    let service = LinkService::new(storage, settings);

    let outcome = run(&service, config.command).await;
    service.close().await.context("failed to close storage")?;
    outcome
}

async fn run(service: &LinkService, command: Command) -> anyhow::Result<()> {
    let ctx = Context::background();

    match command {
        Command::Add { url, owner } => {
            let short_url = service.shorten(&ctx, &url, owner.map(OwnerId::new)).await?;
            println!("{short_url}");
        }
        Command::Get { code } => {
            println!("{}", service.resolve(&ctx, &code).await?);
        }
        Command::List { owner } => {
            for link in service.links_for_owner(&ctx, OwnerId::new(owner)).await? {
                println!("{}\t{}", link.short_url, link.original_url);
            }
        }
        Command::Delete { owner, codes } => {
            service
                .delete_links(&ctx, &codes, OwnerId::new(owner))
                .await?;
        }
        Command::RegisterOwner => {
            println!("{}", service.register_owner(&ctx).await?);
        }
        Command::Ping => {
            service.ping(&ctx).await?;
            println!("ok");
        }
    }

    Ok(())
}

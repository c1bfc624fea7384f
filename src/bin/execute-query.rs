// Copyright (c) 2025 - Cowboy AI, Inc.
//! Execute Query
//!
//! Runs one query through the eager execution façade and logs the result.
//!
//! Run with: cargo run --bin execute-query --features neo4j,container -- "RETURN 42"
//!
//! Configuration (environment variables):
//! 1. NEO4J_URI, NEO4J_USER, NEO4J_PASSWORD, NEO4J_DATABASE: target server
//! 2. NEO4J_ROUTING: `writers` (default) or `readers`
//! 3. NEO4J_WITH_DOCKER=1: start a throwaway container instead, using
//!    NEO4J_IMAGE_VERSION (default `5`)

use anyhow::{Context, Result};
use cim_graph_query::adapters::Neo4jSessionProvider;
use cim_graph_query::config::{with_database, QueryOption};
use cim_graph_query::container::{ContainerConfiguration, Neo4jContainer};
use cim_graph_query::{params, Driver, Neo4jConfig, RoutingControl};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "RETURN 42".to_string());

    let routing: RoutingControl = std::env::var("NEO4J_ROUTING")
        .ok()
        .map(|raw| raw.parse())
        .transpose()
        .context("Invalid NEO4J_ROUTING")?
        .unwrap_or_default();

    let with_docker = std::env::var("NEO4J_WITH_DOCKER").is_ok_and(|v| v == "1");

    let (config, container) = if with_docker {
        let version = std::env::var("NEO4J_IMAGE_VERSION").unwrap_or_else(|_| "5".to_string());
        let (container, config) = Neo4jContainer::start_with_neo4j_config(ContainerConfiguration::new(
            version, "neo4j", "s3cr3t",
        ))
        .await
        .context("Failed to start Neo4j container")?;
        (config, Some(container))
    } else {
        (Neo4jConfig::from_env().context("Failed to load configuration")?, None)
    };

    let outcome = run(config, &query, routing).await;

    if let Some(container) = container {
        if let Err(e) = container.stop().await {
            error!("Failed to stop container: {}", e);
        }
    }

    outcome
}

async fn run(config: Neo4jConfig, query: &str, routing: RoutingControl) -> Result<()> {
    let database = config.database().to_string();
    let provider = Neo4jSessionProvider::connect(config)
        .await
        .context("Failed to connect to Neo4j")?;
    let driver = Driver::new(provider);
    driver
        .verify_connectivity()
        .await
        .context("Connectivity check failed")?;
    info!("Connected to {} (encrypted: {})", driver.target(), driver.is_encrypted());

    let options = [QueryOption::Routing(routing), with_database(database)];
    let result = driver.execute_query(query, params! {}, options).await?;
    info!("{}", result);

    driver.close().await?;
    Ok(())
}

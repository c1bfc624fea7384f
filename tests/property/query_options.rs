// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Query Option Application
//!
//! Options are field assignments applied in order: for every field, the last
//! option that sets it decides the value, and unset fields keep their default.

use cim_graph_query::config::{
    with_database, with_impersonated_user, with_readers_routing_control, with_timeout,
    with_writers_routing_control,
};
use cim_graph_query::{QueryConfig, QueryOption, RoutingControl};
use proptest::prelude::*;
use std::time::Duration;

/// Plain description of an option, so the expected outcome can be computed
#[derive(Debug, Clone)]
enum OptionSpec {
    Readers,
    Writers,
    Database(String),
    User(String),
    Timeout(u64),
}

impl OptionSpec {
    fn build(&self) -> QueryOption {
        match self {
            OptionSpec::Readers => with_readers_routing_control(),
            OptionSpec::Writers => with_writers_routing_control(),
            OptionSpec::Database(db) => with_database(db.clone()),
            OptionSpec::User(user) => with_impersonated_user(user.clone()),
            OptionSpec::Timeout(ms) => with_timeout(Duration::from_millis(*ms)),
        }
    }
}

fn option_spec() -> impl Strategy<Value = OptionSpec> {
    prop_oneof![
        Just(OptionSpec::Readers),
        Just(OptionSpec::Writers),
        "[a-z]{0,8}".prop_map(OptionSpec::Database),
        "[a-z]{0,8}".prop_map(OptionSpec::User),
        (1u64..10_000).prop_map(OptionSpec::Timeout),
    ]
}

#[derive(Debug, PartialEq)]
struct Expected {
    routing: RoutingControl,
    database: Option<String>,
    user: Option<String>,
    timeout: Option<Duration>,
}

fn fold(specs: &[OptionSpec]) -> Expected {
    let mut expected = Expected {
        routing: RoutingControl::Writers,
        database: None,
        user: None,
        timeout: None,
    };
    for spec in specs {
        match spec {
            OptionSpec::Readers => expected.routing = RoutingControl::Readers,
            OptionSpec::Writers => expected.routing = RoutingControl::Writers,
            OptionSpec::Database(db) => {
                expected.database = Some(db.clone()).filter(|d| !d.is_empty())
            }
            OptionSpec::User(user) => expected.user = Some(user.clone()).filter(|u| !u.is_empty()),
            OptionSpec::Timeout(ms) => expected.timeout = Some(Duration::from_millis(*ms)),
        }
    }
    expected
}

fn observe(config: &QueryConfig) -> Expected {
    Expected {
        routing: config.routing(),
        database: config.database().map(str::to_string),
        user: config.impersonated_user().map(str::to_string),
        timeout: config.timeout(),
    }
}

proptest! {
    /// Last assignment per field wins
    #[test]
    fn prop_options_apply_in_order(specs in prop::collection::vec(option_spec(), 0..12)) {
        let config = QueryConfig::from_options(specs.iter().map(OptionSpec::build));
        prop_assert_eq!(observe(&config), fold(&specs));
    }

    /// Appending an option only changes the field it sets
    #[test]
    fn prop_appending_database_only_touches_database(
        specs in prop::collection::vec(option_spec(), 0..12),
        db in "[a-z]{1,8}",
    ) {
        let before = QueryConfig::from_options(specs.iter().map(OptionSpec::build));
        let after = QueryConfig::from_options(
            specs.iter().map(OptionSpec::build).chain(std::iter::once(with_database(db.clone()))),
        );

        prop_assert_eq!(after.database(), Some(db.as_str()));
        prop_assert_eq!(after.routing(), before.routing());
        prop_assert_eq!(after.impersonated_user(), before.impersonated_user());
        prop_assert_eq!(after.timeout(), before.timeout());
    }

    /// With no routing option the write path is used
    #[test]
    fn prop_routing_defaults_to_writers(
        specs in prop::collection::vec(option_spec(), 0..12)
    ) {
        let without_routing: Vec<_> = specs
            .into_iter()
            .filter(|s| !matches!(s, OptionSpec::Readers | OptionSpec::Writers))
            .collect();
        let config = QueryConfig::from_options(without_routing.iter().map(OptionSpec::build));
        prop_assert_eq!(config.routing(), RoutingControl::Writers);
    }
}

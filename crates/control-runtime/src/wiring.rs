//! Subsystem construction in dependency order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use audit_ledger::{AuditLog, FillJournal, LedgerSeq};
use circuit_breakers::BreakerTree;
use config_registry::{default_catalog, default_presets, ConfigRegistry};
use event_replay::ReplayEngine;
use intent_service::exec::standard::{standard_registry, StandardDeps};
use intent_service::{IntentService, IntentServiceConfig};
use intent_store::{InMemoryIntentStore, IntentRepository, JsonlIntentStore};
use operator_gateway::{AppState, GatewayConfig, OperatorGateway};
use shared_bus::{subjects, DurableConfig, DurableSubscription, InMemoryEventBus};
use shared_crypto::OpsSecret;
use shared_types::WorldState;
use state_manager::StateManager;
use state_projection::StateProjection;

use crate::config::RuntimeConfig;
use crate::consumers::{spawn_breaker_audit, spawn_confidence_feed, FillsConsumer};

/// The assembled control plane.
pub struct Runtime {
    pub bus: Arc<InMemoryEventBus>,
    pub state: Arc<StateManager>,
    pub breakers: Arc<BreakerTree>,
    pub config_registry: Arc<ConfigRegistry>,
    pub audit: Arc<AuditLog>,
    pub fills: Arc<FillJournal>,
    pub intents: Arc<IntentService>,
    pub projection: Arc<StateProjection>,
    pub replay: Arc<ReplayEngine>,
    pub gateway: OperatorGateway,
    /// Keepalive handles; dropping one stops its consumer group.
    _subscriptions: Vec<DurableSubscription>,
}

/// Build every subsystem and wire the bus consumers.
///
/// # Errors
///
/// Any journal open, receipt-chain verification, or configuration
/// failure aborts startup.
pub fn build(config: &RuntimeConfig) -> anyhow::Result<Runtime> {
    let secret = OpsSecret::new(config.ops_secret.as_bytes().to_vec());
    let bus = Arc::new(InMemoryEventBus::new());
    let seq = LedgerSeq::new();

    // Ledgers first: everything else records into them.
    let audit = Arc::new(if config.ephemeral {
        AuditLog::in_memory(secret.clone(), seq.clone())
    } else {
        AuditLog::open(config.data_dir.join("audit.jsonl"), secret.clone(), seq.clone())
            .context("opening audit journal")?
    });
    audit.attach_publisher(bus.clone());

    let fills = Arc::new(if config.ephemeral {
        FillJournal::in_memory(seq.clone())
    } else {
        FillJournal::open(config.data_dir.join("fills.jsonl"), seq.clone())
            .context("opening fill journal")?
    });

    let store: Arc<dyn IntentRepository> = if config.ephemeral {
        Arc::new(InMemoryIntentStore::new())
    } else {
        Arc::new(
            JsonlIntentStore::open(config.data_dir.join("intents.jsonl"))
                .context("opening intent journal")?,
        )
    };

    let config_registry = Arc::new(
        if config.ephemeral {
            ConfigRegistry::in_memory(default_catalog(), default_presets(), secret.clone())
        } else {
            ConfigRegistry::open(
                default_catalog(),
                default_presets(),
                secret.clone(),
                config.data_dir.join("receipts.jsonl"),
            )
            .context("opening config receipt chain")?
        }
        .with_env_layer(config.config_env_layer.clone()),
    );
    config_registry.attach_publisher(bus.clone());

    // State ownership chain: world → breakers.
    let state = Arc::new(StateManager::new(WorldState::default()));
    let breakers = Arc::new(BreakerTree::new(state.clone()));
    breakers.attach_publisher(bus.clone());

    // Intent pipeline, sized from the effective config.
    let max_in_memory = config_registry
        .effective_value("system.maxInMemoryIntents")
        .ok()
        .and_then(|v| v.as_u64())
        .unwrap_or(10_000) as usize;
    let sse_retention = config_registry
        .effective_value("system.sseRetentionEvents")
        .ok()
        .and_then(|v| v.as_u64())
        .unwrap_or(2_048) as usize;

    let deps = StandardDeps {
        state: state.clone(),
        breakers: breakers.clone(),
        config: config_registry.clone(),
        publisher: bus.clone(),
        account: config.venue_account.clone(),
    };
    let intents = IntentService::new(
        IntentServiceConfig {
            max_in_memory,
            sse_retention,
            operators: config.operators.clone(),
            ..IntentServiceConfig::default()
        },
        secret,
        standard_registry(&deps),
        store,
        audit.clone(),
        state.clone(),
        breakers.clone(),
        config_registry.clone(),
    );
    intents.hydrate_from_store();

    // Read model and historical replay.
    let projection = StateProjection::new(
        state.clone(),
        breakers.clone(),
        intents.clone(),
        config_registry.clone(),
    );
    Arc::clone(&projection).spawn_invalidator();

    let replay = ReplayEngine::new(audit.clone(), fills.clone(), seq, state.clone());
    Arc::clone(&replay).spawn_periodic(Duration::from_secs(config.snapshot_interval_secs));

    // Bus consumers.
    let fills_sub = Arc::clone(&bus).subscribe_durable(
        subjects::FILL_PATTERN,
        "state-manager",
        Arc::new(FillsConsumer {
            fills: fills.clone(),
            state: state.clone(),
        }),
        DurableConfig::default(),
    );
    spawn_breaker_audit(&bus, audit.clone(), state.clone());
    spawn_confidence_feed(&bus, state.clone());

    let gateway = OperatorGateway::new(
        GatewayConfig {
            bind_addr: config.bind_addr,
            ..GatewayConfig::default()
        },
        AppState {
            intents: intents.clone(),
            projection: projection.clone(),
            config: config_registry.clone(),
            replay: replay.clone(),
            audit: audit.clone(),
        },
    )
    .map_err(|e| anyhow::anyhow!("gateway config: {e}"))?;

    info!(
        data_dir = %config.data_dir.display(),
        bind = %config.bind_addr,
        ephemeral = config.ephemeral,
        operators = config.operators.len(),
        "Control plane wired"
    );

    Ok(Runtime {
        bus,
        state,
        breakers,
        config_registry,
        audit,
        fills,
        intents,
        projection,
        replay,
        gateway,
        _subscriptions: vec![fills_sub],
    })
}

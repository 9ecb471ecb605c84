//! Scripted walk through the engine against an in-memory store.
//!
//! Creates a parent, creates children under it through the
//! `/Parent/<id>/Child/add` route, names everything with write-through
//! updates, snapshots the cache, and then cascade-deletes the graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use docsync_api::{MemoryStore, Operation};
use docsync_config::Config;
use docsync_core::{
    CollectionId, Document, DocumentKey, DocumentStore, EntityRecord, MemoryNavigator,
    NavigationEvent, Navigator, Redirect, SyncEngine,
};

use crate::cli::{DemoArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

const PARENT: &str = "Parent";
const CHILD: &str = "Child";

/// Everything the demo observed, rendered as JSON.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub parent: DocumentKey,
    pub children: Vec<DocumentKey>,
    /// Cache contents after the graph was built: collection → doc → record.
    pub cache: BTreeMap<String, BTreeMap<String, Arc<EntityRecord>>>,
    /// Remote writes in the order the store applied them.
    pub operations: Vec<String>,
    pub navigation: Vec<String>,
    /// Slots and subscriptions still held once the demo finished.
    pub cached_after: usize,
    pub subscriptions_after: usize,
    pub stored_after: usize,
}

pub async fn handle(args: &DemoArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let report = run(args, config).await?;
    output::print_output(&output::render_json(global, &report)?)
}

pub async fn run(args: &DemoArgs, config: &Config) -> Result<DemoReport, CliError> {
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(MemoryNavigator::new("/"));
    let engine = SyncEngine::start(
        config.engine_config()?,
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
    );

    let result = walk(&engine, &store, &navigator, args).await;
    engine.shutdown().await;
    result
}

async fn walk(
    engine: &SyncEngine,
    store: &MemoryStore,
    navigator: &MemoryNavigator,
    args: &DemoArgs,
) -> Result<DemoReport, CliError> {
    let parent = engine.create(CollectionId::new(PARENT)).await?;
    name_entity(engine, &parent, "Demo parent").await?;

    let mut children = Vec::with_capacity(args.children);
    for n in 1..=args.children {
        navigator.set_path(&format!("/{PARENT}/{}/{CHILD}/add", parent.doc));
        let child = engine.create(CollectionId::new(CHILD)).await?;
        name_entity(engine, &child, &format!("Child {n}")).await?;
        children.push(child);
    }
    info!(%parent, children = children.len(), "demo graph built");

    // Pushes for earlier parent writes can land after the last link; wait
    // until the parent lists every child.
    engine
        .watch(&parent)
        .wait_for(|slot| slot.as_ref().is_some_and(|r| r.children() == children))
        .await
        .ok_or(CliError::EngineStopped)?;

    let cache = snapshot(engine);

    if !args.keep {
        engine
            .delete(parent.clone(), Some(Redirect::Replace(format!("/{PARENT}"))))
            .await?;
    }

    Ok(DemoReport {
        parent,
        children,
        cache,
        operations: store.operations().iter().map(describe_operation).collect(),
        navigation: navigator.history().iter().map(describe_navigation).collect(),
        cached_after: engine.cache().len(),
        subscriptions_after: engine.subscription_count().await?,
        stored_after: store.len(),
    })
}

/// Wait for the first push, then set `Name` and write it through.
async fn name_entity(engine: &SyncEngine, key: &DocumentKey, name: &str) -> Result<(), CliError> {
    engine
        .watch(key)
        .loaded()
        .await
        .ok_or(CliError::EngineStopped)?;

    let mut patch = Document::new();
    patch.insert("Name".into(), Value::String(name.into()));
    engine.update(key.clone(), patch).await?;
    Ok(())
}

fn snapshot(engine: &SyncEngine) -> BTreeMap<String, BTreeMap<String, Arc<EntityRecord>>> {
    let cache = engine.cache();
    let mut out: BTreeMap<String, BTreeMap<String, Arc<EntityRecord>>> = BTreeMap::new();
    for key in cache.keys() {
        if let Some(record) = cache.get(&key) {
            out.entry(key.collection.to_string())
                .or_default()
                .insert(key.doc.to_string(), record);
        }
    }
    out
}

fn describe_operation(op: &Operation) -> String {
    match op {
        Operation::Add(key) => format!("add {key}"),
        Operation::Update(key) => format!("update {key}"),
        Operation::Delete(key) => format!("delete {key}"),
    }
}

fn describe_navigation(event: &NavigationEvent) -> String {
    match event {
        NavigationEvent::Replace(path) => format!("replace {path}"),
        NavigationEvent::Push(path) => format!("push {path}"),
    }
}

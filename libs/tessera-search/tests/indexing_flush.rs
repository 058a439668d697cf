#![allow(unused)]
mod support;

use tessera_search::config::SearchConfig;
use tessera_search::indexing::IndexingCoordinator;
use tessera_search::{run_in_transaction, Error, IndexManager, SearchTransaction};
use support::{
    company_loader, contact_loader, registry, BulkOp, Company, Contact, MemoryHost, MemoryStore, Tables,
};

fn managers() -> anyhow::Result<(IndexManager<Company, Tables>, IndexManager<Contact, Tables>)> {
    let registry = registry();
    Ok((
        IndexManager::new(&registry, company_loader())?,
        IndexManager::new(&registry, contact_loader())?,
    ))
}

fn index(document_type: &str, id: &str) -> BulkOp {
    BulkOp::Index {
        document_type: document_type.to_string(),
        id: id.to_string(),
    }
}

fn delete(document_type: &str, id: &str) -> BulkOp {
    BulkOp::Delete {
        document_type: document_type.to_string(),
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Intent resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_wins_over_index_in_either_order() -> anyhow::Result<()> {
    let (companies, _) = managers()?;

    for delete_first in [true, false] {
        let host = MemoryHost::seeded();
        let store = MemoryStore::default();
        let mut tx = SearchTransaction::begin(&host, store.shared()).await?;

        if delete_first {
            companies.delete(&mut tx, 1);
            companies.index(&mut tx, 1);
        } else {
            companies.index(&mut tx, 1);
            companies.delete(&mut tx, 1);
        }
        tx.commit().await?;

        let bulks = store.bulks();
        assert_eq!(bulks.len(), 1, "delete_first = {}", delete_first);
        assert_eq!(bulks[0].ops, vec![delete("Company", "1")]);
    }

    Ok(())
}

#[tokio::test]
async fn single_delete_sends_one_delete_before_commit() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.delete(&mut tx, 5);
    tx.commit().await?;

    let bulks = store.bulks();
    assert_eq!(bulks.len(), 1);
    assert_eq!(bulks[0].ops, vec![delete("Company", "5")]);
    assert_eq!(bulks[0].operations, 1);
    assert!(bulks[0].wait_for_refresh);
    assert_eq!(
        host.events(),
        vec!["begin", "begin_nested", "complete_nested", "commit"]
    );
    Ok(())
}

#[tokio::test]
async fn reindex_all_overrides_per_id_intents() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 1);
    companies.delete(&mut tx, 2);
    companies.index_all(&mut tx);
    tx.commit().await?;

    let bulks = store.bulks();
    assert_eq!(bulks.len(), 1);
    assert_eq!(
        bulks[0].ops,
        vec![index("Company", "1"), index("Company", "2"), index("Company", "3")]
    );
    assert_eq!(bulks[0].operations, 1, "reindex all is one index_many call");
    Ok(())
}

#[tokio::test]
async fn several_ids_use_batch_operations() -> anyhow::Result<()> {
    let (companies, contacts) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index_many(&mut tx, [1, 3, 99]);
    contacts.delete_many(&mut tx, [(1i64, 10i64), (2i64, 20i64)]);
    tx.commit().await?;

    let bulks = store.bulks();
    assert_eq!(bulks.len(), 1);
    assert_eq!(
        bulks[0].ops,
        vec![
            index("Company", "1"),
            index("Company", "3"),
            delete("Contact", "1__10"),
            delete("Contact", "2__20"),
        ]
    );
    assert_eq!(bulks[0].operations, 2);
    Ok(())
}

#[tokio::test]
async fn document_types_share_one_bulk_in_first_touch_order() -> anyhow::Result<()> {
    let (companies, contacts) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    contacts.index(&mut tx, (1i64, 10i64));
    companies.delete(&mut tx, 3);
    companies.index(&mut tx, 2);
    tx.commit().await?;

    let bulks = store.bulks();
    assert_eq!(bulks.len(), 1);
    assert_eq!(
        bulks[0].ops,
        vec![
            index("Contact", "1__10"),
            delete("Company", "3"),
            index("Company", "2"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn missing_source_row_is_skipped() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 99);
    tx.commit().await?;

    assert!(store.bulks().is_empty(), "an empty bulk is never sent");
    assert_eq!(host.events().last(), Some(&"commit"));
    Ok(())
}

#[tokio::test]
async fn rows_written_in_the_transaction_are_indexed() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    tx.connection()?
        .companies
        .insert(7, support::company(7, "Initech", "ACT"));
    companies.index(&mut tx, 7);
    tx.commit().await?;

    assert_eq!(store.bulks()[0].ops, vec![index("Company", "7")]);
    Ok(())
}

// ---------------------------------------------------------------------------
// Transaction outcome
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_flush_rolls_back_the_transaction() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();
    store.fail_bulks();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 1);
    let err = tx.commit().await.unwrap_err();

    assert!(err.is_backend(), "unexpected error: {}", err);
    assert_eq!(
        host.events(),
        vec!["begin", "begin_nested", "abort_nested", "rollback"]
    );
    Ok(())
}

#[tokio::test]
async fn rollback_discards_intents() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 1);
    tx.rollback().await?;

    assert!(store.bulks().is_empty());
    assert_eq!(host.events(), vec!["begin", "rollback"]);
    Ok(())
}

#[tokio::test]
async fn commit_without_intents_skips_the_nested_scope() -> anyhow::Result<()> {
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let tx = SearchTransaction::begin(&host, store.shared()).await?;
    tx.commit().await?;

    assert_eq!(host.events(), vec!["begin", "commit"]);
    Ok(())
}

#[tokio::test]
async fn last_manager_decides_refresh_policy() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let eventual = companies.clone().with_wait_for_refresh(false);
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 1);
    eventual.index(&mut tx, 2);
    tx.commit().await?;

    assert!(!store.bulks()[0].wait_for_refresh);
    Ok(())
}

#[tokio::test]
async fn refresh_policy_follows_search_config() -> anyhow::Result<()> {
    let config = SearchConfig {
        wait_for_refresh: false,
        ..SearchConfig::default()
    };
    let companies = IndexManager::<Company, Tables>::from_config(&registry(), company_loader(), &config)?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let mut tx = SearchTransaction::begin(&host, store.shared()).await?;
    companies.index(&mut tx, 1);
    tx.commit().await?;

    let bulks = store.bulks();
    assert_eq!(bulks.len(), 1);
    assert!(!bulks[0].wait_for_refresh);
    Ok(())
}

#[tokio::test]
async fn run_in_transaction_commits_on_success() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let value = run_in_transaction(&host, store.shared(), |tx| {
        let companies = companies.clone();
        Box::pin(async move {
            companies.index(tx, 2);
            Ok(42)
        })
    })
    .await?;

    assert_eq!(value, 42);
    assert_eq!(store.bulks()[0].ops, vec![index("Company", "2")]);
    assert_eq!(host.events().last(), Some(&"commit"));
    Ok(())
}

#[tokio::test]
async fn run_in_transaction_rolls_back_on_error() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let host = MemoryHost::seeded();
    let store = MemoryStore::default();

    let result: tessera_search::Result<()> = run_in_transaction(&host, store.shared(), |tx| {
        let companies = companies.clone();
        Box::pin(async move {
            companies.index(tx, 2);
            Err(Error::Configuration("boom".to_string()))
        })
    })
    .await;

    assert!(result.unwrap_err().is_configuration());
    assert!(store.bulks().is_empty());
    assert_eq!(host.events(), vec!["begin", "rollback"]);
    Ok(())
}

// ---------------------------------------------------------------------------
// Coordinator and rebuild
// ---------------------------------------------------------------------------

#[tokio::test]
async fn coordinator_flush_clears_state() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let loader = company_loader();
    let store = MemoryStore::default();
    let mut tables = Tables::seeded();

    let mut coordinator = IndexingCoordinator::<Tables>::new();
    let state = coordinator.state_for::<Company>(companies.definition(), &loader);
    state.register_index(1.into());
    state.register_delete(2.into());
    assert!(coordinator.has_pending());
    assert!(coordinator.state("Company").is_some());

    let operations = coordinator.flush(&mut tables, &store).await?;

    assert_eq!(operations, 2);
    assert!(!coordinator.has_pending());
    assert!(coordinator.state("Company").is_none());
    Ok(())
}

#[tokio::test]
async fn rebuild_is_full_then_partial() -> anyhow::Result<()> {
    let (companies, _) = managers()?;
    let store = MemoryStore::default();
    let mut tables = Tables::seeded();

    assert_eq!(companies.rebuild_index(&store, &mut tables).await?, 3);
    assert_eq!(companies.rebuild_index(&store, &mut tables).await?, 3);

    let resets = store.resets();
    assert_eq!(resets.len(), 2);
    assert!(!resets[0].partial_rebuild, "new index gets a full rebuild");
    assert!(resets[1].partial_rebuild, "existing index gets a partial rebuild");
    assert_eq!(resets[0].document_type, "Company");
    Ok(())
}

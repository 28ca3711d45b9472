#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Queries running while the index is rebuilt must always see one complete generation

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use bakery_chat::database::models::{MenuItem, Order, OrderLine, Payment};
use bakery_chat::embeddings::HashingEmbedder;
use bakery_chat::index::KnowledgeBase;
use bakery_chat::knowledge::{DocumentSource, KnowledgeExtractor, KnowledgeSource};
use bakery_chat::retrieval::Retriever;

const ITEMS_PER_GENERATION: usize = 12;

/// Every scan returns a fresh generation of menu items
struct ChangingMenu {
    generation: AtomicUsize,
}

#[async_trait]
impl KnowledgeSource for ChangingMenu {
    async fn menu_items(&self) -> anyhow::Result<Vec<MenuItem>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let created_at = chrono::Utc::now().naive_utc();
        Ok((0..ITEMS_PER_GENERATION)
            .map(|i| MenuItem {
                id: i as i64 + 1,
                name: format!("Gen{generation} Pastry {i}"),
                description: "Buttery pastry baked fresh".to_string(),
                price: 60.0,
                category: "pastries".to_string(),
                image_url: None,
                available: true,
                created_at,
            })
            .collect())
    }

    async fn orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(Vec::new())
    }

    async fn order_lines(&self) -> anyhow::Result<Vec<OrderLine>> {
        Ok(Vec::new())
    }

    async fn payments(&self) -> anyhow::Result<Vec<Payment>> {
        Ok(Vec::new())
    }
}

fn generation_of(source: &DocumentSource) -> Option<String> {
    match source {
        DocumentSource::MenuItem { name, .. } => name.split_whitespace().next().map(str::to_string),
        _ => None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queries_during_rebuilds_see_one_generation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let knowledge = Arc::new(KnowledgeBase::new(
        KnowledgeExtractor::new("₹", None),
        Arc::new(ChangingMenu {
            generation: AtomicUsize::new(0),
        }),
        Arc::new(HashingEmbedder::new(256)),
        dir.path().join("index.json"),
    ));
    knowledge.refresh().await.expect("initial build");

    let retriever = Arc::new(Retriever::new(knowledge.handle(), knowledge.embedder(), 4));

    let rebuilds = {
        let knowledge = Arc::clone(&knowledge);
        tokio::spawn(async move {
            for _ in 0..5 {
                knowledge.refresh().await.expect("rebuild succeeds");
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let retriever = Arc::clone(&retriever);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let results = retriever
                        .retrieve("Do you have a buttery pastry?")
                        .await
                        .expect("retrieval succeeds");
                    assert_eq!(results.len(), 4);

                    let generations: HashSet<String> = results
                        .iter()
                        .filter_map(|scored| generation_of(&scored.document.source))
                        .collect();
                    assert!(
                        generations.len() <= 1,
                        "mixed generations in one answer: {generations:?}"
                    );
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    rebuilds.await.expect("rebuild task panicked");
    for reader in readers {
        reader.await.expect("reader task panicked");
    }

    let header = knowledge.current_header().await.expect("index is served");
    assert!(header.document_count >= ITEMS_PER_GENERATION);
}

#[tokio::test]
async fn restart_serves_persisted_index_without_rebuilding() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let index_path = dir.path().join("index.json");
    let source = Arc::new(ChangingMenu {
        generation: AtomicUsize::new(0),
    });

    let first = Arc::new(KnowledgeBase::new(
        KnowledgeExtractor::new("₹", None),
        Arc::clone(&source) as Arc<dyn KnowledgeSource>,
        Arc::new(HashingEmbedder::new(256)),
        index_path.clone(),
    ));
    let report = first.refresh().await.expect("build succeeds");
    assert!(report.persisted);

    let second = KnowledgeBase::new(
        KnowledgeExtractor::new("₹", None),
        Arc::clone(&source) as Arc<dyn KnowledgeSource>,
        Arc::new(HashingEmbedder::new(256)),
        index_path,
    );
    let header = second
        .load_persisted()
        .await
        .expect("persisted index loads")
        .expect("index exists");

    assert_eq!(header.document_count, report.documents);
    assert_eq!(header.built_at, report.built_at);
    // Loading does not scan the source again
    assert_eq!(source.generation.load(Ordering::SeqCst), 1);
}

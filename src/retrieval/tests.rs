use super::*;
use crate::embeddings::HashingEmbedder;
use crate::index::{IndexEntry, VectorIndex};
use crate::knowledge::{Document, DocumentSource};
use std::sync::atomic::{AtomicUsize, Ordering};

struct TrackingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl TrackingEmbedder {
    fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(dimension),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Embedder for TrackingEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts)
    }
}

struct OfflineEmbedder;

impl Embedder for OfflineEmbedder {
    fn model_id(&self) -> &str {
        "offline"
    }

    fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

fn menu(id: i64, name: &str, category: &str, price: &str) -> Document {
    Document {
        text: format!("Menu Item: {name}\nCategory: {category}\nPrice: {price}"),
        source: DocumentSource::MenuItem {
            id,
            name: name.to_string(),
            category: category.to_lowercase(),
        },
    }
}

fn bakery_index(embedder: &HashingEmbedder) -> VectorIndex {
    let documents = vec![
        menu(1, "Sourdough Loaf", "Breads", "$6"),
        menu(2, "Chocolate Cake", "Cakes", "$15"),
        menu(3, "Butter Croissant", "Pastries", "$3"),
        menu(4, "Red Velvet Cake", "Cakes", "$18"),
        menu(5, "Oat Cookies", "Cookies", "$4"),
        menu(6, "Baguette", "Breads", "$5"),
    ];
    let entries = documents
        .into_iter()
        .map(|document| IndexEntry {
            vector: embedder.embed_one(&document.text),
            document,
        })
        .collect();
    VectorIndex::build(embedder.model_id(), entries).expect("valid index")
}

#[tokio::test]
async fn uninitialized_index_skips_embedding() {
    let embedder = TrackingEmbedder::new(64);
    let retriever = Retriever::new(
        Arc::new(IndexHandle::new()),
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        4,
    );

    let results = retriever
        .retrieve("What cakes do you have?")
        .await
        .expect("retrieval never fails on a missing index");

    assert!(results.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_index_skips_embedding() {
    let embedder = TrackingEmbedder::new(64);
    let handle = Arc::new(IndexHandle::with_index(
        VectorIndex::build(embedder.model_id(), Vec::new()).expect("valid index"),
    ));
    let retriever = Retriever::new(handle, Arc::clone(&embedder) as Arc<dyn Embedder>, 4);

    assert!(
        retriever
            .retrieve("anything")
            .await
            .expect("empty index is fine")
            .is_empty()
    );
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cake_question_finds_both_cakes() {
    let embedder = HashingEmbedder::new(384);
    let handle = Arc::new(IndexHandle::with_index(bakery_index(&embedder)));
    let retriever = Retriever::new(handle, Arc::new(embedder), 2);

    let results = retriever
        .retrieve("What cakes do you have today?")
        .await
        .expect("retrieval succeeds");

    let names: Vec<String> = results
        .iter()
        .filter_map(|r| match &r.document.source {
            DocumentSource::MenuItem { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert!(names.contains(&"Chocolate Cake".to_string()));
    assert!(names.contains(&"Red Velvet Cake".to_string()));
}

#[tokio::test]
async fn results_bounded_and_ordered() {
    let embedder = HashingEmbedder::new(128);
    let handle = Arc::new(IndexHandle::with_index(bakery_index(&embedder)));

    for k in 1..=10 {
        let retriever = Retriever::new(Arc::clone(&handle), Arc::new(embedder.clone()), k);
        let results = retriever
            .retrieve("fresh bread and pastries")
            .await
            .expect("retrieval succeeds");

        assert!(results.len() <= k);
        assert!(
            results
                .windows(2)
                .all(|pair| pair[0].distance <= pair[1].distance)
        );
    }
}

#[tokio::test]
async fn embedding_failure_is_upstream_unavailable() {
    let embedder = HashingEmbedder::new(32);
    let handle = Arc::new(IndexHandle::with_index(bakery_index(&embedder)));
    let retriever = Retriever::new(handle, Arc::new(OfflineEmbedder), 4);

    assert!(matches!(
        retriever.retrieve("cakes").await,
        Err(ChatError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn dimension_mismatch_is_index_error() {
    let handle = Arc::new(IndexHandle::with_index(bakery_index(&HashingEmbedder::new(32))));
    let retriever = Retriever::new(handle, Arc::new(HashingEmbedder::new(64)), 4);

    assert!(matches!(
        retriever.retrieve("cakes").await,
        Err(ChatError::Index(_))
    ));
}

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow_array::RecordBatchIterator;
use tokio::runtime::Runtime;

use corpus_core::config::{SearchSettings, SnippetOptions};
use corpus_core::traits::{Embedder, Neighbor, VectorIndex};
use corpus_core::{CorpusChunk, Error, Facet, MatchResult, PageNumber, SearchRequest, SearchType};
use corpus_embed::HashEmbedder;
use corpus_hybrid::{DiskLoader, HybridSearchEngine, Memo, QueryEmbeddingCache, ResourceLoader};
use corpus_text::MetadataTable;
use corpus_vector::schema::index_batch;

struct ScriptedIndex {
    neighbors: Vec<Neighbor>,
    fail: bool,
    last_k: AtomicUsize,
}

impl VectorIndex for ScriptedIndex {
    fn query(&self, _vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
        self.last_k.store(k, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("index offline");
        }
        Ok(self.neighbors.iter().take(k).copied().collect())
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str {
        "broken"
    }
    fn dim(&self) -> usize {
        4
    }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("model crashed")
    }
}

struct Fixture {
    chunks: Vec<CorpusChunk>,
    index: Arc<ScriptedIndex>,
    embedder: Arc<dyn Embedder>,
    fail_metadata: bool,
    metadata_loads: AtomicUsize,
    index_loads: AtomicUsize,
}

impl Fixture {
    fn new(chunks: Vec<CorpusChunk>, neighbors: Vec<Neighbor>) -> Self {
        Self {
            chunks,
            index: Arc::new(ScriptedIndex { neighbors, fail: false, last_k: AtomicUsize::new(0) }),
            embedder: Arc::new(HashEmbedder::new(32)),
            fail_metadata: false,
            metadata_loads: AtomicUsize::new(0),
            index_loads: AtomicUsize::new(0),
        }
    }

    fn failing_index(mut self) -> Self {
        self.index = Arc::new(ScriptedIndex { neighbors: Vec::new(), fail: true, last_k: AtomicUsize::new(0) });
        self
    }
}

impl ResourceLoader for Fixture {
    fn load_index(&self, _path: &Path) -> anyhow::Result<Arc<dyn VectorIndex>> {
        self.index_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.index.clone())
    }

    fn load_metadata(&self, path: &Path) -> anyhow::Result<MetadataTable> {
        self.metadata_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata {
            anyhow::bail!("no such file: {}", path.display());
        }
        Ok(MetadataTable::from_chunks(self.chunks.clone()))
    }

    fn load_embedder(&self, _model_id: &str) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(self.embedder.clone())
    }
}

fn chunk(i: usize, text: &str, group: &str, priority: i64) -> CorpusChunk {
    CorpusChunk {
        index: i,
        file_path: format!("text/{i}.txt"),
        pdf_url: format!("http://localhost/pdfs/{i}.pdf"),
        book_title: format!("Book {}", i % 2),
        author: "Sri Aurobindo".to_string(),
        group: group.to_string(),
        priority,
        chapter_name: "N/A".to_string(),
        page_number: PageNumber::Number(i as u32 + 1),
        snippet: text.to_string(),
    }
}

fn n(index: usize, distance: f32) -> Neighbor {
    Neighbor { index, distance }
}

fn engine(fixture: &Arc<Fixture>) -> HybridSearchEngine {
    HybridSearchEngine::new(fixture.clone(), SearchSettings::default(), SnippetOptions::default())
}

fn assert_ranked(results: &[MatchResult]) {
    for w in results.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        assert!(a.category_priority() <= b.category_priority(), "{a:?} before {b:?}");
        if a.category_priority() == b.category_priority() {
            assert!(a.priority >= b.priority, "{a:?} before {b:?}");
            if a.priority == b.priority {
                assert!(a.distance <= b.distance, "{a:?} before {b:?}");
            }
        }
    }
}

fn mixed_corpus() -> (Vec<CorpusChunk>, Vec<Neighbor>) {
    let chunks = (0..12)
        .map(|i| {
            let text = match i % 3 {
                0 => "The divine love is the secret of all.",
                1 => "Love that is divine never fails us.",
                _ => "An unrelated passage about rivers and hills.",
            };
            chunk(i, text, if i % 2 == 0 { "CWSA" } else { "CWM" }, (i % 4) as i64)
        })
        .collect();
    let mut neighbors: Vec<Neighbor> = (0..12).map(|i| n(i, i as f32 * 0.05)).collect();
    neighbors.push(n(3, 0.9));
    (chunks, neighbors)
}

#[test]
fn exact_scenario_single_chunk() {
    let chunks = vec![chunk(0, "All can be done if the god-touch is there.", "CWSA", 0)];
    let fixture = Arc::new(Fixture::new(chunks, vec![]));
    let results = engine(&fixture)
        .search(&SearchRequest::new("god-touch").search_type(SearchType::Exact).top_k(5))
        .expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category_priority(), 1);
    assert_eq!(results[0].distance, 0.0);
    assert!(results[0].snippet.contains("<mark>god-touch</mark>"), "{}", results[0].snippet);
    assert_eq!(fixture.index_loads.load(Ordering::SeqCst), 0, "textual modes never load the vector index");
}

#[test]
fn group_filter_scenario() {
    let fixture = Arc::new(Fixture::new(
        vec![
            chunk(0, "Surrender is the key to the yoga.", "CWSA", 0),
            chunk(1, "Surrender to the Divine is simple.", "CWM", 0),
        ],
        vec![n(0, 0.2), n(1, 0.3)],
    ));
    let request = SearchRequest::new("surrender").filter(Facet::Group, "CWM");
    let results = engine(&fixture).search(&request).expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].group, "CWM");
}

#[test]
fn all_words_hit_confirmed_by_vector_index_is_promoted() {
    let fixture = Arc::new(Fixture::new(
        vec![
            chunk(0, "The touch of god is everywhere and in all.", "CWSA", 0),
            chunk(1, "A quiet evening by the sea shore.", "CWSA", 0),
        ],
        vec![n(1, 0.30), n(0, 0.42)],
    ));
    let results = engine(&fixture).search(&SearchRequest::new("god touch")).expect("search");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].file_path, "text/0.txt");
    assert_eq!(results[0].category_priority(), 2);
    assert_eq!(results[0].distance, 0.42);
    assert_eq!(results[1].category_priority(), 4);
    assert_eq!(results[1].distance, 0.30);
}

#[test]
fn unconfirmed_all_words_hit_keeps_placeholder() {
    let chunks = vec![chunk(0, "The touch of god is everywhere and in all.", "CWSA", 0)];
    let fixture = Arc::new(Fixture::new(chunks, vec![]));
    let results = engine(&fixture).search(&SearchRequest::new("god touch")).expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category_priority(), 3);
    assert_eq!(results[0].distance, 0.1);
}

#[test]
fn results_are_ranked_deduplicated_and_bounded() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let engine = engine(&fixture);

    let full = engine.search(&SearchRequest::new("divine love")).expect("search");
    assert_eq!(full.len(), 12);
    assert_ranked(&full);
    let paths: HashSet<&str> = full.iter().map(|r| r.file_path.as_str()).collect();
    assert_eq!(paths.len(), full.len(), "no corpus position appears twice");
    let counts = |rank: u8| full.iter().filter(|r| r.category_priority() == rank).count();
    assert_eq!((counts(1), counts(2), counts(3), counts(4)), (4, 4, 0, 4));

    let top = engine.search(&SearchRequest::new("divine love").top_k(5)).expect("search");
    assert_eq!(top.len(), 5);
    assert_eq!(top, full[..5].to_vec());
}

#[test]
fn filters_hold_for_every_result() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let request = SearchRequest::new("divine love").filter(Facet::Group, "CWM").filter(Facet::BookTitle, "Book 1");
    let results = engine(&fixture).search(&request).expect("search");
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.group == "CWM" && r.book_title == "Book 1"));
}

#[test]
fn single_strategy_modes_run_only_their_matcher() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let engine = engine(&fixture);

    let exact = engine.search(&SearchRequest::new("divine love").search_type(SearchType::Exact)).unwrap();
    assert!(!exact.is_empty() && exact.iter().all(|r| r.category_priority() == 1));

    let all_words = engine.search(&SearchRequest::new("divine love").search_type(SearchType::AllWords)).unwrap();
    assert_eq!(all_words.len(), 8, "all-words alone also reports the literal hits");
    assert!(all_words.iter().all(|r| r.category_priority() == 3));

    let request = SearchRequest::new("divine love").search_type(SearchType::Semantic).top_k(3);
    let semantic = engine.search(&request).unwrap();
    assert_eq!(semantic.len(), 3);
    assert!(semantic.iter().all(|r| r.category_priority() == 4));
    assert_eq!(fixture.index.last_k.load(Ordering::SeqCst), 15, "over-fetches top_k x 5 neighbors");
}

#[test]
fn semantic_mode_orders_by_distance() {
    let chunks = (0..6).map(|i| chunk(i, "Plain text without the words we look for.", "CWSA", 0)).collect();
    let neighbors = vec![n(4, 0.1), n(2, 0.2), n(0, 0.3), n(1, 0.4), n(3, 0.5), n(5, 0.6)];
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let request = SearchRequest::new("peace").search_type(SearchType::Semantic).top_k(3);
    let results = engine(&fixture).search(&request).unwrap();
    let got: Vec<(&str, f32)> = results.iter().map(|r| (r.file_path.as_str(), r.distance)).collect();
    assert_eq!(got, vec![("text/4.txt", 0.1), ("text/2.txt", 0.2), ("text/0.txt", 0.3)]);
}

#[test]
fn repeated_searches_are_deterministic_cold_or_warm() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let request = SearchRequest::new("divine love").top_k(7);
    let cold = engine(&fixture).search(&request).unwrap();
    let warm_engine = engine(&fixture);
    let first = warm_engine.search(&request).unwrap();
    let second = warm_engine.search(&request).unwrap();
    assert_eq!(cold, first);
    assert_eq!(first, second);
}

#[test]
fn stale_neighbor_indices_are_skipped() {
    let fixture = Arc::new(Fixture::new(
        vec![chunk(0, "Nothing textual matches this passage.", "CWSA", 0)],
        vec![n(99, 0.01), n(0, 0.2)],
    ));
    let results = engine(&fixture).search(&SearchRequest::new("peace").search_type(SearchType::Semantic)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "text/0.txt");
}

#[test]
fn index_failure_degrades_in_all_mode_and_fails_in_semantic_mode() {
    let chunks = vec![chunk(0, "Peace is the first condition.", "CWSA", 0)];
    let fixture = Arc::new(Fixture::new(chunks, vec![]).failing_index());
    let engine = engine(&fixture);
    let results = engine.search(&SearchRequest::new("peace")).expect("textual results survive");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category_priority(), 1);

    let err = engine.search(&SearchRequest::new("peace").search_type(SearchType::Semantic)).unwrap_err();
    assert!(matches!(err, Error::SearchFailed(_)), "{err}");
}

#[test]
fn embedding_failure_is_search_failed() {
    let mut fixture = Fixture::new(vec![chunk(0, "Peace is the first condition.", "CWSA", 0)], vec![n(0, 0.1)]);
    fixture.embedder = Arc::new(BrokenEmbedder);
    let err = engine(&Arc::new(fixture)).search(&SearchRequest::new("peace")).unwrap_err();
    match err {
        Error::SearchFailed(msg) => assert!(msg.contains("model crashed"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn invalid_requests_are_rejected() {
    let fixture = Arc::new(Fixture::new(vec![chunk(0, "text", "CWSA", 0)], vec![]));
    let engine = engine(&fixture);
    assert!(matches!(engine.search(&SearchRequest::new("x").top_k(0)), Err(Error::InvalidArgument(_))));
    assert!(matches!(engine.search(&SearchRequest::new(" \n ")), Err(Error::InvalidArgument(_))));
    assert!(matches!("fuzzy".parse::<SearchType>(), Err(Error::InvalidArgument(_))));
}

#[test]
fn missing_metadata_is_resource_unavailable() {
    let mut fixture = Fixture::new(vec![], vec![]);
    fixture.fail_metadata = true;
    let request = SearchRequest::new("peace").search_type(SearchType::Exact);
    let err = engine(&Arc::new(fixture)).search(&request).unwrap_err();
    assert!(matches!(err, Error::ResourceUnavailable { .. }), "{err}");
}

#[test]
fn no_matches_is_an_empty_list() {
    let fixture = Arc::new(Fixture::new(vec![chunk(0, "Peace is the first condition.", "CWSA", 0)], vec![]));
    let results = engine(&fixture).search(&SearchRequest::new("thunder")).expect("search");
    assert!(results.is_empty());
}

#[test]
fn query_embeddings_are_cached_and_bounded() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let settings = SearchSettings { query_cache_capacity: 2, ..SearchSettings::default() };
    let engine = HybridSearchEngine::new(fixture.clone(), settings, SnippetOptions::default());
    for q in ["divine", "divine", "love", "rivers"] {
        engine.search(&SearchRequest::new(q).search_type(SearchType::Semantic)).unwrap();
    }
    let cache = engine.cache().query_cache();
    assert_eq!(cache.capacity(), 2);
    assert_eq!(cache.len(), 2);
    let model = fixture.embedder.model_id().to_string();
    assert!(cache.get("divine", &model).is_none(), "least recently used entry is evicted");
    let v = cache.get("rivers", &model).expect("cached");
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[test]
fn query_embedding_cache_evicts_least_recent() {
    let cache = QueryEmbeddingCache::new(2);
    let v: Arc<[f32]> = Arc::from(vec![1.0f32]);
    cache.insert("a", "m", v.clone());
    cache.insert("b", "m", v.clone());
    assert!(cache.get("a", "m").is_some());
    cache.insert("c", "m", v);
    assert_eq!(cache.len(), 2);
    assert!(cache.get("b", "m").is_none());
    assert!(cache.get("a", "m").is_some());
    assert!(cache.get("a", "other").is_none(), "model id is part of the key");
}

#[test]
fn concurrent_first_access_yields_one_consistent_value() {
    let memo: Memo<String, Arc<usize>> = Memo::new();
    let key = "metadata.json".to_string();
    let seen: Vec<Arc<usize>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let (memo, key) = (&memo, &key);
                s.spawn(move || memo.get_or_try_insert_with(key, || Ok::<_, ()>(Arc::new(i))).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let stored = memo.get(&key).unwrap();
    assert_eq!(memo.len(), 1);
    assert!(seen.iter().all(|v| Arc::ptr_eq(v, &stored)));
}

#[test]
fn concurrent_searches_share_loaded_resources() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let engine = engine(&fixture);
    let request = SearchRequest::new("divine love").top_k(6);
    let results: Vec<Vec<MatchResult>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| engine.search(&request).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(engine.cache().loaded(), (1, 1, 1));
    assert!(fixture.metadata_loads.load(Ordering::SeqCst) >= 1);
}

#[test]
fn facets_come_from_the_metadata_table() {
    let (chunks, neighbors) = mixed_corpus();
    let fixture = Arc::new(Fixture::new(chunks, neighbors));
    let facets = engine(&fixture).facets().unwrap();
    assert_eq!(facets.groups, vec!["CWM", "CWSA"]);
    assert_eq!(facets.book_titles, vec!["Book 0", "Book 1"]);
    assert_eq!(facets.authors, vec!["Sri Aurobindo"]);
}

#[test]
fn disk_loader_serves_lance_index_and_json_metadata() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let texts = [
        "The divine love is the secret of all.",
        "Rivers run down from the quiet hills.",
        "Love is divine in its very essence, said the sage.",
    ];
    let records: Vec<serde_json::Value> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| serde_json::json!({"snippet": t, "group": "CWSA", "priority": i, "page_number": i + 1}))
        .collect();
    fs::write(tmp.path().join("metadata.json"), serde_json::to_string(&records)?)?;

    let embedder = HashEmbedder::new(64);
    let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embedder.embed_one(t)).collect();
    let batch = index_batch(&[0, 1, 2], &vectors)?;
    let schema = batch.schema();
    let uri = tmp.path().join("chunks.lance").to_string_lossy().to_string();
    Runtime::new()?.block_on(async {
        let db = lancedb::connect(&uri).execute().await?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        db.create_table("chunks", reader).execute().await?;
        anyhow::Ok(())
    })?;

    let settings = SearchSettings {
        index_path: "chunks.lance".to_string(),
        metadata_path: "metadata.json".to_string(),
        model_id: "custom".to_string(),
        ..SearchSettings::default()
    };
    let loader = DiskLoader::new("chunks")
        .with_embedder_factory(|_model_id| Ok(Arc::new(HashEmbedder::new(64)) as Arc<dyn Embedder>));
    let engine =
        HybridSearchEngine::new(Arc::new(loader), settings, SnippetOptions::default()).with_base_dir(tmp.path());

    let results = engine.search(&SearchRequest::new("divine love"))?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].category_priority(), 1);
    assert_eq!(results[0].page_number, PageNumber::Number(1));
    assert_eq!(results[1].category_priority(), 2, "all-words hit confirmed by the Lance neighbors");
    assert_eq!(results[2].category_priority(), 4);
    assert_ranked(&results);
    Ok(())
}

use std::collections::HashMap;

use infralens_llm::{Bm25Embedder, SparseEmbedder};
use infralens_memory::{
    FieldCondition, FieldValue, HybridQuery, QdrantOps, VectorFilter, VectorPoint, VectorStore,
};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup_with_qdrant() -> (QdrantOps, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let ops = QdrantOps::new(&format!("http://127.0.0.1:{grpc_port}")).unwrap();
    (ops, container)
}

fn point(vector: Vec<f32>, text: &str, filename: &str) -> VectorPoint {
    VectorPoint {
        id: uuid::Uuid::new_v4().to_string(),
        vector,
        sparse: Bm25Embedder::default().sparse_embed(text),
        payload: HashMap::from([
            ("content".into(), serde_json::json!(text)),
            ("filename".into(), serde_json::json!(filename)),
        ]),
    }
}

#[tokio::test]
async fn ensure_collection_is_idempotent() {
    let (ops, _container) = setup_with_qdrant().await;

    VectorStore::ensure_collection(&ops, "u1_repo", 4).await.unwrap();
    VectorStore::ensure_collection(&ops, "u1_repo", 4).await.unwrap();
    assert!(VectorStore::collection_exists(&ops, "u1_repo").await.unwrap());
}

#[tokio::test]
async fn delete_missing_collection_is_ok() {
    let (ops, _container) = setup_with_qdrant().await;
    VectorStore::delete_collection(&ops, "never_created").await.unwrap();
    assert!(!VectorStore::collection_exists(&ops, "never_created").await.unwrap());
}

#[tokio::test]
async fn upsert_count_and_hybrid_search() {
    let (ops, _container) = setup_with_qdrant().await;
    VectorStore::ensure_collection(&ops, "u1_repo", 4).await.unwrap();

    let points = vec![
        point(vec![1.0, 0.0, 0.0, 0.0], "retry backoff with jitter", "retry.rs"),
        point(vec![0.0, 1.0, 0.0, 0.0], "terraform aws vpc module", "main.tf"),
        point(vec![0.0, 0.0, 1.0, 0.0], "project overview and purpose", "README.md"),
    ];
    VectorStore::upsert(&ops, "u1_repo", points).await.unwrap();
    assert_eq!(VectorStore::count(&ops, "u1_repo").await.unwrap(), 3);

    let query = HybridQuery {
        dense: vec![0.9, 0.1, 0.0, 0.0],
        sparse: Some(Bm25Embedder::default().sparse_embed_query("retry backoff")),
    };
    let results = VectorStore::search(&ops, "u1_repo", query, 2, None)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].payload["filename"], "retry.rs");
}

#[tokio::test]
async fn filename_filter_restricts_results() {
    let (ops, _container) = setup_with_qdrant().await;
    VectorStore::ensure_collection(&ops, "u1_repo", 4).await.unwrap();
    VectorStore::upsert(
        &ops,
        "u1_repo",
        vec![
            point(vec![1.0, 0.0, 0.0, 0.0], "fn main() {}", "main.rs"),
            point(vec![0.0, 1.0, 0.0, 0.0], "# Demo project", "README.md"),
        ],
    )
    .await
    .unwrap();

    let filter = VectorFilter {
        must: vec![FieldCondition {
            field: "filename".into(),
            value: FieldValue::AnyText(vec!["README.md".into(), "package.json".into()]),
        }],
        must_not: vec![],
    };
    let query = HybridQuery {
        dense: vec![1.0, 0.0, 0.0, 0.0],
        sparse: None,
    };
    let results = VectorStore::search(&ops, "u1_repo", query, 5, Some(filter))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].payload["filename"], "README.md");
}

#[tokio::test]
async fn delete_collection_removes_points() {
    let (ops, _container) = setup_with_qdrant().await;
    VectorStore::ensure_collection(&ops, "u1_repo", 4).await.unwrap();
    VectorStore::upsert(
        &ops,
        "u1_repo",
        vec![point(vec![1.0, 0.0, 0.0, 0.0], "x", "a.rs")],
    )
    .await
    .unwrap();

    VectorStore::delete_collection(&ops, "u1_repo").await.unwrap();
    assert!(!VectorStore::collection_exists(&ops, "u1_repo").await.unwrap());
}

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use infralens_index::{
    Fetcher, IndexManager, IngestPipeline, PipelineConfig, Visibility, format_context, retrieve,
};
use infralens_llm::Bm25Embedder;
use infralens_llm::mock::MockProvider;
use infralens_memory::{InMemoryVectorStore, SqliteStore};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StaticTree(Vec<(&'static str, &'static str)>);

impl Fetcher for StaticTree {
    fn check_visibility<'a>(
        &'a self,
        _repo_url: &'a str,
        _credential: Option<&'a str>,
    ) -> BoxFuture<'a, Visibility> {
        Box::pin(async { Visibility::Public })
    }

    fn clone_into<'a>(
        &'a self,
        _repo_url: &'a str,
        destination: &'a Path,
        _credential: Option<&'a str>,
    ) -> BoxFuture<'a, infralens_index::Result<()>> {
        Box::pin(async move {
            for (rel, content) in &self.0 {
                let path = destination.join(rel);
                tokio::fs::create_dir_all(path.parent().unwrap()).await?;
                tokio::fs::write(path, content).await?;
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn ingested_repository_answers_overview_and_specific_queries() {
    let scratch = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    let provider = Arc::new(MockProvider::default());
    let sparse = Arc::new(Bm25Embedder::default());
    let tree = StaticTree(vec![
        (
            "README.md",
            "# Harbor\n\nHarbor deploys container workloads to a Kubernetes cluster.",
        ),
        (
            "deploy/values.yaml",
            "replicaCount: 3\nimage:\n  repository: harbor/api\n  tag: stable\n",
        ),
        (
            "src/backoff.py",
            "def backoff(attempt):\n    return min(2 ** attempt, 60)\n",
        ),
    ]);

    let pipeline = IngestPipeline::new(
        Arc::new(tree),
        IndexManager::new(Arc::new(InMemoryVectorStore::new())),
        provider.clone(),
        sparse.clone(),
        sqlite.clone(),
        sqlite.clone(),
        PipelineConfig {
            scratch_root: scratch.path().to_path_buf(),
            ..PipelineConfig::default()
        },
    );

    let report = pipeline
        .ingest("alice", "https://github.com/acme/harbor")
        .await
        .unwrap();
    assert_eq!(report.collection_name, "alice_harbor");
    assert_eq!(report.files_processed, 3);

    let record = sqlite
        .find_repository("alice", None)
        .await
        .unwrap()
        .unwrap();
    let handle = pipeline
        .manager()
        .open_collection(&record.collection_name, provider.as_ref(), sparse.as_ref())
        .await
        .unwrap();

    let overview = retrieve(&handle, "what is this project about?", 4)
        .await
        .unwrap();
    assert_eq!(overview[0].filename, "README.md");

    let specific = retrieve(&handle, "backoff attempt", 1).await.unwrap();
    assert_eq!(specific.len(), 1);
    assert_eq!(specific[0].filename, "backoff.py");

    let context = format_context(&specific, 600);
    assert!(context.starts_with("File: backoff.py\n"));
}

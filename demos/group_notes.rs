//! Group a handful of notes whose embeddings form three topics.
//!
//! Run with `RUST_LOG=debug` to see the score of every candidate group count.

use cortex_cluster::{ClusterEngine, ClusterRequest, EmbeddingRecord, EngineConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Three topics in a toy 2D embedding space.
    let notes: Vec<(&str, [f32; 2])> = vec![
        // Groceries (near origin)
        ("buy oat milk", [0.0, 0.0]),
        ("eggs and bread", [0.1, 0.2]),
        ("coffee beans running low", [0.2, 0.1]),
        ("pick up apples", [-0.1, 0.1]),
        // Rust (near (5, 5))
        ("borrow checker and lifetimes", [5.0, 5.0]),
        ("trait objects vs generics", [5.1, 4.9]),
        ("serde derive attributes", [4.9, 5.1]),
        ("tokio task cancellation", [5.2, 5.2]),
        // Travel (near (10, 0))
        ("book train to Lyon", [10.0, 0.0]),
        ("renew passport before March", [10.1, 0.1]),
        ("hotel near the station", [9.9, -0.1]),
        ("pack the travel adapter", [10.2, 0.2]),
    ];

    let records: Vec<EmbeddingRecord> = notes
        .iter()
        .enumerate()
        .map(|(i, (text, v))| EmbeddingRecord::new(format!("note-{i}"), *text, v.to_vec()))
        .collect();

    let engine = ClusterEngine::new(EngineConfig::default());

    // --- Automatic group count ---
    let summary = engine.cluster_summary(records.clone(), &ClusterRequest::auto(5));
    println!("=== auto (max_k=5) ===");
    println!(
        "{} notes in {} groups",
        summary.total_records, summary.num_clusters
    );
    for (index, group) in &summary.clusters {
        println!("  group {index}: {} notes", group.size);
        for sample in &group.sample_texts {
            println!("    - {sample}");
        }
    }

    // --- Fixed group count, as JSON ---
    let groups = engine.cluster(records, &ClusterRequest::fixed(2));
    println!("\n=== fixed (k=2) ===");
    match serde_json::to_string_pretty(&groups) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("could not serialize groups: {e}"),
    }
}

use cortex_cluster::cluster::{Clustering, Kmeans};
use cortex_cluster::{standardize, ClusterEngine, ClusterRequest, EmbeddingRecord, EngineConfig};
use proptest::prelude::*;

fn fast_engine() -> ClusterEngine {
    ClusterEngine::new(EngineConfig {
        n_init: 2,
        max_iter: 50,
        max_k: 5,
        ..EngineConfig::default()
    })
}

proptest! {
    #[test]
    fn prop_kmeans_labels_dense(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 1..20),
        k in 1usize..5
    ) {
        // Skip if k > n
        if k <= data.len() {
            let model = Kmeans::new(k).with_seed(42).with_n_init(2);
            let labels = model.fit_predict(&data).unwrap();

            prop_assert_eq!(labels.len(), data.len());
            let max = *labels.iter().max().unwrap();
            prop_assert!(max < k);
            for l in 0..=max {
                prop_assert!(labels.contains(&l));
            }
        }
    }

    #[test]
    fn prop_standardize_is_finite(
        data in prop::collection::vec(prop::collection::vec(-1e3f32..1e3, 3), 1..15)
    ) {
        let out = standardize(&data).unwrap();
        prop_assert_eq!(out.len(), data.len());
        prop_assert!(out.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn prop_cluster_is_a_partition(
        data in prop::collection::vec(prop::collection::vec(-5.0f32..5.0, 3), 0..12),
        k in prop::option::of(1usize..8),
        auto_k in any::<bool>()
    ) {
        let records: Vec<EmbeddingRecord> = data
            .into_iter()
            .enumerate()
            .map(|(i, v)| EmbeddingRecord::new(format!("r{i}"), "", v))
            .collect();
        let n = records.len();
        let request = ClusterRequest { k, auto_k, max_k: None };

        let out = fast_engine().cluster(records, &request);

        let groups = out.len();
        prop_assert_eq!(out.indices().collect::<Vec<_>>(), (0..groups).collect::<Vec<_>>());
        prop_assert!(groups <= n);
        prop_assert!(out.iter().all(|(_, g)| !g.is_empty()));

        let mut ids: Vec<usize> = out
            .iter()
            .flat_map(|(_, g)| g.iter().map(|r| r.id[1..].parse::<usize>().unwrap()))
            .collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..n).collect::<Vec<_>>());
    }
}

//! Adapter contract across every compiled backend.

use o1search::config::{LshConfig, Settings, TreeConfig};
use o1search::vector::{BackendKind, ScoreKind, SharedAdapter, VectorSearchAdapter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tempfile::TempDir;

fn adapter(kind: BackendKind, dimension: usize) -> VectorSearchAdapter {
    let tree = TreeConfig {
        seed: Some(5),
        ..TreeConfig::default()
    };
    VectorSearchAdapter::with_backend(dimension, kind, &LshConfig::seeded(10, 8, 5), &tree)
        .unwrap()
}

fn random_unit_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(77);
    (0..count)
        .map(|_| {
            let mut v: Vec<f32> = (0..dimension).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            v.iter_mut().for_each(|x| *x /= norm);
            v
        })
        .collect()
}

fn assert_best_first(hits: &[(f32, Value)], kind: ScoreKind) {
    for pair in hits.windows(2) {
        assert!(
            !kind.is_better(pair[1].0, pair[0].0),
            "{} ranked after {}",
            pair[1].0,
            pair[0].0
        );
    }
}

#[test]
fn test_basis_vectors_by_name() {
    for name in ["auto", "flat", "tree", "lsh"] {
        let Ok(mut adapter) = VectorSearchAdapter::<Value>::new(5, name) else {
            let kind: BackendKind = name.parse().unwrap();
            assert!(!kind.is_available(), "{name} should construct");
            continue;
        };

        for i in 0..3 {
            let mut v = vec![0.0; 5];
            v[i] = 1.0;
            adapter.add(v, json!({ "id": i + 1 })).unwrap();
        }

        let hits = adapter.search(&[1.0, 0.0, 0.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits.len(), 1, "{name}");
        assert_eq!(hits[0].1["id"], 1, "{name}");
    }
}

#[test]
fn test_thousand_vectors_every_backend() {
    let vectors = random_unit_vectors(1000, 128);

    for kind in BackendKind::available() {
        let mut adapter = adapter(kind, 128);
        for (i, v) in vectors.iter().enumerate() {
            adapter.add(v.clone(), json!(i)).unwrap();
            assert_eq!(adapter.len(), i + 1);
        }

        for target in [0, 500, 999] {
            let hits = adapter.search(&vectors[target], 10).unwrap();
            assert!(!hits.is_empty() && hits.len() <= 10, "backend {kind}");
            assert_eq!(hits[0].1, json!(target), "backend {kind}");
            assert_best_first(&hits, adapter.score_kind());
        }

        // Exact and tree backends always fill k from a large corpus
        if kind != BackendKind::Lsh {
            assert_eq!(adapter.search(&vectors[1], 10).unwrap().len(), 10);
        }
        assert!(adapter.search(&vectors[1], 0).unwrap().is_empty());
        assert_eq!(adapter.len(), 1000);
    }
}

#[test]
fn test_scores_follow_backend_semantics() {
    for kind in BackendKind::available() {
        let mut adapter = adapter(kind, 2);
        adapter.add(vec![1.0, 0.0], json!("east")).unwrap();
        adapter.add(vec![0.0, 2.0], json!("north")).unwrap();

        let hits = adapter.search(&[1.0, 0.0], 2).unwrap();
        let expected_east = match kind {
            BackendKind::Lsh => 1.0,
            _ => 0.0,
        };
        assert!((hits[0].0 - expected_east).abs() < 1e-5, "backend {kind}");

        if hits.len() == 2 {
            let expected_north = match kind {
                BackendKind::Flat => 5.0_f32.sqrt(),
                BackendKind::Tree => 2.0_f32.sqrt(),
                _ => 0.0,
            };
            assert!((hits[1].0 - expected_north).abs() < 1e-5, "backend {kind}");
        }
    }
}

#[test]
fn test_clear_keeps_backend_and_settings() {
    for kind in BackendKind::available() {
        let mut adapter = adapter(kind, 4);
        adapter.add(vec![1.0, 2.0, 3.0, 4.0], json!(1)).unwrap();
        adapter.clear();

        assert_eq!(adapter.len(), 0);
        assert_eq!(adapter.backend(), kind);
        if let Some(index) = adapter.lsh_index() {
            assert_eq!(index.seed(), 5);
        }
        assert!(adapter.add(vec![1.0], json!(2)).is_err());
    }
}

#[test]
fn test_adapter_from_settings_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".o1search").join("settings.toml");

    let mut settings = Settings::default();
    settings.index.dimension = 6;
    settings.index.backend = "o1".to_string();
    settings.lsh = LshConfig::seeded(3, 16, 12);
    settings.save(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    let mut adapter = VectorSearchAdapter::<Value>::from_settings(&loaded).unwrap();
    assert_eq!(adapter.backend(), BackendKind::Lsh);

    adapter.add(vec![1.0; 6], json!("ones")).unwrap();
    let index = adapter.lsh_index().unwrap();
    assert_eq!(index.num_tables(), 3);
    assert_eq!(index.hash_size(), 16);

    // LSH state persists through the engine
    let index_path = temp_dir.path().join("index.o1");
    index.save(&index_path).unwrap();
    let reloaded =
        o1search::LshIndex::<Value>::load_compatible(&index_path, 6, &loaded.lsh).unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn test_unknown_backend_in_settings() {
    let mut settings = Settings::default();
    settings.index.backend = "milvus".to_string();
    let err = VectorSearchAdapter::<Value>::from_settings(&settings).unwrap_err();
    assert_eq!(err.status_code(), "UNKNOWN_BACKEND");
    assert!(err.to_string().contains("Suggestion"));
}

#[test]
fn test_shared_adapter_between_threads() {
    let shared = SharedAdapter::new(adapter(BackendKind::available()[0], 8));
    let vectors = random_unit_vectors(40, 8);

    std::thread::scope(|scope| {
        for chunk in vectors.chunks(10) {
            let shared = shared.clone();
            scope.spawn(move || {
                for v in chunk {
                    shared.add(v.clone(), json!(null)).unwrap();
                }
            });
        }
    });

    assert_eq!(shared.len(), 40);
    let hits = shared.search(&vectors[0], 3).unwrap();
    assert!(!hits.is_empty());
}

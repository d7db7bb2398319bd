use evograph::catalog::{
    check_stream_compatibility, Compatibility, DataStream, DirectoryCatalog, GenomeCatalog, StreamRole, StreamType,
};
use evograph::config::CatalogConfig;
use evograph::nodes::{DenseParams, NodeKind};
use evograph::types::Activation;
use evograph::{deserialize_genome, serialize_genome, Genome, LineageCounter};
use tempfile::TempDir;

fn classifier(lineage: &LineageCounter) -> Genome {
    Genome::sequential(
        vec![28, 28, 1],
        vec![
            NodeKind::Flatten,
            NodeKind::Dense(DenseParams {
                units: 10,
                activation: Activation::Softmax,
                use_bias: true,
            }),
        ],
        vec![10],
        lineage,
    )
    .unwrap()
}

#[test]
fn test_catalog_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = CatalogConfig {
        directory: dir.path().join("genomes"),
    };
    let catalog = DirectoryCatalog::from_config(&config);
    let lineage = LineageCounter::new();
    let text = serialize_genome(&classifier(&lineage)).unwrap();

    let first = catalog.save(&text, "mnist-flat", &["mnist".to_string()]).unwrap();
    let second = catalog.save(&text, "mnist-flat-2", &[]).unwrap();
    assert_ne!(first.id, second.id);
    assert!(dir.path().join("genomes").join("meta.json").exists());

    assert_eq!(first.summary.input_dims, vec![3]);
    assert_eq!(first.summary.output_dims, vec![1]);
    assert_eq!(first.summary.total_nodes, 4);
    assert_eq!(first.summary.layer_types, vec!["Dense", "Flatten", "Input", "Output"]);

    let names: Vec<String> = catalog.list().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["mnist-flat", "mnist-flat-2"]);

    let loaded = catalog.load(&first.id).unwrap();
    let genome = deserialize_genome(&loaded, &LineageCounter::new()).unwrap();
    assert_eq!(genome.node_count(), 4);

    catalog.delete(&first.id).unwrap();
    catalog.delete(&first.id).unwrap();
    let remaining = catalog.list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);
}

#[test]
fn test_saved_entry_checks_against_streams() {
    let dir = TempDir::new().unwrap();
    let catalog = DirectoryCatalog::new(dir.path());
    let text = serialize_genome(&classifier(&LineageCounter::new())).unwrap();
    let entry = catalog.save(&text, "mnist", &[]).unwrap();

    let image_to_label = [
        DataStream {
            role: StreamRole::Input,
            stream_type: StreamType::Image,
        },
        DataStream {
            role: StreamRole::Target,
            stream_type: StreamType::Categorical,
        },
    ];
    assert_eq!(check_stream_compatibility(&entry.summary, &image_to_label), Compatibility::Compatible);

    let text_to_label = [
        DataStream {
            role: StreamRole::Input,
            stream_type: StreamType::Text,
        },
        DataStream {
            role: StreamRole::Target,
            stream_type: StreamType::Categorical,
        },
    ];
    assert_eq!(check_stream_compatibility(&entry.summary, &text_to_label), Compatibility::Incompatible);
}

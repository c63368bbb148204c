mod common;

use std::sync::Arc;
use std::thread;

use autoedit::stages::{PassthroughEditor, PlaceholderCaptioner};
use autoedit::storage::{IMAGES_DIR, RESULTS_FILE};
use autoedit::{ProcessingMode, ResultStore, Workflow};
use tempfile::TempDir;

use common::png_bytes;

fn persisting_workflow(store: &Arc<ResultStore>) -> Workflow {
    Workflow::new(Box::new(PlaceholderCaptioner), Box::new(PassthroughEditor))
        .with_sink(store.clone())
}

#[test]
fn test_history_is_newest_first_and_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ResultStore::open(tmp.path()).unwrap());
    let workflow = persisting_workflow(&store);

    let prompts = ["make it vintage", "add a red scarf", "vintage film look"];
    for (i, prompt) in prompts.iter().enumerate() {
        let mode = if i == 1 {
            ProcessingMode::Professional
        } else {
            ProcessingMode::Casual
        };
        workflow
            .process(prompt, &png_bytes(4 + i as u32, 4), mode, None)
            .unwrap();
    }

    let reopened = ResultStore::open(tmp.path()).unwrap();
    let all = reopened.list();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].user_prompt, "vintage film look");
    assert_eq!(all[2].user_prompt, "make it vintage");
    assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    assert_eq!(all[1].caption, "");
    assert_eq!(all[1].steps.len(), 3);
    assert_eq!(all[0].steps.len(), 4);

    assert_eq!(reopened.recent(1), vec![all[0].clone()]);
    assert_eq!(reopened.search("Vintage").len(), 2);
    assert_eq!(reopened.search("scarf")[0].id, all[1].id);
}

#[test]
fn test_layout_on_disk() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ResultStore::open(tmp.path().join("results")).unwrap());
    let workflow = persisting_workflow(&store);
    let image = png_bytes(6, 6);

    let record = workflow
        .process("make it vintage", &image, ProcessingMode::Casual, None)
        .unwrap();

    let root = tmp.path().join("results");
    assert!(root.join(RESULTS_FILE).is_file());
    let stored = store.get(record.stored_id().unwrap()).unwrap();
    let filename = stored.image_filename.clone().unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(
        std::fs::read(root.join(IMAGES_DIR).join(&filename)).unwrap(),
        image
    );

    let raw = std::fs::read_to_string(root.join(RESULTS_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &json[0];
    for key in [
        "id",
        "timestamp",
        "user_prompt",
        "caption",
        "refined_prompt",
        "image_filename",
        "image_format",
        "steps",
    ] {
        assert!(entry.get(key).is_some(), "missing {key}");
    }
    assert_eq!(entry["image_format"], "PNG");
    assert_eq!(entry["steps"][0]["name"], "Caption Extraction");
}

#[test]
fn test_corrupt_index_does_not_block_new_results() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(RESULTS_FILE), "[{\"id\": 3").unwrap();
    let store = Arc::new(ResultStore::open(tmp.path()).unwrap());
    let workflow = persisting_workflow(&store);

    let record = workflow
        .process("add a hat", &png_bytes(3, 3), ProcessingMode::Casual, None)
        .unwrap();

    let all = store.list();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, record.stored_id().unwrap());
}

#[test]
fn test_parallel_workflows_share_one_store() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ResultStore::open(tmp.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let workflow = persisting_workflow(&store);
                workflow
                    .process(
                        &format!("edit number {i}"),
                        &png_bytes(4, 4),
                        ProcessingMode::Professional,
                        None,
                    )
                    .unwrap()
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().stored_id().unwrap().to_string())
        .collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 4);
    assert_eq!(store.list().len(), 4);
    for stored in store.list() {
        assert!(store.load_image(&stored).is_ok());
    }
}

mod common;

use std::sync::Arc;

use anyhow::Result;
use sketchrs::{
    matcher::Scoring,
    service::{ServiceError, ServiceOptions, SketchService},
    storage::{FsStore, ImageStore, MemoryStore},
};

fn options() -> ServiceOptions {
    ServiceOptions {
        photo_prefix: "Photos/".to_string(),
        extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        scoring: Scoring::Relative,
    }
}

fn service_with(store: Arc<dyn ImageStore>) -> SketchService {
    SketchService::new(store, common::pipeline(), options())
}

fn two_photo_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert("Photos/a.jpg", common::gray_png(51));
    store.insert("Photos/b.jpg", common::gray_png(153));
    store.insert("Photos/readme.txt", b"ignored".to_vec());
    store
}

#[test]
fn test_match_sketch_reports_closest_photo() -> Result<()> {
    let service = service_with(two_photo_store());
    assert_eq!(service.rebuild()?, 2);

    let response = service.match_sketch(&common::gray_png(0))?;
    assert_eq!(response.matched_image_id, "Photos/a.jpg");
    assert!((response.similarity - 66.67).abs() < 0.01);

    let json = serde_json::to_value(&response)?;
    assert_eq!(json["matched_image_id"], "Photos/a.jpg");
    assert!(json["similarity"].is_f64());
    Ok(())
}

#[test]
fn test_undecodable_sketch_leaves_gallery_intact() -> Result<()> {
    let service = service_with(two_photo_store());
    service.rebuild()?;
    let before = service.gallery();

    let err = service.match_sketch(b"\x00\x01 this is no picture").unwrap_err();
    assert!(matches!(err, ServiceError::Sketch(_)));
    assert_eq!(err.to_string(), "Failed to process the sketch");

    assert!(Arc::ptr_eq(&before, &service.gallery()));
    assert_eq!(service.gallery().len(), 2);
    assert!(service.match_sketch(&common::gray_png(200)).is_ok());
    Ok(())
}

#[test]
fn test_missing_photo_is_not_found() {
    let service = service_with(two_photo_store());
    for id in ["nobody.jpg", "../Photos/a.jpg", ""] {
        let err = service.photo(id).unwrap_err();
        assert!(matches!(err, ServiceError::ImageNotFound(_)), "{id}: {err}");
        assert_eq!(err.to_string(), "Image not found");
    }
}

#[test]
fn test_photo_served_with_content_type() -> Result<()> {
    let service = service_with(two_photo_store());
    let photo = service.photo("a.jpg")?;
    assert_eq!(photo.data, common::gray_png(51));
    assert_eq!(photo.content_type, "image/jpeg");
    Ok(())
}

#[test]
fn test_matched_id_fetches_the_photo() -> Result<()> {
    let store = two_photo_store();
    store.insert("Photos/nested/c.png", common::gray_png(2));
    let service = service_with(store);
    service.rebuild()?;

    let response = service.match_sketch(&common::gray_png(0))?;
    assert_eq!(response.matched_image_id, "Photos/nested/c.png");
    let photo = service.photo(&response.matched_image_id)?;
    assert_eq!(photo.data, common::gray_png(2));
    assert_eq!(photo.content_type, "image/png");

    assert_eq!(service.photo("nested/c.png")?.data, common::gray_png(2));
    assert_eq!(service.photo("Photos/a.jpg")?.data, common::gray_png(51));
    Ok(())
}

#[test]
fn test_empty_gallery_is_distinct_error() -> Result<()> {
    let service = service_with(Arc::new(MemoryStore::new()));
    assert_eq!(service.rebuild()?, 0);

    let err = service.match_sketch(&common::gray_png(10)).unwrap_err();
    assert!(matches!(err, ServiceError::NoGallery));
    Ok(())
}

#[test]
fn test_single_photo_gallery_scores_zero() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.insert("Photos/only.png", common::gray_png(90));
    let service = service_with(store);
    service.rebuild()?;

    let response = service.match_sketch(&common::gray_png(90))?;
    assert_eq!(response.matched_image_id, "Photos/only.png");
    assert_eq!(response.similarity, 0.0);
    Ok(())
}

#[test]
fn test_rebuild_picks_up_new_photos() -> Result<()> {
    let store = two_photo_store();
    let service = service_with(store.clone());
    service.rebuild()?;
    let old = service.gallery();

    store.insert("Photos/c.png", common::gray_png(5));
    assert_eq!(service.rebuild()?, 3);

    assert_eq!(old.len(), 2);
    let response = service.match_sketch(&common::gray_png(0))?;
    assert_eq!(response.matched_image_id, "Photos/c.png");
    Ok(())
}

#[test]
fn test_calibrated_scoring() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.insert("Photos/only.png", common::gray_png(90));
    let mut opts = options();
    // row-mean distance for identical images is 0
    opts.scoring = Scoring::Calibrated {
        reference_distance: 1.0,
    };
    let service = SketchService::new(store, common::pipeline(), opts);
    service.rebuild()?;

    let response = service.match_sketch(&common::gray_png(90))?;
    assert_eq!(response.similarity, 100.0);
    Ok(())
}

#[test]
fn test_filesystem_store_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let photos = dir.path().join("Photos");
    std::fs::create_dir_all(&photos)?;
    std::fs::write(photos.join("dark.png"), common::gray_png(20))?;
    std::fs::write(photos.join("light.PNG"), common::gray_png(230))?;
    std::fs::write(photos.join("corrupt.jpg"), b"\xff\xd8\xff truncated")?;

    let service = service_with(Arc::new(FsStore::new(dir.path())));
    assert_eq!(service.rebuild()?, 2);

    let response = service.match_sketch(&common::gray_png(240))?;
    assert_eq!(response.matched_image_id, "Photos/light.PNG");
    assert!(response.similarity > 90.0);

    assert_eq!(service.photo("light.PNG")?.content_type, "image/png");
    Ok(())
}

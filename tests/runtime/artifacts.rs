//! Integration tests for compiled artifacts
//!
//! Tests building, saving, loading, linking, and running artifacts.

use std::fs;
use std::path::PathBuf;

use sprig_debug::DebugConfig;
use sprig_foundation::{ErrorKind, Value};
use sprig_language::{Loader, LoaderConfig, MemoryProvider};
use sprig_runtime::{
    Artifact, FORMAT_VERSION, MAGIC, Payload, Session, build_image, build_library, link_artifacts, load_from_file,
    save_to_file,
};

fn loader() -> Loader<MemoryProvider> {
    let files = MemoryProvider::new()
        .with_file("/src/shapes.sprig", "(def area (fn [w h] (* w h)))")
        .with_file("/src/main.sprig", "(use \"shapes\") (area 6 7)")
        .with_file("/src/counter.sprig", "(def count-up (fn [n] (if (= n 0) 0 (+ 1 (count-up (- n 1)))))) (count-up 5)");
    Loader::new(files, LoaderConfig::new())
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sprig_artifacts_{}_{name}", std::process::id()))
}

fn run(artifact: Artifact) -> Value {
    let image = artifact.into_image().unwrap();
    Session::with_provider(MemoryProvider::new(), &DebugConfig::new(), LoaderConfig::new())
        .run_image(&image)
        .unwrap()
}

// =============================================================================
// In Memory
// =============================================================================

#[test]
fn image_round_trips_through_bytes() {
    let image = build_image(&mut loader(), &[PathBuf::from("/src/main.sprig")]).unwrap();
    let artifact = Artifact::image(image);
    let restored = Artifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, artifact);
    assert_eq!(restored.kind(), "image");
    assert_eq!(run(restored), Value::Int(42));
}

#[test]
fn library_resolves_when_run() {
    let library = build_library(&mut loader(), &[PathBuf::from("/src/counter.sprig")]).unwrap();
    let artifact = Artifact::library(library);
    assert_eq!(artifact.kind(), "library");
    assert_eq!(run(artifact), Value::Int(5));
}

#[test]
fn envelope_fields() {
    let artifact = Artifact::image(sprig_language::Image::default());
    assert_eq!(artifact.magic, MAGIC);
    assert_eq!(artifact.version, FORMAT_VERSION);
    assert!(matches!(artifact.payload, Payload::Image(_)));
}

#[test]
fn foreign_envelope_is_rejected() {
    let mut artifact = Artifact::image(sprig_language::Image::default());
    artifact.magic = "other".to_string();
    let err = Artifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SerializationError(ref m) if m.contains("not a sprig artifact")));
}

#[test]
fn future_version_is_rejected() {
    let mut artifact = Artifact::image(sprig_language::Image::default());
    artifact.version = FORMAT_VERSION + 1;
    let err = Artifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SerializationError(ref m) if m.contains("unsupported artifact version")));
}

#[test]
fn garbage_is_a_serialization_error() {
    let err = Artifact::from_bytes(b"definitely not msgpack").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SerializationError(_)));
}

// =============================================================================
// Listings
// =============================================================================

#[test]
fn image_listing_shows_globals_then_code() {
    let image = build_image(&mut loader(), &[PathBuf::from("/src/main.sprig")]).unwrap();
    let text = Artifact::image(image).render().unwrap();
    assert!(text.starts_with("; globals:\n;      0  stdout\n;      1  stderr\n;      2  area\ncode:\n"), "{text}");
    assert!(text.contains("0000  Jump"));
}

#[test]
fn library_listing_shows_bodies() {
    let library = build_library(&mut loader(), &[PathBuf::from("/src/counter.sprig")]).unwrap();
    let text = Artifact::library(library).render().unwrap();
    assert!(text.contains("; functions:\n;      0  @ 0000\n"), "{text}");
    assert!(text.contains("bodies:\n"));
}

// =============================================================================
// On Disk
// =============================================================================

#[test]
fn save_load_and_link() {
    let shapes = scratch("shapes.sprigl");
    let counter = scratch("counter.sprigl");
    let image_path = scratch("linked.sprigc");

    let mut loader = loader();
    let lib_a = build_library(&mut loader, &[PathBuf::from("/src/shapes.sprig")]).unwrap();
    let lib_b = build_library(&mut loader, &[PathBuf::from("/src/counter.sprig")]).unwrap();
    save_to_file(&Artifact::library(lib_a), &shapes).unwrap();
    save_to_file(&Artifact::library(lib_b), &counter).unwrap();

    let linked = link_artifacts(&[shapes.clone(), counter.clone()]).unwrap();
    assert_eq!(linked.globals, vec!["stdout", "stderr", "area", "count-up"]);
    save_to_file(&Artifact::image(linked), &image_path).unwrap();

    let loaded = load_from_file(&image_path).unwrap();
    assert_eq!(loaded.kind(), "image");
    assert_eq!(run(loaded), Value::Int(5));

    for path in [shapes, counter, image_path] {
        let _ = fs::remove_file(path);
    }
}

#[test]
fn images_cannot_be_linked() {
    let path = scratch("not_a_lib.sprigc");
    save_to_file(&Artifact::image(sprig_language::Image::default()), &path).unwrap();
    let err = link_artifacts(&[path.clone()]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SerializationError(ref m) if m.contains("only libraries")));
    let _ = fs::remove_file(path);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_from_file(scratch("does_not_exist.sprigc")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IoError(ref m) if m.contains("failed to open")));
}

#[test]
fn compile_failures_are_not_built() {
    let files = MemoryProvider::new().with_file("/bad.sprig", "(def x y) (z)");
    let mut loader = Loader::new(files, LoaderConfig::new());
    let err = build_library(&mut loader, &[PathBuf::from("/bad.sprig")]).unwrap_err();
    assert_eq!(err.messages().len(), 2);
}

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use continuity_context::{ContinuityEngine, Startup};
use continuity_core::config::Settings;
use continuity_core::error::Error;
use continuity_core::Category;
use continuity_embed::HashEmbedder;
use continuity_vector::sidecar::sidecar_path;

const PORTFOLIO: &str = "Portfolio overview: three active projects, Atlas storage, Beacon search and the Compass planner.";
const PROJECT: &str = "Atlas project context: the storage layer migration is half done and the API freeze starts Friday.";
const SESSION: &str = "Session briefing: last session fixed the chunk overlap bug and started the Atlas persistence work.";
const THEORY: &str = "Continuity theory: every session should leave enough context behind for the next one to resume.";

fn write_corpus(root: &Path) {
    fs::write(root.join("PORTFOLIO_CONTEXT.md"), PORTFOLIO).unwrap();
    fs::create_dir_all(root.join("atlas")).unwrap();
    fs::write(root.join("atlas").join("PROJECT_CONTEXT.md"), PROJECT).unwrap();
    fs::write(root.join("atlas").join("SESSION_BRIEFING.md"), SESSION).unwrap();
    fs::write(root.join("CONTINUITY_THEORY.md"), THEORY).unwrap();
}

fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.corpus.root = root.to_string_lossy().into_owned();
    settings
}

fn engine_for(root: &Path) -> ContinuityEngine {
    ContinuityEngine::new(settings_for(root), Box::new(HashEmbedder::new(384))).expect("engine")
}

#[test]
fn rebuild_indexes_every_document() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    assert!(engine.is_empty());

    let report = engine.rebuild().expect("rebuild");
    assert_eq!(report.files_matched, 4);
    assert_eq!(report.files_indexed, 4);
    assert_eq!(report.chunks, 4);
    assert!(report.skipped.is_empty());
    assert_eq!(engine.len(), 4);
    assert!(engine.index_path().exists());
    assert!(sidecar_path(&engine.index_path()).exists());
}

#[test]
fn retrieve_finds_the_exact_chunk_first() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();

    let results = engine.retrieve(SESSION, 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.text, SESSION);
    assert_eq!(results[0].chunk.category(), Category::Session);
    assert_eq!(results[0].relevance, 1.0);
    assert!(results[1].relevance < 1.0);
}

#[test]
fn session_context_renders_all_sections() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();

    let context = engine.assemble_session_context(None, Some("Atlas")).unwrap();
    assert!(context.starts_with("=== CONTINUITY CONTEXT ===\n"));
    assert!(context.ends_with("\n=== END CONTEXT ==="));
    for heading in ["## Portfolio Context:", "## Project Context:", "## Recent Sessions:", "## Continuity Principles:"] {
        assert!(context.contains(heading), "missing {heading}");
    }
    for text in [PORTFOLIO, PROJECT, SESSION, THEORY] {
        assert!(context.contains(text));
    }

    let overridden = engine.assemble_session_context(Some("persistence work"), None).unwrap();
    assert_eq!(overridden, context, "four chunks all fit within the caps");
}

#[test]
fn empty_root_is_a_state_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_for(tmp.path());
    let report = engine.rebuild().unwrap();
    assert_eq!(report.chunks, 0);
    assert!(engine.is_empty());
    assert!(engine.retrieve("anything", 5).unwrap().is_empty());
    assert_eq!(
        engine.assemble_session_context(None, None).unwrap(),
        "=== CONTINUITY CONTEXT ===\n\n\n=== END CONTEXT ==="
    );
}

#[test]
fn second_engine_loads_what_the_first_built() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());

    let first = engine_for(tmp.path());
    let startup = first.load_or_build(false).unwrap();
    assert!(matches!(startup, Startup::Built(_)));
    assert_eq!(startup.chunks(), 4);

    let second = engine_for(tmp.path());
    assert_eq!(second.load_or_build(false).unwrap(), Startup::Loaded { chunks: 4 });
    assert_eq!(first.retrieve(PROJECT, 4).unwrap(), second.retrieve(PROJECT, 4).unwrap());

    assert!(matches!(second.load_or_build(true).unwrap(), Startup::Built(_)));
}

#[test]
fn corrupt_sidecar_falls_back_to_rebuild() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    engine_for(tmp.path()).rebuild().unwrap();

    let engine = engine_for(tmp.path());
    fs::write(sidecar_path(&engine.index_path()), b"{\"version\": 1").unwrap();
    assert!(matches!(engine.load(), Err(Error::CorruptIndex(_))));

    let startup = engine.load_or_build(false).unwrap();
    assert!(matches!(startup, Startup::Built(_)));
    assert_eq!(engine.len(), 4);
    assert_eq!(engine_for(tmp.path()).load().unwrap(), 4);
}

#[test]
fn failed_load_keeps_previous_state() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();

    fs::remove_file(engine.index_path()).unwrap();
    assert!(matches!(engine.load(), Err(Error::NotFound(_))));
    assert_eq!(engine.len(), 4);
    assert_eq!(engine.retrieve(THEORY, 1).unwrap()[0].chunk.text, THEORY);
}

#[test]
fn snapshots_survive_a_rebuild() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();
    let before = engine.snapshot().unwrap();

    fs::write(
        tmp.path().join("SESSION_BRIEFING_02.md"),
        "Second briefing: Beacon search gained a ranking fix and Compass planning moved to next week.",
    )
    .unwrap();
    engine.rebuild().unwrap();

    assert_eq!(before.len(), 4);
    assert_eq!(engine.len(), 5);
    assert!(!Arc::ptr_eq(&before, &engine.snapshot().unwrap()));
}

#[test]
fn readers_see_whole_states_during_rebuild() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();
    fs::write(
        tmp.path().join("BEACON_PROJECT_CONTEXT.md"),
        "Beacon project context: search ranking is being tuned against the continuity notes corpus.",
    )
    .unwrap();

    let shared = &engine;
    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    for _ in 0..20 {
                        let n = shared.retrieve(PROJECT, 10).unwrap().len();
                        assert!(n == 4 || n == 5, "saw {n} results");
                    }
                })
            })
            .collect();
        shared.rebuild().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    });
    assert_eq!(engine.len(), 5);
}

#[test]
fn construction_validates_settings_and_embedder() {
    let tmp = TempDir::new().unwrap();

    let err = ContinuityEngine::new(settings_for(tmp.path()), Box::new(HashEmbedder::new(16))).err().unwrap();
    assert!(matches!(err, Error::DimensionMismatch { expected: 384, actual: 16 }));

    let mut bad = settings_for(tmp.path());
    bad.corpus.overlap = bad.corpus.chunk_size;
    let err = ContinuityEngine::new(bad, Box::new(HashEmbedder::new(384))).err().unwrap();
    assert!(matches!(err, Error::InvalidChunking { .. }));
}

#[test]
fn empty_build_is_not_persisted_and_next_start_rescans() {
    let tmp = TempDir::new().unwrap();
    let first = engine_for(tmp.path());
    let startup = first.load_or_build(false).unwrap();
    assert_eq!(startup.chunks(), 0);
    assert!(!first.index_path().exists());
    assert!(!sidecar_path(&first.index_path()).exists());

    fs::write(tmp.path().join("PROJECT_CONTEXT.md"), PROJECT).unwrap();
    let second = engine_for(tmp.path());
    let startup = second.load_or_build(false).unwrap();
    assert!(matches!(startup, Startup::Built(_)), "got {startup:?}");
    assert_eq!(startup.chunks(), 1);
    assert_eq!(second.retrieve(PROJECT, 3).unwrap()[0].chunk.text, PROJECT);
}

#[test]
fn empty_sweep_keeps_the_persisted_index() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let engine = engine_for(tmp.path());
    engine.rebuild().unwrap();

    for name in ["PORTFOLIO_CONTEXT.md", "CONTINUITY_THEORY.md"] {
        fs::remove_file(tmp.path().join(name)).unwrap();
    }
    fs::remove_dir_all(tmp.path().join("atlas")).unwrap();
    assert_eq!(engine.rebuild().unwrap().chunks, 0);
    assert!(engine.is_empty());

    assert_eq!(engine_for(tmp.path()).load().unwrap(), 4);
}

fn narrow_engine(root: &Path) -> ContinuityEngine {
    let mut settings = settings_for(root);
    settings.embedding.dimension = 64;
    ContinuityEngine::new(settings, Box::new(HashEmbedder::new(64))).expect("engine")
}

#[test]
fn loading_an_index_from_another_embedding_space_fails() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    engine_for(tmp.path()).rebuild().unwrap();

    let engine = narrow_engine(tmp.path());
    let err = engine.load().unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 384, actual: 64 }), "got {err}");
    assert!(!err.is_rebuildable());
    assert!(engine.is_empty());
}

#[test]
fn load_or_build_surfaces_dimension_mismatch_instead_of_rebuilding() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    engine_for(tmp.path()).rebuild().unwrap();

    let engine = narrow_engine(tmp.path());
    let err = engine.load_or_build(false).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 384, actual: 64 }));
    assert!(engine.is_empty());
    // the 384-dimension pair on disk is left as it was
    assert_eq!(engine_for(tmp.path()).load().unwrap(), 4);
}

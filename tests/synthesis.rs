//! Path Synthesis Integration Tests
//!
//! Library layout and filename rules for each category kind.

use std::path::{Path, PathBuf};

use plexsort::core::sanitize::FORBIDDEN_CHARS;
use plexsort::core::{sanitize, PathSynthesizer, SynthesisError};
use plexsort::domain::{dedupe_sequential, Category, MediaRecord};
use tempfile::TempDir;

fn record(category: Category, title: &str, source: &str) -> MediaRecord {
    MediaRecord {
        original_path: PathBuf::from(source),
        new_path: None,
        category,
        title: title.to_string(),
        show_name: None,
        year: None,
        season: None,
        episode: None,
        subfolders: Vec::new(),
    }
}

#[test]
fn test_sanitizer_properties() {
    for input in ["a<b>c", "What? Why: \"Because\"", "/\\|*", "plain"] {
        let clean = sanitize(Some(input));
        assert!(!clean.contains(&FORBIDDEN_CHARS[..]));
        assert_eq!(sanitize(Some(&clean)), clean);
    }
    assert_eq!(sanitize(None), "");
}

#[test]
fn test_sequential_dedupe() {
    let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
    assert_eq!(dedupe_sequential(&s(&["A", "B", "B"])), s(&["A", "B"]));
    assert_eq!(dedupe_sequential(&s(&["A", "B", "A"])), s(&["A", "B", "A"]));
}

#[test]
fn test_episodic_title_and_season_folder() {
    let synth = PathSynthesizer::new("/lib");
    let mut rec = record(Category::TvShows, "Test Show", "/in/test.show.s1e1.mkv");
    rec.season = Some("1".to_string());
    rec.episode = Some("1".to_string());

    let dest = synth.destination(&rec).unwrap();
    assert_eq!(dest.directory, PathBuf::from("/lib/TV Shows/Test Show/Season 01"));
    assert_eq!(dest.file_name, "S01E01 - Test Show.mkv");

    rec.subfolders = vec!["FooBar".to_string()];
    let dest = synth.destination(&rec).unwrap();
    assert_eq!(dest.directory, PathBuf::from("/lib/TV Shows/FooBar/Season 01"));
}

#[test]
fn test_movie_filename() {
    let synth = PathSynthesizer::new("/lib");
    let mut rec = record(Category::Movies, "Test Movie", "/in/Test.Movie.2020.mkv");
    rec.year = Some("2020".to_string());

    let dest = synth.destination(&rec).unwrap();
    assert_eq!(dest.path(), PathBuf::from("/lib/Movies/2020 - Test Movie.mkv"));

    // Same record, same answer
    assert_eq!(synth.destination(&rec).unwrap(), dest);
}

#[test]
fn test_unknown_category_keeps_file_name() {
    let synth = PathSynthesizer::new("/lib");
    let rec = record(
        Category::Other("Documentaries".to_string()),
        "Planet",
        "/in/planet.earth.ep1.mkv",
    );

    let dest = synth.destination(&rec).unwrap();
    assert_eq!(dest.path(), PathBuf::from("/lib/Documentaries/planet.earth.ep1.mkv"));
}

#[test]
fn test_category_that_sanitizes_to_nothing() {
    let synth = PathSynthesizer::new("/lib");
    let rec = record(Category::Other("???".to_string()), "X", "/in/x.mkv");

    assert!(matches!(
        synth.destination(&rec),
        Err(SynthesisError::EmptyCategory(_))
    ));
}

#[tokio::test]
async fn test_prepare_creates_directories_unless_dry_run() {
    let temp = TempDir::new().unwrap();
    let synth = PathSynthesizer::new(temp.path());
    let mut rec = record(Category::Anime, "Show", "/in/show.mkv");
    rec.season = Some("02".to_string());

    let dest = synth.prepare(&rec, true).await.unwrap();
    assert!(!dest.directory.exists());

    let dest = synth.prepare(&rec, false).await.unwrap();
    assert_eq!(dest.directory, temp.path().join("Anime/Show/Season 02"));
    assert!(dest.directory.is_dir());

    // Idempotent
    synth.prepare(&rec, false).await.unwrap();
    assert!(Path::new(&dest.directory).is_dir());
}

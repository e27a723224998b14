use chrono::NaiveDate;
use lapp_core::db::open_db_in_memory;
use lapp_core::{
    EngineConfig, FixedClock, Item, ItemBody, Language, MasteryError, MasteryService,
    SqliteStudyRepository, StudyRepository, Unit,
};
use rusqlite::Connection;

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, n).unwrap()
}

fn service<'a>(
    conn: &'a Connection,
    clock: &'a FixedClock,
) -> MasteryService<SqliteStudyRepository<'a>, &'a FixedClock> {
    let repo = SqliteStudyRepository::try_new(conn).unwrap();
    MasteryService::with_clock(repo, clock, EngineConfig::new(2.0).unwrap()).unwrap()
}

fn scored_word(id: &str, unit_id: &str, score: f64) -> Item {
    let mut item = Item::new(
        id,
        unit_id,
        ItemBody::Vocabulary {
            word: id.to_string(),
            translation: "-".to_string(),
        },
        day(1),
    );
    item.score = score;
    item
}

fn seed(repo: &impl StudyRepository) {
    repo.insert_language(&Language::new("lang_L1", "Italian", day(1)))
        .unwrap();
    repo.insert_unit(&Unit::new("unit_U1", "lang_L1", "Food", day(1)))
        .unwrap();
}

#[test]
fn unit_and_language_take_the_mean_of_their_children() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let repo = service.repository();
    seed(repo);
    repo.insert_item(&scored_word("voc_V1", "unit_U1", 40.0)).unwrap();
    repo.insert_item(&scored_word("voc_V2", "unit_U1", 60.0)).unwrap();

    let unit = service.recompute_unit("unit_U1").unwrap();
    assert_eq!(unit.score, 50.0);
    assert_eq!(unit.last_practiced, day(3));

    let language = repo.get_language("lang_L1").unwrap().unwrap();
    assert_eq!(language.score, 50.0);
    assert_eq!(language.last_practiced, day(3));
    assert_eq!(language.current_unit.as_deref(), Some("unit_U1"));
}

#[test]
fn language_mean_spans_every_unit() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let repo = service.repository();
    seed(repo);
    let mut strong = Unit::new("unit_U2", "lang_L1", "Travel", day(1));
    strong.score = 90.0;
    repo.insert_unit(&strong).unwrap();
    repo.insert_item(&scored_word("voc_V1", "unit_U1", 30.0)).unwrap();

    let language = service.recompute_language("lang_L1").unwrap();
    assert_eq!(language.score, (0.0 + 90.0) / 2.0);

    service.recompute_unit("unit_U1").unwrap();
    let language = repo.get_language("lang_L1").unwrap().unwrap();
    assert_eq!(language.score, (30.0 + 90.0) / 2.0);
    assert_eq!(language.current_unit.as_deref(), Some("unit_U1"));
}

#[test]
fn recompute_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(4));
    let service = service(&conn, &clock);
    let repo = service.repository();
    seed(repo);
    repo.insert_item(&scored_word("voc_V1", "unit_U1", 12.0)).unwrap();
    repo.insert_item(&scored_word("voc_V2", "unit_U1", 33.0)).unwrap();
    repo.insert_item(&scored_word("voc_V3", "unit_U1", 71.0)).unwrap();

    let first = service.recompute_unit("unit_U1").unwrap();
    let second = service.recompute_unit("unit_U1").unwrap();
    assert_eq!(first, second);
    assert_eq!(
        repo.get_language("lang_L1").unwrap().unwrap().score,
        first.score
    );
}

#[test]
fn empty_unit_and_empty_language_score_zero() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(2));
    let service = service(&conn, &clock);
    let repo = service.repository();
    seed(repo);
    let mut stale = repo.get_unit("unit_U1").unwrap().unwrap();
    stale.score = 80.0;
    repo.put_unit(&stale).unwrap();

    let unit = service.recompute_unit("unit_U1").unwrap();
    assert_eq!(unit.score, 0.0);
    assert!(!unit.score.is_nan());

    repo.insert_language(&Language::new("lang_L2", "Greek", day(1)))
        .unwrap();
    let empty = service.recompute_language("lang_L2").unwrap();
    assert_eq!(empty.score, 0.0);
    assert_eq!(empty.current_unit, None);
}

#[test]
fn missing_unit_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(2));
    let service = service(&conn, &clock);

    let err = service.recompute_unit("unit_U404").unwrap_err();
    assert!(matches!(err, MasteryError::NotFound { kind: "unit", .. }));
    let err = service.recompute_language("lang_L404").unwrap_err();
    assert!(matches!(err, MasteryError::NotFound { kind: "language", .. }));
}

#[test]
fn orphaned_unit_is_an_invalid_scope_and_is_left_untouched() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    let clock = FixedClock::new(day(9));
    let service = service(&conn, &clock);
    let repo = service.repository();
    repo.insert_unit(&Unit::new("unit_U1", "lang_L9", "Orphan", day(1)))
        .unwrap();
    repo.insert_item(&scored_word("voc_V1", "unit_U1", 64.0)).unwrap();

    match service.recompute_unit("unit_U1").unwrap_err() {
        MasteryError::InvalidScope { id, parent_id, .. } => {
            assert_eq!(id, "unit_U1");
            assert_eq!(parent_id, "lang_L9");
        }
        other => panic!("unexpected error: {other}"),
    }
    let unit = repo.get_unit("unit_U1").unwrap().unwrap();
    assert_eq!(unit.score, 0.0);
    assert_eq!(unit.last_practiced, day(1));
}

use chrono::NaiveDate;
use lapp_core::db::open_db_in_memory;
use lapp_core::{
    Associations, EngineConfig, FixedClock, Item, ItemBody, LanguageDetails, MasteryError,
    MasteryService, SqliteStudyRepository, StudyRepository, UnitDetails,
};
use rusqlite::Connection;

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, n).unwrap()
}

fn service<'a>(
    conn: &'a Connection,
    clock: &'a FixedClock,
) -> MasteryService<SqliteStudyRepository<'a>, &'a FixedClock> {
    let repo = SqliteStudyRepository::try_new(conn).unwrap();
    MasteryService::with_clock(repo, clock, EngineConfig::new(2.0).unwrap()).unwrap()
}

fn word(text: &str) -> ItemBody {
    ItemBody::Vocabulary {
        word: text.to_string(),
        translation: format!("{text}-en"),
    }
}

fn exercise(associations: Associations) -> ItemBody {
    ItemBody::Exercise {
        exercise_type: "multiple_choice".to_string(),
        question: "pick the greeting".to_string(),
        answer: "ciao".to_string(),
        associations,
    }
}

#[test]
fn resolving_prunes_deleted_ids_from_storage() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(1));
    let service = service(&conn, &clock);
    let language = service
        .create_language(&LanguageDetails::named("Italian"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Greetings"))
        .unwrap();
    let kept = service.create_item(&unit.id, word("ciao")).unwrap();
    let doomed = service.create_item(&unit.id, word("salve")).unwrap();

    let ex = service
        .create_item(
            &unit.id,
            exercise(Associations {
                vocabulary: vec![kept.id.clone(), doomed.id.clone()],
                ..Associations::default()
            }),
        )
        .unwrap();
    assert!(service.delete_item(&doomed.id).unwrap());

    let stored = service.repository().get_item(&ex.id).unwrap().unwrap();
    assert_eq!(stored.associations().unwrap().vocabulary.len(), 2);

    let resolved = service.resolve_associations(&ex.id).unwrap();
    assert_eq!(resolved.vocabulary.len(), 1);
    assert_eq!(resolved.vocabulary[0].id, kept.id);
    assert!(resolved.grammar.is_empty());
    assert!(resolved.character.is_empty());

    let stored = service.repository().get_item(&ex.id).unwrap().unwrap();
    assert_eq!(
        stored.associations().unwrap().vocabulary,
        vec![kept.id.clone()]
    );
}

#[test]
fn ids_under_the_wrong_list_or_unknown_are_dropped() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(1));
    let service = service(&conn, &clock);
    let repo = service.repository();
    let language = service
        .create_language(&LanguageDetails::named("Korean"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Hangul"))
        .unwrap();
    let glyph = service
        .create_item(
            &unit.id,
            ItemBody::Character {
                glyph: "ㄱ".to_string(),
                meaning: "g/k".to_string(),
            },
        )
        .unwrap();

    let stored = Item::new(
        "ex_E9",
        unit.id.clone(),
        exercise(Associations {
            vocabulary: vec!["legacy-17".to_string()],
            character: vec![glyph.id.clone(), glyph.id.clone()],
            grammar: vec![],
        }),
        day(1),
    );
    repo.insert_item(&stored).unwrap();

    let resolved = service.resolve_associations("ex_E9").unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.character[0].id, glyph.id);

    let rewritten = repo.get_item("ex_E9").unwrap().unwrap();
    assert_eq!(
        rewritten.associations().unwrap(),
        &Associations {
            vocabulary: vec![],
            character: vec![glyph.id.clone()],
            grammar: vec![],
        }
    );
}

#[test]
fn creating_an_exercise_drops_unresolvable_ids_up_front() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(1));
    let service = service(&conn, &clock);
    let language = service
        .create_language(&LanguageDetails::named("Italian"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Verbs"))
        .unwrap();

    let ex = service
        .create_item(
            &unit.id,
            exercise(Associations {
                grammar: vec!["gram_G3".to_string()],
                ..Associations::default()
            }),
        )
        .unwrap();
    assert!(ex.associations().unwrap().is_empty());
}

#[test]
fn resolving_a_non_exercise_is_invalid_input() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(1));
    let service = service(&conn, &clock);
    let language = service
        .create_language(&LanguageDetails::named("Italian"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Basics"))
        .unwrap();
    let plain = service.create_item(&unit.id, word("sì")).unwrap();

    let err = service.resolve_associations(&plain.id).unwrap_err();
    assert!(matches!(err, MasteryError::InvalidInput(_)));
    let err = service.resolve_associations("ex_E404").unwrap_err();
    assert!(matches!(err, MasteryError::NotFound { kind: "item", .. }));
}

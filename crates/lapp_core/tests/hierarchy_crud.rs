use chrono::NaiveDate;
use lapp_core::db::open_db_in_memory;
use lapp_core::{
    EngineConfig, FixedClock, ItemBody, ItemKind, LanguageDetails, MasteryError, MasteryService,
    SqliteStudyRepository, StudyRepository, UnitDetails,
};
use rusqlite::Connection;

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, n).unwrap()
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

#[test]
fn new_records_start_unpracticed_and_roll_up() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);

    let mut details = LanguageDetails::named("  Czech ");
    details.native_name = Some("čeština".to_string());
    details.level = Some("B1".to_string());
    let language = service.create_language(&details).unwrap();
    assert_eq!(language.name, "Czech");
    assert_eq!(language.level, "B1");
    assert_eq!(language.score, 0.0);
    assert_eq!(language.last_practiced, day(3));
    assert_eq!(language.current_unit, None);

    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Pronouns"))
        .unwrap();
    assert_eq!(
        service
            .get_language_snapshot(&language.id)
            .unwrap()
            .current_unit
            .as_deref(),
        Some(unit.id.as_str())
    );

    let item = service.create_item(&unit.id, word("já")).unwrap();
    assert_eq!(item.id, "voc_V1");
    assert_eq!(item.score, 0.0);
    assert_eq!(item.last_practiced, day(3));
}

#[test]
fn creating_under_a_missing_parent_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);

    assert!(matches!(
        service.create_unit("lang_L1", &UnitDetails::titled("x")),
        Err(MasteryError::NotFound { kind: "language", .. })
    ));
    assert!(matches!(
        service.create_item("unit_U1", word("x")),
        Err(MasteryError::NotFound { kind: "unit", .. })
    ));
    assert!(matches!(
        service.list_items("unit_U1", None),
        Err(MasteryError::NotFound { kind: "unit", .. })
    ));
}

#[test]
fn blank_language_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);

    let err = service
        .create_language(&LanguageDetails::named("   "))
        .unwrap_err();
    assert!(matches!(err, MasteryError::Repo(_)));
    assert!(service.list_languages().unwrap().is_empty());
}

#[test]
fn detail_updates_keep_score_and_practice_date() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let language = service
        .create_language(&LanguageDetails::named("Czech"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Verbs"))
        .unwrap();
    let item = service.create_item(&unit.id, word("být")).unwrap();

    clock.advance_days(4);
    service.report_outcome(&item.id, true).unwrap();
    let before = service.get_unit(&unit.id).unwrap();

    clock.advance_days(1);
    let mut edit = UnitDetails::titled("Verbs I");
    edit.level = Some("A2".to_string());
    let after = service.update_unit_details(&unit.id, &edit).unwrap();
    assert_eq!(after.title, "Verbs I");
    assert_eq!(after.level, "A2");
    assert_eq!(after.score, before.score);
    assert_eq!(after.last_practiced, day(7));

    let mut rename = LanguageDetails::named("Čeština");
    rename.flag = Some("cz".to_string());
    let renamed = service
        .update_language_details(&language.id, &rename)
        .unwrap();
    assert_eq!(renamed.flag, "cz");
    assert_eq!(renamed.last_practiced, day(7));
    assert!(renamed.score > 0.0);
}

#[test]
fn listings_follow_creation_order_and_kind_filter() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let first = service
        .create_language(&LanguageDetails::named("Czech"))
        .unwrap();
    let second = service
        .create_language(&LanguageDetails::named("Slovak"))
        .unwrap();
    let unit = service
        .create_unit(&first.id, &UnitDetails::titled("Mixed"))
        .unwrap();
    service.create_item(&unit.id, word("pes")).unwrap();
    service
        .create_item(
            &unit.id,
            ItemBody::Character {
                glyph: "ř".to_string(),
                meaning: "rzh".to_string(),
            },
        )
        .unwrap();
    service.create_item(&unit.id, word("kočka")).unwrap();

    let languages: Vec<String> = service
        .list_languages()
        .unwrap()
        .into_iter()
        .map(|language| language.id)
        .collect();
    assert_eq!(languages, vec![first.id.clone(), second.id.clone()]);

    let words: Vec<String> = service
        .list_items(&unit.id, Some(ItemKind::Vocabulary))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(words, vec!["voc_V1".to_string(), "voc_V2".to_string()]);
    assert_eq!(service.list_items(&unit.id, None).unwrap().len(), 3);
    assert_eq!(service.list_units(&first.id).unwrap().len(), 1);
    assert!(service.list_units(&second.id).unwrap().is_empty());
}

#[test]
fn deletes_cascade_and_recompute_survivors() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let language = service
        .create_language(&LanguageDetails::named("Czech"))
        .unwrap();
    let unit = service
        .create_unit(&language.id, &UnitDetails::titled("Animals"))
        .unwrap();
    let strong = service.create_item(&unit.id, word("pes")).unwrap();
    let weak = service.create_item(&unit.id, word("kůň")).unwrap();

    clock.advance_days(30);
    service.report_outcome(&strong.id, true).unwrap();
    let mixed = service.get_unit(&unit.id).unwrap().score;

    assert!(service.delete_item(&weak.id).unwrap());
    let unit_after = service.get_unit(&unit.id).unwrap();
    assert!(unit_after.score > mixed);
    assert_eq!(
        unit_after.score,
        service.get_item(&strong.id).unwrap().score
    );
    assert!(!service.delete_item(&weak.id).unwrap());

    assert!(service.delete_language(&language.id).unwrap());
    assert!(matches!(
        service.get_unit(&unit.id),
        Err(MasteryError::NotFound { kind: "unit", .. })
    ));
    assert!(service
        .repository()
        .get_item(&strong.id)
        .unwrap()
        .is_none());
    assert!(!service.delete_language(&language.id).unwrap());
}

#[test]
fn language_wide_listings_span_units_and_filter_by_level() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(day(3));
    let service = service(&conn, &clock);
    let czech = service
        .create_language(&LanguageDetails::named("Czech"))
        .unwrap();
    let slovak = service
        .create_language(&LanguageDetails::named("Slovak"))
        .unwrap();

    let leveled = |title: &str, level: &str| {
        let mut details = UnitDetails::titled(title);
        details.level = Some(level.to_string());
        details
    };
    let greetings = service.create_unit(&czech.id, &leveled("Greetings", "A1")).unwrap();
    let verbs = service.create_unit(&czech.id, &leveled("Verbs", "B1")).unwrap();
    let food = service.create_unit(&czech.id, &leveled("Food", "A1")).unwrap();
    let other = service.create_unit(&slovak.id, &leveled("Ahoj", "A1")).unwrap();

    let beginner: Vec<String> = service
        .list_units_at_level(&czech.id, "A1")
        .unwrap()
        .into_iter()
        .map(|unit| unit.id)
        .collect();
    assert_eq!(beginner, vec![greetings.id.clone(), food.id.clone()]);
    assert!(service.list_units_at_level(&czech.id, "C2").unwrap().is_empty());

    let ahoj = service.create_item(&greetings.id, word("ahoj")).unwrap();
    let byt = service
        .create_item(
            &verbs.id,
            ItemBody::Grammar {
                title: "být".to_string(),
                explanation: "to be".to_string(),
            },
        )
        .unwrap();
    let chleba = service.create_item(&food.id, word("chleba")).unwrap();
    service.create_item(&other.id, word("dobrý")).unwrap();

    let everything: Vec<String> = service
        .list_language_items(&czech.id, None)
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(everything, vec![ahoj.id.clone(), byt.id, chleba.id.clone()]);

    let words: Vec<String> = service
        .list_language_items(&czech.id, Some(ItemKind::Vocabulary))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(words, vec![ahoj.id, chleba.id]);

    assert!(matches!(
        service.list_language_items("lang_L9", None).unwrap_err(),
        MasteryError::NotFound { kind: "language", .. }
    ));
    assert!(matches!(
        service.list_units_at_level("lang_L9", "A1").unwrap_err(),
        MasteryError::NotFound { kind: "language", .. }
    ));
}

use claims::{assert_err, assert_ok};
use nordvaer::gazetteer::{GazetteerStore, PlaceResolver, ResolveOptions};
use nordvaer::model::{MatchType, PlaceClass};
use pretty_assertions::assert_eq;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;

struct Fixture {
    path: PathBuf,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

const DDL: &str = r#"
CREATE TABLE place (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    name_norm TEXT NOT NULL,
    alt_names TEXT NOT NULL DEFAULT '',
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    place_class TEXT NOT NULL,
    municipality_code TEXT,
    municipality_name TEXT,
    county_name TEXT,
    importance REAL NOT NULL DEFAULT 0,
    county_seat INTEGER NOT NULL DEFAULT 0,
    municipality_seat INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX place_name_norm_idx ON place (name_norm);
CREATE TABLE place_alt (place_id TEXT NOT NULL, name_norm TEXT NOT NULL);
CREATE INDEX place_alt_name_idx ON place_alt (name_norm);
CREATE VIRTUAL TABLE place_fts USING fts5(
    name, alt_names, content='place', content_rowid='rowid', tokenize='unicode61'
);
CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
"#;

struct PlaceRow {
    id: &'static str,
    name: &'static str,
    alt_names: &'static [&'static str],
    lat: f64,
    lon: f64,
    class: &'static str,
    municipality_code: &'static str,
    municipality_name: &'static str,
    county_name: &'static str,
    importance: f64,
    county_seat: bool,
    municipality_seat: bool,
}

const PLACES: &[PlaceRow] = &[
    PlaceRow {
        id: "n1",
        name: "Oslo",
        alt_names: &["Kristiania", "Christiania"],
        lat: 59.9139,
        lon: 10.7522,
        class: "city",
        municipality_code: "0301",
        municipality_name: "Oslo",
        county_name: "Oslo",
        importance: 9.9,
        county_seat: true,
        municipality_seat: true,
    },
    PlaceRow {
        id: "n2",
        name: "Oslofjorden",
        alt_names: &[],
        lat: 59.5,
        lon: 10.6,
        class: "district",
        municipality_code: "",
        municipality_name: "",
        county_name: "Viken",
        importance: 5.0,
        county_seat: false,
        municipality_seat: false,
    },
    PlaceRow {
        id: "n3",
        name: "Bergen",
        alt_names: &["Bjørgvin"],
        lat: 60.3913,
        lon: 5.3221,
        class: "city",
        municipality_code: "4601",
        municipality_name: "Bergen",
        county_name: "Vestland",
        importance: 9.2,
        county_seat: true,
        municipality_seat: true,
    },
    PlaceRow {
        id: "n4",
        name: "Tromsø",
        alt_names: &["Romsa"],
        lat: 69.6489,
        lon: 18.9551,
        class: "city",
        municipality_code: "5501",
        municipality_name: "Tromsø",
        county_name: "Troms",
        importance: 8.1,
        county_seat: true,
        municipality_seat: true,
    },
    PlaceRow {
        id: "n5",
        name: "Os",
        alt_names: &[],
        lat: 60.18,
        lon: 5.47,
        class: "village",
        municipality_code: "4624",
        municipality_name: "Bjørnafjorden",
        county_name: "Vestland",
        importance: 4.0,
        county_seat: false,
        municipality_seat: true,
    },
    PlaceRow {
        id: "n6",
        name: "Os",
        alt_names: &[],
        lat: 62.49,
        lon: 11.22,
        class: "village",
        municipality_code: "3430",
        municipality_name: "Os",
        county_name: "Innlandet",
        importance: 3.2,
        county_seat: false,
        municipality_seat: true,
    },
    PlaceRow {
        id: "n7",
        name: "Mo i Rana",
        alt_names: &[],
        lat: 66.3128,
        lon: 14.1428,
        class: "town",
        municipality_code: "1833",
        municipality_name: "Rana",
        county_name: "Nordland",
        importance: 6.5,
        county_seat: false,
        municipality_seat: true,
    },
];

async fn build_fixture(tag: &str) -> Fixture {
    let path = std::env::temp_dir().join(format!("nordvaer-gazetteer-{tag}-{}.db", cuid2::create_id()));
    let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.expect("create fixture db");

    for statement in DDL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&pool).await.expect("apply fixture ddl");
    }

    for place in PLACES {
        sqlx::query(
            "INSERT INTO place (id, name, name_norm, alt_names, lat, lon, place_class, \
             municipality_code, municipality_name, county_name, importance, county_seat, \
             municipality_seat) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(place.id)
        .bind(place.name)
        .bind(place.name.to_lowercase())
        .bind(place.alt_names.join("|"))
        .bind(place.lat)
        .bind(place.lon)
        .bind(place.class)
        .bind((!place.municipality_code.is_empty()).then_some(place.municipality_code))
        .bind((!place.municipality_name.is_empty()).then_some(place.municipality_name))
        .bind(place.county_name)
        .bind(place.importance)
        .bind(place.county_seat as i64)
        .bind(place.municipality_seat as i64)
        .execute(&pool)
        .await
        .expect("insert place");

        for alt in place.alt_names {
            sqlx::query("INSERT INTO place_alt (place_id, name_norm) VALUES (?1, ?2)")
                .bind(place.id)
                .bind(alt.to_lowercase())
                .execute(&pool)
                .await
                .expect("insert alt name");
        }
    }

    sqlx::query(
        "INSERT INTO place_fts (rowid, name, alt_names) SELECT rowid, name, alt_names FROM place",
    )
    .execute(&pool)
    .await
    .expect("populate fts index");
    sqlx::query("INSERT INTO meta (key, value) VALUES ('build_date', '2026-06-01')")
        .execute(&pool)
        .await
        .expect("insert meta");

    pool.close().await;
    Fixture { path }
}

#[tokio::test]
async fn test_open_missing_file_fails() {
    let path = std::env::temp_dir().join(format!("nordvaer-absent-{}.db", cuid2::create_id()));
    assert_err!(GazetteerStore::open(&path).await);
}

#[tokio::test]
async fn test_store_lookup_primitives() {
    let fixture = build_fixture("store").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);

    let primary = assert_ok!(store.find_exact_primary("oslo").await);
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].name, "Oslo");
    assert_eq!(primary[0].place_class, PlaceClass::City);
    assert_eq!(primary[0].alt_names, vec!["Kristiania", "Christiania"]);

    let alt = assert_ok!(store.find_exact_alt("bjørgvin").await);
    assert_eq!(alt.len(), 1);
    assert_eq!(alt[0].name, "Bergen");

    let full_text = assert_ok!(store.find_full_text("oslo", 10).await);
    assert!(full_text.len() >= 2, "expected Oslo and Oslofjorden, got {}", full_text.len());
    assert!(full_text.iter().any(|(place, _)| place.name == "Oslofjorden"));

    let norwegian = assert_ok!(store.find_full_text("troms", 10).await);
    assert!(norwegian.iter().any(|(place, _)| place.name == "Tromsø"));

    let info = assert_ok!(store.info().await);
    assert_eq!(info.record_count, PLACES.len() as i64);
    assert_eq!(info.build_date.as_deref(), Some("2026-06-01"));
}

#[tokio::test]
async fn test_resolver_resolves_oslo_with_high_confidence() {
    let fixture = build_fixture("oslo").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);
    let resolver = PlaceResolver::new(store);

    let matches = assert_ok!(resolver.resolve("Oslo", &ResolveOptions::with_limit(5)).await);
    assert!(!matches.is_empty());
    assert_eq!(matches[0].place.name, "Oslo");
    assert_eq!(matches[0].match_type, MatchType::ExactPrimary);
    assert!(matches[0].confidence >= 0.95, "confidence {}", matches[0].confidence);

    for pair in matches.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
    for item in &matches {
        assert!((0.0..=1.0).contains(&item.confidence));
    }
}

#[tokio::test]
async fn test_resolver_is_deterministic_on_unchanged_store() {
    let fixture = build_fixture("determinism").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);
    let resolver = PlaceResolver::new(store);

    let first = assert_ok!(resolver.resolve("os", &ResolveOptions::with_limit(5)).await);
    let second = assert_ok!(resolver.resolve("os", &ResolveOptions::with_limit(5)).await);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_resolver_alt_names_and_country_suffix() {
    let fixture = build_fixture("alt").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);
    let resolver = PlaceResolver::new(store);

    let matches = assert_ok!(resolver.resolve("Bjørgvin, Norway", &ResolveOptions::with_limit(3)).await);
    assert!(!matches.is_empty());
    assert_eq!(matches[0].place.name, "Bergen");
    assert_eq!(matches[0].match_type, MatchType::ExactAlt);
}

#[tokio::test]
async fn test_resolver_municipality_preference_keeps_all_matches() {
    let fixture = build_fixture("municipality").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);
    let resolver = PlaceResolver::new(store);

    let options = ResolveOptions {
        limit: 5,
        preferred_place_classes: Vec::new(),
        preferred_municipality_code: Some("3430".to_string()),
    };
    let matches = assert_ok!(resolver.resolve("Os", &options).await);
    let os_matches: Vec<_> =
        matches.iter().filter(|candidate| candidate.place.name == "Os").collect();
    assert_eq!(os_matches.len(), 2);
    assert_eq!(os_matches[0].place.municipality_code.as_deref(), Some("3430"));
}

#[tokio::test]
async fn test_resolver_respects_limit_and_empty_query() {
    let fixture = build_fixture("limits").await;
    let store = assert_ok!(GazetteerStore::open(&fixture.path).await);
    let resolver = PlaceResolver::new(store);

    let matches = assert_ok!(resolver.resolve("o", &ResolveOptions::with_limit(1)).await);
    assert!(matches.len() <= 1);

    let empty = assert_ok!(resolver.resolve("   ", &ResolveOptions::with_limit(5)).await);
    assert_eq!(empty.len(), 0);
}

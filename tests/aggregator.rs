mod common;

use common::{StubResolver, address_query, city_query, coordinate, event};
use lecture_map::workbook::XlsxStore;
use lecture_map::{CoordinateCache, Offline, UnresolvedReason, recompute, recompute_and_save, recompute_cached};
use tempfile::tempdir;

#[test]
fn two_institutions_in_one_city() {
    let events = vec![
        event("Uni A", "Berlin", 2, 10),
        event("Uni A", "Berlin", 1, 20),
        event("Uni B", "Berlin", 1, 5),
    ];
    let mut resolver = StubResolver::new()
        .with(&address_query("Uni A", "Berlin"), 52.51, 13.32)
        .with(&address_query("Uni B", "Berlin"), 52.45, 13.29);

    let result = recompute(&events, None, &mut resolver);
    assert_eq!(result.table.len(), 2);
    assert!(result.warnings.is_empty());

    let a = result.table.get("Uni A", "Berlin").unwrap();
    assert_eq!(a.event_count, 2);
    assert_eq!(a.total_tables, 3);
    assert_eq!(a.total_participants, 30);
    assert_eq!(a.city_event_total, 3);
    assert_eq!(a.city_participants_total, 35);
    assert_eq!(a.coordinate(), Some(coordinate(52.51, 13.32)));

    let b = result.table.get("Uni B", "Berlin").unwrap();
    assert_eq!(b.event_count, 1);
    assert_eq!(b.total_tables, 1);
    assert_eq!(b.total_participants, 5);
    assert_eq!(b.city_event_total, 3);
    assert_eq!(b.city_participants_total, 35);

    // one lookup per group, never per event
    assert_eq!(resolver.calls.len(), 2);
}

#[test]
fn empty_log_gives_empty_table() {
    let mut resolver = StubResolver::new();
    let result = recompute(&[], None, &mut resolver);
    assert!(result.table.is_empty());
    assert!(result.warnings.is_empty());
    assert!(resolver.calls.is_empty());
}

#[test]
fn totals_match_the_event_log() {
    let events = vec![
        event("Uni A", "Berlin", 2, 10),
        event("Uni C", "Potsdam", 3, 7),
        event("Uni B", "Berlin", 1, 5),
        event("Uni C", "Potsdam", 1, 1),
        event("Uni A", "Berlin", 4, 40),
    ];
    let table = recompute(&events, None, &mut Offline).table;

    let events_total: u64 = table.iter().map(|r| r.event_count).sum();
    assert_eq!(events_total, events.len() as u64);

    for record in &table {
        let city_events: u64 = table.in_city(&record.city).map(|r| r.event_count).sum();
        let city_participants: u64 = table
            .in_city(&record.city)
            .map(|r| r.total_participants)
            .sum();
        assert_eq!(record.city_event_total, city_events);
        assert_eq!(record.city_participants_total, city_participants);
    }

    let c = table.get("Uni C", "Potsdam").unwrap();
    assert_eq!(c.city_event_total, 2);
    assert_eq!(c.city_participants_total, 8);
}

#[test]
fn records_follow_first_appearance() {
    let events = vec![
        event("Uni B", "Berlin", 1, 1),
        event("Uni A", "Berlin", 1, 1),
        event("Uni B", "Berlin", 1, 1),
        event("Uni A", "Potsdam", 1, 1),
    ];
    let table = recompute(&events, None, &mut Offline).table;
    let keys: Vec<(&str, &str)> = table
        .iter()
        .map(|r| (r.institution_name.as_str(), r.city.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![("Uni B", "Berlin"), ("Uni A", "Berlin"), ("Uni A", "Potsdam")]
    );
}

#[test]
fn names_are_compared_exactly() {
    let events = vec![event("Uni A", "Berlin", 1, 1), event("Uni A ", "Berlin", 1, 1)];
    let table = recompute(&events, None, &mut Offline).table;
    assert_eq!(table.len(), 2);
    assert!(table.get("Uni A", "Berlin").is_some());
    assert!(table.get("Uni A ", "Berlin").is_some());
    assert_eq!(table.get("Uni A", "Berlin").unwrap().city_event_total, 2);
}

#[test]
fn first_event_decides_postal_code() {
    let mut second = event("Uni A", "Berlin", 1, 1);
    second.postal_code = "10999".to_string();
    let events = vec![event("Uni A", "Berlin", 1, 1), second];
    let table = recompute(&events, None, &mut Offline).table;
    assert_eq!(table.get("Uni A", "Berlin").unwrap().postal_code, "10115");
}

#[test]
fn repeated_passes_are_identical() {
    let events = vec![
        event("Uni A", "Berlin", 2, 10),
        event("Uni B", "Potsdam", 1, 5),
        event("Uni A", "Berlin", 1, 20),
    ];
    let mut resolver = StubResolver::new().with(&address_query("Uni A", "Berlin"), 52.5, 13.4);
    let first = recompute(&events, None, &mut resolver);
    let second = recompute(&events, None, &mut resolver);
    assert_eq!(first.table, second.table);
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn seed_belongs_to_the_first_group_only() {
    let events = vec![event("Uni A", "Berlin", 1, 1), event("Uni B", "Berlin", 1, 1)];
    let mut resolver = StubResolver::new().with(&address_query("Uni B", "Berlin"), 52.4, 13.2);

    let result = recompute(&events, Some(coordinate(1.0, 2.0)), &mut resolver);
    assert_eq!(
        result.table.get("Uni A", "Berlin").unwrap().coordinate(),
        Some(coordinate(1.0, 2.0))
    );
    assert_eq!(
        result.table.get("Uni B", "Berlin").unwrap().coordinate(),
        Some(coordinate(52.4, 13.2))
    );
    assert_eq!(resolver.calls, vec![address_query("Uni B", "Berlin")]);
}

#[test]
fn cached_groups_skip_the_resolver() {
    let events = vec![event("Uni A", "Berlin", 1, 1), event("Uni B", "Berlin", 1, 1)];
    let mut resolver = StubResolver::new().with(&address_query("Uni A", "Berlin"), 52.5, 13.3);
    let previous = recompute(&events[..1], None, &mut resolver).table;

    assert!(CoordinateCache::new().is_empty());
    let cache = CoordinateCache::from_table(&previous);
    assert!(!cache.is_empty());
    assert_eq!(cache.len(), 1);

    let mut resolver = StubResolver::new().with(&address_query("Uni B", "Berlin"), 52.4, 13.2);
    let result = recompute_cached(&events, None, &cache, &mut resolver);
    assert_eq!(resolver.calls, vec![address_query("Uni B", "Berlin")]);
    assert_eq!(
        result.table.get("Uni A", "Berlin").unwrap().coordinate(),
        Some(coordinate(52.5, 13.3))
    );
}

#[test]
fn coordinates_survive_recalculation_with_cache() {
    let events = vec![event("Uni A", "Berlin", 1, 1)];
    let mut resolver = StubResolver::new().with(&address_query("Uni A", "Berlin"), 52.5, 13.3);
    let first = recompute(&events, None, &mut resolver).table;

    // the service now gives a different answer, but the stored one wins
    let mut moved = StubResolver::new().with(&address_query("Uni A", "Berlin"), 0.0, 0.0);
    let mut more = events.clone();
    more.push(event("Uni A", "Berlin", 2, 2));
    let second = recompute_cached(&more, None, &CoordinateCache::from_table(&first), &mut moved).table;

    assert_eq!(
        second.get("Uni A", "Berlin").unwrap().coordinate(),
        first.get("Uni A", "Berlin").unwrap().coordinate()
    );
    assert!(moved.calls.is_empty());
}

#[test]
fn unknown_address_falls_back_to_city() {
    let events = vec![event("Uni X", "Berlin", 1, 3)];
    let mut resolver = StubResolver::new().with(&city_query("Berlin"), 52.52, 13.405);

    let result = recompute(&events, None, &mut resolver);
    let x = result.table.get("Uni X", "Berlin").unwrap();
    assert_eq!(x.coordinate(), Some(coordinate(52.52, 13.405)));

    assert_eq!(result.warnings.len(), 1);
    let warning = &result.warnings[0];
    assert!(warning.used_city_fallback);
    assert_eq!(warning.institution_name, "Uni X");
    assert_eq!(warning.query, address_query("Uni X", "Berlin"));
    assert_eq!(warning.reason, UnresolvedReason::NoMatch);
    assert_eq!(
        resolver.calls,
        vec![address_query("Uni X", "Berlin"), city_query("Berlin")]
    );
}

#[test]
fn unresolved_group_keeps_blank_coordinates() {
    let events = vec![event("Uni X", "Nowhere", 1, 3), event("Uni X", "Nowhere", 1, 3)];
    let mut resolver = StubResolver::new();
    resolver.unavailable = true;

    let result = recompute(&events, None, &mut resolver);
    let x = result.table.get("Uni X", "Nowhere").unwrap();
    assert_eq!(x.latitude, None);
    assert_eq!(x.longitude, None);
    assert_eq!(x.event_count, 2);
    assert_eq!(result.table.unlocated().count(), 1);

    assert_eq!(result.warnings.len(), 1);
    assert!(!result.warnings[0].used_city_fallback);
    assert!(matches!(
        result.warnings[0].reason,
        UnresolvedReason::Unavailable(_)
    ));
}

#[test]
fn failed_save_still_returns_the_table() {
    let dir = tempdir().unwrap();
    // a directory cannot be replaced by the workbook file
    let blocked = dir.path().join("blocked.xlsx");
    std::fs::create_dir(&blocked).unwrap();
    let store = XlsxStore::new(&blocked);

    let events = vec![event("Uni A", "Berlin", 2, 10)];
    let outcome = recompute_and_save(&store, &events, None, &CoordinateCache::new(), &mut Offline);
    assert!(!outcome.saved);
    assert_eq!(outcome.table.len(), 1);
    assert_eq!(outcome.table.get("Uni A", "Berlin").unwrap().total_participants, 10);
}

#[test]
fn successful_save_writes_both_tables() {
    use lecture_map::EventStore;

    let dir = tempdir().unwrap();
    let store = XlsxStore::new(dir.path().join("data.xlsx"));
    let events = vec![event("Uni A", "Berlin", 2, 10), event("Uni B", "Berlin", 1, 5)];

    let outcome = recompute_and_save(&store, &events, None, &CoordinateCache::new(), &mut Offline);
    assert!(outcome.saved);

    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.events.unwrap(), events);
    assert_eq!(stored.stats.unwrap(), outcome.table);
}

#[test]
fn totals_do_not_depend_on_event_order() {
    let events = vec![
        event("Uni A", "Berlin", 2, 10),
        event("Uni B", "Berlin", 1, 5),
        event("Uni C", "Potsdam", 3, 7),
        event("Uni A", "Berlin", 1, 20),
    ];
    let mut reversed = events.clone();
    reversed.reverse();

    let forward = recompute(&events, None, &mut Offline).table;
    let backward = recompute(&reversed, None, &mut Offline).table;
    assert_eq!(forward.len(), backward.len());
    for record in &forward {
        let other = backward.get(&record.institution_name, &record.city).unwrap();
        assert_eq!(record.event_count, other.event_count);
        assert_eq!(record.total_tables, other.total_tables);
        assert_eq!(record.total_participants, other.total_participants);
        assert_eq!(record.city_event_total, other.city_event_total);
        assert_eq!(record.city_participants_total, other.city_participants_total);
    }
}

use watch_core::{
    ConfigError, Criteria, Listing, NeighborhoodDirectory, NeighborhoodEntry, ProfileSpec,
};

fn directory() -> NeighborhoodDirectory {
    NeighborhoodDirectory::new(&[
        NeighborhoodEntry {
            id: "X".into(),
            name: "Neve Hadarim".into(),
            aliases: vec!["נווה הדרים".into()],
        },
        NeighborhoodEntry {
            id: "Y".into(),
            name: "Kiryat Rishon".into(),
            aliases: vec![],
        },
    ])
    .unwrap()
}

fn profile(
    name: &str,
    rooms: (f64, f64),
    min_sqm: f64,
    max_price: i64,
    hoods: &[&str],
) -> ProfileSpec {
    ProfileSpec {
        name: name.into(),
        min_rooms: rooms.0,
        max_rooms: rooms.1,
        min_sqm,
        max_price,
        neighborhoods: hoods.iter().map(|h| h.to_string()).collect(),
    }
}

fn two_profiles() -> Criteria {
    Criteria::new(
        &[
            profile("three rooms", (3.0, 3.5), 70.0, 2_350_000, &["Y"]),
            profile("four rooms", (4.0, 4.5), 80.0, 2_700_000, &["X"]),
        ],
        &directory(),
    )
    .unwrap()
}

fn listing(rooms: Option<f64>, sqm: Option<f64>, price: Option<i64>, hood: &str) -> Listing {
    Listing {
        id: "a".into(),
        rooms,
        size_sqm: sqm,
        price,
        neighborhood: Some(hood.into()),
        ..Listing::default()
    }
}

#[test]
fn any_single_profile_matching_in_full_passes() {
    let criteria = two_profiles();
    let candidate = listing(Some(4.0), Some(85.0), Some(2_600_000), "X");

    assert!(criteria.matches(&candidate));
    assert_eq!(
        criteria.first_match(&candidate).map(|p| p.name.as_str()),
        Some("four rooms")
    );
}

#[test]
fn fields_from_different_profiles_do_not_combine() {
    let criteria = two_profiles();
    // Rooms, size and price fit "three rooms", neighborhood only fits "four rooms".
    let candidate = listing(Some(3.5), Some(75.0), Some(2_000_000), "X");
    assert!(!criteria.matches(&candidate));
}

#[test]
fn bounds_are_inclusive() {
    let criteria = two_profiles();
    assert!(criteria.matches(&listing(Some(3.5), Some(70.0), Some(2_350_000), "Y")));
    assert!(!criteria.matches(&listing(Some(3.5), Some(70.0), Some(2_350_001), "Y")));
    assert!(!criteria.matches(&listing(Some(5.0), Some(120.0), Some(2_000_000), "X")));
}

#[test]
fn absent_numbers_are_rejected_not_treated_as_zero() {
    let criteria = two_profiles();
    assert!(!criteria.matches(&listing(Some(4.0), Some(85.0), None, "X")));
    assert!(!criteria.matches(&listing(None, Some(85.0), Some(1), "X")));
    assert!(!criteria.matches(&listing(Some(4.0), None, Some(1), "X")));

    let mut no_hood = listing(Some(4.0), Some(85.0), Some(1), "X");
    no_hood.neighborhood = None;
    assert!(!criteria.matches(&no_hood));
}

#[test]
fn profile_neighborhoods_accept_names_and_aliases() {
    let criteria = Criteria::new(
        &[profile("alias", (3.0, 4.0), 0.0, 3_000_000, &["נווה הדרים"])],
        &directory(),
    )
    .unwrap();
    assert!(criteria.profiles()[0].allowed_neighborhoods.contains("X"));
}

#[test]
fn invalid_profiles_fail_fast() {
    let directory = directory();

    let err = Criteria::new(&[], &directory).unwrap_err();
    assert_eq!(err, ConfigError::NoProfiles);

    let err = Criteria::new(&[profile("inverted", (4.0, 3.0), 0.0, 1, &["X"])], &directory)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvertedBounds { field: "rooms", .. }));

    let err = Criteria::new(&[profile("lost", (3.0, 4.0), 0.0, 1, &["Atlantis"])], &directory)
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnknownNeighborhood {
            profile: "lost".into(),
            neighborhood: "Atlantis".into(),
        }
    );

    let err = Criteria::new(&[profile("neg", (3.0, 4.0), -1.0, 1, &["X"])], &directory)
        .unwrap_err();
    assert!(matches!(err, ConfigError::NegativeBound { field: "min_sqm", .. }));

    let err = Criteria::new(&[profile("empty", (3.0, 4.0), 0.0, 1, &[])], &directory)
        .unwrap_err();
    assert!(matches!(err, ConfigError::EmptyNeighborhoods { .. }));
}

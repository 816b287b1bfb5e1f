use super::*;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
}

#[test]
fn test_branch_name_matches_pattern() {
    let pattern = Regex::new(r"^auto-pr-\d{14}-[a-z0-9]{6}$").unwrap();

    let name = generate_branch_name(SINGLE_MODE_PREFIX, 50);

    assert!(pattern.is_match(&name), "unexpected branch name: {name}");
}

#[test]
fn test_branch_name_uses_timestamp() {
    let mut rng = StdRng::seed_from_u64(7);

    let name = branch_name_at(COLLABORATOR_MODE_PREFIX, 50, &fixed_time(), &mut rng);

    assert!(name.starts_with("collab-pr-20240309070501-"), "got {name}");
    assert_eq!(name.len(), "collab-pr-20240309070501-".len() + 6);
}

#[test]
fn test_branch_name_is_truncated_to_max_length() {
    let mut rng = StdRng::seed_from_u64(1);

    let name = branch_name_at("a-very-long-prefix-for-branches", 20, &fixed_time(), &mut rng);

    assert_eq!(name, "a-very-long-prefix-f");
}

#[test]
fn test_branch_names_never_exceed_max_length() {
    for max_length in 1..40 {
        let name = generate_branch_name(SINGLE_MODE_PREFIX, max_length);
        assert!(name.chars().count() <= max_length);
    }
}

#[test]
fn test_consecutive_branch_names_differ() {
    let first = generate_branch_name(SINGLE_MODE_PREFIX, 50);
    let second = generate_branch_name(SINGLE_MODE_PREFIX, 50);

    assert_ne!(first, second);
}

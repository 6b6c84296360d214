//! Property tests for repository id generation

use std::collections::HashSet;

use proptest::prelude::*;
use repo_manager::manager::{generate_id, sanitize_id};

proptest! {
    #[test]
    fn sanitized_ids_use_the_id_alphabet(name in "[ -~]{0,40}") {
        let id = sanitize_id(&name);
        prop_assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')));
        prop_assert!(!id.contains(['"', '\'']));
    }

    #[test]
    fn generated_ids_are_never_taken(
        name in "[ A-Za-z0-9_.\"'/-]{0,20}",
        taken in proptest::collection::hash_set("[a-z0-9-]{1,12}", 0..20),
    ) {
        let id = generate_id(&name, |candidate| taken.contains(candidate));
        prop_assert!(!taken.contains(&id));
        prop_assert!(repo_fs::validate_path_identifier(&id).is_ok());
    }

    #[test]
    fn repeated_generation_yields_distinct_ids(name in "[A-Za-z ]{1,12}", rounds in 1usize..8) {
        let mut taken = HashSet::new();
        for _ in 0..rounds {
            let id = generate_id(&name, |candidate| taken.contains(candidate));
            prop_assert!(taken.insert(id));
        }
    }
}

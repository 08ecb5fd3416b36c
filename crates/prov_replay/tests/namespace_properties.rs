use std::collections::BTreeSet;

use proptest::prelude::*;
use prov_replay::{kebab_case, VariableNamespace};

fn arb_base() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("FeatureTable[Frequency]".to_string()),
        Just("table".to_string()),
        Just("table-1".to_string()),
        Just("EMPSingleEndSequences".to_string()),
        "[A-Za-z][A-Za-z0-9_\\[\\]-]{0,12}",
    ]
}

proptest! {
    #[test]
    fn claimed_names_never_collide(bases in prop::collection::vec(arb_base(), 1..40)) {
        let mut ns = VariableNamespace::new();
        let mut seen = BTreeSet::new();
        for base in &bases {
            let name = ns.claim(base);
            prop_assert!(seen.insert(name.clone()), "{} handed out twice", name);
        }
    }

    #[test]
    fn first_claim_of_a_fresh_base_is_unsuffixed(base in arb_base()) {
        let mut ns = VariableNamespace::new();
        prop_assert_eq!(ns.claim(&base), kebab_case(&base));
    }

    #[test]
    fn kebab_case_is_stable(base in arb_base()) {
        let once = kebab_case(&base);
        prop_assert_eq!(kebab_case(&once), once.clone());
        prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }
}

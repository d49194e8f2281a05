use proptest::prelude::*;
use sdlpack::markers::{InlineKinds, MismatchPolicy, from_markers, to_markers, to_xml};
use sdlpack::xml::parse_document;

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 .,!?&'\"éß]{1,12}").expect("valid text regex")
}

fn id_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_]{1,4}").expect("valid id regex")
}

/// Well-formed marker strings: text, standalone markers and properly nested
/// paired markers.
fn marker_string_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        text_strategy(),
        id_strategy().prop_map(|id| format!("<{id}/>")),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (id_strategy(), prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(id, parts)| format!("<{id}>{}</{id}>", parts.concat())),
            prop::collection::vec(inner, 1..4).prop_map(|parts| parts.concat()),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn well_formed_markers_survive_strict_roundtrip(input in marker_string_strategy()) {
        let nodes = from_markers(&input, MismatchPolicy::Strict)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(to_markers(&nodes), input);
    }

    #[test]
    fn well_formed_markers_survive_xml_roundtrip(input in marker_string_strategy()) {
        let nodes = from_markers(&input, MismatchPolicy::Strict)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let xml = to_xml(&nodes, &InlineKinds::new());
        let target = parse_document(&format!("<target>{xml}</target>"))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(to_markers(&target.children), input);
    }

    #[test]
    fn tolerant_policy_never_fails(input in "[<>/a-z0-9 ]{0,40}") {
        prop_assert!(from_markers(&input, MismatchPolicy::Tolerant).is_ok());
    }
}

use proptest::prelude::*;
use specgraph_db::{assignable, EntityId, PrimitiveKind, PropertyType};

fn arb_primitive() -> impl Strategy<Value = PropertyType> {
    prop_oneof![
        Just(PrimitiveKind::String),
        Just(PrimitiveKind::Number),
        Just(PrimitiveKind::Boolean),
        Just(PrimitiveKind::Json),
    ]
    .prop_map(PropertyType::Primitive)
}

fn arb_type() -> impl Strategy<Value = PropertyType> {
    let leaf = prop_oneof![
        arb_primitive(),
        (0u32..4).prop_map(|raw| PropertyType::Ref(EntityId::from_raw(raw))),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(PropertyType::array),
            inner.clone().prop_map(PropertyType::map),
            prop::collection::vec(inner, 1..4).prop_map(PropertyType::union),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn assignability_is_reflexive(t in arb_type()) {
        prop_assert!(assignable(&t, &t));
    }

    #[test]
    fn a_union_accepts_each_of_its_non_union_members(a in arb_type(), b in arb_type()) {
        let u = PropertyType::union([a.clone(), b.clone()]);
        if !matches!(a, PropertyType::Union(_)) {
            prop_assert!(assignable(&u, &a));
        }
        if !matches!(b, PropertyType::Union(_)) {
            prop_assert!(assignable(&u, &b));
        }
    }

    #[test]
    fn a_union_accepts_its_sub_unions(members in prop::collection::vec(arb_type(), 1..4)) {
        let whole = PropertyType::union(members.clone());
        let part = PropertyType::union(members.into_iter().take(1));
        prop_assert!(assignable(&whole, &part));
    }

    #[test]
    fn json_slots_only_accept_json(t in arb_type()) {
        prop_assert_eq!(assignable(&PropertyType::JSON, &t), t == PropertyType::JSON);
    }

    #[test]
    fn collections_never_cross_kinds(t in arb_type()) {
        prop_assert!(!assignable(&PropertyType::array(t.clone()), &PropertyType::map(t.clone())));
        prop_assert!(!assignable(&PropertyType::map(t.clone()), &PropertyType::array(t)));
    }

    #[test]
    fn collections_are_covariant(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(
            assignable(&PropertyType::array(a.clone()), &PropertyType::array(b.clone())),
            assignable(&a, &b)
        );
        prop_assert_eq!(
            assignable(&PropertyType::map(a.clone()), &PropertyType::map(b.clone())),
            assignable(&a, &b)
        );
    }

    #[test]
    fn tagged_form_round_trips(t in arb_type()) {
        let tagged = t.to_tagged();
        prop_assert_eq!(PropertyType::from_tagged(&tagged).unwrap(), t);
    }
}

#[test]
fn union_rejects_structurally_distinct_types() {
    let a = PropertyType::STRING;
    let b = PropertyType::array(PropertyType::NUMBER);
    let u = PropertyType::union([a.clone(), b.clone()]);
    assert!(assignable(&u, &a));
    assert!(assignable(&u, &b));
    assert!(!assignable(&u, &PropertyType::BOOLEAN));
    assert!(!assignable(&u, &PropertyType::array(PropertyType::STRING)));
    assert!(!assignable(&u, &PropertyType::map(PropertyType::NUMBER)));
}

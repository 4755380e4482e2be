use expect_test::expect;
use rstest::rstest;

use tautring::moduli::{Ct, Rt, Sm, St};
use tautring::{ModuliType, StrataCache};

#[rstest]
#[case(1, 1, &[1, 2][..], St, 5)]
#[case(1, 1, &[1, 1][..], St, 4)]
#[case(2, 2, &[][..], St, 8)]
#[case(2, 2, &[1][..], Ct, 8)]
#[case(3, 2, &[1, 2][..], Rt, 9)]
#[case(3, 2, &[1, 1][..], Sm, 5)]
fn generator_counts(
    #[case] g: i64,
    #[case] r: usize,
    #[case] markings: &[u32],
    #[case] moduli_type: ModuliType,
    #[case] expected: usize,
) {
    let cache = StrataCache::new();
    assert_eq!(cache.num_strata(g, r, markings, moduli_type), expected);
}

#[rstest]
#[case(2, 2, &[][..], St, 2)]
#[case(2, 3, &[][..], St, 1)]
#[case(1, 1, &[1][..], St, 1)]
#[case(4, 2, &[][..], Ct, 6)]
fn predicted_ranks(
    #[case] g: i64,
    #[case] r: usize,
    #[case] markings: &[u32],
    #[case] moduli_type: ModuliType,
    #[case] expected: usize,
) {
    let cache = StrataCache::new();
    assert_eq!(cache.betti(g, r, markings, moduli_type), expected);
}

#[test]
fn dr_cycle_genus_one() {
    let cache = StrataCache::new();
    let joined = |v: Vec<num_rational::BigRational>| {
        v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")
    };
    expect![["0 2 2 0 -1/24"]].assert_eq(&joined(cache.dr_compute(1, 1, 2, &[2, -2], 0, St)));
    expect![["0 0 0 4 1/8"]].assert_eq(&joined(cache.dr_reduced(1, &[2, -2]).unwrap()));
}

#[test]
fn socle_pairing_is_symmetric() {
    let cache = StrataCache::new();
    let m = cache.pairing_matrix(1, 1, &[1, 1], St);
    let rows: Vec<String> = m
        .iter()
        .map(|row| row.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" "))
        .collect();
    expect![[r#"
        1/4 1/6 1/12 2
        1/6 1/12 0 2
        1/12 0 -1/12 2
        2 2 2 0
    "#]]
    .assert_eq(&format!("{}\n", rows.join("\n")));
    for i in 0..m.len() {
        for j in 0..i {
            assert_eq!(m[i][j], m[j][i]);
        }
    }
}

#[test]
fn spin_and_derived_relations_agree() {
    let cache = StrataCache::new();
    assert!(cache.fz_methods_sanity_check(2, 2, 0, St));
    assert!(cache.fz_methods_sanity_check(1, 2, 1, Ct));
}

#[test]
fn multiplication_is_associative() {
    let cache = StrataCache::new();
    cache.check_associativity(2, 1, 1, 1, &[], St).unwrap();
    cache
        .check_associativity(0, 1, 1, 1, &[1, 2, 3, 4, 5, 6], St)
        .unwrap();
}

#![no_main]

use damage_reflection::catalog::{EntityKind, Relevance, TypeMembership};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // First line is the exclude list, the rest is the include list
    let mut lines = text.lines();
    let exclude: Vec<String> = lines
        .next()
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();
    let include: Vec<String> = lines.map(str::to_string).collect();

    let (membership, _) = TypeMembership::compile(&exclude, &include);
    let (again, _) = TypeMembership::compile(&exclude, &include);
    assert_eq!(membership, again);

    for kind in EntityKind::ALL {
        let relevance = membership.relevance(kind, kind.type_name());
        if exclude.iter().any(|e| e.trim() == kind.type_name()) {
            assert_eq!(relevance, Relevance::Excluded);
        }
    }
});

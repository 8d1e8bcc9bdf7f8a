use impact_classfile::{ClassFile, MemberRefKind};
use impact_test_utils::ClassFileBuilder;

#[test]
fn lists_method_and_interface_method_refs_in_pool_order() {
    let bytes = ClassFileBuilder::new("com/example/Caller")
        .calls("com/example/Derived", "run")
        .calls_interface("java/util/List", "size")
        .build();

    let cf = ClassFile::parse(&bytes).unwrap();
    let refs = cf.method_refs().unwrap();
    let flat: Vec<_> = refs
        .iter()
        .map(|r| (r.kind, r.class_name, r.name))
        .collect();
    assert_eq!(
        flat,
        vec![
            (MemberRefKind::Method, "com/example/Derived", "run"),
            (MemberRefKind::InterfaceMethod, "java/util/List", "size"),
        ]
    );
}

#[test]
fn field_refs_are_not_method_refs() {
    let bytes = ClassFileBuilder::new("com/example/Caller")
        .reads_field("com/example/Config", "DEBUG")
        .calls("com/example/Config", "load")
        .build();

    let cf = ClassFile::parse(&bytes).unwrap();
    let refs = cf.method_refs().unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].name, "load");
}

#[test]
fn two_slot_constants_do_not_shift_later_entries() {
    let bytes = ClassFileBuilder::new("com/example/Constants")
        .long_constant(42)
        .long_constant(-1)
        .calls("com/example/Target", "go")
        .build();

    let cf = ClassFile::parse(&bytes).unwrap();
    assert_eq!(cf.this_class, "com/example/Constants");
    let refs = cf.method_refs().unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].class_name, "com/example/Target");
    assert_eq!(refs[0].name, "go");
}

#[test]
fn repeated_call_sites_share_pool_entries_but_each_ref_is_listed() {
    let bytes = ClassFileBuilder::new("C")
        .calls("T", "a")
        .calls("T", "a")
        .build();
    let cf = ClassFile::parse(&bytes).unwrap();
    // Two distinct Methodref slots pointing at the same target.
    assert_eq!(cf.method_refs().unwrap().len(), 2);
}

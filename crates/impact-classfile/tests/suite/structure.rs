use impact_classfile::{ClassFile, Error};
use impact_test_utils::ClassFileBuilder;

#[test]
fn reads_name_super_and_interfaces() {
    let bytes = ClassFileBuilder::new("com/example/Derived")
        .extends("com/example/Base")
        .implements("java/lang/Runnable")
        .implements("java/io/Serializable")
        .build();

    let cf = ClassFile::parse(&bytes).unwrap();
    assert_eq!(cf.major_version, 52);
    assert_eq!(cf.this_class, "com/example/Derived");
    assert_eq!(cf.super_class.as_deref(), Some("com/example/Base"));
    assert_eq!(cf.interfaces, vec!["java/lang/Runnable", "java/io/Serializable"]);
}

#[test]
fn root_type_has_no_super_class() {
    let bytes = ClassFileBuilder::new("java/lang/Object")
        .without_super()
        .build();
    let cf = ClassFile::parse(&bytes).unwrap();
    assert_eq!(cf.super_class, None);
    assert!(cf.interfaces.is_empty());
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = ClassFileBuilder::new("A").build();
    bytes[0] = 0xDE;
    match ClassFile::parse(&bytes) {
        Err(Error::InvalidMagic(magic)) => assert_eq!(magic, 0xDEFEBABE),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn truncated_class_is_rejected() {
    let bytes = ClassFileBuilder::new("com/example/A")
        .calls("com/example/B", "run")
        .build();
    for len in [0, 3, 9, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            ClassFile::parse(&bytes[..len]).is_err(),
            "prefix of {len} bytes should not parse"
        );
    }
}

#[test]
fn trailing_garbage_is_rejected() {
    let mut bytes = ClassFileBuilder::new("A").build();
    bytes.push(0);
    assert_eq!(
        ClassFile::parse(&bytes).unwrap_err(),
        Error::TrailingBytes(1)
    );
}

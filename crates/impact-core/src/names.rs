use std::borrow::Cow;

/// Binary name of the universal root type. It carries no hierarchy information
/// and is never recorded as a superclass.
pub const ROOT_CLASS: &str = "java.lang.Object";

/// Converts a JVM internal name (`java/util/List`) into its binary form
/// (`java.util.List`).
///
/// Names that are already dotted are returned unchanged without allocating.
pub fn binary_name(name: &str) -> Cow<'_, str> {
    if name.contains('/') {
        Cow::Owned(name.replace('/', "."))
    } else {
        Cow::Borrowed(name)
    }
}

/// `module-info` and `package-info` are class files without a type hierarchy.
pub fn is_ignored_class(binary_name: &str) -> bool {
    binary_name == "module-info"
        || binary_name == "package-info"
        || binary_name.ends_with(".package-info")
}

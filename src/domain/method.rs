//! Helpers over the full-method string format `com.pkg.Class:method(arg.Type,arg.Type)`.

/// Fully qualified class name of a full method (everything before the first `:`).
pub fn full_class_of(full_method: &str) -> &str {
    match full_method.find(':') {
        Some(idx) => &full_method[..idx],
        None => full_method,
    }
}

/// Method name plus argument list, e.g. `test1(java.lang.String)`.
pub fn method_with_args(full_method: &str) -> &str {
    match full_method.find(':') {
        Some(idx) => &full_method[idx + 1..],
        None => full_method,
    }
}

/// Bare method name without arguments.
pub fn method_name(full_method: &str) -> &str {
    let with_args = method_with_args(full_method);
    match with_args.find('(') {
        Some(idx) => &with_args[..idx],
        None => with_args,
    }
}

/// Last dot-separated segment of a fully qualified class name.
pub fn simple_class_of(full_class: &str) -> &str {
    match full_class.rfind('.') {
        Some(idx) => &full_class[idx + 1..],
        None => full_class,
    }
}

/// Simple class name of a full method's declaring class.
pub fn simple_class_of_method(full_method: &str) -> &str {
    simple_class_of(full_class_of(full_method))
}

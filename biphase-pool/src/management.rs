//! Registration of pooled resources for operational inspection.

/// Receives the identifiers under which pooled resources are registered.
///
/// Implementations typically bridge to an operational surface such as a
/// metrics endpoint or an admin console. The registry is injected into
/// every pooled connection, which registers itself at construction and
/// unregisters on destruction.
pub trait ManagementRegistry: Send + Sync {
    /// Registers a resource under `id`.
    fn register(&self, id: &str);

    /// Unregisters the resource previously registered under `id`.
    fn unregister(&self, id: &str);
}

/// A management registry that ignores every registration.
#[derive(Debug, Default)]
pub struct NoopManagementRegistry;

impl ManagementRegistry for NoopManagementRegistry {
    fn register(&self, _id: &str) {}

    fn unregister(&self, _id: &str) {}
}

/// Sanitizes a pool unique name for use inside a management id.
///
/// Characters that carry meaning in management id grammars (separators,
/// wildcards, quotes, whitespace) are replaced with `_`.
pub fn make_valid_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ':' | ',' | '=' | '*' | '?' | '"' | '\n' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_is_unchanged() {
        assert_eq!(make_valid_name("orders-db"), "orders-db");
        assert_eq!(make_valid_name("ds_1.main"), "ds_1.main");
    }

    #[test]
    fn test_reserved_characters_are_replaced() {
        assert_eq!(make_valid_name("a:b,c=d"), "a_b_c_d");
        assert_eq!(make_valid_name("a*b?c\"d"), "a_b_c_d");
    }

    #[test]
    fn test_whitespace_is_replaced() {
        assert_eq!(make_valid_name("orders db\tmain"), "orders_db_main");
    }

    #[test]
    fn test_noop_registry() {
        let registry = NoopManagementRegistry;
        registry.register("biphase:type=XaConnection,unique_name=ds1,id=1");
        registry.unregister("biphase:type=XaConnection,unique_name=ds1,id=1");
    }
}

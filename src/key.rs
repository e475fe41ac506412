use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

/// Identity of a cached value: the value type plus the caller's key.
///
/// Equal caller keys for different value types never collide because the [`TypeId`] is part of
/// the identity. The rendered form `type_name:key` is only used for logs and error messages.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    type_id: TypeId,
    repr: Arc<str>,
}

impl CacheKey {
    pub fn new<T, K>(key: &K) -> Self
    where
        T: 'static,
        K: fmt::Display + ?Sized,
    {
        Self {
            type_id: TypeId::of::<T>(),
            repr: format!("{}:{}", type_name::<T>(), key).into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheKey").field(&self.repr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User;
    struct Order;

    #[test]
    fn test_same_type_and_key_are_equal() {
        assert_eq!(CacheKey::new::<User, _>(&42), CacheKey::new::<User, _>("42"));
    }

    #[test]
    fn test_types_do_not_collide() {
        let user = CacheKey::new::<User, _>(&42);
        let order = CacheKey::new::<Order, _>(&42);
        assert_ne!(user, order);
        assert!(user.to_string().ends_with("User:42"));
        assert!(order.to_string().ends_with("Order:42"));
    }

    #[test]
    fn test_keys_do_not_collide() {
        assert_ne!(CacheKey::new::<User, _>("a"), CacheKey::new::<User, _>("b"));
    }
}

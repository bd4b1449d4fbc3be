use crate::models::{Catch, Visibility};

/// Whether a catch with this visibility may contend for titles.
pub fn qualifies(visibility: Visibility) -> bool {
    match visibility {
        Visibility::Public | Visibility::FriendsOnly => true,
        Visibility::Private => false,
    }
}

/// Whether `catch` may contend for spot and territory titles.
///
/// Private catches are kept in the catch history but never compete.
pub fn is_contender(catch: &Catch) -> bool {
    qualifies(catch.visibility)
}

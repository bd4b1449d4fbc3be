pub use super::{catches::Entity as Catches, spots::Entity as Spots, territories::Entity as Territories};

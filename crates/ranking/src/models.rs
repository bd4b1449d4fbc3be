use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::units;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_type!(
    /// An angler.
    UserId
);
id_type!(SpotId);
id_type!(CatchId);
id_type!(TerritoryId);

/// Optimistic-concurrency token of a spot row.
///
/// Every committed title change bumps it, so a write that carries a stale
/// version is rejected by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    pub const INITIAL: Version = Version(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SizeUnit {
    Millimeters,
    Centimeters,
    Meters,
    Inches,
    Feet,
    Grams,
    Kilograms,
    Ounces,
    Pounds,
    Other(String),
}

impl SizeUnit {
    pub fn code(&self) -> &str {
        match self {
            SizeUnit::Millimeters => "mm",
            SizeUnit::Centimeters => "cm",
            SizeUnit::Meters => "m",
            SizeUnit::Inches => "in",
            SizeUnit::Feet => "ft",
            SizeUnit::Grams => "g",
            SizeUnit::Kilograms => "kg",
            SizeUnit::Ounces => "oz",
            SizeUnit::Pounds => "lb",
            SizeUnit::Other(code) => code,
        }
    }

    pub fn is_length(&self) -> bool {
        matches!(
            self,
            SizeUnit::Millimeters
                | SizeUnit::Centimeters
                | SizeUnit::Meters
                | SizeUnit::Inches
                | SizeUnit::Feet
        )
    }
}

impl From<&str> for SizeUnit {
    fn from(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "mm" => SizeUnit::Millimeters,
            "cm" => SizeUnit::Centimeters,
            "m" => SizeUnit::Meters,
            "in" => SizeUnit::Inches,
            "ft" => SizeUnit::Feet,
            "g" => SizeUnit::Grams,
            "kg" => SizeUnit::Kilograms,
            "oz" => SizeUnit::Ounces,
            "lb" | "lbs" => SizeUnit::Pounds,
            _ => SizeUnit::Other(code.trim().to_string()),
        }
    }
}

impl From<String> for SizeUnit {
    fn from(code: String) -> Self {
        SizeUnit::from(code.as_str())
    }
}

impl From<SizeUnit> for String {
    fn from(unit: SizeUnit) -> Self {
        unit.code().to_string()
    }
}

impl Display for SizeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub value: f64,
    pub unit: SizeUnit,
}

impl Size {
    pub fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    pub fn cm(value: f64) -> Self {
        Self::new(value, SizeUnit::Centimeters)
    }

    /// Size in centimeters, or the raw value for units outside the length set.
    pub fn normalized(&self) -> f64 {
        units::normalize(self.value, &self.unit)
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}{}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    FriendsOnly,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::FriendsOnly => "friends_only",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown visibility `{0}`")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" => Ok(Visibility::Public),
            "friends_only" => Ok(Visibility::FriendsOnly),
            "private" => Ok(Visibility::Private),
            other => Err(UnknownVisibility(other.to_string())),
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged catch. Size and species never change once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catch {
    pub id: CatchId,
    pub owner: UserId,
    pub spot: Option<SpotId>,
    pub species: String,
    pub size: Size,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Display for Catch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) by {}", self.species, self.size, self.owner)
    }
}

/// A catch that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCatch {
    pub owner: UserId,
    pub spot: Option<SpotId>,
    pub species: String,
    pub size: Size,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl NewCatch {
    pub fn with_id(self, id: CatchId) -> Catch {
        Catch {
            id,
            owner: self.owner,
            spot: self.spot,
            species: self.species,
            size: self.size,
            visibility: self.visibility,
            created_at: self.created_at,
        }
    }
}

/// The consistent view of a spot's title fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotTitle {
    pub king: UserId,
    pub best_catch: CatchId,
    pub best_size: Size,
}

impl SpotTitle {
    pub fn for_catch(catch: &Catch) -> Self {
        Self {
            king: catch.owner,
            best_catch: catch.id,
            best_size: catch.size.clone(),
        }
    }
}

/// A spot as stored.
///
/// The title fields are kept as they come out of the store so that rows
/// violating the "king iff best catch" rule can still be loaded. Use
/// [`Spot::title`] to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,
    pub territory: Option<TerritoryId>,
    pub king: Option<UserId>,
    pub best_catch: Option<CatchId>,
    pub best_size: Option<Size>,
}

impl Spot {
    pub fn untitled(id: SpotId, territory: Option<TerritoryId>) -> Self {
        Self {
            id,
            territory,
            king: None,
            best_catch: None,
            best_size: None,
        }
    }

    pub fn with_title(mut self, title: SpotTitle) -> Self {
        self.king = Some(title.king);
        self.best_catch = Some(title.best_catch);
        self.best_size = Some(title.best_size);
        self
    }

    /// Current title, or `None` when the spot is untitled or its title fields
    /// disagree with each other.
    pub fn title(&self) -> Option<SpotTitle> {
        match (self.king, self.best_catch) {
            (Some(king), Some(best_catch)) => Some(SpotTitle {
                king,
                best_catch,
                // a missing size compares like an empty spot
                best_size: self
                    .best_size
                    .clone()
                    .unwrap_or_else(|| Size::cm(0.0)),
            }),
            (None, None) => None,
            (king, best_catch) => {
                debug!(
                    "Spot {} has inconsistent title (king: {:?}, best catch: {:?}), reading it as untitled",
                    self.id, king, best_catch
                );
                None
            }
        }
    }

    /// Exactly one of king and best catch is set.
    pub fn has_inconsistent_title(&self) -> bool {
        self.king.is_some() != self.best_catch.is_some()
    }
}

/// A spot record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    pub spots: Vec<SpotId>,
}

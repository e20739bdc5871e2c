//! Variant Registry
//!
//! The closed set of minigame kinds. Identity comes in two shapes (numeric id
//! and text token) and both resolve through one total function: anything
//! unknown is `NONE`, which is the documented contract rather than an error.

use serde::{Serialize, Deserialize};

use crate::game::controller::Controller;

/// One minigame kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// No minigame; normal play.
    None,
    /// Last player standing.
    Battle,
    /// Knock opponents off the arena.
    Tumble,
    /// Elytra course.
    Glide,
    /// Waiting room.
    Lobby,
}

/// Either form of variant identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantKey<'a> {
    /// Numeric id.
    Id(i64),
    /// Text token, matched case-insensitively.
    Token(&'a str),
}

impl From<i64> for VariantKey<'_> {
    fn from(id: i64) -> Self {
        VariantKey::Id(id)
    }
}

impl<'a> From<&'a str> for VariantKey<'a> {
    fn from(token: &'a str) -> Self {
        VariantKey::Token(token)
    }
}

impl Variant {
    /// Every variant.
    pub const ALL: [Variant; 5] = [
        Variant::None,
        Variant::Battle,
        Variant::Tumble,
        Variant::Glide,
        Variant::Lobby,
    ];

    /// Match variants that can be launched from the lobby.
    pub const MATCHES: [Variant; 3] = [Variant::Battle, Variant::Tumble, Variant::Glide];

    /// Numeric id. `NONE` is 0 and `LOBBY` is 99.
    pub const fn id(self) -> i64 {
        match self {
            Variant::None => 0,
            Variant::Battle => 1,
            Variant::Tumble => 2,
            Variant::Glide => 3,
            Variant::Lobby => 99,
        }
    }

    /// Lowercase text token.
    pub const fn token(self) -> &'static str {
        match self {
            Variant::None => "none",
            Variant::Battle => "battle",
            Variant::Tumble => "tumble",
            Variant::Glide => "glide",
            Variant::Lobby => "lobby",
        }
    }

    /// Human-readable name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Variant::None => "None",
            Variant::Battle => "Battle",
            Variant::Tumble => "Tumble",
            Variant::Glide => "Glide",
            Variant::Lobby => "Lobby",
        }
    }

    /// True for real match variants (not `NONE`, not `LOBBY`).
    pub const fn is_actual_minigame(self) -> bool {
        !matches!(self, Variant::None | Variant::Lobby)
    }

    /// Whether the client hides hearts and hunger on the hotbar.
    pub const fn has_bare_hotbar(self) -> bool {
        matches!(self, Variant::Lobby)
    }

    /// Resolve a numeric id; unknown ids are `NONE`.
    pub fn from_id(id: i64) -> Variant {
        Self::ALL
            .into_iter()
            .find(|v| v.id() == id)
            .unwrap_or(Variant::None)
    }

    /// Resolve a token case-insensitively; a numeric string resolves as an
    /// id. Unknown tokens are `NONE`.
    pub fn from_token(token: &str) -> Variant {
        let token = token.trim();
        if let Ok(id) = token.parse::<i64>() {
            return Self::from_id(id);
        }
        Self::ALL
            .into_iter()
            .find(|v| v.token().eq_ignore_ascii_case(token))
            .unwrap_or(Variant::None)
    }

    /// Resolve either identity form. Never fails.
    pub fn resolve<'a>(key: impl Into<VariantKey<'a>>) -> Variant {
        match key.into() {
            VariantKey::Id(id) => Self::from_id(id),
            VariantKey::Token(token) => Self::from_token(token),
        }
    }

    /// Fresh controller for this variant.
    pub fn new_controller(self) -> Controller {
        Controller::for_variant(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserved_ids() {
        assert_eq!(Variant::None.id(), 0);
        assert_eq!(Variant::Lobby.id(), 99);
        assert_eq!(Variant::resolve(1i64), Variant::Battle);
        assert_eq!(Variant::resolve(99i64), Variant::Lobby);
    }

    #[test]
    fn test_tokens_case_insensitive() {
        assert_eq!(Variant::resolve("TUMBLE"), Variant::Tumble);
        assert_eq!(Variant::resolve("Glide"), Variant::Glide);
        assert_eq!(Variant::resolve(" battle "), Variant::Battle);
        assert_eq!(Variant::resolve("3"), Variant::Glide);
        assert_eq!(Variant::resolve("parkour"), Variant::None);
        assert_eq!(Variant::resolve(""), Variant::None);
    }

    #[test]
    fn test_metadata() {
        assert!(Variant::Battle.is_actual_minigame());
        assert!(!Variant::Lobby.is_actual_minigame());
        assert!(!Variant::None.is_actual_minigame());
        assert!(Variant::Lobby.has_bare_hotbar());
        assert!(!Variant::Battle.has_bare_hotbar());
        assert_eq!(Variant::Glide.display_name(), "Glide");
    }

    #[test]
    fn test_new_controller_matches_variant() {
        for variant in Variant::ALL {
            assert_eq!(variant.new_controller().variant(), variant);
        }
    }

    proptest! {
        #[test]
        fn property_unknown_ids_resolve_to_none(id in any::<i64>()) {
            prop_assume!(![0, 1, 2, 3, 99].contains(&id));
            prop_assert_eq!(Variant::resolve(id), Variant::None);
        }

        #[test]
        fn property_unknown_tokens_resolve_to_none(token in "[a-z]{1,12}") {
            prop_assume!(!["none", "battle", "tumble", "glide", "lobby"].contains(&token.as_str()));
            prop_assert_eq!(Variant::resolve(token.as_str()), Variant::None);
        }
    }
}

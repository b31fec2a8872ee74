/// The entity families the provider verifies. Accounts are individuals or
/// companies; the rest are person records attached to a company account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Individual,
    Company,
    Representative,
    Director,
    Owner,
}

impl EntityKind {
    pub fn is_person(self) -> bool {
        matches!(
            self,
            EntityKind::Representative | EntityKind::Director | EntityKind::Owner
        )
    }

    /// The relationship role flag the provider expects on person payloads.
    pub fn relationship_role(self) -> Option<&'static str> {
        match self {
            EntityKind::Representative => Some("representative"),
            EntityKind::Director => Some("director"),
            EntityKind::Owner => Some("owner"),
            _ => None,
        }
    }
}

/// Nesting strategy for a path, selected by its leading segment.
///
/// Keeping this as a table means each parsed path is classified exactly once
/// instead of being re-matched against string prefixes at every use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRoute {
    /// Nests under the named account sub-object (`individual` / `company`).
    Entity(&'static str),
    /// Routes to its own dedicated sub-object at the payload root.
    Dedicated(&'static str),
    /// Relationship block: compiled, except for the role booleans.
    Relationship,
    /// Never compiled from form input (tos acceptance, person placeholders).
    Exempt,
    /// No special rule: nests generically from the payload root.
    Generic,
}

pub fn route(head: &str) -> SegmentRoute {
    match head {
        "individual" => SegmentRoute::Entity("individual"),
        "company" => SegmentRoute::Entity("company"),
        "relationship" => SegmentRoute::Relationship,
        "tos_acceptance" => SegmentRoute::Exempt,
        "address_kana" => SegmentRoute::Dedicated("address_kana"),
        "address_kanji" => SegmentRoute::Dedicated("address_kanji"),
        "business_profile" => SegmentRoute::Dedicated("business_profile"),
        "verification" => SegmentRoute::Dedicated("verification"),
        "dob" => SegmentRoute::Dedicated("dob"),
        head if head.starts_with("person_") => SegmentRoute::Exempt,
        _ => SegmentRoute::Generic,
    }
}

/// Relationship leaves that arrive as role checkboxes, not form values.
pub fn is_role_boolean(leaf: &str) -> bool {
    matches!(leaf, "representative" | "director" | "owner" | "executive")
}

/// Secondary address lines are optional regardless of what the provider
/// declares.
pub fn is_secondary_address_line(leaf: &str) -> bool {
    leaf == "line2"
}

/// Flat submission key for the owner-role checkbox, consulted by the
/// percent-ownership zero rule.
pub const OWNER_FLAG_KEY: &str = "relationship_owner";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        assert_eq!(route("individual"), SegmentRoute::Entity("individual"));
        assert_eq!(route("company"), SegmentRoute::Entity("company"));
        assert_eq!(route("dob"), SegmentRoute::Dedicated("dob"));
        assert_eq!(route("business_profile"), SegmentRoute::Dedicated("business_profile"));
        assert_eq!(route("tos_acceptance"), SegmentRoute::Exempt);
        assert_eq!(route("person_abc123"), SegmentRoute::Exempt);
        assert_eq!(route("relationship"), SegmentRoute::Relationship);
        assert_eq!(route("external_account"), SegmentRoute::Generic);
    }

    #[test]
    fn test_role_booleans() {
        assert!(is_role_boolean("owner"));
        assert!(is_role_boolean("executive"));
        assert!(!is_role_boolean("percent_ownership"));
        assert!(!is_role_boolean("title"));
    }
}

//! Space type classification from labels and room shape.

use crate::domain::SpaceType;

/// Label keywords, checked in order. English and German drawing conventions.
const KEYWORDS: &[(&str, SpaceType)] = &[
    ("TREPPE", SpaceType::Stair),
    ("STAIR", SpaceType::Stair),
    ("CORRIDOR", SpaceType::Corridor),
    ("FLUR", SpaceType::Corridor),
    ("LOBBY", SpaceType::Corridor),
    ("FOYER", SpaceType::Corridor),
    ("HALLWAY", SpaceType::Corridor),
    ("KÜCHE", SpaceType::Kitchen),
    ("KUECHE", SpaceType::Kitchen),
    ("KITCHEN", SpaceType::Kitchen),
    ("PANTRY", SpaceType::Kitchen),
    ("BATH", SpaceType::Bathroom),
    ("SHOWER", SpaceType::Bathroom),
    ("DUSCHE", SpaceType::Bathroom),
    ("BAD", SpaceType::Bathroom),
    ("WC", SpaceType::Sanitary),
    ("TOILET", SpaceType::Sanitary),
    ("RESTROOM", SpaceType::Sanitary),
    ("SANITÄR", SpaceType::Sanitary),
    ("SANITAER", SpaceType::Sanitary),
    ("MEETING", SpaceType::Meeting),
    ("CONFERENCE", SpaceType::Meeting),
    ("BESPRECHUNG", SpaceType::Meeting),
    ("OFFICE", SpaceType::Office),
    ("BÜRO", SpaceType::Office),
    ("BUERO", SpaceType::Office),
    ("CLASS", SpaceType::Classroom),
    ("KLASSE", SpaceType::Classroom),
    ("SCHLAF", SpaceType::Bedroom),
    ("BEDROOM", SpaceType::Bedroom),
    ("LIVING", SpaceType::Living),
    ("WOHN", SpaceType::Living),
    ("WARD", SpaceType::Ward),
    ("PATIENT", SpaceType::Ward),
    ("SHOP", SpaceType::Retail),
    ("RETAIL", SpaceType::Retail),
    ("VERKAUF", SpaceType::Retail),
    ("WORKSHOP", SpaceType::Production),
    ("WERKSTATT", SpaceType::Production),
    ("PRODUCTION", SpaceType::Production),
    ("PRODUKTION", SpaceType::Production),
    ("STORAGE", SpaceType::Storage),
    ("LAGER", SpaceType::Storage),
    ("ABSTELL", SpaceType::Storage),
    ("TECHNICAL", SpaceType::Technical),
    ("TECHNIK", SpaceType::Technical),
    ("SERVER", SpaceType::Technical),
    ("PLANT", SpaceType::Technical),
];

/// Classify a room by keyword, e.g. `"OFFICE 1.02"` → [`SpaceType::Office`].
pub fn from_label(label: &str) -> Option<SpaceType> {
    let upper = label.to_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    KEYWORDS.iter().find_map(|(keyword, space)| {
        // Short keywords must match a whole word ("WC", "BAD").
        let hit = if keyword.chars().count() <= 3 {
            words.iter().any(|w| w == keyword)
        } else {
            upper.contains(keyword)
        };
        hit.then_some(*space)
    })
}

/// Fallback for unlabeled rooms.
pub fn from_shape(area_m2: f64, short_side_m: f64, long_side_m: f64) -> SpaceType {
    if short_side_m > 0.0 && long_side_m / short_side_m >= 4.0 && short_side_m <= 2.5 {
        SpaceType::Corridor
    } else if area_m2 < 4.0 {
        SpaceType::Storage
    } else {
        SpaceType::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(from_label("OFFICE 1.02"), Some(SpaceType::Office));
        assert_eq!(from_label("Open Office"), Some(SpaceType::Office));
        assert_eq!(from_label("WC 0.05"), Some(SpaceType::Sanitary));
        assert_eq!(from_label("Teeküche"), Some(SpaceType::Kitchen));
        assert_eq!(from_label("Bad"), Some(SpaceType::Bathroom));
        assert_eq!(from_label("Treppenhaus"), Some(SpaceType::Stair));
        assert_eq!(from_label("Badminton hall"), None);
        assert_eq!(from_label("R-17"), None);
    }

    #[test]
    fn test_shape_fallback() {
        assert_eq!(from_shape(24.0, 2.0, 12.0), SpaceType::Corridor);
        assert_eq!(from_shape(3.0, 1.5, 2.0), SpaceType::Storage);
        assert_eq!(from_shape(20.0, 4.0, 5.0), SpaceType::Other);
    }
}

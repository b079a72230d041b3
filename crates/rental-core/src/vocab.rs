//! Reference vocabularies offered to clients.
//!
//! Locations are suggestions only; statuses and type tags are the values the
//! wiki's dataentry aliases accept, so updates are checked against them.

/// Suggested storage locations.
pub const LOCATIONS: &[&str] = &[
    "Schwind/Rzayev (PT 3.0.30)",
    "Böhm/Böhm (PT 3.0.31)",
    "Brockelmann/Schmidt (PT 3.0.41)",
    "FIL Besprechungsraum (PT 3.0.28)",
    "FIL Besprechungsraum (Sideboard)",
    "FIL Besprechungsraum (Schrank)",
    "FIL Besprechungsraum (Tresor)",
    "FIL Usability-Labor (PT 3.0.26)",
    "FIL Usability-Labor (Laboratories Sideboard)",
    "FIL Usability-Labor (Extras Sideboard)",
    "FIL Werkstatt (PT 3.0.27)",
    "FIL Werkstatt (Schrank unten)",
    "FIL Werkstatt (Schrank oben)",
    "FIL Werkstatt (Sideboard)",
    "Bazo/Kocur (PT 3.0.32)",
    "TB-Besprechungsraum (TB 1.101)",
    "TB-Labor (TB VR4)",
    "TB-Studio (TB VR4)",
    "TB-Werkstatt (TB VR4)",
    "Wimmer (TB 1.102)",
    "Hahn (TB 1.103)",
    "Bockes (TB 1.104)",
    "Projekt (TB 1.105)",
    "Schwappach/Lohmüller (TB 1.106)",
    "Safe",
    "anderer Ort",
    "unbekannt",
];

/// Accepted item statuses.
pub const STATUSES: &[&str] = &[
    "defekt",
    "entliehen",
    "geblockt",
    "reserviert",
    "verbaut",
    "verfügbar",
    "verloren",
];

/// Accepted type tags.
pub const TYPES: &[&str] = &[
    "Adapter",
    "Audio",
    "Beamer",
    "Display",
    "Diverse",
    "Eingabegerät",
    "Kabel",
    "Kamera",
    "Laptop",
    "PC",
    "Prototyping",
    "Sensor",
    "Smartphone",
    "Smartwatch",
    "Software",
    "Spielkonsole",
    "Stativ",
    "Tablet",
    "Werkzeug",
];

/// Status of an item that is currently lent out.
pub const STATUS_LENT: &str = "entliehen";
/// Status of an item that can be lent.
pub const STATUS_AVAILABLE: &str = "verfügbar";

#[must_use]
pub fn is_known_status(status: &str) -> bool {
    STATUSES.contains(&status)
}

#[must_use]
pub fn is_known_type(tag: &str) -> bool {
    TYPES.contains(&tag)
}

use serde::Serialize;

/// Fixed display position of a surveyed location on the site plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
}

/// Sentinel for locations with no registered position
pub const UNMAPPED: Coords = Coords { x: 0, y: 0 };

static LOCATION_COORDS: [(&str, Coords); 5] = [
    ("SDB", Coords { x: 100, y: 150 }),
    ("GEC", Coords { x: 300, y: 120 }),
    ("ECC", Coords { x: 220, y: 300 }),
    ("FOODCOURT", Coords { x: 400, y: 250 }),
    ("LOUNGE", Coords { x: 500, y: 200 }),
];

pub fn map_location(name: &str) -> Coords {
    LOCATION_COORDS
        .iter()
        .find(|(location, _)| *location == name)
        .map(|(_, coords)| *coords)
        .unwrap_or(UNMAPPED)
}

pub fn is_mapped(coords: Coords) -> bool {
    coords != UNMAPPED
}

pub fn registered_locations() -> impl Iterator<Item = &'static str> {
    LOCATION_COORDS.iter().map(|(location, _)| *location)
}

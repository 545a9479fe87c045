//! The two payload domains the demo can seed.

use std::fmt;

use ordo_core::{Container, ContainerEntry, Item};

/// A card on a kanban-style board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub assignee: Option<String>,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.assignee {
            Some(who) => write!(f, "{} (@{who})", self.title),
            None => f.write_str(&self.title),
        }
    }
}

/// A planted area inside a growing zone.
#[derive(Debug, Clone, PartialEq)]
pub struct CultivationArea {
    pub name: String,
    pub crop: String,
    pub area_m2: f32,
}

impl fmt::Display for CultivationArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({} m²)", self.name, self.crop, self.area_m2)
    }
}

fn column<P>(id: &str, name: &str, order: u32, items: Vec<(&str, P)>) -> ContainerEntry<P> {
    ContainerEntry::new(
        Container::new(id, name, order),
        items
            .into_iter()
            .enumerate()
            .map(|(i, (item, payload))| Item::new(item, id, i as u32, payload))
            .collect(),
    )
}

fn card(title: &str, assignee: Option<&str>) -> Card {
    Card {
        title: title.into(),
        assignee: assignee.map(Into::into),
    }
}

fn area(name: &str, crop: &str, area_m2: f32) -> CultivationArea {
    CultivationArea {
        name: name.into(),
        crop: crop.into(),
        area_m2,
    }
}

/// Three board columns; `review` starts empty.
#[must_use]
pub fn board_seed() -> Vec<ContainerEntry<Card>> {
    vec![
        column(
            "todo",
            "To do",
            0,
            vec![
                ("card-1", card("Write release notes", Some("mara"))),
                ("card-2", card("Triage inbox", None)),
                ("card-3", card("Fix flaky login test", Some("jo"))),
            ],
        ),
        column(
            "doing",
            "Doing",
            1,
            vec![("card-4", card("Migrate billing tables", Some("sam")))],
        ),
        column("review", "Review", 2, Vec::new()),
    ]
}

/// Two greenhouse zones with planted areas.
#[must_use]
pub fn cultivation_seed() -> Vec<ContainerEntry<CultivationArea>> {
    vec![
        column(
            "north",
            "North greenhouse",
            0,
            vec![
                ("bed-a", area("Bed A", "tomato", 12.5)),
                ("bed-b", area("Bed B", "basil", 4.0)),
            ],
        ),
        column(
            "south",
            "South greenhouse",
            1,
            vec![
                ("bed-c", area("Bed C", "lettuce", 8.0)),
                ("bed-d", area("Bed D", "pepper", 10.0)),
                ("bed-e", area("Bed E", "cucumber", 6.5)),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_normalized() {
        for entry in board_seed() {
            for (i, item) in entry.items.iter().enumerate() {
                assert_eq!(item.order as usize, i);
                assert_eq!(item.container_id, entry.container.id);
            }
        }
        assert_eq!(cultivation_seed()[1].items.len(), 3);
    }

    #[test]
    fn payload_display() {
        assert_eq!(card("Ship it", Some("kim")).to_string(), "Ship it (@kim)");
        assert_eq!(area("Bed Z", "kale", 2.5).to_string(), "Bed Z: kale (2.5 m²)");
    }
}

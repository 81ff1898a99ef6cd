//! Room automation data points, controllers and BACS class.

use std::collections::BTreeMap;

use crate::domain::{
    ArtifactDocument, BuildingCategory, CalculationTable, Discipline, GenerationError, Room,
    SpaceType,
};
use crate::generate::tables::fmt;
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

const POINTS_PER_CONTROLLER: u32 = 32;
/// Occupant density above which ventilation is demand controlled.
const CO2_DENSITY_THRESHOLD: f64 = 0.2;

/// EN 15232 efficiency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BacsClass {
    D,
    C,
    B,
    A,
}

impl BacsClass {
    pub fn rank(&self) -> u8 {
        match self {
            BacsClass::D => 1,
            BacsClass::C => 2,
            BacsClass::B => 3,
            BacsClass::A => 4,
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            BacsClass::D => "D",
            BacsClass::C => "C",
            BacsClass::B => "B",
            BacsClass::A => "A",
        }
    }
}

/// Functions installed in one room.
#[derive(Debug, Clone, Default, PartialEq)]
struct RoomFunctions {
    lighting: u32,
    presence: bool,
    heating: u32,
    co2: bool,
    blinds: u32,
}

impl RoomFunctions {
    fn points(&self) -> u32 {
        self.lighting + self.presence as u32 + self.heating + self.co2 as u32 + self.blinds
    }
}

fn room_functions(room: &Room, category: BuildingCategory) -> RoomFunctions {
    let residential = category == BuildingCategory::Residential;
    let space = room.space_type;
    let conditioned = !matches!(space, SpaceType::Stair | SpaceType::Storage);
    RoomFunctions {
        // switch + dimming
        lighting: 2,
        presence: !residential && !matches!(space, SpaceType::Stair | SpaceType::Technical),
        // temperature, setpoint, valve
        heating: if conditioned { 3 } else { 0 },
        co2: space.occupancy_density() >= CO2_DENSITY_THRESHOLD,
        // position + slat angle per facade with windows
        blinds: if room.windows > 0 && !residential { 2 } else { 0 },
    }
}

/// Class the installed functions reach.
fn bacs_class(category: BuildingCategory, presence_coverage: f64) -> BacsClass {
    if category == BuildingCategory::Residential {
        BacsClass::C
    } else if presence_coverage >= 0.5 {
        BacsClass::B
    } else {
        BacsClass::C
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutomationGenerator;

impl DisciplineGenerator for AutomationGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Automation
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let category = input.project.category;
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut points_table = CalculationTable::new(
            "Data points",
            &["Room", "Use", "Lighting", "Presence", "Heating", "CO₂", "Blinds", "Total"],
        );

        let mut points_by_level: BTreeMap<usize, u32> = BTreeMap::new();
        let mut presence_rooms = 0;
        let mut co2_rooms = 0;
        let mut occupied_rooms = 0;

        for room in &input.building.rooms {
            let f = room_functions(room, category);
            let points = f.points();
            *points_by_level.entry(room.level).or_insert(0) += points;
            if room.space_type.is_occupied() {
                occupied_rooms += 1;
                presence_rooms += f.presence as u32;
            }
            co2_rooms += f.co2 as u32;

            let mut row = room_row(room);
            row.put("data_points", points as f64);
            row.put("presence_sensor", f.presence as u8 as f64);
            if f.co2 {
                row.put("co2_sensor", 1.0);
            }
            doc.rooms.push(row);

            let yes_no = |b: bool| if b { "1" } else { "0" }.to_string();
            points_table.push_row(vec![
                room.id.clone(),
                room.space_type.to_string(),
                f.lighting.to_string(),
                yes_no(f.presence),
                f.heating.to_string(),
                yes_no(f.co2),
                f.blinds.to_string(),
                points.to_string(),
            ]);
        }

        let mut controllers_table = CalculationTable::new(
            "Room controllers",
            &["Level", "Data points", "Controllers", "Points per controller"],
        );
        let mut controllers = 0;
        let mut points_total = 0;
        let mut max_per_controller: f64 = 0.0;
        for (level, points) in &points_by_level {
            let count = points.div_ceil(POINTS_PER_CONTROLLER).max(1);
            let per = *points as f64 / count as f64;
            max_per_controller = max_per_controller.max(per);
            controllers += count;
            points_total += points;
            controllers_table.push_row(vec![
                level.to_string(),
                points.to_string(),
                count.to_string(),
                fmt(per, 1),
            ]);
        }
        if controllers == 0 {
            return Err(GenerationError::new(self.discipline(), "no rooms to automate"));
        }

        let presence_coverage = if occupied_rooms > 0 {
            presence_rooms as f64 / occupied_rooms as f64
        } else {
            0.0
        };
        let class = bacs_class(category, presence_coverage);
        let mut summary = CalculationTable::new("BACS class", &["Parameter", "Value"]);
        summary.push_row(vec!["Efficiency class".to_string(), class.letter().to_string()]);
        summary.push_row(vec!["Presence coverage".to_string(), fmt(presence_coverage, 2)]);

        doc.put("data_points", points_total as f64);
        doc.put("controllers", controllers as f64);
        doc.put("max_points_per_controller", max_per_controller);
        doc.put("presence_coverage", presence_coverage);
        doc.put("co2_sensors", co2_rooms as f64);
        doc.put("bacs_class_rank", class.rank() as f64);
        doc.tables.push(points_table);
        doc.tables.push(controllers_table);
        doc.tables.push(summary);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::test_support::{room, sample_input};

    #[test]
    fn test_class_order() {
        assert!(BacsClass::A > BacsClass::B);
        assert_eq!(BacsClass::B.rank(), 3);
        assert_eq!(bacs_class(BuildingCategory::Residential, 1.0), BacsClass::C);
        assert_eq!(bacs_class(BuildingCategory::Office, 0.8), BacsClass::B);
    }

    #[test]
    fn test_sample_points() {
        let doc = AutomationGenerator
            .design(&sample_input(Discipline::Automation))
            .expect("design");
        // lighting 2 + presence 1 + heating 3 + co2 1 + blinds 2
        let meeting = room(&doc, "L0-R04");
        assert_eq!(meeting.metrics.get("data_points"), Some(&9.0));
        assert_eq!(meeting.metrics.get("co2_sensor"), Some(&1.0));
        let office = room(&doc, "L0-R02");
        assert!(!office.metrics.contains_key("co2_sensor"));
        assert!(doc.metric("max_points_per_controller").expect("max") <= 32.0);
        assert_eq!(doc.metric("bacs_class_rank"), Some(3.0));
    }
}

//! Room schedule and area reconciliation.

use crate::domain::{ArtifactDocument, CalculationTable, Discipline, GenerationError};
use crate::generate::tables::fmt;
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

/// Floor finish plus suspended ceiling subtracted from the storey height.
const CEILING_BUILDUP_M: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchitectureGenerator;

impl DisciplineGenerator for ArchitectureGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::Architecture
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let building = &input.building;
        let project = &input.project;
        if project.total_area_m2 <= 0.0 {
            return Err(GenerationError::new(
                self.discipline(),
                "declared area must be positive",
            ));
        }

        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);
        let mut schedule = CalculationTable::new(
            "Room schedule",
            &["Room", "Name", "Level", "Use", "Area m²", "Perimeter m", "Height m", "Volume m³"],
        );
        let mut min_clear = f64::INFINITY;

        for room in &building.rooms {
            let mut row = room_row(room);
            row.put("area_m2", room.area_m2);
            row.put("perimeter_m", room.perimeter_m);
            row.put("height_m", room.height_m);
            row.put("volume_m3", room.volume_m3());
            row.put("exterior_wall_m", room.exterior_wall_m);
            if room.space_type.is_occupied() {
                let clear = room.height_m - CEILING_BUILDUP_M;
                min_clear = min_clear.min(clear);
                row.put("clear_height_m", clear);
            }
            doc.rooms.push(row);
            schedule.push_row(vec![
                room.id.clone(),
                room.display_name().to_string(),
                room.level.to_string(),
                room.space_type.to_string(),
                fmt(room.area_m2, 2),
                fmt(room.perimeter_m, 2),
                fmt(room.height_m, 2),
                fmt(room.volume_m3(), 1),
            ]);
        }

        let mut by_level = CalculationTable::new("Area by level", &["Level", "Name", "Rooms", "Area m²"]);
        let areas = building.area_by_level();
        for level in &building.levels {
            by_level.push_row(vec![
                level.index.to_string(),
                level.name.clone(),
                building.rooms_on_level(level.index).count().to_string(),
                fmt(areas.get(&level.index).copied().unwrap_or(0.0), 2),
            ]);
        }

        let net = building.net_floor_area_m2();
        let declared = project.total_area_m2;
        doc.put("net_floor_area_m2", net);
        doc.put("declared_area_m2", declared);
        doc.put("area_deviation_pct", (net - declared).abs() / declared * 100.0);
        doc.put("room_count", building.rooms.len() as f64);
        doc.put("level_count", building.levels.len() as f64);
        doc.put("gross_volume_m3", building.rooms.iter().map(|r| r.volume_m3()).sum());
        if min_clear.is_finite() {
            doc.put("min_clear_height_m", min_clear);
        }
        doc.tables.push(schedule);
        doc.tables.push(by_level);
        Ok(doc)
    }
}
